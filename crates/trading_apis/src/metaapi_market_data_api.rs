use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use base::entities::candle::{CandlePrice, TickVolume};
use base::entities::{Candle, Timeframe};
use base::helpers::NumberOfCandles;
use base::requests::api::SyncHttpRequest;
use base::requests::entities::{HttpRequestData, HttpRequestMethod, HttpRequestWithRetriesParams};
use base::requests::http_request_with_retries;
use base::settings::{ApiUrls, MetaapiSettings};

use crate::api::{FetchOutcome, MarketDataApi};
use crate::helpers::{from_iso_utc_str_to_utc_datetime, from_utc_datetime_to_iso_utc_str};

pub type NumberOfRequestRetries = u32;
pub type SecondsToSleepBeforeRequestRetry = u32;

pub const DEFAULT_NUMBER_OF_REQUEST_RETRIES: NumberOfRequestRetries = 5;
pub const DEFAULT_NUMBER_OF_SECONDS_TO_SLEEP_BEFORE_REQUEST_RETRY:
    SecondsToSleepBeforeRequestRetry = 1;

pub const MAX_NUMBER_OF_CANDLES_PER_REQUEST: NumberOfCandles = 1000;

type MetatraderTime = String;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MetatraderCandleJson {
    time: MetatraderTime,
    open: CandlePrice,
    high: CandlePrice,
    low: CandlePrice,
    close: CandlePrice,
    tick_volume: TickVolume,
}

impl TryFrom<MetatraderCandleJson> for Candle {
    type Error = anyhow::Error;

    fn try_from(candle_json: MetatraderCandleJson) -> Result<Self> {
        Ok(Candle {
            time: from_iso_utc_str_to_utc_datetime(&candle_json.time)?,
            open: candle_json.open,
            high: candle_json.high,
            low: candle_json.low,
            close: candle_json.close,
            tick_volume: candle_json.tick_volume,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    pub number_of_request_retries: NumberOfRequestRetries,
    pub seconds_to_sleep_before_request_retry: SecondsToSleepBeforeRequestRetry,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            number_of_request_retries: DEFAULT_NUMBER_OF_REQUEST_RETRIES,
            seconds_to_sleep_before_request_retry:
                DEFAULT_NUMBER_OF_SECONDS_TO_SLEEP_BEFORE_REQUEST_RETRY,
        }
    }
}

impl From<&MetaapiSettings> for RetrySettings {
    fn from(settings: &MetaapiSettings) -> Self {
        Self {
            number_of_request_retries: settings.number_of_request_retries,
            seconds_to_sleep_before_request_retry: settings.seconds_to_sleep_before_request_retry,
        }
    }
}

pub type AuthToken = String;
pub type AccountId = String;

#[derive(Debug, Clone)]
pub struct ApiData {
    pub auth_token: AuthToken,
    pub account_id: AccountId,
    pub urls: ApiUrls,
}

impl From<&MetaapiSettings> for ApiData {
    fn from(settings: &MetaapiSettings) -> Self {
        Self {
            auth_token: settings.auth_token.clone(),
            account_id: settings.account_id.clone(),
            urls: settings.urls.clone(),
        }
    }
}

pub struct MetaapiMarketDataApi<R>
where
    R: SyncHttpRequest,
{
    api_data: ApiData,
    retry_settings: RetrySettings,
    target_logger: String,
    request_api: R,
}

impl<R> MetaapiMarketDataApi<R>
where
    R: SyncHttpRequest,
{
    pub fn new(
        api_data: ApiData,
        retry_settings: RetrySettings,
        target_logger: String,
        request_api: R,
    ) -> Self {
        Self {
            api_data,
            retry_settings,
            target_logger,
            request_api,
        }
    }

    fn request_block_of_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        end_time: DateTime<Utc>,
        limit: NumberOfCandles,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/users/current/accounts/{}/historical-market-data/symbols/{}/timeframes/{}/candles",
            self.api_data.urls.market_data, self.api_data.account_id, symbol, timeframe
        );

        let req_data = HttpRequestData::new(HttpRequestMethod::Get, url)
            .with_header("auth-token", &self.api_data.auth_token)
            .with_query("startTime", &from_utc_datetime_to_iso_utc_str(end_time))
            .with_query("limit", &limit.to_string());

        let req_params = HttpRequestWithRetriesParams {
            req_entity_name: &format!("the block of {} {} {} candles", limit, symbol, timeframe),
            target_logger: &self.target_logger,
            number_of_retries: self.retry_settings.number_of_request_retries,
            seconds_to_sleep: self.retry_settings.seconds_to_sleep_before_request_retry,
        };

        let response = http_request_with_retries(req_data, req_params, &self.request_api)?;

        let block_of_candles: Vec<MetatraderCandleJson> = serde_json::from_str(&response)
            .context("error on deserializing the block of candles")?;

        block_of_candles
            .into_iter()
            .map(Candle::try_from)
            .collect::<Result<Vec<_>>>()
    }
}

impl<R> MarketDataApi for MetaapiMarketDataApi<R>
where
    R: SyncHttpRequest,
{
    fn get_historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        end_time: DateTime<Utc>,
        limit: NumberOfCandles,
    ) -> FetchOutcome {
        let limit = limit.min(MAX_NUMBER_OF_CANDLES_PER_REQUEST);
        if limit == 0 {
            return FetchOutcome::NoMoreData;
        }

        match self.request_block_of_candles(symbol, timeframe, end_time, limit) {
            Ok(candles) if candles.is_empty() => FetchOutcome::NoMoreData,
            Ok(candles) => FetchOutcome::Data(candles),
            Err(e) => FetchOutcome::TransientError(e),
        }
    }
}
