use anyhow::Result;
use base::entities::{Candle, Timeframe};
use base::helpers::NumberOfCandles;
use chrono::{DateTime, Utc};

/// The result of requesting one page of historical candles.
#[derive(Debug)]
pub enum FetchOutcome {
    Data(Vec<Candle>),
    /// The provider has no candles at or before the requested time.
    NoMoreData,
    /// The provider couldn't be reached or answered with garbage, even after retries.
    TransientError(anyhow::Error),
}

pub trait MarketDataApi {
    /// Requests up to `limit` candles at or before `end_time`.
    fn get_historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        end_time: DateTime<Utc>,
        limit: NumberOfCandles,
    ) -> FetchOutcome;
}

pub trait AccountApi {
    /// Makes sure the trading account is deployed and connected to its broker.
    fn connect(&self) -> Result<()>;
}
