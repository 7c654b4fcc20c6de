//! Brings a stored series up to date with the market data api: pages of candles are requested
//! backwards from now until they reach the last stored candle, then only the new candles are
//! appended to the series.

use std::collections::VecDeque;

use base::entities::{Candle, CandleTime};
use base::helpers::{number_of_candles_between, NumberOfCandles};
use chrono::{DateTime, Utc};
use trading_apis::metaapi_market_data_api::MAX_NUMBER_OF_CANDLES_PER_REQUEST;
use trading_apis::{FetchOutcome, MarketDataApi};

use crate::historical_data::serialization::DatasetStorage;
use crate::{Dataset, DisorderedCandlesError, SeriesKey};

/// Protects from a market data api that never reaches the stored candles.
pub const MAX_NUMBER_OF_PAGES: u32 = 1000;

pub type PageNumber = u32;

#[derive(thiserror::Error, Debug)]
pub enum SeriesUpdateError {
    #[error("there is no {0} series in the dataset")]
    SeriesNotFound(SeriesKey),

    #[error("the {0} series has no candles to continue from")]
    EmptySeries(SeriesKey),

    #[error("error on requesting page {page} of {key} candles")]
    Fetch {
        key: SeriesKey,
        page: PageNumber,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Disordered(#[from] DisorderedCandlesError),

    #[error("error on saving the dataset after updating the {key} series")]
    Storage {
        key: SeriesKey,
        #[source]
        source: anyhow::Error,
    },
}

/// The number of candles to request per page: all the candles since the cursor,
/// but not more than the api gives at once.
pub fn number_of_candles_to_request(
    cursor: CandleTime,
    now: DateTime<Utc>,
    key: &SeriesKey,
) -> NumberOfCandles {
    number_of_candles_between(cursor, now, key.timeframe).min(MAX_NUMBER_OF_CANDLES_PER_REQUEST)
}

/// Requests pages of candles backwards from `now` until a page reaches the cursor,
/// the api runs out of candles or the page limit is hit. Returns every received candle,
/// the earlier pages first, each page in the order the api returned it.
pub fn fetch_candles_since<M: MarketDataApi>(
    market_data_api: &M,
    key: &SeriesKey,
    cursor: CandleTime,
    now: DateTime<Utc>,
) -> Result<Vec<Candle>, SeriesUpdateError> {
    let limit = number_of_candles_to_request(cursor, now, key);
    if limit == 0 {
        log::info!("{} is ahead of the current time, nothing to request", key);
        return Ok(Vec::new());
    }

    let mut all_candles = VecDeque::new();
    let mut end_time = now;

    for page in 1..=MAX_NUMBER_OF_PAGES {
        let outcome =
            market_data_api.get_historical_candles(&key.symbol, key.timeframe, end_time, limit);

        let block_of_candles = match outcome {
            FetchOutcome::Data(candles) => candles,
            FetchOutcome::NoMoreData => {
                log::info!("{} candles are over", key);
                break;
            }
            FetchOutcome::TransientError(source) => {
                return Err(SeriesUpdateError::Fetch {
                    key: key.clone(),
                    page,
                    source,
                })
            }
        };

        // the order inside of a page depends on the api, so the earliest candle is searched
        let earliest_time = match block_of_candles.iter().map(|candle| candle.time).min() {
            Some(time) => time,
            None => {
                log::info!("{} candles are over", key);
                break;
            }
        };

        log::info!("{} page: {}", key, page);

        let mut block_of_candles = VecDeque::from(block_of_candles);
        block_of_candles.append(&mut all_candles);
        all_candles = block_of_candles;

        end_time = earliest_time;

        if earliest_time <= cursor {
            log::info!("{} reached candles from the dataset", key);
            break;
        }
    }

    Ok(all_candles.into())
}

/// Sorts the candles by time, drops the ones with a repeated time (the first one is kept)
/// and the ones not newer than the cursor.
pub fn candles_newer_than(mut candles: Vec<Candle>, cursor: CandleTime) -> Vec<Candle> {
    candles.sort_by_key(|candle| candle.time);
    candles.dedup_by_key(|candle| candle.time);
    candles.retain(|candle| candle.time > cursor);
    candles
}

/// Appends all the candles newer than the cursor to the series and saves the dataset
/// if there were any. Returns the number of appended candles.
pub fn sync_series_since<M, S>(
    dataset: &mut Dataset,
    key: &SeriesKey,
    cursor: CandleTime,
    market_data_api: &M,
    storage: &S,
    now: DateTime<Utc>,
) -> Result<usize, SeriesUpdateError>
where
    M: MarketDataApi,
    S: DatasetStorage,
{
    if dataset.series(key).is_none() {
        return Err(SeriesUpdateError::SeriesNotFound(key.clone()));
    }

    let candles = fetch_candles_since(market_data_api, key, cursor, now)?;
    let new_candles = candles_newer_than(candles, cursor);

    if new_candles.is_empty() {
        log::info!("{} is already up to date", key);
        return Ok(0);
    }

    let number_of_new_candles = new_candles.len();

    dataset
        .series_mut(key)
        .ok_or_else(|| SeriesUpdateError::SeriesNotFound(key.clone()))?
        .append(new_candles)?;

    storage
        .save_dataset(dataset, key)
        .map_err(|source| SeriesUpdateError::Storage {
            key: key.clone(),
            source,
        })?;

    Ok(number_of_new_candles)
}

/// Continues the series from its last candle.
pub fn update_series<M, S>(
    dataset: &mut Dataset,
    key: &SeriesKey,
    market_data_api: &M,
    storage: &S,
    now: DateTime<Utc>,
) -> Result<usize, SeriesUpdateError>
where
    M: MarketDataApi,
    S: DatasetStorage,
{
    let cursor = dataset
        .series(key)
        .ok_or_else(|| SeriesUpdateError::SeriesNotFound(key.clone()))?
        .last_time()
        .ok_or_else(|| SeriesUpdateError::EmptySeries(key.clone()))?;

    sync_series_since(dataset, key, cursor, market_data_api, storage, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base::entities::Timeframe;
    use chrono::Duration;
    use log::Level;
    use std::cell::RefCell;

    struct PagesApi {
        pages: RefCell<VecDeque<Vec<Candle>>>,
    }

    impl MarketDataApi for PagesApi {
        fn get_historical_candles(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _end_time: DateTime<Utc>,
            _limit: NumberOfCandles,
        ) -> FetchOutcome {
            match self.pages.borrow_mut().pop_front() {
                Some(page) => FetchOutcome::Data(page),
                None => FetchOutcome::NoMoreData,
            }
        }
    }

    fn time(time: &str) -> CandleTime {
        DateTime::parse_from_rfc3339(time).unwrap().into()
    }

    fn key() -> SeriesKey {
        SeriesKey::new("EURUSD", Timeframe::Hour)
    }

    #[test]
    #[allow(non_snake_case)]
    fn number_of_candles_to_request__long_gap__should_be_capped() {
        let cursor = time("2023-01-01T00:00:00Z");
        let now = time("2024-01-01T00:00:00Z");

        assert_eq!(number_of_candles_to_request(cursor, now, &key()), 1000);
    }

    #[test]
    #[allow(non_snake_case)]
    fn number_of_candles_to_request__short_gap__should_count_candles() {
        let cursor = time("2024-01-01T00:00:00Z");
        let now = time("2024-01-01T05:59:00Z");

        assert_eq!(number_of_candles_to_request(cursor, now, &key()), 6);
    }

    #[test]
    #[allow(non_snake_case)]
    fn number_of_candles_to_request__cursor_in_future__should_be_0() {
        let cursor = time("2024-01-01T01:00:00Z");
        let now = time("2024-01-01T00:00:00Z");

        assert_eq!(number_of_candles_to_request(cursor, now, &key()), 0);
    }

    #[test]
    #[allow(non_snake_case)]
    fn candles_newer_than__unsorted_with_duplicates__should_sort_dedup_and_filter() {
        let mut first_duplicate = Candle::at(time("2024-01-01T02:00:00Z"));
        first_duplicate.tick_volume = 1;
        let mut second_duplicate = Candle::at(time("2024-01-01T02:00:00Z"));
        second_duplicate.tick_volume = 2;

        let candles = vec![
            Candle::at(time("2023-12-31T23:00:00Z")),
            first_duplicate.clone(),
            Candle::at(time("2024-01-01T00:00:00Z")),
            Candle::at(time("2024-01-01T01:00:00Z")),
            second_duplicate,
        ];

        let new_candles = candles_newer_than(candles, time("2024-01-01T00:00:00Z"));

        assert_eq!(
            new_candles,
            vec![Candle::at(time("2024-01-01T01:00:00Z")), first_duplicate]
        );
    }

    #[test]
    #[allow(non_snake_case)]
    fn fetch_candles_since__several_pages__should_log_page_counter_and_keep_page_order() {
        testing_logger::setup();

        let cursor = time("2024-01-01T00:00:00Z");
        let later_page: Vec<Candle> = (3..6)
            .map(|i| Candle::at(cursor + Duration::hours(i)))
            .collect();
        let earlier_page: Vec<Candle> = (0..3)
            .map(|i| Candle::at(cursor + Duration::hours(i)))
            .collect();

        let api = PagesApi {
            pages: RefCell::new(VecDeque::from(vec![later_page.clone(), earlier_page.clone()])),
        };

        let candles =
            fetch_candles_since(&api, &key(), cursor, time("2024-01-01T05:00:00Z")).unwrap();

        let mut expected = earlier_page;
        expected.extend(later_page);
        assert_eq!(candles, expected);

        testing_logger::validate(|captured_logs| {
            let pages: Vec<_> = captured_logs
                .iter()
                .filter(|log| log.level == Level::Info && log.body.contains("page:"))
                .map(|log| log.body.clone())
                .collect();

            assert_eq!(pages, vec!["EURUSD 1h page: 1", "EURUSD 1h page: 2"]);
        });
    }
}
