use std::time::Instant;

use anyhow::{bail, Context, Result};
use base::entities::CandleTime;
use base::notifier::Notifier;
use chrono::{DateTime, Utc};
use trading_apis::MarketDataApi;

use crate::historical_data::serialization::DatasetStorage;
use crate::historical_data::synchronization::{sync_series_since, update_series, SeriesUpdateError};
use crate::{Series, SeriesKey};

pub mod serialization;
pub mod synchronization;

pub const DATA_UPDATED_MESSAGE: &str = "Data updated";

#[derive(Debug)]
pub struct SeriesUpdateReport {
    pub key: SeriesKey,
    /// The number of appended candles or the reason the series wasn't updated.
    pub result: Result<usize, SeriesUpdateError>,
}

#[derive(Debug, Default)]
pub struct UpdateReport {
    pub series: Vec<SeriesUpdateReport>,
}

impl UpdateReport {
    pub fn number_of_failed_series(&self) -> usize {
        self.series
            .iter()
            .filter(|series| series.result.is_err())
            .count()
    }

    pub fn number_of_new_candles(&self) -> usize {
        self.series
            .iter()
            .filter_map(|series| series.result.as_ref().ok())
            .sum()
    }

    pub fn to_message(&self) -> String {
        let mut message = String::from(DATA_UPDATED_MESSAGE);

        for series in self.series.iter() {
            let line = match &series.result {
                Ok(number_of_new_candles) => {
                    format!("\n{}: +{}", series.key, number_of_new_candles)
                }
                Err(e) => format!("\n{}: failed, {}", series.key, e),
            };

            message.push_str(&line);
        }

        message
    }
}

/// Updates every series of the stored dataset one by one, then notifies about the results.
/// A series that fails to update doesn't stop the others; only a dataset that can't be
/// loaded fails the whole run.
pub fn update_all_series<M, S, N>(
    market_data_api: &M,
    storage: &S,
    notifier: &N,
    now: impl Fn() -> DateTime<Utc>,
) -> Result<UpdateReport>
where
    M: MarketDataApi,
    S: DatasetStorage,
    N: Notifier,
{
    let mut dataset = storage
        .load_dataset()
        .context("error on loading the dataset to update")?;

    let mut report = UpdateReport::default();

    for key in dataset.keys() {
        log::info!("downloading {}", key);
        let started_at = Instant::now();

        let result = update_series(&mut dataset, &key, market_data_api, storage, now());

        match &result {
            Ok(number_of_new_candles) => log::info!(
                "downloaded {} new {} candles, took {:.2}s",
                number_of_new_candles,
                key,
                started_at.elapsed().as_secs_f64()
            ),
            Err(e) => log::error!("the {} series wasn't updated: {:?}", key, e),
        }

        report.series.push(SeriesUpdateReport { key, result });
    }

    if let Err(e) = notifier.send_message(&report.to_message()) {
        log::error!("error on sending the update notification: {:?}", e);
    }

    Ok(report)
}

/// Adds a new series to the dataset, seeded with all the candles after `history_start`.
/// The dataset is created if nothing was stored yet.
pub fn add_series<M, S>(
    key: &SeriesKey,
    history_start: CandleTime,
    market_data_api: &M,
    storage: &S,
    now: DateTime<Utc>,
) -> Result<usize>
where
    M: MarketDataApi,
    S: DatasetStorage,
{
    let mut dataset = storage.try_to_load_dataset()?.unwrap_or_default();

    if let Some(series) = dataset.series(key) {
        if !series.is_empty() {
            bail!("the {} series already exists, update it instead", key);
        }
    }

    dataset.insert_series(key.clone(), Series::new());

    let number_of_new_candles =
        sync_series_since(&mut dataset, key, history_start, market_data_api, storage, now)?;

    if number_of_new_candles == 0 {
        log::warn!("no candles after {} for {}, the series isn't added", history_start, key);
    }

    Ok(number_of_new_candles)
}
