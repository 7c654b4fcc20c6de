use anyhow::{bail, Result};
use base::entities::{Candle, CandleTime, Timeframe};
use base::helpers::NumberOfCandles;
use base::notifier::Notifier;
use chrono::{DateTime, Duration, Utc};
use market_data::historical_data::serialization::DatasetStorage;
use market_data::historical_data::synchronization::{
    update_series, SeriesUpdateError, MAX_NUMBER_OF_PAGES,
};
use market_data::historical_data::{add_series, update_all_series, DATA_UPDATED_MESSAGE};
use market_data::{Dataset, Series, SeriesKey};
use std::cell::RefCell;
use std::collections::VecDeque;
use trading_apis::{FetchOutcome, MarketDataApi};

fn time(time: &str) -> CandleTime {
    DateTime::parse_from_rfc3339(time).unwrap().with_timezone(&Utc)
}

fn hourly_candles(from: &str, number_of_candles: i64) -> Vec<Candle> {
    let from = time(from);
    (0..number_of_candles)
        .map(|i| Candle::at(from + Duration::hours(i)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
struct CandlesRequest {
    symbol: String,
    timeframe: Timeframe,
    end_time: DateTime<Utc>,
    limit: NumberOfCandles,
}

#[derive(Default)]
struct MarketDataApiMock {
    pages: RefCell<VecDeque<FetchOutcome>>,
    /// Returned when there are no pages left, `NoMoreData` otherwise.
    repeated_page: Option<Vec<Candle>>,
    requests: RefCell<Vec<CandlesRequest>>,
}

impl MarketDataApiMock {
    fn new(pages: Vec<FetchOutcome>) -> Self {
        Self {
            pages: RefCell::new(pages.into()),
            ..Default::default()
        }
    }
}

impl MarketDataApi for MarketDataApiMock {
    fn get_historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        end_time: DateTime<Utc>,
        limit: NumberOfCandles,
    ) -> FetchOutcome {
        self.requests.borrow_mut().push(CandlesRequest {
            symbol: symbol.to_string(),
            timeframe,
            end_time,
            limit,
        });

        match self.pages.borrow_mut().pop_front() {
            Some(page) => page,
            None => match &self.repeated_page {
                Some(candles) => FetchOutcome::Data(candles.clone()),
                None => FetchOutcome::NoMoreData,
            },
        }
    }
}

#[derive(Default)]
struct InMemoryStorage {
    dataset: RefCell<Option<Dataset>>,
    saves: RefCell<Vec<SeriesKey>>,
    fail_on_save: bool,
}

impl InMemoryStorage {
    fn with_dataset(dataset: Dataset) -> Self {
        Self {
            dataset: RefCell::new(Some(dataset)),
            ..Default::default()
        }
    }

    fn stored_series(&self, key: &SeriesKey) -> Series {
        self.dataset
            .borrow()
            .as_ref()
            .unwrap()
            .series(key)
            .unwrap()
            .clone()
    }
}

impl DatasetStorage for InMemoryStorage {
    fn try_to_load_dataset(&self) -> Result<Option<Dataset>> {
        Ok(self.dataset.borrow().clone())
    }

    fn save_dataset(&self, dataset: &Dataset, updated_series: &SeriesKey) -> Result<()> {
        if self.fail_on_save {
            bail!("disk is full");
        }

        *self.dataset.borrow_mut() = Some(dataset.clone());
        self.saves.borrow_mut().push(updated_series.clone());
        Ok(())
    }
}

#[derive(Default)]
struct NotifierMock {
    messages: RefCell<Vec<String>>,
    fail: bool,
}

impl Notifier for NotifierMock {
    fn send_message(&self, message: &str) -> Result<()> {
        self.messages.borrow_mut().push(message.to_string());
        if self.fail {
            bail!("telegram is down");
        }
        Ok(())
    }
}

fn eurusd_hour() -> SeriesKey {
    SeriesKey::new("EURUSD", Timeframe::Hour)
}

fn dataset_with(key: &SeriesKey, candles: Vec<Candle>) -> Dataset {
    let mut dataset = Dataset::new();
    dataset.insert_series(key.clone(), Series::try_from(candles).unwrap());
    dataset
}

#[test]
#[allow(non_snake_case)]
fn update_series__unsorted_page_reaching_cursor__should_append_only_newer_candles() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2023-12-31T23:00:00Z", 2));
    let storage = InMemoryStorage::default();

    let mut page = hourly_candles("2024-01-01T00:00:00Z", 6);
    page.swap(0, 5);
    page.swap(1, 3);
    let api = MarketDataApiMock::new(vec![FetchOutcome::Data(page)]);

    let now = time("2024-01-01T05:30:00Z");
    let number_of_new_candles = update_series(&mut dataset, &key, &api, &storage, now).unwrap();

    assert_eq!(number_of_new_candles, 5);
    assert_eq!(
        dataset.series(&key).unwrap().candles(),
        hourly_candles("2023-12-31T23:00:00Z", 7).as_slice()
    );
    assert_eq!(
        *api.requests.borrow(),
        vec![CandlesRequest {
            symbol: String::from("EURUSD"),
            timeframe: Timeframe::Hour,
            end_time: now,
            limit: 6,
        }]
    );
    assert_eq!(*storage.saves.borrow(), vec![key.clone()]);
    assert_eq!(storage.stored_series(&key), *dataset.series(&key).unwrap());
}

#[test]
#[allow(non_snake_case)]
fn update_series__page_with_older_and_newer_candles__should_append_only_newer_sorted() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2023-12-31T23:00:00Z", 2));
    let storage = InMemoryStorage::default();

    let page = vec![
        Candle::at(time("2023-12-31T23:00:00Z")),
        Candle::at(time("2024-01-01T02:00:00Z")),
        Candle::at(time("2023-12-31T22:00:00Z")),
        Candle::at(time("2024-01-01T01:00:00Z")),
        Candle::at(time("2023-12-31T21:00:00Z")),
    ];
    let api = MarketDataApiMock::new(vec![FetchOutcome::Data(page)]);

    let number_of_new_candles = update_series(
        &mut dataset,
        &key,
        &api,
        &storage,
        time("2024-01-01T02:10:00Z"),
    )
    .unwrap();

    assert_eq!(number_of_new_candles, 2);
    assert_eq!(api.requests.borrow().len(), 1);
    assert_eq!(
        dataset.series(&key).unwrap().candles(),
        hourly_candles("2023-12-31T23:00:00Z", 4).as_slice()
    );
}

#[test]
#[allow(non_snake_case)]
fn update_series__empty_first_page__should_not_change_or_save_dataset() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2024-01-01T00:00:00Z", 1));
    let initial_dataset = dataset.clone();
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock::new(vec![FetchOutcome::Data(vec![])]);

    let number_of_new_candles = update_series(
        &mut dataset,
        &key,
        &api,
        &storage,
        time("2024-01-01T05:00:00Z"),
    )
    .unwrap();

    assert_eq!(number_of_new_candles, 0);
    assert_eq!(dataset, initial_dataset);
    assert_eq!(api.requests.borrow().len(), 1);
    assert!(storage.saves.borrow().is_empty());
}

#[test]
#[allow(non_snake_case)]
fn update_series__no_more_data__should_not_save_dataset() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2024-01-01T00:00:00Z", 1));
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock::new(vec![FetchOutcome::NoMoreData]);

    let number_of_new_candles = update_series(
        &mut dataset,
        &key,
        &api,
        &storage,
        time("2024-01-01T05:00:00Z"),
    )
    .unwrap();

    assert_eq!(number_of_new_candles, 0);
    assert!(storage.saves.borrow().is_empty());
}

#[test]
#[allow(non_snake_case)]
fn update_series__cursor_equals_now__should_request_one_candle_and_append_nothing() {
    let key = eurusd_hour();
    let cursor = "2024-01-01T05:00:00Z";
    let mut dataset = dataset_with(&key, hourly_candles(cursor, 1));
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock::new(vec![FetchOutcome::Data(hourly_candles(cursor, 1))]);

    let number_of_new_candles =
        update_series(&mut dataset, &key, &api, &storage, time(cursor)).unwrap();

    assert_eq!(number_of_new_candles, 0);
    assert_eq!(api.requests.borrow()[0].limit, 1);
    assert_eq!(dataset.series(&key).unwrap().len(), 1);
    assert!(storage.saves.borrow().is_empty());
}

#[test]
#[allow(non_snake_case)]
fn update_series__cursor_in_future__should_not_request_candles() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2024-01-01T05:00:00Z", 1));
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock::new(vec![]);

    let number_of_new_candles = update_series(
        &mut dataset,
        &key,
        &api,
        &storage,
        time("2024-01-01T04:00:00Z"),
    )
    .unwrap();

    assert_eq!(number_of_new_candles, 0);
    assert!(api.requests.borrow().is_empty());
}

#[test]
#[allow(non_snake_case)]
fn update_series__several_ascending_pages__should_request_backwards_until_cursor() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2024-01-01T00:00:00Z", 1));
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock::new(vec![
        FetchOutcome::Data(hourly_candles("2024-01-01T06:00:00Z", 5)),
        FetchOutcome::Data(hourly_candles("2024-01-01T02:00:00Z", 5)),
        FetchOutcome::Data(hourly_candles("2023-12-31T23:00:00Z", 4)),
    ]);

    let now = time("2024-01-01T10:00:00Z");
    let number_of_new_candles = update_series(&mut dataset, &key, &api, &storage, now).unwrap();

    assert_eq!(number_of_new_candles, 10);
    assert_eq!(
        dataset.series(&key).unwrap().candles(),
        hourly_candles("2024-01-01T00:00:00Z", 11).as_slice()
    );

    let end_times: Vec<_> = api.requests.borrow().iter().map(|r| r.end_time).collect();
    assert_eq!(
        end_times,
        vec![
            now,
            time("2024-01-01T06:00:00Z"),
            time("2024-01-01T02:00:00Z")
        ]
    );
    assert!(api.requests.borrow().iter().all(|r| r.limit == 11));
}

#[test]
#[allow(non_snake_case)]
fn update_series__several_descending_pages__should_give_same_series() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2024-01-01T00:00:00Z", 1));
    let storage = InMemoryStorage::default();

    let descending = |from: &str, number_of_candles: i64| {
        let mut candles = hourly_candles(from, number_of_candles);
        candles.reverse();
        FetchOutcome::Data(candles)
    };

    let api = MarketDataApiMock::new(vec![
        descending("2024-01-01T06:00:00Z", 5),
        descending("2024-01-01T02:00:00Z", 5),
        descending("2023-12-31T23:00:00Z", 4),
    ]);

    let number_of_new_candles = update_series(
        &mut dataset,
        &key,
        &api,
        &storage,
        time("2024-01-01T10:00:00Z"),
    )
    .unwrap();

    assert_eq!(number_of_new_candles, 10);
    assert_eq!(api.requests.borrow().len(), 3);
    assert_eq!(
        dataset.series(&key).unwrap().candles(),
        hourly_candles("2024-01-01T00:00:00Z", 11).as_slice()
    );
}

#[test]
#[allow(non_snake_case)]
fn update_series__api_never_reaches_cursor__should_stop_after_max_number_of_pages() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2023-01-01T00:00:00Z", 1));
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock {
        repeated_page: Some(hourly_candles("2024-01-01T00:00:00Z", 3)),
        ..Default::default()
    };

    let number_of_new_candles = update_series(
        &mut dataset,
        &key,
        &api,
        &storage,
        time("2024-01-01T03:00:00Z"),
    )
    .unwrap();

    assert_eq!(api.requests.borrow().len(), MAX_NUMBER_OF_PAGES as usize);
    assert_eq!(number_of_new_candles, 3);
}

#[test]
#[allow(non_snake_case)]
fn update_series__repeated_update__should_not_change_dataset() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2024-01-01T00:00:00Z", 1));
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock {
        repeated_page: Some(hourly_candles("2024-01-01T00:00:00Z", 4)),
        ..Default::default()
    };
    let now = time("2024-01-01T03:00:00Z");

    assert_eq!(
        update_series(&mut dataset, &key, &api, &storage, now).unwrap(),
        3
    );
    let updated_dataset = dataset.clone();

    assert_eq!(
        update_series(&mut dataset, &key, &api, &storage, now).unwrap(),
        0
    );
    assert_eq!(dataset, updated_dataset);
    assert_eq!(storage.saves.borrow().len(), 1);
}

#[test]
#[allow(non_snake_case)]
fn update_series__fetch_fails_after_first_page__should_leave_series_unsaved() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2024-01-01T00:00:00Z", 1));
    let initial_dataset = dataset.clone();
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock::new(vec![
        FetchOutcome::Data(hourly_candles("2024-01-01T06:00:00Z", 5)),
        FetchOutcome::TransientError(anyhow::anyhow!("connection reset")),
    ]);

    let result = update_series(
        &mut dataset,
        &key,
        &api,
        &storage,
        time("2024-01-01T10:00:00Z"),
    );

    assert!(matches!(
        result,
        Err(SeriesUpdateError::Fetch { page: 2, .. })
    ));
    assert_eq!(dataset, initial_dataset);
    assert_eq!(api.requests.borrow().len(), 2);
    assert!(storage.saves.borrow().is_empty());
}

#[test]
#[allow(non_snake_case)]
fn update_series__empty_series__should_return_error() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, vec![]);
    let api = MarketDataApiMock::new(vec![]);

    let result = update_series(
        &mut dataset,
        &key,
        &api,
        &InMemoryStorage::default(),
        time("2024-01-01T03:00:00Z"),
    );

    assert!(matches!(result, Err(SeriesUpdateError::EmptySeries(_))));
    assert!(api.requests.borrow().is_empty());
}

#[test]
#[allow(non_snake_case)]
fn update_series__storage_fails__should_return_storage_error() {
    let key = eurusd_hour();
    let mut dataset = dataset_with(&key, hourly_candles("2024-01-01T00:00:00Z", 1));
    let storage = InMemoryStorage {
        fail_on_save: true,
        ..Default::default()
    };
    let api = MarketDataApiMock::new(vec![FetchOutcome::Data(hourly_candles(
        "2024-01-01T00:00:00Z",
        2,
    ))]);

    let result = update_series(
        &mut dataset,
        &key,
        &api,
        &storage,
        time("2024-01-01T01:00:00Z"),
    );

    assert!(matches!(result, Err(SeriesUpdateError::Storage { .. })));
}

#[test]
#[allow(non_snake_case)]
fn update_all_series__one_series_fails__should_update_others_and_notify() {
    let failing = SeriesKey::new("EURUSD", Timeframe::Hour);
    let updated = SeriesKey::new("GBPUSD", Timeframe::Hour);

    let mut dataset = dataset_with(&failing, hourly_candles("2024-01-01T00:00:00Z", 1));
    dataset.insert_series(
        updated.clone(),
        Series::try_from(hourly_candles("2024-01-01T00:00:00Z", 1)).unwrap(),
    );

    let storage = InMemoryStorage::with_dataset(dataset);
    let api = MarketDataApiMock::new(vec![
        FetchOutcome::TransientError(anyhow::anyhow!("connection reset")),
        FetchOutcome::Data(hourly_candles("2024-01-01T00:00:00Z", 3)),
    ]);
    let notifier = NotifierMock::default();

    let report = update_all_series(&api, &storage, &notifier, || {
        time("2024-01-01T02:00:00Z")
    })
    .unwrap();

    assert_eq!(report.series.len(), 2);
    assert!(matches!(
        report.series[0].result,
        Err(SeriesUpdateError::Fetch { page: 1, .. })
    ));
    assert_eq!(report.series[1].result.as_ref().unwrap(), &2);
    assert_eq!(report.number_of_failed_series(), 1);
    assert_eq!(report.number_of_new_candles(), 2);

    assert_eq!(storage.stored_series(&failing).len(), 1);
    assert_eq!(storage.stored_series(&updated).len(), 3);

    let messages = notifier.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with(DATA_UPDATED_MESSAGE));
    assert!(messages[0].contains("GBPUSD 1h: +2"));
    assert!(messages[0].contains("EURUSD 1h: failed"));
}

#[test]
#[allow(non_snake_case)]
fn update_all_series__notification_fails__should_still_succeed() {
    let key = eurusd_hour();
    let storage = InMemoryStorage::with_dataset(dataset_with(
        &key,
        hourly_candles("2024-01-01T00:00:00Z", 1),
    ));
    let api = MarketDataApiMock::new(vec![FetchOutcome::Data(hourly_candles(
        "2024-01-01T00:00:00Z",
        2,
    ))]);
    let notifier = NotifierMock {
        fail: true,
        ..Default::default()
    };

    let report = update_all_series(&api, &storage, &notifier, || {
        time("2024-01-01T01:00:00Z")
    })
    .unwrap();

    assert_eq!(report.number_of_new_candles(), 1);
    assert_eq!(notifier.messages.borrow().len(), 1);
}

#[test]
#[allow(non_snake_case)]
fn update_all_series__nothing_stored__should_return_error_without_notification() {
    let notifier = NotifierMock::default();

    let result = update_all_series(
        &MarketDataApiMock::default(),
        &InMemoryStorage::default(),
        &notifier,
        Utc::now,
    );

    assert!(result.is_err());
    assert!(notifier.messages.borrow().is_empty());
}

#[test]
#[allow(non_snake_case)]
fn add_series__nothing_stored__should_create_dataset_with_candles_after_start() {
    let key = SeriesKey::new("XAUUSD", Timeframe::Hour);
    let storage = InMemoryStorage::default();
    let api = MarketDataApiMock::new(vec![FetchOutcome::Data(hourly_candles(
        "2024-01-01T00:00:00Z",
        4,
    ))]);

    let number_of_new_candles = add_series(
        &key,
        time("2024-01-01T00:00:00Z"),
        &api,
        &storage,
        time("2024-01-01T03:00:00Z"),
    )
    .unwrap();

    assert_eq!(number_of_new_candles, 3);
    assert_eq!(
        storage.stored_series(&key).candles(),
        hourly_candles("2024-01-01T01:00:00Z", 3).as_slice()
    );
}

#[test]
#[allow(non_snake_case)]
fn add_series__existing_series__should_return_error() {
    let key = eurusd_hour();
    let storage = InMemoryStorage::with_dataset(dataset_with(
        &key,
        hourly_candles("2024-01-01T00:00:00Z", 1),
    ));
    let api = MarketDataApiMock::new(vec![]);

    let result = add_series(
        &key,
        time("2023-01-01T00:00:00Z"),
        &api,
        &storage,
        time("2024-01-01T03:00:00Z"),
    );

    assert!(result.is_err());
    assert!(api.requests.borrow().is_empty());
    assert!(storage.saves.borrow().is_empty());
}
