use base::entities::{Candle, CandleTime, Symbol, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub mod charts;
pub mod historical_data;
pub mod indicators;

/// Identifies one series of candles in the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<Symbol>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl Display for SeriesKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.symbol, self.timeframe)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("the candle at {time} doesn't follow the previous candle at {previous_time}")]
pub struct DisorderedCandlesError {
    pub previous_time: CandleTime,
    pub time: CandleTime,
}

fn check_candles_order<'a>(
    previous_time: Option<CandleTime>,
    candles: impl IntoIterator<Item = &'a Candle>,
) -> Result<(), DisorderedCandlesError> {
    let mut previous_time = previous_time;

    for candle in candles {
        if let Some(previous_time) = previous_time {
            if candle.time <= previous_time {
                return Err(DisorderedCandlesError {
                    previous_time,
                    time: candle.time,
                });
            }
        }

        previous_time = Some(candle.time);
    }

    Ok(())
}

/// Candles of one symbol and timeframe, strictly increasing by time.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(try_from = "Vec<Candle>", into = "Vec<Candle>")]
pub struct Series {
    candles: Vec<Candle>,
}

impl Series {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last_time(&self) -> Option<CandleTime> {
        self.candles.last().map(|candle| candle.time)
    }

    /// Appends the candles if all of them are newer than the last candle of the series
    /// and strictly increasing by time. Otherwise, the series stays untouched.
    pub fn append(&mut self, candles: Vec<Candle>) -> Result<(), DisorderedCandlesError> {
        check_candles_order(self.last_time(), &candles)?;
        self.candles.extend(candles);
        Ok(())
    }
}

impl TryFrom<Vec<Candle>> for Series {
    type Error = DisorderedCandlesError;

    fn try_from(candles: Vec<Candle>) -> Result<Self, Self::Error> {
        check_candles_order(None, &candles)?;
        Ok(Self { candles })
    }
}

impl From<Series> for Vec<Candle> {
    fn from(series: Series) -> Self {
        series.candles
    }
}

/// All the stored series: symbol -> timeframe -> series.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Dataset {
    symbols: BTreeMap<Symbol, BTreeMap<Timeframe, Series>>,
}

impl Dataset {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn series(&self, key: &SeriesKey) -> Option<&Series> {
        self.symbols
            .get(&key.symbol)
            .and_then(|timeframes| timeframes.get(&key.timeframe))
    }

    pub fn series_mut(&mut self, key: &SeriesKey) -> Option<&mut Series> {
        self.symbols
            .get_mut(&key.symbol)
            .and_then(|timeframes| timeframes.get_mut(&key.timeframe))
    }

    /// Returns the previous series of the key if there was one.
    pub fn insert_series(&mut self, key: SeriesKey, series: Series) -> Option<Series> {
        self.symbols
            .entry(key.symbol)
            .or_default()
            .insert(key.timeframe, series)
    }

    pub fn keys(&self) -> Vec<SeriesKey> {
        self.symbols
            .iter()
            .flat_map(|(symbol, timeframes)| {
                timeframes
                    .keys()
                    .map(move |timeframe| SeriesKey::new(symbol.clone(), *timeframe))
            })
            .collect()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.keys()
    }

    pub fn timeframes(&self, symbol: &str) -> Vec<Timeframe> {
        self.symbols
            .get(symbol)
            .map(|timeframes| timeframes.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn candle(time: &str) -> Candle {
        Candle::at(DateTime::parse_from_rfc3339(time).unwrap().with_timezone(&Utc))
    }

    #[test]
    fn should_append_newer_candles() {
        let mut series = Series::try_from(vec![candle("2024-01-01T00:00:00Z")]).unwrap();

        series
            .append(vec![
                candle("2024-01-01T01:00:00Z"),
                candle("2024-01-01T02:00:00Z"),
            ])
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.last_time(), Some(candle("2024-01-01T02:00:00Z").time));
    }

    #[test]
    fn should_not_append_candle_with_existing_time() {
        let mut series = Series::try_from(vec![candle("2024-01-01T00:00:00Z")]).unwrap();

        let error = series
            .append(vec![
                candle("2024-01-01T00:00:00Z"),
                candle("2024-01-01T01:00:00Z"),
            ])
            .unwrap_err();

        assert_eq!(error.time, candle("2024-01-01T00:00:00Z").time);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn should_not_create_series_from_unsorted_candles() {
        assert!(Series::try_from(vec![
            candle("2024-01-01T01:00:00Z"),
            candle("2024-01-01T00:00:00Z"),
        ])
        .is_err());
    }

    #[test]
    fn should_reject_unsorted_series_on_deserialization() {
        let json = serde_json::to_string(&vec![
            candle("2024-01-01T01:00:00Z"),
            candle("2024-01-01T00:00:00Z"),
        ])
        .unwrap();

        assert!(serde_json::from_str::<Series>(&json).is_err());
    }

    #[test]
    fn should_list_keys_by_symbol_and_timeframe() {
        let mut dataset = Dataset::new();
        dataset.insert_series(SeriesKey::new("GBPUSD", Timeframe::Day), Series::new());
        dataset.insert_series(SeriesKey::new("EURUSD", Timeframe::Hour), Series::new());
        dataset.insert_series(SeriesKey::new("EURUSD", Timeframe::OneMin), Series::new());

        assert_eq!(
            dataset.keys(),
            vec![
                SeriesKey::new("EURUSD", Timeframe::OneMin),
                SeriesKey::new("EURUSD", Timeframe::Hour),
                SeriesKey::new("GBPUSD", Timeframe::Day),
            ]
        );
        assert_eq!(
            dataset.timeframes("EURUSD"),
            vec![Timeframe::OneMin, Timeframe::Hour]
        );
        assert!(dataset.timeframes("USDJPY").is_empty());
    }
}
