use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::entities::{CandlePrice, Timeframe};

pub type NumberOfCandles = u64;

pub fn price_to_f64(price: CandlePrice) -> f64 {
    price.to_f64().unwrap_or(f64::NAN)
}

/// Counts the minutes in `[start_time, end_time]`, stepping by one minute from `start_time`,
/// whose offset from `start_time` is a whole number of candles of the timeframe.
pub fn number_of_candles_between(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    timeframe: Timeframe,
) -> NumberOfCandles {
    if end_time < start_time {
        return 0;
    }

    let minutes = (end_time - start_time).num_minutes() as NumberOfCandles;
    minutes / timeframe.minutes() as NumberOfCandles + 1
}
