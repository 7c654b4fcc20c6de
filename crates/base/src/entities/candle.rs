use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub type CandleTime = DateTime<Utc>;
pub type CandlePrice = Decimal;
pub type TickVolume = u64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    pub time: CandleTime,
    pub open: CandlePrice,
    pub high: CandlePrice,
    pub low: CandlePrice,
    pub close: CandlePrice,
    pub tick_volume: TickVolume,
}

impl Candle {
    /// The candle with default prices at the given time.
    pub fn at(time: CandleTime) -> Self {
        Self {
            time,
            ..Default::default()
        }
    }
}

impl Default for Candle {
    fn default() -> Self {
        Self {
            time: DateTime::<Utc>::MIN_UTC,
            open: dec!(1.30945),
            high: dec!(1.31078),
            low: dec!(1.30939),
            close: dec!(1.31058),
            tick_volume: 100,
        }
    }
}
