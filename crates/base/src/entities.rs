pub mod candle;

use anyhow::Result;
pub use candle::{Candle, CandlePrice, CandleTime, TickVolume};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub type Symbol = String;
pub type NumberOfMinutes = u32;

/// Candle resolution. The discriminant is the length of one candle in minutes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Timeframe {
    OneMin = 1,
    FiveMin = 5,
    FifteenMin = 15,
    ThirtyMin = 30,
    Hour = 60,
    FourHours = 240,
    Day = 1440,
    Week = 10080,
    Month = 43200,
}

impl Timeframe {
    pub const ALL: [Timeframe; 9] = [
        Self::OneMin,
        Self::FiveMin,
        Self::FifteenMin,
        Self::ThirtyMin,
        Self::Hour,
        Self::FourHours,
        Self::Day,
        Self::Week,
        Self::Month,
    ];

    pub fn minutes(&self) -> NumberOfMinutes {
        *self as NumberOfMinutes
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "1m" => Ok(Self::OneMin),
            "5m" => Ok(Self::FiveMin),
            "15m" => Ok(Self::FifteenMin),
            "30m" => Ok(Self::ThirtyMin),
            "1h" => Ok(Self::Hour),
            "4h" => Ok(Self::FourHours),
            "1d" => Ok(Self::Day),
            "1w" => Ok(Self::Week),
            "1mn" => Ok(Self::Month),
            _ => anyhow::bail!("invalid timeframe: {}", input),
        }
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Timeframe::OneMin => write!(f, "1m"),
            Timeframe::FiveMin => write!(f, "5m"),
            Timeframe::FifteenMin => write!(f, "15m"),
            Timeframe::ThirtyMin => write!(f, "30m"),
            Timeframe::Hour => write!(f, "1h"),
            Timeframe::FourHours => write!(f, "4h"),
            Timeframe::Day => write!(f, "1d"),
            Timeframe::Week => write!(f, "1w"),
            Timeframe::Month => write!(f, "1mn"),
        }
    }
}

// Serialized by its api name, so it can be used as a key of json maps.
impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Timeframe::from_str(&name).map_err(D::Error::custom)
    }
}
