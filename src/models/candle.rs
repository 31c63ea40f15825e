//! OHLC candlestick channel models.

use serde::Deserialize;
use std::fmt;

use super::str_f64;

/// Supported candlestick intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl CandleInterval {
    /// Returns the wire-format interval token.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::Min1 => "1m",
            CandleInterval::Min5 => "5m",
            CandleInterval::Min15 => "15m",
            CandleInterval::Hour1 => "1h",
            CandleInterval::Hour4 => "4h",
            CandleInterval::Day1 => "1d",
            CandleInterval::Week1 => "1w",
        }
    }

    /// Parses a wire-format interval token.
    #[must_use]
    pub fn from_wire(token: &str) -> Option<Self> {
        match token {
            "1m" => Some(CandleInterval::Min1),
            "5m" => Some(CandleInterval::Min5),
            "15m" => Some(CandleInterval::Min15),
            "1h" => Some(CandleInterval::Hour1),
            "4h" => Some(CandleInterval::Hour4),
            "1d" => Some(CandleInterval::Day1),
            "1w" => Some(CandleInterval::Week1),
            _ => None,
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single OHLC candlestick bar from the `kline` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    #[serde(rename = "s", default)]
    pub symbol: String,
    #[serde(rename = "o", with = "str_f64")]
    pub open: f64,
    #[serde(rename = "h", with = "str_f64")]
    pub high: f64,
    #[serde(rename = "l", with = "str_f64")]
    pub low: f64,
    #[serde(rename = "c", with = "str_f64")]
    pub close: f64,
    #[serde(rename = "v", with = "str_f64")]
    pub volume: f64,
    /// Volume in quote-currency units.
    #[serde(rename = "q", with = "str_f64")]
    pub quote_volume: f64,
    /// Start of this candle's window, milliseconds since the Unix epoch.
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "i")]
    pub interval: CandleInterval,
    /// Envelope timestamp in milliseconds since the Unix epoch.
    #[serde(skip)]
    pub ts: i64,
}
