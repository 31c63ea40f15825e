//! Trade (executed deals) channel models.

use serde::{Deserialize, Deserializer};

use super::str_f64;

/// Trade direction. Encoded on the wire as `1` (buy) or `2` (sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            1 => Ok(TradeSide::Buy),
            2 => Ok(TradeSide::Sell),
            other => Err(serde::de::Error::custom(format!(
                "invalid trade side: {other}"
            ))),
        }
    }
}

/// A single executed trade from the `deals` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct Trade {
    #[serde(rename = "s", default)]
    pub symbol: String,
    #[serde(rename = "p", with = "str_f64")]
    pub price: f64,
    #[serde(rename = "v", with = "str_f64")]
    pub quantity: f64,
    #[serde(rename = "S", deserialize_with = "TradeSide::deserialize")]
    pub side: TradeSide,
    /// Execution time in milliseconds since the Unix epoch.
    #[serde(rename = "t")]
    pub trade_time: i64,
    /// Envelope timestamp in milliseconds since the Unix epoch.
    #[serde(skip)]
    pub ts: i64,
}
