//! Ticker (24-hour price summary) channel models.

use serde::Deserialize;

use super::str_f64;

/// A single ticker update from the `ticker` channel.
///
/// All numeric fields arrive as strings on the wire and are parsed into
/// 64-bit floats.
#[derive(Debug, Clone, Deserialize)]
pub struct Ticker {
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// Last traded price.
    #[serde(rename = "c", with = "str_f64")]
    pub last_price: f64,
    /// Absolute price change over the last 24 hours.
    #[serde(rename = "p", with = "str_f64")]
    pub price_change: f64,
    /// Price change as a percentage over the last 24 hours.
    #[serde(rename = "P", with = "str_f64")]
    pub price_change_pct: f64,
    #[serde(rename = "h", with = "str_f64")]
    pub high: f64,
    #[serde(rename = "l", with = "str_f64")]
    pub low: f64,
    #[serde(rename = "v", with = "str_f64")]
    pub volume: f64,
    /// Volume in quote-currency units.
    #[serde(rename = "q", with = "str_f64")]
    pub quote_volume: f64,
    /// Envelope timestamp in milliseconds since the Unix epoch.
    #[serde(skip)]
    pub ts: i64,
}
