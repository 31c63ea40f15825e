//! Order-book depth and best bid/ask channel models.

use serde::Deserialize;

use super::str_f64;

/// One price level of the order book.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceLevel {
    #[serde(rename = "p", with = "str_f64")]
    pub price: f64,
    #[serde(rename = "v", with = "str_f64")]
    pub quantity: f64,
}

/// An incremental order-book update from the `depth` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct Depth {
    #[serde(rename = "s", default)]
    pub symbol: String,
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
    /// Order-book revision counter, used to detect gaps.
    #[serde(rename = "r", default)]
    pub version: Option<String>,
    /// Envelope timestamp in milliseconds since the Unix epoch.
    #[serde(skip)]
    pub ts: i64,
}

/// A best bid/ask update from the `bookTicker` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct BookTicker {
    #[serde(rename = "s", default)]
    pub symbol: String,
    #[serde(rename = "b", with = "str_f64")]
    pub bid_price: f64,
    /// Quantity available at the best bid price.
    #[serde(rename = "B", with = "str_f64")]
    pub bid_quantity: f64,
    #[serde(rename = "a", with = "str_f64")]
    pub ask_price: f64,
    /// Quantity available at the best ask price.
    #[serde(rename = "A", with = "str_f64")]
    pub ask_quantity: f64,
    /// Envelope timestamp in milliseconds since the Unix epoch.
    #[serde(skip)]
    pub ts: i64,
}
