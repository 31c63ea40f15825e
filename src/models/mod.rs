//! Shared models for the MEXC WebSocket protocol.
//!
//! Contains channel kinds, canonical channel strings, subscription
//! request types, and common control messages (ping/pong, subscription
//! acks, data envelopes).

pub mod candle;
pub mod depth;
pub mod ticker;
pub mod trade;

pub use candle::{Candle, CandleInterval};
pub use depth::{BookTicker, Depth, PriceLevel};
pub use ticker::Ticker;
pub use trade::{Trade, TradeSide};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::KervielError;

/// Prefix shared by every public spot market-data channel.
const CHANNEL_PREFIX: &str = "spot@public.";

/// Protocol segment between the channel kind and the symbol.
const CHANNEL_VERSION: &str = "v3.api";

/// Market-data channel kinds exposed by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Ticker,
    /// OHLC candlestick data (wire name: `"kline"`).
    Candle,
    /// Executed trades (wire name: `"deals"`).
    Trade,
    Depth,
    /// Best bid/ask updates (wire name: `"bookTicker"`).
    BookTicker,
}

impl ChannelKind {
    /// Returns the wire-format kind name used inside canonical channel strings.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Ticker => "ticker",
            ChannelKind::Candle => "kline",
            ChannelKind::Trade => "deals",
            ChannelKind::Depth => "depth",
            ChannelKind::BookTicker => "bookTicker",
        }
    }

    fn from_wire(word: &str) -> Option<Self> {
        match word {
            "ticker" => Some(ChannelKind::Ticker),
            "kline" => Some(ChannelKind::Candle),
            "deals" => Some(ChannelKind::Trade),
            "depth" => Some(ChannelKind::Depth),
            "bookTicker" => Some(ChannelKind::BookTicker),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single channel subscription, keyed by its canonical channel string
/// (e.g. `spot@public.ticker.v3.api.BTCUSDT`,
/// `spot@public.kline.v3.api.ETHUSDT.1m`).
///
/// Consumers never build raw strings; the constructors here define the
/// canonical mapping and [`Subscription::parse`] inverts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    channel: String,
    kind: ChannelKind,
    symbol: String,
    interval: Option<CandleInterval>,
}

impl Subscription {
    fn build(kind: ChannelKind, symbol: &str, interval: Option<CandleInterval>) -> Self {
        let mut channel = format!(
            "{CHANNEL_PREFIX}{}.{CHANNEL_VERSION}.{}",
            kind.as_str(),
            symbol
        );
        if let Some(interval) = interval {
            channel.push('.');
            channel.push_str(interval.as_str());
        }
        Self {
            channel,
            kind,
            symbol: symbol.to_string(),
            interval,
        }
    }

    /// Ticker subscription for `symbol`.
    #[must_use]
    pub fn ticker(symbol: &str) -> Self {
        Self::build(ChannelKind::Ticker, symbol, None)
    }

    /// Candlestick subscription for `symbol` at `interval`.
    #[must_use]
    pub fn candle(symbol: &str, interval: CandleInterval) -> Self {
        Self::build(ChannelKind::Candle, symbol, Some(interval))
    }

    /// Trade subscription for `symbol`.
    #[must_use]
    pub fn trade(symbol: &str) -> Self {
        Self::build(ChannelKind::Trade, symbol, None)
    }

    /// Order-book depth subscription for `symbol`.
    #[must_use]
    pub fn depth(symbol: &str) -> Self {
        Self::build(ChannelKind::Depth, symbol, None)
    }

    /// Best bid/ask subscription for `symbol`.
    #[must_use]
    pub fn book_ticker(symbol: &str) -> Self {
        Self::build(ChannelKind::BookTicker, symbol, None)
    }

    /// The canonical channel string sent on the wire.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[must_use]
    pub fn interval(&self) -> Option<CandleInterval> {
        self.interval
    }

    /// Parses a canonical channel string back into its parts.
    ///
    /// # Errors
    ///
    /// [`KervielError::DecodeFailed`] when the string does not follow the
    /// `spot@public.<kind>.v3.api.<SYMBOL>[.<interval>]` shape.
    pub fn parse(channel: &str) -> Result<Self> {
        let malformed = || KervielError::DecodeFailed(format!("unrecognized channel: {channel}"));

        let rest = channel.strip_prefix(CHANNEL_PREFIX).ok_or_else(malformed)?;
        let (kind_word, rest) = rest.split_once('.').ok_or_else(malformed)?;
        let kind = ChannelKind::from_wire(kind_word).ok_or_else(malformed)?;
        let rest = rest
            .strip_prefix(CHANNEL_VERSION)
            .and_then(|r| r.strip_prefix('.'))
            .ok_or_else(malformed)?;

        match kind {
            ChannelKind::Candle => {
                let (symbol, interval) = rest.split_once('.').ok_or_else(malformed)?;
                if symbol.is_empty() || interval.contains('.') {
                    return Err(malformed());
                }
                let interval = CandleInterval::from_wire(interval).ok_or_else(malformed)?;
                Ok(Self::build(kind, symbol, Some(interval)))
            }
            _ => {
                if rest.is_empty() || rest.contains('.') {
                    return Err(malformed());
                }
                Ok(Self::build(kind, rest, None))
            }
        }
    }
}

/// A `SUBSCRIPTION` request sent to the exchange.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    method: String,
    params: Vec<String>,
}

impl SubscribeRequest {
    /// Creates a subscribe request for the given canonical channels.
    #[must_use]
    pub fn new(channels: &[String]) -> Self {
        Self {
            method: "SUBSCRIPTION".to_string(),
            params: channels.to_vec(),
        }
    }
}

/// An `UNSUBSCRIPTION` request sent to the exchange.
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeRequest {
    method: String,
    params: Vec<String>,
}

impl UnsubscribeRequest {
    /// Creates an unsubscribe request for the given canonical channels.
    #[must_use]
    pub fn new(channels: &[String]) -> Self {
        Self {
            method: "UNSUBSCRIPTION".to_string(),
            params: channels.to_vec(),
        }
    }
}

/// A `PING` request used to test connection liveness.
#[derive(Debug, Clone, Serialize)]
pub struct PingRequest {
    method: String,
}

impl PingRequest {
    /// Creates a new ping request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            method: "PING".to_string(),
        }
    }
}

impl Default for PingRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Server acknowledgement of a subscription: `{"e":"sub.success","c":"..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionAck {
    #[serde(rename = "e")]
    pub event: String,
    /// The confirmed canonical channel string.
    #[serde(rename = "c")]
    pub channel: String,
}

/// Data envelope wrapping every market-data frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub channel: String,
    pub data: serde_json::Value,
    /// Exchange timestamp in milliseconds since the Unix epoch.
    pub ts: i64,
}

/// Returns `true` if `value` is a pong frame. The exchange answers pings
/// with either `{"pong": <n>}` or `{"method": "PONG"}`; both are accepted.
#[must_use]
pub fn is_pong(value: &serde_json::Value) -> bool {
    if value.get("pong").is_some_and(serde_json::Value::is_number) {
        return true;
    }
    value.get("method").and_then(|m| m.as_str()) == Some("PONG")
}

/// Deserializes an `f64` from either a JSON string or a bare number.
/// The exchange encodes numeric fields as strings.
pub(crate) mod str_f64 {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Number(f64),
        String(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::Number(n) => Ok(n),
            StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
