//! Inbound frame decoding and dispatch to typed consumer channels.
//!
//! Frames that fail to parse are logged and dropped; they never crash the
//! reader or disconnect the transport. Every typed channel is bounded and
//! the overflow policy is fixed per kind: **drop-newest** everywhere — when
//! a consumer lags and its buffer is full, the incoming message is
//! discarded so the reader can never block behind a slow consumer.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::Result;
use crate::error::KervielError;
use crate::models::{
    BookTicker, Candle, ChannelKind, Depth, Envelope, Subscription, SubscriptionAck, Ticker, Trade,
    is_pong,
};

/// Ticker stream buffer; overflow drops the incoming message.
pub const TICKER_BUFFER: usize = 256;
/// Candle stream buffer; overflow drops the incoming message.
pub const CANDLE_BUFFER: usize = 128;
/// Trade stream buffer; overflow drops the incoming message.
pub const TRADE_BUFFER: usize = 256;
/// Depth stream buffer; overflow drops the incoming message.
pub const DEPTH_BUFFER: usize = 64;
/// Book-ticker stream buffer; overflow drops the incoming message.
pub const BOOK_TICKER_BUFFER: usize = 256;

/// Decodes inbound frames and delivers them to the typed streams.
pub struct MessageRouter {
    tickers: mpsc::Sender<Ticker>,
    candles: mpsc::Sender<Candle>,
    trades: mpsc::Sender<Trade>,
    depths: mpsc::Sender<Depth>,
    book_tickers: mpsc::Sender<BookTicker>,
    /// Channels acknowledged by the peer on the current connection.
    confirmed: Mutex<HashSet<String>>,
    last_pong: Mutex<Option<Instant>>,
}

impl MessageRouter {
    /// Creates a router delivering into the given typed senders.
    #[must_use]
    pub fn new(
        tickers: mpsc::Sender<Ticker>,
        candles: mpsc::Sender<Candle>,
        trades: mpsc::Sender<Trade>,
        depths: mpsc::Sender<Depth>,
        book_tickers: mpsc::Sender<BookTicker>,
    ) -> Self {
        Self {
            tickers,
            candles,
            trades,
            depths,
            book_tickers,
            confirmed: Mutex::new(HashSet::new()),
            last_pong: Mutex::new(None),
        }
    }

    /// Decodes one text frame and dispatches it.
    ///
    /// Never fails: malformed JSON, undecodable payloads and unknown
    /// channels are logged and dropped.
    pub fn route_text(&self, text: &str) {
        if let Err(e) = self.route_inner(text) {
            warn!(error = %e, "Dropping undecodable frame");
        }
    }

    fn route_inner(&self, text: &str) -> Result<()> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| KervielError::DecodeFailed(e.to_string()))?;

        if is_pong(&value) {
            let mut last_pong = self.last_pong.lock().expect("router mutex poisoned");
            *last_pong = Some(Instant::now());
            debug!("Received pong");
            return Ok(());
        }

        if value.get("e").and_then(|e| e.as_str()) == Some("sub.success") {
            let ack: SubscriptionAck = serde_json::from_value(value)
                .map_err(|e| KervielError::DecodeFailed(e.to_string()))?;
            debug!(channel = ack.channel, "Subscription confirmed");
            let mut confirmed = self.confirmed.lock().expect("router mutex poisoned");
            confirmed.insert(ack.channel);
            return Ok(());
        }

        if value.get("channel").is_some() && value.get("data").is_some() {
            let envelope: Envelope = serde_json::from_value(value)
                .map_err(|e| KervielError::DecodeFailed(e.to_string()))?;
            return self.dispatch(envelope);
        }

        debug!(frame = text, "Ignoring unrecognized frame");
        Ok(())
    }

    /// Routes a data envelope to its typed stream by canonical channel.
    fn dispatch(&self, envelope: Envelope) -> Result<()> {
        let sub = Subscription::parse(&envelope.channel)?;
        let decode = |e: serde_json::Error| KervielError::DecodeFailed(e.to_string());

        match sub.kind() {
            ChannelKind::Ticker => {
                let mut ticker: Ticker = serde_json::from_value(envelope.data).map_err(decode)?;
                ticker.ts = envelope.ts;
                if ticker.symbol.is_empty() {
                    ticker.symbol = sub.symbol().to_string();
                }
                Self::forward(&self.tickers, ticker, "ticker");
            }
            ChannelKind::Candle => {
                let mut candle: Candle = serde_json::from_value(envelope.data).map_err(decode)?;
                candle.ts = envelope.ts;
                if candle.symbol.is_empty() {
                    candle.symbol = sub.symbol().to_string();
                }
                Self::forward(&self.candles, candle, "candle");
            }
            ChannelKind::Trade => {
                let mut trade: Trade = serde_json::from_value(envelope.data).map_err(decode)?;
                trade.ts = envelope.ts;
                if trade.symbol.is_empty() {
                    trade.symbol = sub.symbol().to_string();
                }
                Self::forward(&self.trades, trade, "trade");
            }
            ChannelKind::Depth => {
                let mut depth: Depth = serde_json::from_value(envelope.data).map_err(decode)?;
                depth.ts = envelope.ts;
                if depth.symbol.is_empty() {
                    depth.symbol = sub.symbol().to_string();
                }
                Self::forward(&self.depths, depth, "depth");
            }
            ChannelKind::BookTicker => {
                let mut book: BookTicker =
                    serde_json::from_value(envelope.data).map_err(decode)?;
                book.ts = envelope.ts;
                if book.symbol.is_empty() {
                    book.symbol = sub.symbol().to_string();
                }
                Self::forward(&self.book_tickers, book, "bookTicker");
            }
        }

        Ok(())
    }

    /// Non-blocking delivery with the drop-newest overflow policy.
    fn forward<T>(tx: &mpsc::Sender<T>, message: T, kind: &'static str) {
        match tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(kind, "Consumer lagging, dropping message");
            }
            // The consumer dropped its stream; nothing to deliver to.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Whether the peer has acknowledged `channel` on the current connection.
    #[must_use]
    pub fn is_confirmed(&self, channel: &str) -> bool {
        let confirmed = self.confirmed.lock().expect("router mutex poisoned");
        confirmed.contains(channel)
    }

    /// Clears per-connection state after a reconnect.
    pub fn reset_confirmations(&self) {
        let mut confirmed = self.confirmed.lock().expect("router mutex poisoned");
        confirmed.clear();
    }

    /// Instant of the most recent pong, if any was received.
    #[must_use]
    pub fn last_pong(&self) -> Option<Instant> {
        *self.last_pong.lock().expect("router mutex poisoned")
    }
}
