//! Public streaming client façade.
//!
//! [`StreamClient`] ties the connection manager, subscription registry,
//! message router, reconnect supervisor and the two rate limiters together
//! behind the operations a trading bot needs: connect, disconnect,
//! subscribe/unsubscribe per channel kind, and typed output streams.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;
use crate::config::ClientConfig;
use crate::error::KervielError;
use crate::limiter::TokenBucket;
use crate::models::{
    BookTicker, Candle, CandleInterval, Depth, SubscribeRequest, Subscription, Ticker, Trade,
    UnsubscribeRequest,
};
use crate::websocket::connection::{ConnectionManager, ConnectionState};
use crate::websocket::registry::SubscriptionRegistry;
use crate::websocket::router::{
    BOOK_TICKER_BUFFER, CANDLE_BUFFER, DEPTH_BUFFER, MessageRouter, TICKER_BUFFER, TRADE_BUFFER,
};
use crate::websocket::supervisor::ReconnectSupervisor;

/// Error stream buffer; overflow drops the incoming error.
pub const ERROR_BUFFER: usize = 16;

/// How long `disconnect` waits for the supervisor before aborting it.
const SUPERVISOR_GRACE: Duration = Duration::from_millis(100);

/// Read-only typed output streams, handed out once at construction.
///
/// Each stream is bounded with a drop-newest overflow policy (see
/// [`router`](crate::websocket::router)); a consumer that stops draining a
/// stream loses messages but never stalls the client.
pub struct MarketStreams {
    pub tickers: mpsc::Receiver<Ticker>,
    pub candles: mpsc::Receiver<Candle>,
    pub trades: mpsc::Receiver<Trade>,
    pub depths: mpsc::Receiver<Depth>,
    pub book_tickers: mpsc::Receiver<BookTicker>,
    /// Terminal and asynchronous errors, e.g.
    /// [`KervielError::ReconnectExhausted`].
    pub errors: mpsc::Receiver<KervielError>,
}

struct SupervisorHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Resilient, rate-limited streaming client for MEXC spot market data.
///
/// Each instance carries its own configuration, limiters, registry and
/// workers; there is no process-wide state.
pub struct StreamClient {
    config: ClientConfig,
    manager: Arc<ConnectionManager>,
    registry: Arc<SubscriptionRegistry>,
    router: Arc<MessageRouter>,
    sub_limiter: Arc<TokenBucket>,
    errors: mpsc::Sender<KervielError>,
    supervisor: Mutex<Option<SupervisorHandle>>,
    shutdown: CancellationToken,
}

impl StreamClient {
    /// Creates a client and its typed output streams. No I/O happens until
    /// [`connect`](StreamClient::connect).
    #[must_use]
    pub fn new(config: ClientConfig) -> (Self, MarketStreams) {
        let (ticker_tx, tickers) = mpsc::channel(TICKER_BUFFER);
        let (candle_tx, candles) = mpsc::channel(CANDLE_BUFFER);
        let (trade_tx, trades) = mpsc::channel(TRADE_BUFFER);
        let (depth_tx, depths) = mpsc::channel(DEPTH_BUFFER);
        let (book_tx, book_tickers) = mpsc::channel(BOOK_TICKER_BUFFER);
        let (error_tx, errors) = mpsc::channel(ERROR_BUFFER);

        let router = Arc::new(MessageRouter::new(
            ticker_tx, candle_tx, trade_tx, depth_tx, book_tx,
        ));
        let conn_limiter = Arc::new(TokenBucket::new(
            config.connection_limit.requests_per_second,
            config.connection_limit.burst_capacity,
        ));
        let sub_limiter = Arc::new(TokenBucket::new(
            config.subscription_limit.requests_per_second,
            config.subscription_limit.burst_capacity,
        ));
        let manager = Arc::new(ConnectionManager::new(&config, conn_limiter, router.clone()));

        let client = Self {
            config,
            manager,
            registry: Arc::new(SubscriptionRegistry::new()),
            router,
            sub_limiter,
            errors: error_tx,
            supervisor: Mutex::new(None),
            shutdown: CancellationToken::new(),
        };
        let streams = MarketStreams {
            tickers,
            candles,
            trades,
            depths,
            book_tickers,
            errors,
        };
        (client, streams)
    }

    /// Connects to the configured endpoint and starts supervision.
    ///
    /// Subscriptions surviving from a previous session are replayed onto
    /// the new connection. A no-op when already connected.
    ///
    /// # Errors
    ///
    /// [`KervielError::AlreadyClosed`], [`KervielError::RateExhausted`],
    /// [`KervielError::DialFailed`], or [`KervielError::Cancelled`].
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        if self.manager.state() == ConnectionState::Closed {
            return Err(KervielError::AlreadyClosed);
        }
        if self.manager.is_connected() {
            return Ok(());
        }
        // A supervisor from a previous session may still be winding down.
        self.stop_supervisor().await;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.manager.dial(cancel, events_tx.clone()).await?;
        self.router.reset_confirmations();

        // Replay must complete before the connection is handed over; a
        // half-replayed connection would serve a subset of the registry.
        if let Err(e) = self.replay_registry(cancel).await {
            self.manager.close().await;
            return Err(e);
        }

        let sup_cancel = self.shutdown.child_token();
        let supervisor = ReconnectSupervisor::new(
            self.manager.clone(),
            self.registry.clone(),
            self.router.clone(),
            self.sub_limiter.clone(),
            self.config.clone(),
            events_rx,
            events_tx,
            self.errors.clone(),
            sup_cancel.clone(),
        );
        let handle = tokio::spawn(supervisor.run());
        {
            let mut slot = self.supervisor.lock().expect("client mutex poisoned");
            *slot = Some(SupervisorHandle {
                cancel: sup_cancel,
                handle,
            });
        }

        info!(endpoint = %self.manager.endpoint(), "Connected");
        Ok(())
    }

    /// Disconnects and stops supervision.
    ///
    /// Idempotent and infallible; returns within a bounded grace period
    /// regardless of peer behaviour or slow consumers. Subscriptions stay
    /// in the registry and are replayed by the next
    /// [`connect`](StreamClient::connect).
    pub async fn disconnect(&self) {
        self.stop_supervisor().await;
        self.manager.close().await;
        info!("Disconnected");
    }

    /// Permanently shuts the client down. Terminal: subsequent operations
    /// fail with [`KervielError::AlreadyClosed`]. Safe to call more than
    /// once.
    pub async fn close(&self) {
        self.shutdown.cancel();
        self.stop_supervisor().await;
        self.manager.shutdown().await;
    }

    /// Sends one subscription frame per registry entry, limiter-gated.
    async fn replay_registry(&self, cancel: &CancellationToken) -> Result<()> {
        for sub in self.registry.snapshot() {
            self.sub_limiter.wait(cancel).await?;
            self.manager
                .send_json(&SubscribeRequest::new(&[sub.channel().to_string()]))?;
            debug!(channel = sub.channel(), "Replayed subscription");
        }
        Ok(())
    }

    async fn stop_supervisor(&self) {
        let supervisor = {
            let mut slot = self.supervisor.lock().expect("client mutex poisoned");
            slot.take()
        };
        let Some(SupervisorHandle { cancel, mut handle }) = supervisor else {
            return;
        };
        cancel.cancel();
        if tokio::time::timeout(SUPERVISOR_GRACE, &mut handle)
            .await
            .is_err()
        {
            handle.abort();
        }
    }

    /// Subscribes to the ticker channel for each symbol.
    ///
    /// # Errors
    ///
    /// [`KervielError::NotConnected`], [`KervielError::RateExhausted`], or
    /// [`KervielError::Cancelled`].
    pub async fn subscribe_tickers(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<()> {
        let subs = symbols.iter().map(|s| Subscription::ticker(s)).collect();
        self.subscribe_all(cancel, subs).await
    }

    /// Subscribes to candlesticks for `symbol` at `interval`.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn subscribe_candles(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        interval: CandleInterval,
    ) -> Result<()> {
        self.subscribe_all(cancel, vec![Subscription::candle(symbol, interval)])
            .await
    }

    /// Subscribes to the trade channel for each symbol.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn subscribe_trades(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<()> {
        let subs = symbols.iter().map(|s| Subscription::trade(s)).collect();
        self.subscribe_all(cancel, subs).await
    }

    /// Subscribes to order-book depth for each symbol.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn subscribe_depth(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<()> {
        let subs = symbols.iter().map(|s| Subscription::depth(s)).collect();
        self.subscribe_all(cancel, subs).await
    }

    /// Subscribes to best bid/ask updates for each symbol.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn subscribe_book_tickers(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<()> {
        let subs = symbols.iter().map(|s| Subscription::book_ticker(s)).collect();
        self.subscribe_all(cancel, subs).await
    }

    /// Unsubscribes from the ticker channel for each symbol.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn unsubscribe_tickers(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<()> {
        let subs = symbols.iter().map(|s| Subscription::ticker(s)).collect();
        self.unsubscribe_all(cancel, subs).await
    }

    /// Unsubscribes from candlesticks for `symbol` at `interval`.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn unsubscribe_candles(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        interval: CandleInterval,
    ) -> Result<()> {
        self.unsubscribe_all(cancel, vec![Subscription::candle(symbol, interval)])
            .await
    }

    /// Unsubscribes from the trade channel for each symbol.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn unsubscribe_trades(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<()> {
        let subs = symbols.iter().map(|s| Subscription::trade(s)).collect();
        self.unsubscribe_all(cancel, subs).await
    }

    /// Unsubscribes from order-book depth for each symbol.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn unsubscribe_depth(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<()> {
        let subs = symbols.iter().map(|s| Subscription::depth(s)).collect();
        self.unsubscribe_all(cancel, subs).await
    }

    /// Unsubscribes from best bid/ask updates for each symbol.
    ///
    /// # Errors
    ///
    /// As [`subscribe_tickers`](StreamClient::subscribe_tickers).
    pub async fn unsubscribe_book_tickers(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<()> {
        let subs = symbols.iter().map(|s| Subscription::book_ticker(s)).collect();
        self.unsubscribe_all(cancel, subs).await
    }

    async fn subscribe_all(
        &self,
        cancel: &CancellationToken,
        subs: Vec<Subscription>,
    ) -> Result<()> {
        if subs.is_empty() {
            return Ok(());
        }
        if !self.manager.is_connected() {
            return Err(KervielError::NotConnected);
        }

        for sub in subs {
            // Idempotent subscribe: an existing entry costs neither a token
            // nor a frame.
            if self.registry.contains(sub.channel()) {
                debug!(channel = sub.channel(), "Already subscribed");
                continue;
            }
            self.sub_limiter.wait(cancel).await?;
            if !self.registry.add(sub.clone()) {
                continue;
            }
            self.manager
                .send_json(&SubscribeRequest::new(&[sub.channel().to_string()]))?;
            info!(channel = sub.channel(), "Subscribed to channel");
        }
        Ok(())
    }

    async fn unsubscribe_all(
        &self,
        cancel: &CancellationToken,
        subs: Vec<Subscription>,
    ) -> Result<()> {
        if subs.is_empty() {
            return Ok(());
        }
        if !self.manager.is_connected() {
            return Err(KervielError::NotConnected);
        }

        for sub in subs {
            if !self.registry.contains(sub.channel()) {
                continue;
            }
            self.sub_limiter.wait(cancel).await?;
            if !self.registry.remove(sub.channel()) {
                continue;
            }
            self.manager
                .send_json(&UnsubscribeRequest::new(&[sub.channel().to_string()]))?;
            info!(channel = sub.channel(), "Unsubscribed from channel");
        }
        Ok(())
    }

    /// Whether a live transport exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Current connection lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Total number of dial attempts since construction.
    #[must_use]
    pub fn connection_attempts(&self) -> u32 {
        self.manager.connection_attempts()
    }

    /// Replaces the endpoint used by subsequent dials.
    pub fn set_endpoint(&self, url: impl Into<String>) {
        self.manager.set_endpoint(url);
    }

    /// Snapshot of the active subscriptions.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.snapshot()
    }

    /// Whether the peer has acknowledged `channel` on the current
    /// connection.
    #[must_use]
    pub fn is_confirmed(&self, channel: &str) -> bool {
        self.router.is_confirmed(channel)
    }
}
