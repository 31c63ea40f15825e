//! WebSocket connection lifecycle management.
//!
//! [`ConnectionManager`] owns at most one live transport. Each successful
//! dial spawns three workers: a **reader** feeding the
//! [`MessageRouter`], a **writer** draining the bounded outbound queue (the
//! only task that ever touches the sink), and a **pinger** emitting
//! periodic liveness probes. Worker failures are reported on the
//! connection-event channel; the supervisor decides what happens next.
//!
//! No mutex here is ever held across an `.await`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tungstenite::Message;

use super::router::MessageRouter;
use super::{WsReader, WsWriter, connect};
use crate::Result;
use crate::config::ClientConfig;
use crate::error::KervielError;
use crate::limiter::TokenBucket;
use crate::models::PingRequest;

/// Capacity of the outbound frame queue. [`ConnectionManager::send`] fails
/// with [`KervielError::Backpressure`] once it is full.
pub const OUTBOUND_QUEUE: usize = 256;

/// How long teardown waits for a worker before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Dialing,
    Connected,
    Reconnecting,
    /// Terminal: the client was shut down and cannot dial again.
    Closed,
}

/// Why a live connection ended, reported by a worker to the supervisor.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The transport failed, timed out, or the peer closed it.
    Lost { reason: String },
}

/// Everything tied to one live transport.
struct ActiveConnection {
    outbound: mpsc::Sender<Message>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

/// Owns the transport and its reader/writer/pinger workers.
pub struct ConnectionManager {
    endpoint: Mutex<String>,
    ping_interval: Duration,
    pong_timeout: Duration,
    conn_limiter: Arc<TokenBucket>,
    router: Arc<MessageRouter>,
    state: Mutex<ConnectionState>,
    attempts: AtomicU32,
    active: Mutex<Option<ActiveConnection>>,
}

impl ConnectionManager {
    /// Creates a manager for the configured endpoint. No I/O happens until
    /// [`dial`](ConnectionManager::dial).
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        conn_limiter: Arc<TokenBucket>,
        router: Arc<MessageRouter>,
    ) -> Self {
        Self {
            endpoint: Mutex::new(config.endpoint.clone()),
            ping_interval: config.ping_interval,
            pong_timeout: config.pong_timeout,
            conn_limiter,
            router,
            state: Mutex::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            active: Mutex::new(None),
        }
    }

    /// Replaces the endpoint used by subsequent dials.
    pub fn set_endpoint(&self, url: impl Into<String>) {
        let mut endpoint = self.endpoint.lock().expect("connection mutex poisoned");
        *endpoint = url.into();
    }

    /// The endpoint used by subsequent dials.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint
            .lock()
            .expect("connection mutex poisoned")
            .clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("connection mutex poisoned")
    }

    /// Transitions to `state` unless already terminally closed.
    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.lock().expect("connection mutex poisoned");
        if *current != ConnectionState::Closed {
            *current = state;
        }
    }

    /// Whether a live transport exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Total number of dial attempts since construction.
    #[must_use]
    pub fn connection_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Dials the configured endpoint and starts the connection workers.
    ///
    /// Passes the *connection* rate limiter before any network I/O. Workers
    /// report transport loss to `events`.
    ///
    /// # Errors
    ///
    /// [`KervielError::AlreadyClosed`], [`KervielError::RateExhausted`],
    /// [`KervielError::Cancelled`], or [`KervielError::DialFailed`].
    pub async fn dial(
        &self,
        cancel: &CancellationToken,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<()> {
        if self.state() == ConnectionState::Closed {
            return Err(KervielError::AlreadyClosed);
        }

        self.conn_limiter.wait(cancel).await?;
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;

        if self.state() == ConnectionState::Disconnected {
            self.set_state(ConnectionState::Dialing);
        }
        let url = self.endpoint();
        info!(url = %url, attempt, "Dialing WebSocket");

        let result = tokio::select! {
            () = cancel.cancelled() => Err(KervielError::Cancelled),
            res = connect(&url) => res,
        };
        let (writer, reader) = match result {
            Ok(pair) => pair,
            Err(e) => {
                // During supervised retries the state stays Reconnecting.
                if self.state() == ConnectionState::Dialing {
                    self.set_state(ConnectionState::Disconnected);
                }
                return Err(e);
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let conn_cancel = CancellationToken::new();

        let workers = vec![
            tokio::spawn(run_reader(
                reader,
                self.router.clone(),
                events.clone(),
                conn_cancel.clone(),
                self.pong_timeout,
            )),
            tokio::spawn(run_writer(
                writer,
                outbound_rx,
                events,
                conn_cancel.clone(),
            )),
            tokio::spawn(run_pinger(
                outbound_tx.clone(),
                self.ping_interval,
                conn_cancel.clone(),
            )),
        ];

        let previous = {
            let mut active = self.active.lock().expect("connection mutex poisoned");
            active.replace(ActiveConnection {
                outbound: outbound_tx,
                cancel: conn_cancel,
                workers,
            })
        };
        // A previous transport must never outlive its replacement.
        if let Some(previous) = previous {
            previous.cancel.cancel();
            for handle in previous.workers {
                handle.abort();
            }
        }

        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    /// Enqueues a frame for the writer without blocking.
    ///
    /// # Errors
    ///
    /// [`KervielError::NotConnected`] without a live transport,
    /// [`KervielError::Backpressure`] when the outbound queue is full.
    pub fn send(&self, message: Message) -> Result<()> {
        let active = self.active.lock().expect("connection mutex poisoned");
        let Some(conn) = active.as_ref() else {
            return Err(KervielError::NotConnected);
        };
        conn.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => KervielError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => KervielError::NotConnected,
        })
    }

    /// Serializes `value` and enqueues it as a text frame.
    ///
    /// # Errors
    ///
    /// As [`send`](ConnectionManager::send), plus
    /// [`KervielError::Json`] if serialization fails.
    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.send(Message::Text(json.into()))
    }

    /// Stops the connection workers and drops the transport.
    ///
    /// Idempotent; concurrent calls collapse to one teardown. Returns
    /// within a bounded grace period regardless of peer behaviour.
    pub async fn close(&self) {
        let conn = {
            let mut active = self.active.lock().expect("connection mutex poisoned");
            active.take()
        };
        let Some(conn) = conn else {
            return;
        };

        conn.cancel.cancel();
        for mut handle in conn.workers {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }
        self.set_state(ConnectionState::Disconnected);
        debug!("Connection closed");
    }

    /// Permanently closes the manager. Subsequent dials fail with
    /// [`KervielError::AlreadyClosed`]. Safe to call more than once.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().expect("connection mutex poisoned");
            *state = ConnectionState::Closed;
        }
        self.close().await;
    }
}

/// Reads inbound frames and feeds them to the router until the transport
/// fails, the peer goes silent past `pong_timeout`, or `cancel` fires.
async fn run_reader(
    mut reader: WsReader,
    router: Arc<MessageRouter>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    cancel: CancellationToken,
    pong_timeout: Duration,
) {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return,
            next = tokio::time::timeout(pong_timeout, reader.next()) => next,
        };
        match next {
            Err(_) => {
                warn!(timeout_secs = pong_timeout.as_secs(), "No inbound frames within pong window");
                let _ = events.send(ConnectionEvent::Lost {
                    reason: "read timeout".to_string(),
                });
                return;
            }
            Ok(None) => {
                warn!("WebSocket stream ended");
                let _ = events.send(ConnectionEvent::Lost {
                    reason: "stream ended".to_string(),
                });
                return;
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "WebSocket read error");
                let _ = events.send(ConnectionEvent::Lost {
                    reason: format!("read failed: {e}"),
                });
                return;
            }
            Ok(Some(Ok(Message::Text(text)))) => router.route_text(&text),
            Ok(Some(Ok(Message::Close(_)))) => {
                info!("Peer closed the connection");
                let _ = events.send(ConnectionEvent::Lost {
                    reason: "peer close".to_string(),
                });
                return;
            }
            // Binary/Ping/Pong/Frame messages carry no market data.
            Ok(Some(Ok(_))) => {}
        }
    }
}

/// Drains the outbound queue onto the sink. The sole writer to the
/// transport, so frames go out in enqueue order with no interleaving.
async fn run_writer(
    mut writer: WsWriter,
    mut outbound: mpsc::Receiver<Message>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break,
            frame = outbound.recv() => frame,
        };
        let Some(frame) = frame else { break };
        if let Err(e) = writer.send(frame).await {
            let err = KervielError::WriteFailed(e.to_string());
            warn!(error = %err, "WebSocket write error");
            let _ = events.send(ConnectionEvent::Lost {
                reason: err.to_string(),
            });
            return;
        }
    }
    // Best-effort close frame; the peer may already be gone.
    let _ = writer.close().await;
}

/// Emits a `PING` every `interval`, starting immediately after connect.
async fn run_pinger(
    outbound: mpsc::Sender<Message>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        match serde_json::to_string(&PingRequest::new()) {
            Ok(json) => {
                if outbound.try_send(Message::Text(json.into())).is_err() {
                    debug!("Outbound queue full, skipping ping");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize ping"),
        }
    }
}
