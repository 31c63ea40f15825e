//! Reconnection with exponential backoff and automatic resubscription.
//!
//! [`ReconnectSupervisor`] listens for connection-lost events from the
//! workers. On each loss it reaps the dead connection, backs off, redials
//! through the *connection* rate limiter, and replays the subscription
//! registry through the *subscription* rate limiter. A `disconnect` call
//! pre-empts pending backoff sleeps and limiter waits through the
//! supervisor-scoped cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use super::registry::SubscriptionRegistry;
use super::router::MessageRouter;
use crate::Result;
use crate::config::ClientConfig;
use crate::error::KervielError;
use crate::limiter::TokenBucket;
use crate::models::SubscribeRequest;

/// A reconnection that stays up at least this long resets the attempt
/// counter.
const STABILITY_WINDOW: Duration = Duration::from_secs(30);

/// Watches one client's connection and restores it after transport loss.
pub struct ReconnectSupervisor {
    manager: Arc<ConnectionManager>,
    registry: Arc<SubscriptionRegistry>,
    router: Arc<MessageRouter>,
    sub_limiter: Arc<TokenBucket>,
    config: ClientConfig,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    errors: mpsc::Sender<KervielError>,
    cancel: CancellationToken,
}

impl ReconnectSupervisor {
    /// Creates a supervisor for an already-established connection.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manager: Arc<ConnectionManager>,
        registry: Arc<SubscriptionRegistry>,
        router: Arc<MessageRouter>,
        sub_limiter: Arc<TokenBucket>,
        config: ClientConfig,
        events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
        events_tx: mpsc::UnboundedSender<ConnectionEvent>,
        errors: mpsc::Sender<KervielError>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            manager,
            registry,
            router,
            sub_limiter,
            config,
            events_rx,
            events_tx,
            errors,
            cancel,
        }
    }

    /// Runs until cancelled, the client shuts down, or reconnection is
    /// exhausted.
    pub async fn run(mut self) {
        let mut attempt: u32 = 0;
        let mut connected_at = Instant::now();

        loop {
            let event = tokio::select! {
                () = self.cancel.cancelled() => return,
                event = self.events_rx.recv() => event,
            };
            let Some(ConnectionEvent::Lost { reason }) = event else {
                // Event channel closed: every sender (and the client) is gone.
                return;
            };

            // Reap the dead connection's workers before any redial, then
            // drain events the other workers of the same connection may
            // have queued, so they are not mistaken for a fresh loss.
            self.manager.close().await;
            while self.events_rx.try_recv().is_ok() {}
            if self.manager.state() == ConnectionState::Closed {
                return;
            }

            if !self.config.auto_reconnect {
                warn!(reason = %reason, "Connection lost; auto-reconnect is disabled");
                return;
            }

            if connected_at.elapsed() >= STABILITY_WINDOW {
                attempt = 0;
            }
            warn!(reason = %reason, "Connection lost, reconnecting");
            self.manager.set_state(ConnectionState::Reconnecting);

            loop {
                attempt += 1;
                if attempt > self.config.max_reconnect_attempts {
                    let attempts = attempt - 1;
                    warn!(attempts, "Reconnect attempts exhausted, giving up");
                    self.manager.set_state(ConnectionState::Disconnected);
                    let _ = self
                        .errors
                        .try_send(KervielError::ReconnectExhausted { attempts });
                    return;
                }

                let delay = backoff_delay(
                    attempt,
                    self.config.reconnect_delay,
                    self.config.max_reconnect_delay,
                );
                info!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before redial");
                tokio::select! {
                    () = self.cancel.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }

                match self.manager.dial(&self.cancel, self.events_tx.clone()).await {
                    Ok(()) => {
                        self.router.reset_confirmations();
                        match self.resubscribe().await {
                            Ok(()) => info!("Reconnected and resubscribed"),
                            Err(KervielError::Cancelled) => return,
                            // The transport may already be gone again; the
                            // next lost event restarts the cycle and the
                            // registry still holds every channel.
                            Err(e) => warn!(error = %e, "Resubscription incomplete"),
                        }
                        connected_at = Instant::now();
                        break;
                    }
                    Err(KervielError::Cancelled | KervielError::AlreadyClosed) => return,
                    Err(e) => warn!(error = %e, attempt, "Reconnect attempt failed"),
                }
            }
        }
    }

    /// Replays the registry onto the fresh connection, one subscription
    /// frame per entry, each gated through the subscription limiter.
    async fn resubscribe(&self) -> Result<()> {
        for sub in self.registry.snapshot() {
            self.sub_limiter.wait(&self.cancel).await?;
            let request = SubscribeRequest::new(&[sub.channel().to_string()]);
            self.manager.send_json(&request)?;
            debug!(channel = sub.channel(), "Resubscribed");
        }
        Ok(())
    }
}

/// `min(max_delay, base · 2^(n−1))` for the n-th attempt.
fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(2_u32.saturating_pow(exponent)).min(max)
}
