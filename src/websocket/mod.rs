//! Async WebSocket transport layer for the MEXC market-data API.
//!
//! This module is organized by concern:
//! - [`connection`] - transport ownership and the reader/writer/pinger workers
//! - [`registry`] - the canonical set of active subscriptions
//! - [`router`] - inbound frame decoding and typed dispatch
//! - [`supervisor`] - reconnection with backoff and resubscription

pub mod connection;
pub mod registry;
pub mod router;
pub mod supervisor;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::info;
use tungstenite::Message;

use crate::Result;
use crate::error::KervielError;

pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState, OUTBOUND_QUEUE};
pub use registry::SubscriptionRegistry;
pub use router::MessageRouter;
pub use supervisor::ReconnectSupervisor;

/// Write half of an exchange WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of an exchange WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns [`KervielError::DialFailed`] if the connection or TLS handshake
/// fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _) = connect_async(url).await.map_err(KervielError::DialFailed)?;
    info!("WebSocket handshake completed");

    Ok(ws_stream.split())
}
