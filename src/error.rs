//! Crate-level error types.
//!
//! [`KervielError`] unifies every error source (rate limiting, connection
//! lifecycle, JSON, configuration) behind a single enum so callers can match
//! on the variant they care about while still using the `?` operator for
//! easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KervielError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum KervielError {
    /// A rate limiter had no token available and cannot produce one
    /// (zero refill rate), or a non-blocking acquire found the bucket empty.
    #[error("rate limit exhausted: {0}")]
    RateExhausted(&'static str),

    /// The operation was aborted by its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// The client has no live transport.
    #[error("not connected")]
    NotConnected,

    /// The outbound frame queue is full; the writer is not keeping up.
    #[error("outbound queue full")]
    Backpressure,

    /// Establishing the WebSocket connection failed.
    #[error("dial failed: {0}")]
    DialFailed(#[source] tungstenite::Error),

    /// Writing a frame to the transport failed.
    #[error("transport write failed: {0}")]
    WriteFailed(String),

    /// An inbound frame could not be decoded. Never surfaced to callers;
    /// the router logs the frame and drops it.
    #[error("frame decode failed: {0}")]
    DecodeFailed(String),

    /// Automatic reconnection gave up after the configured attempt limit.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    /// The client was shut down; no further operations are possible.
    #[error("client already closed")]
    AlreadyClosed,

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration file could not be found, read, or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
