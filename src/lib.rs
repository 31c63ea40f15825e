//! Resilient WebSocket market-data client for the MEXC spot exchange.
//!
//! Maintains live subscriptions to ticker, candle, trade, depth and
//! book-ticker channels, recovering from transport loss with exponential
//! backoff and automatic resubscription. Connection and subscription
//! attempts are gated by independent token-bucket rate limiters.

pub mod client;
pub mod config;
pub mod error;
pub mod limiter;
pub mod models;
pub mod websocket;

pub use client::{MarketStreams, StreamClient};
pub use config::{ClientConfig, RateLimitConfig};
pub use error::{KervielError, Result};
