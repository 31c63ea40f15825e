//! Client and application configuration.
//!
//! [`ClientConfig`] is the programmatic, immutable configuration consumed by
//! [`StreamClient`](crate::client::StreamClient). [`AppConfig`] mirrors
//! `config/config.toml`, loaded by the demo binary via [`fetch_config`].

use std::time::Duration;

use config::Config;
use serde::Deserialize;

/// Token-bucket parameters for one admission class.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained refill rate in tokens per second.
    pub requests_per_second: f64,
    /// Maximum number of tokens the bucket can hold.
    pub burst_capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst_capacity: 10.0,
        }
    }
}

/// Streaming client configuration. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint URL.
    pub endpoint: String,
    /// Interval between outbound `PING` frames.
    pub ping_interval: Duration,
    /// How long the reader tolerates total inbound silence before treating
    /// the connection as dead.
    pub pong_timeout: Duration,
    /// Base delay for exponential reconnect backoff.
    pub reconnect_delay: Duration,
    /// Cap applied to the exponential backoff.
    pub max_reconnect_delay: Duration,
    /// Reconnect attempts before giving up and surfacing
    /// [`KervielError::ReconnectExhausted`](crate::KervielError::ReconnectExhausted).
    pub max_reconnect_attempts: u32,
    /// Whether transport loss triggers automatic reconnection.
    pub auto_reconnect: bool,
    /// Gate on connection attempts.
    pub connection_limit: RateLimitConfig,
    /// Gate on subscription and unsubscription frames.
    pub subscription_limit: RateLimitConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://wbs.mexc.com/ws".to_string(),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_delay: Duration::from_secs(60),
            max_reconnect_attempts: 10,
            auto_reconnect: true,
            connection_limit: RateLimitConfig::default(),
            subscription_limit: RateLimitConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for `endpoint` with default timings.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

/// Top-level application configuration.
#[derive(Deserialize)]
pub struct AppConfig {
    pub mexc: MexcConfig,
}

/// MEXC-specific configuration values.
#[derive(Deserialize)]
pub struct MexcConfig {
    pub websocket_url: String,
    /// Symbols the demo binary subscribes to on startup.
    #[serde(default)]
    pub symbols: Vec<String>,
    pub ping_interval_secs: Option<u64>,
    pub reconnect_delay_secs: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
    pub auto_reconnect: Option<bool>,
}

impl MexcConfig {
    /// Builds a [`ClientConfig`] from the file values, falling back to
    /// defaults for anything left unset.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            endpoint: self.websocket_url.clone(),
            ping_interval: self
                .ping_interval_secs
                .map_or(defaults.ping_interval, Duration::from_secs),
            reconnect_delay: self
                .reconnect_delay_secs
                .map_or(defaults.reconnect_delay, Duration::from_secs),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
            auto_reconnect: self.auto_reconnect.unwrap_or(defaults.auto_reconnect),
            ..defaults
        }
    }
}

/// Loads and deserializes the application configuration from disk.
///
/// # Errors
///
/// Returns [`KervielError::Config`](crate::KervielError::Config) if the
/// configuration file is missing, malformed, or cannot be deserialized
/// into [`AppConfig`].
pub fn fetch_config() -> crate::Result<AppConfig> {
    let config = Config::builder()
        .add_source(config::File::with_name("./config/config.toml").required(true))
        .build()?;

    Ok(config.try_deserialize::<AppConfig>()?)
}
