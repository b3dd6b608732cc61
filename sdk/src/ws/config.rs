//! WebSocket client configuration.
//!
//! Provides configuration options for the reconnecting order feed client.

use std::time::Duration;

use url::Url;

use super::error::WsError;

/// Default WebSocket URL.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/ws";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 25;

/// Default base reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;

/// Default geometric growth of the reconnect delay.
pub const DEFAULT_BACKOFF_GROWTH: f64 = 1.5;

/// Maximum reconnect delay in seconds.
pub const MAX_RECONNECT_DELAY_SECS: u64 = 30;

/// Lower bound of the jitter band.
pub const DEFAULT_JITTER_MIN: f64 = 0.85;

/// Upper bound of the jitter band.
pub const DEFAULT_JITTER_MAX: f64 = 1.15;

/// Default capacity of the inbound event queue.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default capacity of the deduplicator's seen-set.
pub const DEFAULT_DEDUP_CAPACITY: usize = 512;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// WebSocket client configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket endpoint URL, without the `target` parameter.
    pub url: String,

    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,

    /// Base reconnect delay (attempt 0, before jitter).
    pub reconnect_delay: Duration,

    /// Geometric growth applied per failed attempt.
    pub backoff_growth: f64,

    /// Maximum reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Jitter band as `(min, max)` multipliers.
    pub jitter: (f64, f64),

    /// Maximum reconnection attempts (None = unlimited).
    pub max_reconnect_attempts: Option<u32>,

    /// Timeout for a single connection attempt.
    pub connect_timeout: Duration,

    /// Capacity of the inbound event queue.
    pub event_buffer: usize,

    /// Capacity of the deduplicator's seen-set.
    pub dedup_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            backoff_growth: DEFAULT_BACKOFF_GROWTH,
            max_reconnect_delay: Duration::from_secs(MAX_RECONNECT_DELAY_SECS),
            jitter: (DEFAULT_JITTER_MIN, DEFAULT_JITTER_MAX),
            max_reconnect_attempts: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            event_buffer: DEFAULT_EVENT_BUFFER,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

impl WsConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the base reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the backoff growth factor.
    #[must_use]
    pub fn with_backoff_growth(mut self, growth: f64) -> Self {
        self.backoff_growth = growth;
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the jitter band.
    #[must_use]
    pub fn with_jitter(mut self, min: f64, max: f64) -> Self {
        self.jitter = (min, max);
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the inbound event queue capacity.
    #[must_use]
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Sets the deduplicator capacity.
    #[must_use]
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    /// Returns the connection URL for a subscription target.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL does not parse.
    pub fn connection_url(&self, target: &str) -> Result<String, WsError> {
        let mut url = self.parse_url()?;
        url.query_pairs_mut().append_pair("target", target);
        Ok(url.into())
    }

    fn parse_url(&self) -> Result<Url, WsError> {
        Url::parse(&self.url).map_err(|e| WsError::InvalidConfig(format!("invalid url: {e}")))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.url.is_empty() {
            return Err(WsError::InvalidConfig("url cannot be empty".to_string()));
        }

        let url = self.parse_url()?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(WsError::InvalidConfig(
                "url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(WsError::InvalidConfig(
                "heartbeat_interval must be > 0".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(WsError::InvalidConfig(
                "connect_timeout must be > 0".to_string(),
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(WsError::InvalidConfig(
                "reconnect_delay must be > 0".to_string(),
            ));
        }

        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(WsError::InvalidConfig(
                "max_reconnect_delay must be >= reconnect_delay".to_string(),
            ));
        }

        if !self.backoff_growth.is_finite() || self.backoff_growth < 1.0 {
            return Err(WsError::InvalidConfig(
                "backoff_growth must be >= 1.0".to_string(),
            ));
        }

        let (min, max) = self.jitter;
        if !(min.is_finite() && max.is_finite()) || min <= 0.0 || min > max {
            return Err(WsError::InvalidConfig(
                "jitter band must satisfy 0 < min <= max".to_string(),
            ));
        }

        if self.event_buffer == 0 || self.dedup_capacity == 0 {
            return Err(WsError::InvalidConfig(
                "event_buffer and dedup_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.url, DEFAULT_WS_URL);
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert!((config.backoff_growth - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
        assert!(config.max_reconnect_attempts.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = WsConfig::new("wss://example.com/ws")
            .with_heartbeat_interval(Duration::from_secs(60))
            .with_reconnect_delay(Duration::from_millis(100))
            .with_backoff_growth(2.0)
            .with_max_reconnect_delay(Duration::from_secs(5))
            .with_jitter(0.9, 1.1)
            .with_max_reconnect_attempts(5)
            .with_event_buffer(8)
            .with_dedup_capacity(16);

        assert_eq!(config.url, "wss://example.com/ws");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(config.reconnect_delay, Duration::from_millis(100));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.jitter, (0.9, 1.1));
        assert_eq!(config.max_reconnect_attempts, Some(5));
        assert_eq!(config.event_buffer, 8);
        assert_eq!(config.dedup_capacity, 16);
    }

    #[test]
    fn test_config_connection_url() {
        let config = WsConfig::new("wss://example.com/ws");
        assert_eq!(
            config.connection_url("restaurant-3").expect("url"),
            "wss://example.com/ws?target=restaurant-3"
        );
    }

    #[test]
    fn test_config_connection_url_with_existing_params() {
        let config = WsConfig::new("wss://example.com/ws?v=1");
        assert_eq!(
            config.connection_url("7").expect("url"),
            "wss://example.com/ws?v=1&target=7"
        );
    }

    #[test]
    fn test_config_connection_url_encodes_target() {
        let config = WsConfig::new("ws://localhost/ws");
        assert_eq!(
            config.connection_url("table 7&x=1").expect("url"),
            "ws://localhost/ws?target=table+7%26x%3D1"
        );
    }

    #[test]
    fn test_config_connection_url_unparseable() {
        let config = WsConfig::new("ws://");
        assert!(config.connection_url("7").is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_heartbeat() {
        let config = WsConfig::default().with_heartbeat_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(WsError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_validate_zero_connect_timeout() {
        let config = WsConfig::default().with_connect_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(WsError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_validate_invalid_scheme() {
        let config = WsConfig::new("https://example.com/ws");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_empty_url() {
        assert!(WsConfig::new("").validate().is_err());
    }

    #[test]
    fn test_config_validate_growth() {
        let config = WsConfig::default().with_backoff_growth(0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_jitter_band() {
        let config = WsConfig::default().with_jitter(1.2, 0.8);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_cap_below_base() {
        let config = WsConfig::default()
            .with_reconnect_delay(Duration::from_secs(10))
            .with_max_reconnect_delay(Duration::from_secs(1));
        assert!(config.validate().is_err());
    }
}
