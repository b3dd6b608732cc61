//! Server configuration.
//!
//! Defaults suit a single-node deployment. Every value can be overridden
//! from `ORDERWIRE_*` environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::ws::cache::CacheConfig;
use crate::ws::health::HealthConfig;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default per-connection outbound queue size.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Default socket write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// Outbound queue size per connection.
    pub outbound_buffer: usize,

    /// Maximum time a single socket write may take.
    pub write_timeout: Duration,

    /// Health monitor settings.
    pub health: HealthConfig,

    /// Message cache settings.
    pub cache: CacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            health: HealthConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration for the given address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through a variable lookup function.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or the
    /// resulting configuration is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("ORDERWIRE_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "ORDERWIRE_PORT")? {
            config.port = port;
        }
        if let Some(buffer) = parse_var(&lookup, "ORDERWIRE_OUTBOUND_BUFFER")? {
            config.outbound_buffer = buffer;
        }
        if let Some(ms) = parse_var(&lookup, "ORDERWIRE_WRITE_TIMEOUT_MS")? {
            config.write_timeout = Duration::from_millis(ms);
        }
        if let Some(high) = parse_var(&lookup, "ORDERWIRE_HEALTH_HIGH_WATER")? {
            config.health.high_water = high;
        }
        if let Some(low) = parse_var(&lookup, "ORDERWIRE_HEALTH_LOW_WATER")? {
            config.health.low_water = low;
        }
        if let Some(secs) = parse_var(&lookup, "ORDERWIRE_IDLE_TIMEOUT_SECS")? {
            config.health = config.health.with_idle_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = parse_var(&lookup, "ORDERWIRE_CACHE_TTL_MS")? {
            config.cache = config.cache.with_ttl(Duration::from_millis(ms));
        }
        if let Some(capacity) = parse_var(&lookup, "ORDERWIRE_CACHE_CAPACITY")? {
            config.cache.capacity = capacity;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the outbound queue size.
    #[must_use]
    pub const fn with_outbound_buffer(mut self, buffer: usize) -> Self {
        self.outbound_buffer = buffer;
        self
    }

    /// Sets the write timeout.
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the health monitor configuration.
    #[must_use]
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }

    /// Sets the message cache configuration.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Returns the socket address string.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid("outbound buffer must be positive".into()));
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::Invalid("write timeout must be positive".into()));
        }
        self.health.validate()?;
        self.cache.validate()
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidVar { name, value })
        })
        .transpose()
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidVar {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// A setting is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
