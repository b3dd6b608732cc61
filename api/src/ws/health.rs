//! Dead and idle connection sweeper.
//!
//! A connection is evicted when it reports closed or has been silent longer
//! than the idle threshold. The sweep interval and threshold tighten under
//! load and relax again only once load falls below a lower watermark.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::channels::ConnectionRegistry;
use super::metrics::WsMetrics;
use crate::config::ConfigError;

/// Health monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    /// Sweep interval in normal mode.
    pub normal_interval: Duration,
    /// Idle threshold in normal mode.
    pub normal_idle_timeout: Duration,
    /// Sweep interval in aggressive mode.
    pub aggressive_interval: Duration,
    /// Idle threshold in aggressive mode.
    pub aggressive_idle_timeout: Duration,
    /// Total connections at which aggressive mode starts.
    pub high_water: usize,
    /// Total connections at or below which normal mode may resume.
    pub low_water: usize,
    /// Channel density at which aggressive mode starts.
    pub density_high_water: usize,
    /// Channel density at or below which normal mode may resume.
    pub density_low_water: usize,
    /// Connections checked between scheduler yields.
    pub batch_size: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            normal_interval: Duration::from_secs(30),
            normal_idle_timeout: Duration::from_secs(120),
            aggressive_interval: Duration::from_secs(10),
            aggressive_idle_timeout: Duration::from_secs(45),
            high_water: 500,
            low_water: 400,
            density_high_water: 200,
            density_low_water: 150,
            batch_size: 100,
        }
    }
}

impl HealthConfig {
    /// Sets the total connection watermarks.
    #[must_use]
    pub const fn with_watermarks(mut self, high: usize, low: usize) -> Self {
        self.high_water = high;
        self.low_water = low;
        self
    }

    /// Sets the channel density watermarks.
    #[must_use]
    pub const fn with_density_watermarks(mut self, high: usize, low: usize) -> Self {
        self.density_high_water = high;
        self.density_low_water = low;
        self
    }

    /// Sets the normal-mode idle threshold.
    ///
    /// The aggressive threshold follows at 3/8 of it, the ratio of the
    /// defaults (120 s and 45 s).
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.normal_idle_timeout = timeout;
        self.aggressive_idle_timeout = timeout.saturating_mul(3) / 8;
        self
    }

    /// Sets the aggressive-mode idle threshold.
    #[must_use]
    pub const fn with_aggressive_idle_timeout(mut self, timeout: Duration) -> Self {
        self.aggressive_idle_timeout = timeout;
        self
    }

    /// Sets both sweep intervals.
    #[must_use]
    pub const fn with_intervals(mut self, normal: Duration, aggressive: Duration) -> Self {
        self.normal_interval = normal;
        self.aggressive_interval = aggressive;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the watermarks overlap, a value is zero, or
    /// aggressive mode is looser than normal mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.low_water >= self.high_water {
            return Err(ConfigError::Invalid(
                "health low water must be below high water".into(),
            ));
        }
        if self.density_low_water >= self.density_high_water {
            return Err(ConfigError::Invalid(
                "health density low water must be below density high water".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("health batch size must be positive".into()));
        }
        if self.normal_interval.is_zero() || self.aggressive_interval.is_zero() {
            return Err(ConfigError::Invalid("health intervals must be positive".into()));
        }
        if self.normal_idle_timeout.is_zero() || self.aggressive_idle_timeout.is_zero() {
            return Err(ConfigError::Invalid("health idle timeouts must be positive".into()));
        }
        if self.aggressive_interval > self.normal_interval {
            return Err(ConfigError::Invalid(
                "aggressive sweep interval must not exceed the normal interval".into(),
            ));
        }
        if self.aggressive_idle_timeout > self.normal_idle_timeout {
            return Err(ConfigError::Invalid(
                "aggressive idle timeout must not exceed the normal idle timeout".into(),
            ));
        }
        Ok(())
    }
}

/// Sweep aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMode {
    /// Relaxed interval and threshold.
    Normal,
    /// Short interval and strict threshold.
    Aggressive,
}

impl SweepMode {
    /// Returns the mode after observing the current load.
    #[must_use]
    pub const fn next(self, config: &HealthConfig, connections: usize, density: usize) -> Self {
        match self {
            Self::Normal
                if connections >= config.high_water || density >= config.density_high_water =>
            {
                Self::Aggressive
            }
            Self::Aggressive
                if connections <= config.low_water && density <= config.density_low_water =>
            {
                Self::Normal
            }
            mode => mode,
        }
    }

    /// Returns the sweep interval for this mode.
    #[must_use]
    pub const fn interval(self, config: &HealthConfig) -> Duration {
        match self {
            Self::Normal => config.normal_interval,
            Self::Aggressive => config.aggressive_interval,
        }
    }

    /// Returns the idle threshold for this mode.
    #[must_use]
    pub const fn idle_timeout(self, config: &HealthConfig) -> Duration {
        match self {
            Self::Normal => config.normal_idle_timeout,
            Self::Aggressive => config.aggressive_idle_timeout,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Registrations examined.
    pub scanned: usize,
    /// Registrations removed.
    pub evicted: usize,
    /// Mode the sweep ran in.
    pub mode: SweepMode,
}

/// Periodically evicts dead and idle connections.
#[derive(Debug)]
pub struct HealthMonitor {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<WsMetrics>,
    config: HealthConfig,
    aggressive: AtomicBool,
}

impl HealthMonitor {
    /// Creates a monitor in normal mode.
    #[must_use]
    pub const fn new(
        registry: Arc<ConnectionRegistry>,
        metrics: Arc<WsMetrics>,
        config: HealthConfig,
    ) -> Self {
        Self {
            registry,
            metrics,
            config,
            aggressive: AtomicBool::new(false),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Returns the current mode.
    #[must_use]
    pub fn mode(&self) -> SweepMode {
        if self.aggressive.load(Ordering::Relaxed) {
            SweepMode::Aggressive
        } else {
            SweepMode::Normal
        }
    }

    fn set_mode(&self, mode: SweepMode) {
        let previous = self.mode();
        if previous != mode {
            info!(from = ?previous, to = ?mode, "health monitor mode changed");
        }
        self.aggressive
            .store(mode == SweepMode::Aggressive, Ordering::Relaxed);
    }

    /// Runs one sweep now.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now()).await
    }

    /// Runs one sweep as of `now`.
    pub async fn sweep_at(&self, now: Instant) -> SweepReport {
        let connections = self.registry.connection_count().await;
        let density = self.registry.max_channel_density().await;
        let mode = self.mode().next(&self.config, connections, density);
        self.set_mode(mode);

        let threshold = mode.idle_timeout(&self.config);
        let registrations = self.registry.registrations().await;
        let mut evicted = 0;

        for batch in registrations.chunks(self.config.batch_size.max(1)) {
            for (channel, connection) in batch {
                let idle = connection.idle_for(now);
                if !connection.is_closed() && idle <= threshold {
                    continue;
                }

                if self.registry.unregister(channel, connection.id()).await {
                    evicted += 1;
                    debug!(
                        connection_id = connection.id(),
                        channel = %channel,
                        idle_secs = idle.as_secs(),
                        "evicting connection"
                    );
                }
                connection.close();
            }
            tokio::task::yield_now().await;
        }

        self.metrics.record_sweep(evicted);
        if evicted > 0 {
            info!(scanned = registrations.len(), evicted, ?mode, "health sweep");
        }

        SweepReport {
            scanned: registrations.len(),
            evicted,
            mode,
        }
    }

    /// Sweeps on the mode's interval until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("health monitor started");
        loop {
            let interval = self.mode().interval(&self.config);
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    self.sweep().await;
                }
            }
        }
        info!("health monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use orderwire_sdk::Channel;
    use tokio::sync::mpsc;

    use super::*;
    use crate::ws::connection::Connection;

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        monitor: HealthMonitor,
        // Keeps connection writers alive.
        receivers: Vec<mpsc::Receiver<Arc<str>>>,
    }

    impl Harness {
        fn new(config: HealthConfig) -> Self {
            let registry = Arc::new(ConnectionRegistry::new());
            let monitor =
                HealthMonitor::new(Arc::clone(&registry), Arc::new(WsMetrics::new()), config);
            Self {
                registry,
                monitor,
                receivers: Vec::new(),
            }
        }

        async fn add(&mut self, channel: Channel, last_seen: Instant) -> Arc<Connection> {
            let (tx, rx) = mpsc::channel(4);
            let conn = Arc::new(Connection::new(channel.clone(), tx));
            conn.touch_at(last_seen);
            self.registry.register(channel, Arc::clone(&conn)).await;
            self.receivers.push(rx);
            conn
        }
    }

    #[test]
    fn test_mode_hysteresis() {
        let config = HealthConfig::default();
        let mode = SweepMode::Normal;

        assert_eq!(mode.next(&config, 499, 10), SweepMode::Normal);
        let mode = mode.next(&config, 500, 10);
        assert_eq!(mode, SweepMode::Aggressive);
        // Between the watermarks nothing changes.
        assert_eq!(mode.next(&config, 450, 10), SweepMode::Aggressive);
        assert_eq!(mode.next(&config, 400, 10), SweepMode::Normal);
    }

    #[test]
    fn test_mode_density_trigger() {
        let config = HealthConfig::default();
        let mode = SweepMode::Normal.next(&config, 10, 200);
        assert_eq!(mode, SweepMode::Aggressive);
        // Count is low but density is still above its low watermark.
        assert_eq!(mode.next(&config, 10, 151), SweepMode::Aggressive);
        assert_eq!(mode.next(&config, 10, 150), SweepMode::Normal);
    }

    #[test]
    fn test_mode_durations() {
        let config = HealthConfig::default();
        assert_eq!(SweepMode::Normal.interval(&config), Duration::from_secs(30));
        assert_eq!(SweepMode::Normal.idle_timeout(&config), Duration::from_secs(120));
        assert_eq!(SweepMode::Aggressive.interval(&config), Duration::from_secs(10));
        assert_eq!(SweepMode::Aggressive.idle_timeout(&config), Duration::from_secs(45));
    }

    #[test]
    fn test_config_validate() {
        assert!(HealthConfig::default().validate().is_ok());
        assert!(HealthConfig::default()
            .with_watermarks(10, 10)
            .validate()
            .is_err());
        assert!(HealthConfig::default().with_batch_size(0).validate().is_err());
    }

    #[test]
    fn test_config_aggressive_must_be_stricter() {
        let looser_timeout = HealthConfig::default()
            .with_aggressive_idle_timeout(Duration::from_secs(300));
        assert!(looser_timeout.validate().is_err());

        let looser_interval = HealthConfig::default()
            .with_intervals(Duration::from_secs(10), Duration::from_secs(30));
        assert!(looser_interval.validate().is_err());
    }

    #[test]
    fn test_idle_timeout_scales_aggressive_threshold() {
        let config = HealthConfig::default().with_idle_timeout(Duration::from_secs(30));
        assert_eq!(config.normal_idle_timeout, Duration::from_secs(30));
        assert_eq!(config.aggressive_idle_timeout, Duration::from_millis(11_250));
        assert!(config.validate().is_ok());
        assert!(
            SweepMode::Aggressive.idle_timeout(&config) < SweepMode::Normal.idle_timeout(&config)
        );
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_keeps_active() {
        let mut h = Harness::new(HealthConfig::default());
        let start = Instant::now();
        let now = start + Duration::from_secs(121);

        let idle = h.add(Channel::Kitchen, start).await;
        let active = h.add(Channel::Kitchen, now).await;

        let report = h.monitor.sweep_at(now).await;

        assert_eq!(report.scanned, 2);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.mode, SweepMode::Normal);
        assert!(idle.is_closed());
        assert!(!active.is_closed());
        assert_eq!(h.registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_evicts_closed_connection() {
        let mut h = Harness::new(HealthConfig::default());
        let now = Instant::now();
        let conn = h.add(Channel::Kitchen, now).await;
        conn.close();

        let report = h.monitor.sweep_at(now).await;
        assert_eq!(report.evicted, 1);
        assert_eq!(h.registry.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_in_batches() {
        let mut h = Harness::new(HealthConfig::default().with_batch_size(3));
        let start = Instant::now();
        for _ in 0..10 {
            h.add(Channel::Kitchen, start).await;
        }

        let report = h.monitor.sweep_at(start + Duration::from_secs(200)).await;
        assert_eq!(report.scanned, 10);
        assert_eq!(report.evicted, 10);
    }

    #[tokio::test]
    async fn test_aggressive_mode_uses_strict_threshold() {
        let config = HealthConfig::default()
            .with_watermarks(3, 1)
            .with_density_watermarks(100, 50);
        let mut h = Harness::new(config);
        let start = Instant::now();
        for _ in 0..3 {
            h.add(Channel::Kitchen, start).await;
        }

        // 60 s idle: under the normal threshold, over the aggressive one.
        let report = h.monitor.sweep_at(start + Duration::from_secs(60)).await;
        assert_eq!(report.mode, SweepMode::Aggressive);
        assert_eq!(report.evicted, 3);
        assert_eq!(h.monitor.mode(), SweepMode::Aggressive);

        // Load has dropped to zero, so the next sweep relaxes.
        let report = h.monitor.sweep_at(start + Duration::from_secs(61)).await;
        assert_eq!(report.mode, SweepMode::Normal);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let h = Harness::new(HealthConfig::default());
        let monitor = Arc::new(h.monitor);
        let token = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&monitor).run(token.clone()));

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok());
    }
}
