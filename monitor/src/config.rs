use std::time::Duration;

use floorwatch_directory::RetryPolicy;
use floorwatch_identity::Thresholds;

/// Expected embedding dimension of the extraction model.
pub const DEFAULT_DIM: usize = 512;
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_ARRIVAL_COOLDOWN: Duration = Duration::from_secs(300);

/// Controls the monitor and its background tasks.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Embedding dimension; roster entries of any other length are skipped.
    pub dim: usize,

    /// Period of the background roster refresh (default: 10s).
    pub refresh_interval: Duration,

    /// A roster older than this triggers an early background refresh
    /// from the request that noticed (default: 60s).
    pub stale_threshold: Duration,

    /// Period of the presence expiry sweep (default: 5s).
    pub sweep_interval: Duration,

    /// An identity not seen for longer than this leaves its location
    /// (default: 60s).
    pub presence_timeout: Duration,

    /// Minimum gap between two arrival notifications for one location.
    /// Zero notifies on every arrival (default: 300s).
    pub arrival_cooldown: Duration,

    /// Duplicate-check and identification cutoffs.
    pub thresholds: Thresholds,

    /// Retry policy for roster fetches.
    pub retry: RetryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            presence_timeout: floorwatch_presence::DEFAULT_PRESENCE_TIMEOUT,
            arrival_cooldown: DEFAULT_ARRIVAL_COOLDOWN,
            thresholds: Thresholds::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl MonitorConfig {
    /// Replaces zero values that would stall or disable the monitor with
    /// their defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.dim == 0 {
            self.dim = DEFAULT_DIM;
        }
        if self.refresh_interval.is_zero() {
            self.refresh_interval = DEFAULT_REFRESH_INTERVAL;
        }
        if self.stale_threshold.is_zero() {
            self.stale_threshold = DEFAULT_STALE_THRESHOLD;
        }
        if self.sweep_interval.is_zero() {
            self.sweep_interval = DEFAULT_SWEEP_INTERVAL;
        }
        if self.presence_timeout.is_zero() {
            self.presence_timeout = floorwatch_presence::DEFAULT_PRESENCE_TIMEOUT;
        }
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_refresh_interval(mut self, d: Duration) -> Self {
        self.refresh_interval = d;
        self
    }

    pub fn with_stale_threshold(mut self, d: Duration) -> Self {
        self.stale_threshold = d;
        self
    }

    pub fn with_sweep_interval(mut self, d: Duration) -> Self {
        self.sweep_interval = d;
        self
    }

    pub fn with_presence_timeout(mut self, d: Duration) -> Self {
        self.presence_timeout = d;
        self
    }

    pub fn with_arrival_cooldown(mut self, d: Duration) -> Self {
        self.arrival_cooldown = d;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
