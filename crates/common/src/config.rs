//! Configuration types for the transaction core
//!
//! Provides configuration for the connection pool, transaction execution,
//! and the bounded observability buffers. All types carry validated defaults
//! and chaining setters.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::TxError;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Database file path
    pub path: PathBuf,

    /// Connection pool size (default: 10)
    pub max_size: u32,

    /// Pool acquisition timeout (default: 5s)
    pub connection_timeout: Duration,

    /// SQLite busy timeout (default: 5s)
    pub busy_timeout: Duration,

    /// Enable WAL mode (default: true)
    pub enable_wal: bool,

    /// Enable foreign key constraints (default: true)
    pub enable_foreign_keys: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/app.db"),
            max_size: 10,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with the given path
    pub fn new(path: PathBuf) -> Self {
        Self { path, ..Default::default() }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TxError> {
        if self.max_size == 0 {
            return Err(TxError::internal("pool max_size must be greater than 0"));
        }
        if self.max_size > 100 {
            return Err(TxError::internal("pool max_size too large (max: 100)"));
        }
        if self.connection_timeout.is_zero() {
            return Err(TxError::internal("connection_timeout must be greater than 0"));
        }
        if self.path.as_os_str().is_empty() {
            return Err(TxError::internal("database path cannot be empty"));
        }
        Ok(())
    }

    /// Set the connection pool size
    pub fn with_max_size(mut self, size: u32) -> Self {
        self.max_size = size;
        self
    }

    /// Set the pool acquisition timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the SQLite busy timeout
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Disable WAL mode (not recommended for production)
    pub fn without_wal(mut self) -> Self {
        self.enable_wal = false;
        self
    }

    /// Disable foreign key constraints (not recommended for production)
    pub fn without_foreign_keys(mut self) -> Self {
        self.enable_foreign_keys = false;
        self
    }
}

/// Transaction execution configuration
///
/// Covers the retry policy bounds and the per-attempt hard timeout. The
/// defaults match the observed production values: 3 total attempts, 100ms
/// base backoff capped at 10s, 30s hard timeout.
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Maximum total attempts, including the first (default: 3)
    pub max_attempts: u32,

    /// Base delay for exponential backoff (default: 100ms)
    pub base_delay: Duration,

    /// Backoff delay cap (default: 10s)
    pub max_delay: Duration,

    /// Jitter factor, 0.0 = none, 1.0 = full (default: 0.5)
    pub jitter_factor: f64,

    /// Hard timeout for a single attempt of the unit of work (default: 30s)
    pub timeout: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransactionConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TxError> {
        if self.max_attempts == 0 {
            return Err(TxError::internal("max_attempts must be greater than 0"));
        }
        if self.base_delay > self.max_delay {
            return Err(TxError::internal("base_delay cannot be greater than max_delay"));
        }
        if self.timeout.is_zero() {
            return Err(TxError::internal("timeout must be greater than 0"));
        }
        Ok(())
    }

    /// Set the maximum number of total attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the base backoff delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the backoff delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter factor (clamped to 0.0..=1.0)
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Set the per-attempt hard timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Slow query recorder configuration
///
/// The severity bands are display classification only; storage is the same
/// bounded ring regardless of band.
#[derive(Debug, Clone)]
pub struct SlowQueryConfig {
    /// Durations strictly above this are recorded (default: 500ms)
    pub slow_ms: u64,

    /// Very-slow band threshold (default: 1000ms)
    pub very_slow_ms: u64,

    /// Critical band threshold (default: 3000ms)
    pub critical_ms: u64,

    /// Maximum retained entries, oldest evicted (default: 100)
    pub capacity: usize,
}

impl Default for SlowQueryConfig {
    fn default() -> Self {
        Self { slow_ms: 500, very_slow_ms: 1000, critical_ms: 3000, capacity: 100 }
    }
}

impl SlowQueryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TxError> {
        if self.capacity == 0 {
            return Err(TxError::internal("slow query capacity must be greater than 0"));
        }
        if !(self.slow_ms <= self.very_slow_ms && self.very_slow_ms <= self.critical_ms) {
            return Err(TxError::internal("slow query thresholds must be non-decreasing"));
        }
        Ok(())
    }

    /// Set the slow threshold in milliseconds
    pub fn with_slow_ms(mut self, threshold: u64) -> Self {
        self.slow_ms = threshold;
        self
    }

    /// Set the retained entry capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Metrics aggregator configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Capacity of the recent-transactions ring buffer (default: 100)
    pub recent_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { recent_capacity: 100 }
    }
}

impl MetricsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TxError> {
        if self.recent_capacity == 0 {
            return Err(TxError::internal("recent_capacity must be greater than 0"));
        }
        Ok(())
    }

    /// Set the recent-transactions ring capacity
    pub fn with_recent_capacity(mut self, capacity: usize) -> Self {
        self.recent_capacity = capacity;
        self
    }
}
