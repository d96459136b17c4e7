//! Health reporting
//!
//! Aggregates a liveness probe, pool occupancy, operation metrics, and
//! slow query entries into one snapshot. Reporting never fails: probe
//! errors are carried inside the snapshot so partial data still reaches
//! the operator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TxError, TxResult};
use crate::metrics::{MetricsSnapshot, TransactionMetrics};
use crate::monitor::{PoolMonitor, PoolSnapshot};
use crate::pool::SqlitePool;
use crate::slow_query::{SlowQueryEntry, SlowQueryLog};

/// Default cap on the connectivity probe.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Aggregated health snapshot.
///
/// The extended sections are present only when requested. `connected`
/// false with a populated `errors` list still carries whatever extended
/// data could be gathered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub connected: bool,
    pub response_time_ms: f64,
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations: Option<MetricsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_queries: Option<Vec<SlowQueryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolSnapshot>,
}

/// Health reporter
///
/// Read-only composition over the shared observability state.
#[derive(Debug)]
pub struct HealthReporter {
    pool: Arc<SqlitePool>,
    monitor: PoolMonitor,
    metrics: Arc<TransactionMetrics>,
    slow_queries: Arc<SlowQueryLog>,
    probe_timeout: Duration,
}

impl HealthReporter {
    /// Create a reporter over the shared state
    pub fn new(
        pool: Arc<SqlitePool>,
        metrics: Arc<TransactionMetrics>,
        slow_queries: Arc<SlowQueryLog>,
    ) -> Self {
        let monitor = PoolMonitor::new(Arc::clone(&pool));
        Self { pool, monitor, metrics, slow_queries, probe_timeout: DEFAULT_PROBE_TIMEOUT }
    }

    /// Set the connectivity probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Build a health snapshot.
    ///
    /// Runs a `SELECT 1` liveness probe with a bounded timeout; when
    /// `extended` is set, attaches metrics, slow queries, and pool
    /// occupancy. Never returns an error: failures are reported in the
    /// `errors` field.
    pub async fn report(&self, extended: bool) -> HealthSnapshot {
        let mut errors = Vec::new();
        let started = Instant::now();

        let connected = match self.probe().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Database connectivity probe failed: {}", e);
                errors.push(e.to_string());
                false
            }
        };
        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        debug!(connected, response_time_ms, extended, "Health snapshot taken");

        let mut snapshot = HealthSnapshot {
            connected,
            response_time_ms,
            timestamp: Utc::now(),
            errors,
            operations: None,
            slow_queries: None,
            pool: None,
        };

        if extended {
            snapshot.operations = Some(self.metrics.snapshot());
            snapshot.slow_queries = Some(self.slow_queries.entries());
            snapshot.pool = Some(self.monitor.snapshot());
        }

        snapshot
    }

    /// Run the `SELECT 1` liveness probe.
    async fn probe(&self) -> TxResult<()> {
        let pool = Arc::clone(&self.pool);
        let task = tokio::task::spawn_blocking(move || -> TxResult<i64> {
            let conn = pool.acquire()?;
            conn.query_row("SELECT 1", [], |row| row.get(0)).map_err(TxError::from)
        });

        match tokio::time::timeout(self.probe_timeout, task).await {
            Err(_) => Err(TxError::Timeout {
                operation: "health_probe".to_string(),
                elapsed: self.probe_timeout,
            }),
            Ok(Err(join_err)) => {
                Err(TxError::internal(format!("health probe worker failed: {join_err}")))
            }
            Ok(Ok(Ok(1))) => Ok(()),
            Ok(Ok(Ok(other))) => {
                Err(TxError::internal(format!("unexpected probe result: {other}")))
            }
            Ok(Ok(Err(e))) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for health.
    use tempfile::TempDir;

    use super::*;
    use crate::config::{MetricsConfig, PoolConfig, SlowQueryConfig};
    use crate::metrics::{TransactionRecord, TxStatus};

    fn reporter(dir: &TempDir) -> (Arc<TransactionMetrics>, Arc<SlowQueryLog>, HealthReporter) {
        let pool =
            Arc::new(SqlitePool::new(PoolConfig::new(dir.path().join("test.db"))).unwrap());
        let metrics = Arc::new(TransactionMetrics::new(MetricsConfig::default()));
        let slow_queries = Arc::new(SlowQueryLog::new(SlowQueryConfig::default()));
        let reporter =
            HealthReporter::new(pool, Arc::clone(&metrics), Arc::clone(&slow_queries));
        (metrics, slow_queries, reporter)
    }

    /// Validates `HealthReporter::report` behavior for the basic probe
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `snapshot.connected` evaluates to true.
    /// - Confirms extended sections are absent in the basic report.
    #[tokio::test]
    async fn test_basic_report() {
        let temp_dir = TempDir::new().unwrap();
        let (_metrics, _slow, reporter) = reporter(&temp_dir);

        let snapshot = reporter.report(false).await;
        assert!(snapshot.connected);
        assert!(snapshot.errors.is_empty());
        assert!(snapshot.response_time_ms >= 0.0);
        assert!(snapshot.operations.is_none());
        assert!(snapshot.slow_queries.is_none());
        assert!(snapshot.pool.is_none());
    }

    /// Validates `HealthReporter::report` behavior for the extended report
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms metrics, slow queries, and pool sections are attached.
    /// - Confirms recorded data flows through to the snapshot.
    #[tokio::test]
    async fn test_extended_report() {
        let temp_dir = TempDir::new().unwrap();
        let (metrics, slow_queries, reporter) = reporter(&temp_dir);

        metrics.record(TransactionRecord {
            id: "tx_1_1".to_string(),
            operation: "create".to_string(),
            model: "campaign".to_string(),
            duration_ms: 12.0,
            status: TxStatus::Success,
            timestamp: Utc::now(),
        });
        slow_queries.record(600.0, "query", "campaign", Utc::now(), None);

        let snapshot = reporter.report(true).await;
        assert!(snapshot.connected);

        let operations = snapshot.operations.unwrap();
        assert_eq!(operations.total, 1);

        let slow = snapshot.slow_queries.unwrap();
        assert_eq!(slow.len(), 1);

        let pool = snapshot.pool.unwrap();
        assert!(pool.available);
    }

    /// Validates `HealthSnapshot` serialization for the wire shape scenario.
    ///
    /// Assertions:
    /// - Confirms camelCase keys on the serialized snapshot.
    /// - Confirms absent extended sections are omitted entirely.
    #[tokio::test]
    async fn test_snapshot_wire_shape() {
        let temp_dir = TempDir::new().unwrap();
        let (_metrics, _slow, reporter) = reporter(&temp_dir);

        let snapshot = reporter.report(false).await;
        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json.get("responseTimeMs").is_some());
        assert!(json.get("connected").is_some());
        assert!(json.get("operations").is_none());
        assert!(json.get("slowQueries").is_none());
        assert!(json.get("pool").is_none());
    }
}
