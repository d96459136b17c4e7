//! Transaction metrics aggregation
//!
//! Thread-safe counters and per-operation running averages, plus a bounded
//! ring of recent transaction records. Aggregate counters use atomics;
//! the per-operation map and the ring use short critical sections so
//! `snapshot()` never starves writers.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::MetricsConfig;

/// Terminal status of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Error,
}

/// Record of one completed unit of work.
///
/// Exactly one record exists per terminal outcome, regardless of how many
/// retries preceded it. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub operation: String,
    pub model: String,
    pub duration_ms: f64,
    pub status: TxStatus,
    pub timestamp: DateTime<Utc>,
}

/// Running statistics for one operation name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub operation: String,
    pub count: u64,
    pub avg_duration_ms: f64,
}

/// Point-in-time copy of the aggregated metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub avg_duration_ms: f64,
    pub by_operation: HashMap<String, OperationStats>,
    /// Newest first.
    pub recent_transactions: Vec<TransactionRecord>,
}

/// Transaction metrics aggregator
///
/// A single instance is shared by reference across all request paths.
#[derive(Debug)]
pub struct TransactionMetrics {
    succeeded: AtomicU64,
    failed: AtomicU64,
    /// Total duration in microseconds, for the aggregate average.
    total_duration_us: AtomicU64,
    by_operation: RwLock<HashMap<String, OperationStats>>,
    recent: Mutex<VecDeque<TransactionRecord>>,
    recent_capacity: usize,
}

impl TransactionMetrics {
    /// Create a new aggregator
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
            by_operation: RwLock::new(HashMap::new()),
            recent: Mutex::new(VecDeque::with_capacity(config.recent_capacity)),
            recent_capacity: config.recent_capacity,
        }
    }

    /// Record one terminal unit of work.
    ///
    /// Safe for concurrent invocation from many simultaneous requests.
    pub fn record(&self, record: TransactionRecord) {
        self.total_duration_us
            .fetch_add((record.duration_ms * 1000.0) as u64, Ordering::Relaxed);
        match record.status {
            TxStatus::Success => self.succeeded.fetch_add(1, Ordering::Relaxed),
            TxStatus::Error => self.failed.fetch_add(1, Ordering::Relaxed),
        };

        {
            let mut by_operation = self.by_operation.write();
            let stats = by_operation.entry(record.operation.clone()).or_insert_with(|| {
                OperationStats {
                    operation: record.operation.clone(),
                    count: 0,
                    avg_duration_ms: 0.0,
                }
            });
            let count = stats.count as f64;
            stats.avg_duration_ms =
                (stats.avg_duration_ms * count + record.duration_ms) / (count + 1.0);
            stats.count += 1;
        }

        let mut recent = self.recent.lock();
        recent.push_front(record);
        while recent.len() > self.recent_capacity {
            recent.pop_back();
        }
    }

    /// Take a point-in-time copy of all aggregates.
    ///
    /// The total is derived from one pair of status-counter loads rather
    /// than stored separately, so `total == succeeded + failed` holds for
    /// every snapshot even while writers are mid-record.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let failed = self.failed.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let total = succeeded + failed;
        let total_duration_us = self.total_duration_us.load(Ordering::Relaxed);
        let avg_duration_ms = if total == 0 {
            0.0
        } else {
            total_duration_us as f64 / 1000.0 / total as f64
        };

        MetricsSnapshot {
            total,
            succeeded,
            failed,
            avg_duration_ms,
            by_operation: self.by_operation.read().clone(),
            recent_transactions: self.recent.lock().iter().cloned().collect(),
        }
    }

    /// Reset all counters and buffers. Operator action.
    pub fn reset(&self) {
        self.succeeded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.total_duration_us.store(0, Ordering::Relaxed);
        self.by_operation.write().clear();
        self.recent.lock().clear();
    }
}

impl Default for TransactionMetrics {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for metrics.
    use std::sync::Arc;

    use super::*;

    fn record(operation: &str, duration_ms: f64, status: TxStatus) -> TransactionRecord {
        TransactionRecord {
            id: format!("tx_test_{operation}"),
            operation: operation.to_string(),
            model: "campaign".to_string(),
            duration_ms,
            status,
            timestamp: Utc::now(),
        }
    }

    /// Validates `TransactionMetrics::record` behavior for the counter
    /// invariant scenario.
    ///
    /// Assertions:
    /// - Confirms `snapshot.total` equals `succeeded + failed`.
    #[test]
    fn test_total_equals_succeeded_plus_failed() {
        let metrics = TransactionMetrics::default();
        metrics.record(record("create", 10.0, TxStatus::Success));
        metrics.record(record("create", 20.0, TxStatus::Error));
        metrics.record(record("update", 5.0, TxStatus::Success));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.total, snapshot.succeeded + snapshot.failed);
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.failed, 1);
    }

    /// Validates `TransactionMetrics::record` behavior for the running
    /// average scenario.
    ///
    /// Assertions:
    /// - Confirms the per-operation average tracks incrementally.
    #[test]
    fn test_running_average_per_operation() {
        let metrics = TransactionMetrics::default();
        metrics.record(record("create", 100.0, TxStatus::Success));
        metrics.record(record("create", 200.0, TxStatus::Success));
        metrics.record(record("create", 300.0, TxStatus::Error));

        let snapshot = metrics.snapshot();
        let stats = snapshot.by_operation.get("create").unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.avg_duration_ms - 200.0).abs() < f64::EPSILON);
    }

    /// Validates `TransactionMetrics::record` behavior for the ring buffer
    /// eviction scenario.
    ///
    /// Assertions:
    /// - Confirms capacity is enforced with oldest-first eviction.
    /// - Confirms the retained order is newest first.
    #[test]
    fn test_recent_ring_evicts_oldest() {
        let metrics = TransactionMetrics::new(MetricsConfig::default().with_recent_capacity(3));
        for i in 0..5 {
            let mut r = record("create", i as f64, TxStatus::Success);
            r.id = format!("tx_{i}");
            metrics.record(r);
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.recent_transactions.len(), 3);
        let ids: Vec<_> =
            snapshot.recent_transactions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["tx_4", "tx_3", "tx_2"]);
    }

    /// Validates `TransactionMetrics::record` behavior under concurrent
    /// writers.
    ///
    /// Assertions:
    /// - Confirms no updates are lost across 8 threads x 50 records.
    #[test]
    fn test_concurrent_recording_loses_nothing() {
        let metrics = Arc::new(TransactionMetrics::new(
            MetricsConfig::default().with_recent_capacity(1000),
        ));

        let mut handles = vec![];
        for t in 0..8 {
            let metrics = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    let status =
                        if i % 2 == 0 { TxStatus::Success } else { TxStatus::Error };
                    metrics.record(record(&format!("op_{t}"), 1.0, status));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 400);
        assert_eq!(snapshot.total, snapshot.succeeded + snapshot.failed);
        assert_eq!(snapshot.by_operation.len(), 8);
        for stats in snapshot.by_operation.values() {
            assert_eq!(stats.count, 50);
        }
    }

    /// Validates `TransactionMetrics::snapshot` behavior for the concurrent
    /// reader scenario.
    ///
    /// Assertions:
    /// - Confirms `total == succeeded + failed` for every snapshot taken
    ///   while writers are mid-record, not just at rest.
    #[test]
    fn test_snapshot_invariant_holds_during_writes() {
        let metrics = Arc::new(TransactionMetrics::new(
            MetricsConfig::default().with_recent_capacity(10),
        ));

        let mut writers = vec![];
        for t in 0..4 {
            let metrics = Arc::clone(&metrics);
            writers.push(std::thread::spawn(move || {
                for i in 0..10_000 {
                    let status =
                        if i % 2 == 0 { TxStatus::Success } else { TxStatus::Error };
                    metrics.record(record(&format!("op_{t}"), 1.0, status));
                }
            }));
        }

        for _ in 0..50_000 {
            let snapshot = metrics.snapshot();
            assert_eq!(
                snapshot.total,
                snapshot.succeeded + snapshot.failed,
                "snapshot observed an inconsistent total"
            );
        }

        for writer in writers {
            writer.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 40_000);
        assert_eq!(snapshot.succeeded, 20_000);
        assert_eq!(snapshot.failed, 20_000);
    }

    /// Validates `TransactionMetrics::reset` behavior for the operator clear
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms all counters and buffers return to zero.
    #[test]
    fn test_reset() {
        let metrics = TransactionMetrics::default();
        metrics.record(record("create", 10.0, TxStatus::Success));
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 0);
        assert!(snapshot.by_operation.is_empty());
        assert!(snapshot.recent_transactions.is_empty());
    }
}
