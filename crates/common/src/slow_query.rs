//! Slow query recorder
//!
//! Bounded log of operations whose duration crossed the configured
//! threshold. Entries carry a severity band derived purely from duration;
//! the band is display classification only, storage is identical.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::SlowQueryConfig;

/// Severity band for a slow entry, derived from duration alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlowQuerySeverity {
    Slow,
    VerySlow,
    Critical,
}

/// One recorded slow operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowQueryEntry {
    pub operation: String,
    pub model: String,
    pub duration_ms: f64,
    pub severity: SlowQuerySeverity,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Bounded slow query log
///
/// `record` and `clear` are safe to call concurrently.
#[derive(Debug)]
pub struct SlowQueryLog {
    config: SlowQueryConfig,
    entries: Mutex<VecDeque<SlowQueryEntry>>,
}

impl SlowQueryLog {
    /// Create a new log
    pub fn new(config: SlowQueryConfig) -> Self {
        let capacity = config.capacity;
        Self { config, entries: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    /// Record an operation if its duration exceeds the slow threshold.
    ///
    /// Durations at or below the threshold are never stored. Returns the
    /// severity band when an entry was recorded.
    pub fn record(
        &self,
        duration_ms: f64,
        operation: &str,
        model: &str,
        timestamp: DateTime<Utc>,
        query: Option<String>,
    ) -> Option<SlowQuerySeverity> {
        if duration_ms <= self.config.slow_ms as f64 {
            return None;
        }

        let severity = self.severity_for(duration_ms);
        let entry = SlowQueryEntry {
            operation: operation.to_string(),
            model: model.to_string(),
            duration_ms,
            severity,
            timestamp,
            query,
        };

        let mut entries = self.entries.lock();
        entries.push_front(entry);
        while entries.len() > self.config.capacity {
            entries.pop_back();
        }

        Some(severity)
    }

    /// List recorded entries, newest first.
    pub fn entries(&self) -> Vec<SlowQueryEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Clear all entries. Operator action; idempotent.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn severity_for(&self, duration_ms: f64) -> SlowQuerySeverity {
        if duration_ms > self.config.critical_ms as f64 {
            SlowQuerySeverity::Critical
        } else if duration_ms > self.config.very_slow_ms as f64 {
            SlowQuerySeverity::VerySlow
        } else {
            SlowQuerySeverity::Slow
        }
    }
}

impl Default for SlowQueryLog {
    fn default() -> Self {
        Self::new(SlowQueryConfig::default())
    }
}
