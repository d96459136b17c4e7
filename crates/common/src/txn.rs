//! Transaction execution
//!
//! Runs units of work inside database transactions with configurable
//! isolation, bounded retry of transient failures, a per-attempt hard
//! timeout, and terminal-outcome metrics recording. A unit of work either
//! commits in full or rolls back in full; partial effects never persist.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::TransactionConfig;
use crate::error::{TxError, TxResult};
use crate::ids::TxIdGenerator;
use crate::metrics::{TransactionMetrics, TransactionRecord, TxStatus};
use crate::pool::SqlitePool;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::slow_query::SlowQueryLog;

/// Requested transaction isolation level.
///
/// SQLite provides serializable semantics for all write transactions; the
/// weaker levels map onto deferred lock acquisition, with dirty reads
/// enabled only for `ReadUncommitted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    #[serde(rename = "READ UNCOMMITTED")]
    ReadUncommitted,
    #[default]
    #[serde(rename = "READ COMMITTED")]
    ReadCommitted,
    #[serde(rename = "REPEATABLE READ")]
    RepeatableRead,
    #[serde(rename = "SERIALIZABLE")]
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling of the level
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }

    fn behavior(&self) -> TransactionBehavior {
        match self {
            Self::ReadUncommitted | Self::ReadCommitted => TransactionBehavior::Deferred,
            Self::RepeatableRead => TransactionBehavior::Immediate,
            Self::Serializable => TransactionBehavior::Exclusive,
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Timing envelope of a completed unit of work.
///
/// Duration spans from before the first attempt to after the terminal
/// commit or rollback, retries included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxTiming {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
}

/// Successful transaction outcome.
#[derive(Debug, Clone)]
pub struct TxSuccess<T> {
    pub data: T,
    /// Total attempts made, including the successful one.
    pub attempts: u32,
    pub timing: TxTiming,
}

/// Terminal transaction failure.
#[derive(Debug, Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct TxFailure {
    pub error: TxError,
    /// Total attempts made before giving up.
    pub attempts: u32,
}

/// Transaction manager
///
/// Owns the retry loop, timeout enforcement, and terminal-outcome
/// recording. Shared by reference across all request paths.
pub struct TransactionManager {
    pool: Arc<SqlitePool>,
    metrics: Arc<TransactionMetrics>,
    slow_queries: Arc<SlowQueryLog>,
    retry: RetryPolicy,
    config: TransactionConfig,
    ids: TxIdGenerator,
}

impl TransactionManager {
    /// Create a new manager
    ///
    /// # Errors
    /// Returns an error if the transaction configuration is invalid.
    pub fn new(
        pool: Arc<SqlitePool>,
        metrics: Arc<TransactionMetrics>,
        slow_queries: Arc<SlowQueryLog>,
        config: TransactionConfig,
    ) -> TxResult<Self> {
        config.validate()?;

        Ok(Self {
            pool,
            metrics,
            slow_queries,
            retry: RetryPolicy::from(&config),
            config,
            ids: TxIdGenerator::new(),
        })
    }

    /// Retry policy in effect
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Execute a unit of work inside a transaction.
    ///
    /// The closure runs on a blocking thread with an open transaction; a
    /// returned `Ok` commits, a returned `Err` rolls back. Transient
    /// contention failures are retried with exponential backoff up to the
    /// configured attempt limit; fatal failures and timeouts surface
    /// immediately. Exactly one metrics record is emitted per call,
    /// regardless of retries.
    pub async fn execute<T, F>(
        &self,
        operation: &str,
        model: &str,
        isolation: Option<IsolationLevel>,
        unit: F,
    ) -> Result<TxSuccess<T>, TxFailure>
    where
        T: Send + 'static,
        F: Fn(&Transaction<'_>) -> TxResult<T> + Send + Sync + 'static,
    {
        let isolation = isolation.unwrap_or_default();
        let tx_id = self.ids.next_id();
        let start_time = Utc::now();
        let started = Instant::now();
        let unit = Arc::new(unit);

        info!(
            transaction_id = %tx_id,
            operation,
            model,
            isolation = %isolation,
            "Transaction started"
        );

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let pool = Arc::clone(&self.pool);
            let unit_for_attempt = Arc::clone(&unit);
            let cancelled = Arc::new(AtomicBool::new(false));
            let cancelled_for_attempt = Arc::clone(&cancelled);
            let task = tokio::task::spawn_blocking(move || {
                run_attempt(&pool, isolation, unit_for_attempt.as_ref(), &cancelled_for_attempt)
            });

            let outcome: TxResult<T> = match tokio::time::timeout(self.config.timeout, task).await
            {
                Err(_) => {
                    // The worker may still be running; make sure it can no
                    // longer commit.
                    cancelled.store(true, Ordering::SeqCst);
                    Err(TxError::Timeout {
                        operation: operation.to_string(),
                        elapsed: started.elapsed(),
                    })
                }
                Ok(Err(join_err)) => {
                    Err(TxError::internal(format!("transaction worker failed: {join_err}")))
                }
                Ok(Ok(result)) => result,
            };

            match outcome {
                Ok(data) => {
                    let timing =
                        self.finish(&tx_id, operation, model, start_time, started, TxStatus::Success);
                    info!(
                        transaction_id = %tx_id,
                        duration_ms = timing.duration_ms,
                        attempts = attempt,
                        "Transaction completed"
                    );
                    return Ok(TxSuccess { data, attempts: attempt, timing });
                }
                Err(tx_error) => match self.retry.decide(attempt, tx_error.class()) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            transaction_id = %tx_id,
                            attempt,
                            max_attempts = self.retry.max_attempts(),
                            delay_ms = delay.as_millis() as u64,
                            error = %tx_error,
                            "Transaction attempt failed, backing off before retry"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Stop => {
                        let timing = self
                            .finish(&tx_id, operation, model, start_time, started, TxStatus::Error);
                        error!(
                            transaction_id = %tx_id,
                            error_type = tx_error.label(),
                            severity = %tx_error.severity(),
                            duration_ms = timing.duration_ms,
                            attempts = attempt,
                            error = %tx_error,
                            "Transaction failed"
                        );
                        return Err(TxFailure { error: tx_error, attempts: attempt });
                    }
                },
            }
        }
    }

    /// Record the terminal outcome and return the timing envelope.
    fn finish(
        &self,
        tx_id: &str,
        operation: &str,
        model: &str,
        start_time: DateTime<Utc>,
        started: Instant,
        status: TxStatus,
    ) -> TxTiming {
        let end_time = Utc::now();
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.metrics.record(TransactionRecord {
            id: tx_id.to_string(),
            operation: operation.to_string(),
            model: model.to_string(),
            duration_ms,
            status,
            timestamp: end_time,
        });
        self.slow_queries.record(duration_ms, operation, model, end_time, None);

        TxTiming { start_time, end_time, duration_ms }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("retry", &self.retry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run one attempt of the unit of work on the current thread.
///
/// `cancelled` is checked before commit so a unit that finishes after its
/// timeout already fired rolls back instead of committing late.
fn run_attempt<T>(
    pool: &SqlitePool,
    isolation: IsolationLevel,
    unit: &(dyn Fn(&Transaction<'_>) -> TxResult<T> + Send + Sync),
    cancelled: &AtomicBool,
) -> TxResult<T> {
    let mut conn = pool.acquire()?;

    let dirty_reads = isolation == IsolationLevel::ReadUncommitted;
    if dirty_reads {
        conn.pragma_update(None, "read_uncommitted", true).map_err(TxError::from)?;
    }

    let result = (|| {
        let tx = conn.transaction_with_behavior(isolation.behavior())?;
        let value = unit(&tx)?;
        if cancelled.load(Ordering::SeqCst) {
            return Err(TxError::internal("unit of work cancelled after timeout"));
        }
        tx.commit()?;
        Ok(value)
    })();

    // Connections return to the pool; leave them in the default mode.
    if dirty_reads {
        let _ = conn.pragma_update(None, "read_uncommitted", false);
    }

    result
}
