//! Shared transaction execution and health observability core
//!
//! This crate provides the database-facing building blocks used across the
//! application:
//!
//! - **Pooling**: r2d2-backed SQLite connection pool with per-connection
//!   pragmas ([`pool`])
//! - **Transactions**: retrying transaction manager with isolation mapping
//!   and per-attempt timeouts ([`txn`]), plus batch execution ([`batch`])
//! - **Classification**: typed error taxonomy with retryability and
//!   severity ([`error`])
//! - **Observability**: transaction metrics ([`metrics`]), slow query
//!   recording ([`slow_query`]), pool monitoring ([`monitor`]), and
//!   aggregated health reporting ([`health`])

pub mod batch;
pub mod config;
pub mod error;
pub mod health;
pub mod ids;
pub mod metrics;
pub mod monitor;
pub mod pool;
pub mod retry;
pub mod slow_query;
pub mod txn;

pub use batch::{BatchExecutor, BatchStep};
pub use config::{MetricsConfig, PoolConfig, SlowQueryConfig, TransactionConfig};
pub use error::{ConstraintKind, ErrorClass, ErrorSeverity, TxError, TxResult};
pub use health::{HealthReporter, HealthSnapshot};
pub use ids::TxIdGenerator;
pub use metrics::{
    MetricsSnapshot, OperationStats, TransactionMetrics, TransactionRecord, TxStatus,
};
pub use monitor::{PoolMonitor, PoolSnapshot};
pub use pool::{PooledConnection, SqlitePool};
pub use retry::{RetryDecision, RetryPolicy};
pub use slow_query::{SlowQueryEntry, SlowQueryLog, SlowQuerySeverity};
pub use txn::{IsolationLevel, TransactionManager, TxFailure, TxSuccess, TxTiming};
