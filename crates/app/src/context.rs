//! Application context - dependency injection container

use std::path::Path;
use std::sync::Arc;

use dbpulse_common::{
    BatchExecutor, HealthReporter, MetricsConfig, PoolConfig, SlowQueryConfig, SlowQueryLog,
    SqlitePool, TransactionConfig, TransactionManager, TransactionMetrics, TxError, TxResult,
};
use tracing::info;

/// Bundled configuration for the application context.
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    pub pool: PoolConfig,
    pub transaction: TransactionConfig,
    pub slow_query: SlowQueryConfig,
    pub metrics: MetricsConfig,
}

impl ContextConfig {
    /// Configuration rooted at the given database path, defaults elsewhere
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self { pool: PoolConfig::new(db_path.as_ref().to_path_buf()), ..Default::default() }
    }
}

/// Application context - holds all services and shared state
pub struct AppContext {
    pub pool: Arc<SqlitePool>,
    pub metrics: Arc<TransactionMetrics>,
    pub slow_queries: Arc<SlowQueryLog>,
    pub transactions: Arc<TransactionManager>,
    pub batches: BatchExecutor,
    pub health: HealthReporter,
}

impl AppContext {
    /// Build the context: pool, schema migrations, and shared services.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the pool cannot be
    /// created, or migrations fail.
    pub async fn new(config: ContextConfig) -> TxResult<Arc<Self>> {
        config.slow_query.validate()?;
        config.metrics.validate()?;

        let pool = Arc::new(SqlitePool::new(config.pool)?);
        run_migrations(Arc::clone(&pool)).await?;

        let metrics = Arc::new(TransactionMetrics::new(config.metrics));
        let slow_queries = Arc::new(SlowQueryLog::new(config.slow_query));

        let transactions = Arc::new(TransactionManager::new(
            Arc::clone(&pool),
            Arc::clone(&metrics),
            Arc::clone(&slow_queries),
            config.transaction,
        )?);
        let batches = BatchExecutor::new(Arc::clone(&transactions));
        let health = HealthReporter::new(
            Arc::clone(&pool),
            Arc::clone(&metrics),
            Arc::clone(&slow_queries),
        );

        info!("Application context initialised");

        Ok(Arc::new(Self { pool, metrics, slow_queries, transactions, batches, health }))
    }
}

/// Apply the campaign schema.
///
/// Idempotent; safe to run on every startup.
async fn run_migrations(pool: Arc<SqlitePool>) -> TxResult<()> {
    tokio::task::spawn_blocking(move || {
        let conn = pool.acquire()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS campaigns (
                 id TEXT PRIMARY KEY,
                 name TEXT NOT NULL UNIQUE,
                 status TEXT NOT NULL DEFAULT 'draft',
                 created_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS campaign_events (
                 id TEXT PRIMARY KEY,
                 campaign_id TEXT NOT NULL REFERENCES campaigns(id),
                 label TEXT NOT NULL,
                 created_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_campaign_events_campaign
                 ON campaign_events(campaign_id);",
        )
        .map_err(TxError::from)
    })
    .await
    .map_err(|e| TxError::internal(format!("migration worker failed: {e}")))?
}
