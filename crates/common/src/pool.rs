//! SQLite connection pool
//!
//! Provides r2d2-based connection pooling with per-connection pragmas
//! (WAL, foreign keys, busy timeout) and acquisition metrics. The pool is
//! supplied by the driver stack; this module configures and monitors it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::config::PoolConfig;
use crate::error::{TxError, TxResult};

/// Pooled connection handle.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Connection acquisition metrics
///
/// Tracks pool acquisition outcomes using atomic counters for thread-safe
/// operation without locks.
#[derive(Debug)]
pub struct AcquireMetrics {
    /// Number of connections successfully acquired from the pool
    pub acquired: AtomicU64,

    /// Number of acquisition timeouts
    pub timeouts: AtomicU64,

    /// Number of acquisition errors
    pub errors: AtomicU64,

    /// Total time spent acquiring connections (in milliseconds)
    total_wait_ms: AtomicU64,
}

impl AcquireMetrics {
    fn new() -> Self {
        Self {
            acquired: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Get average acquisition time in milliseconds
    pub fn avg_wait_ms(&self) -> u64 {
        let total = self.total_wait_ms.load(Ordering::Relaxed);
        let count = self.acquired.load(Ordering::Relaxed);

        if count == 0 {
            0
        } else {
            total / count
        }
    }
}

/// SQLite connection pool
///
/// Manages a pool of SQLite connections using r2d2. Each connection gets
/// WAL mode, NORMAL synchronous, foreign keys, and a busy timeout applied
/// on initialization.
#[derive(Debug)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: PoolConfig,
    metrics: Arc<AcquireMetrics>,
    /// Callers currently inside `acquire`, for pool occupancy reporting.
    waiting: AtomicU64,
}

impl SqlitePool {
    /// Create a new connection pool
    ///
    /// Builds the r2d2 pool with the configured size and timeouts, then
    /// verifies one connection can be acquired.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the database file
    /// can't be accessed, or pool creation fails.
    #[instrument(skip_all, fields(db_path = ?config.path, pool_size = config.max_size))]
    pub fn new(config: PoolConfig) -> TxResult<Self> {
        config.validate()?;

        info!("Creating SQLite connection pool");

        let metrics = Arc::new(AcquireMetrics::new());

        let pool_config = config.clone();
        let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {}", e);
                TxError::ConnectionFailure(format!("failed to create pool: {e}"))
            })?;

        // Verify a connection can be acquired before handing the pool out.
        {
            let _conn = pool.get().map_err(|e| {
                warn!("Failed to get test connection: {}", e);
                TxError::ConnectionFailure(format!("failed to get test connection: {e}"))
            })?;
        }

        info!("SQLite pool created successfully with {} connections", config.max_size);

        Ok(Self { pool, config, metrics, waiting: AtomicU64::new(0) })
    }

    /// Get a connection from the pool
    pub fn acquire(&self) -> TxResult<PooledConnection> {
        let start = Instant::now();

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let result = self.pool.get();
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(conn) => {
                let wait_ms = start.elapsed().as_millis() as u64;
                self.metrics.acquired.fetch_add(1, Ordering::Relaxed);
                self.metrics.total_wait_ms.fetch_add(wait_ms, Ordering::Relaxed);

                debug!("Connection acquired in {}ms", wait_ms);
                Ok(conn)
            }
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("timed out") || err_str.contains("timeout") {
                    self.metrics.timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!("Connection acquire timeout after {:?}", self.config.connection_timeout);
                } else {
                    self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Connection error: {}", e);
                }
                Err(e.into())
            }
        }
    }

    /// Current r2d2 pool state (total and idle connection counts)
    pub fn state(&self) -> r2d2::State {
        self.pool.state()
    }

    /// Configured maximum pool size
    pub fn max_size(&self) -> u32 {
        self.config.max_size
    }

    /// Callers currently waiting inside `acquire`
    pub fn waiting(&self) -> u64 {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Acquisition metrics
    pub fn metrics(&self) -> &Arc<AcquireMetrics> {
        &self.metrics
    }
}

/// Apply connection-level pragmas
///
/// Applied to each connection in the pool:
/// - WAL mode for better concurrency
/// - NORMAL synchronous mode for balanced safety/performance
/// - Foreign key constraints enabled
/// - Busy timeout for handling lock contention
fn apply_connection_pragmas(conn: &Connection, config: &PoolConfig) -> TxResult<()> {
    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }

    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");

    if config.enable_foreign_keys {
        pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");
    }

    conn.execute_batch(&pragma_sql)
        .map_err(|e| TxError::internal(format!("failed to apply pragmas: {e}")))?;

    conn.busy_timeout(config.busy_timeout)
        .map_err(|e| TxError::internal(format!("failed to set busy timeout: {e}")))?;

    Ok(())
}
