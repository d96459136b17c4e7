//! Connection pool monitoring
//!
//! Read-only snapshots of pool occupancy for health reporting. Snapshots
//! never fail; when the pool is saturated the numbers simply reflect it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pool::SqlitePool;

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    /// Total connections currently open
    pub size: u32,
    /// Connections checked out by callers
    pub active: u32,
    /// Connections idle in the pool
    pub idle: u32,
    /// Callers currently blocked acquiring a connection
    pub waiting_clients: u64,
    /// Whether the pool is currently serving connections
    pub available: bool,
}

/// Pool monitor
///
/// Thin read-side wrapper over the pool's driver state. `snapshot()` is a
/// pure read and cannot fail.
#[derive(Debug, Clone)]
pub struct PoolMonitor {
    pool: Arc<SqlitePool>,
}

impl PoolMonitor {
    /// Create a monitor over the given pool
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Take a point-in-time occupancy snapshot
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.pool.state();

        PoolSnapshot {
            size: state.connections,
            active: state.connections.saturating_sub(state.idle_connections),
            idle: state.idle_connections,
            waiting_clients: self.pool.waiting(),
            available: state.connections > 0,
        }
    }
}
