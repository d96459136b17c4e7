//! Health and observability commands

use std::sync::Arc;
use std::time::Instant;

use dbpulse_common::HealthSnapshot;
use serde::Serialize;
use tracing::info;

use crate::context::AppContext;
use crate::utils::logging::log_command_execution;

/// Get database health status
///
/// Always runs the connectivity probe; with `extended` set, attaches
/// operation metrics, slow query history, and pool occupancy. Never fails:
/// probe errors are reported inside the snapshot.
pub async fn get_db_health(ctx: &Arc<AppContext>, extended: bool) -> HealthSnapshot {
    let command_name = "health::get_db_health";
    let start = Instant::now();

    let snapshot = ctx.health.report(extended).await;

    log_command_execution(command_name, start.elapsed(), snapshot.connected);
    snapshot
}

/// Clear-slow-queries response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSlowQueriesResponse {
    pub cleared: bool,
}

/// Clear the slow query log
///
/// Operator action; idempotent. Succeeds regardless of whether any entries
/// existed.
pub async fn clear_slow_queries(ctx: &Arc<AppContext>) -> ClearSlowQueriesResponse {
    let command_name = "health::clear_slow_queries";
    let start = Instant::now();
    let previous = ctx.slow_queries.len();

    ctx.slow_queries.clear();

    info!(command = command_name, previous_entries = previous, "Slow query log cleared");
    log_command_execution(command_name, start.elapsed(), true);

    ClearSlowQueriesResponse { cleared: true }
}

/// Reset the transaction metrics
///
/// Operator action; clears all counters, per-operation stats, and the
/// recent-transactions buffer.
pub async fn reset_db_metrics(ctx: &Arc<AppContext>) {
    let command_name = "health::reset_db_metrics";
    let start = Instant::now();

    ctx.metrics.reset();

    info!(command = command_name, "Transaction metrics reset");
    log_command_execution(command_name, start.elapsed(), true);
}
