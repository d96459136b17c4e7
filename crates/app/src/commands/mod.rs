//! Command handlers
//!
//! Framework-agnostic async functions the routing layer maps onto
//! endpoints.

pub mod health;
pub mod transaction;

pub use health::{clear_slow_queries, get_db_health, reset_db_metrics, ClearSlowQueriesResponse};
pub use transaction::{
    execute_transaction, AdditionalOperation, OperationKind, Scenario, TransactionErrorBody,
    TransactionRequest, TransactionResponse,
};
