//! Transaction execution command
//!
//! Bridges execute-endpoint requests onto the transaction core. Handles
//! create/update/delete against the campaign tables, multi-step batches,
//! and the deterministic error scenarios used by the test harness.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dbpulse_common::{
    BatchStep, IsolationLevel, TxError, TxFailure, TxSuccess, TxTiming,
};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::context::AppContext;
use crate::utils::logging::log_command_execution;

/// Requested operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    Batch,
    ErrorTest,
}

/// Deterministic failure scenario for the error-test operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    MissingFields,
    Duplicate,
    InvalidReference,
    TemporaryError,
}

/// One extra step of a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalOperation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Execute-endpoint request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub operation: OperationKind,
    #[serde(default)]
    pub name: Option<String>,
    /// Caller-supplied idempotency key; reused as the row id across
    /// retries so a retried write never duplicates.
    #[serde(default)]
    pub test_id: Option<String>,
    #[serde(default)]
    pub isolation: Option<IsolationLevel>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub additional_operations: Vec<AdditionalOperation>,
    #[serde(default)]
    pub scenario: Option<Scenario>,
}

/// Execute-endpoint success body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub data: Value,
    /// Total attempts made, including the successful one.
    pub attempts: u32,
    pub timing: TxTiming,
}

/// Execute-endpoint failure body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionErrorBody {
    pub error: String,
    /// Stable classification label (e.g. `constraint_violation`).
    pub error_type: String,
    pub retry_attempts: u32,
}

impl From<TxFailure> for TransactionErrorBody {
    fn from(failure: TxFailure) -> Self {
        Self {
            error: failure.error.to_string(),
            error_type: failure.error.label().to_string(),
            retry_attempts: failure.attempts,
        }
    }
}

/// Pre-transaction validation failure: one attempt, nothing recorded.
fn validation_failure(field: &str, message: &str) -> TransactionErrorBody {
    let error = TxError::validation(field, message);
    TransactionErrorBody {
        error: error.to_string(),
        error_type: error.label().to_string(),
        retry_attempts: 1,
    }
}

fn success(outcome: TxSuccess<Value>) -> TransactionResponse {
    TransactionResponse { data: outcome.data, attempts: outcome.attempts, timing: outcome.timing }
}

/// Execute a transactional operation.
///
/// Dispatches on the requested operation kind; every path runs through the
/// shared transaction manager so retries, timeouts, and metrics apply
/// uniformly. Validation failures are rejected before any transaction is
/// opened and report a single attempt.
pub async fn execute_transaction(
    ctx: &Arc<AppContext>,
    request: TransactionRequest,
) -> Result<TransactionResponse, TransactionErrorBody> {
    let command_name = "transaction::execute";
    let start = Instant::now();

    info!(command = command_name, operation = ?request.operation, "Executing transaction command");

    let result = match request.operation {
        OperationKind::Create => create_campaign(ctx, &request).await,
        OperationKind::Update => update_campaign(ctx, &request).await,
        OperationKind::Delete => delete_campaign(ctx, &request).await,
        OperationKind::Batch => run_batch(ctx, &request).await,
        OperationKind::ErrorTest => run_error_scenario(ctx, &request).await,
    };

    log_command_execution(command_name, start.elapsed(), result.is_ok());
    result
}

async fn create_campaign(
    ctx: &Arc<AppContext>,
    request: &TransactionRequest,
) -> Result<TransactionResponse, TransactionErrorBody> {
    let id = request.test_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let name = request
        .name
        .clone()
        .unwrap_or_else(|| format!("Test Campaign {}", Utc::now().timestamp_millis()));
    let created_at = Utc::now().to_rfc3339();
    let row = json!({ "id": id, "name": name, "status": "active", "createdAt": created_at });

    let outcome = ctx
        .transactions
        .execute("create", "campaign", request.isolation, move |tx| {
            tx.execute(
                "INSERT INTO campaigns (id, name, status, created_at) VALUES (?1, ?2, 'active', ?3)",
                params![id, name, created_at],
            )?;
            Ok(row.clone())
        })
        .await?;

    Ok(success(outcome))
}

async fn update_campaign(
    ctx: &Arc<AppContext>,
    request: &TransactionRequest,
) -> Result<TransactionResponse, TransactionErrorBody> {
    let Some(id) = request
        .test_id
        .clone()
        .or_else(|| field_str(request.data.as_ref(), "id"))
    else {
        return Err(validation_failure("id", "an id is required for update"));
    };

    let status = field_str(request.data.as_ref(), "status").unwrap_or_else(|| "paused".to_string());
    let row = json!({ "id": id, "status": status });

    let outcome = ctx
        .transactions
        .execute("update", "campaign", request.isolation, move |tx| {
            let changed = tx.execute(
                "UPDATE campaigns SET status = ?1 WHERE id = ?2",
                params![status, id],
            )?;
            if changed == 0 {
                return Err(TxError::validation("id", "campaign not found"));
            }
            Ok(row.clone())
        })
        .await?;

    Ok(success(outcome))
}

async fn delete_campaign(
    ctx: &Arc<AppContext>,
    request: &TransactionRequest,
) -> Result<TransactionResponse, TransactionErrorBody> {
    let Some(id) = request
        .test_id
        .clone()
        .or_else(|| field_str(request.data.as_ref(), "id"))
    else {
        return Err(validation_failure("id", "an id is required for delete"));
    };

    let outcome = ctx
        .transactions
        .execute("delete", "campaign", request.isolation, move |tx| {
            tx.execute("DELETE FROM campaign_events WHERE campaign_id = ?1", params![id])?;
            let deleted = tx.execute("DELETE FROM campaigns WHERE id = ?1", params![id])?;
            Ok(json!({ "id": id, "deleted": deleted > 0 }))
        })
        .await?;

    Ok(success(outcome))
}

/// Primary create plus one campaign event per additional operation, all in
/// a single serializable transaction.
async fn run_batch(
    ctx: &Arc<AppContext>,
    request: &TransactionRequest,
) -> Result<TransactionResponse, TransactionErrorBody> {
    let campaign_id = request.test_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let name = request
        .name
        .clone()
        .unwrap_or_else(|| format!("Batch Campaign {}", Utc::now().timestamp_millis()));
    let created_at = Utc::now().to_rfc3339();

    let mut steps = Vec::with_capacity(1 + request.additional_operations.len());

    {
        let campaign_id = campaign_id.clone();
        let name = name.clone();
        let created_at = created_at.clone();
        steps.push(BatchStep::new("campaign", move |tx| {
            tx.execute(
                "INSERT INTO campaigns (id, name, status, created_at) VALUES (?1, ?2, 'active', ?3)",
                params![campaign_id, name, created_at],
            )?;
            Ok(json!({ "id": campaign_id, "name": name, "status": "active" }))
        }));
    }

    for (index, op) in request.additional_operations.iter().enumerate() {
        let event_id = Uuid::new_v4().to_string();
        let label = op.name.clone().unwrap_or_else(|| format!("event_{}", index + 1));
        let campaign_id = campaign_id.clone();
        let created_at = created_at.clone();
        steps.push(BatchStep::new("campaign_event", move |tx| {
            tx.execute(
                "INSERT INTO campaign_events (id, campaign_id, label, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![event_id, campaign_id, label, created_at],
            )?;
            Ok(json!({ "id": event_id, "campaignId": campaign_id, "label": label }))
        }));
    }

    let outcome = ctx.batches.execute_batch("batch", steps, request.isolation).await?;

    Ok(TransactionResponse {
        data: Value::Array(outcome.data),
        attempts: outcome.attempts,
        timing: outcome.timing,
    })
}

/// Deterministic failure scenarios, one per classifier branch.
async fn run_error_scenario(
    ctx: &Arc<AppContext>,
    request: &TransactionRequest,
) -> Result<TransactionResponse, TransactionErrorBody> {
    let Some(scenario) = request.scenario else {
        return Err(validation_failure("scenario", "a scenario is required for error_test"));
    };

    match scenario {
        // Rejected before any transaction is opened.
        Scenario::MissingFields => {
            Err(validation_failure("name", "required fields are missing"))
        }

        // Second insert violates the UNIQUE constraint on campaigns.name.
        Scenario::Duplicate => {
            let name = format!("dup-{}", Uuid::new_v4());
            let outcome = ctx
                .transactions
                .execute("error_test", "campaign", request.isolation, move |tx| {
                    for id in ["a", "b"] {
                        tx.execute(
                            "INSERT INTO campaigns (id, name, status, created_at)
                             VALUES (?1, ?2, 'active', ?3)",
                            params![format!("{name}-{id}"), name, Utc::now().to_rfc3339()],
                        )?;
                    }
                    Ok(Value::Null)
                })
                .await?;
            Ok(success(outcome))
        }

        // References a campaign id that does not exist.
        Scenario::InvalidReference => {
            let event_id = Uuid::new_v4().to_string();
            let outcome = ctx
                .transactions
                .execute("error_test", "campaign_event", request.isolation, move |tx| {
                    tx.execute(
                        "INSERT INTO campaign_events (id, campaign_id, label, created_at)
                         VALUES (?1, 'missing-campaign', 'orphan', ?2)",
                        params![event_id, Utc::now().to_rfc3339()],
                    )?;
                    Ok(Value::Null)
                })
                .await?;
            Ok(success(outcome))
        }

        // Fails with transient contention on the first attempt, then
        // succeeds, exercising the retry loop end to end.
        Scenario::TemporaryError => {
            let remaining_failures = Arc::new(AtomicU32::new(1));
            let id = request.test_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
            let name = format!("temporary-{id}");

            let outcome = ctx
                .transactions
                .execute("error_test", "campaign", request.isolation, move |tx| {
                    if remaining_failures
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        return Err(TxError::TransientContention(
                            "simulated contention: database is locked".to_string(),
                        ));
                    }
                    tx.execute(
                        "INSERT INTO campaigns (id, name, status, created_at)
                         VALUES (?1, ?2, 'active', ?3)",
                        params![id, name, Utc::now().to_rfc3339()],
                    )?;
                    Ok(json!({ "id": id, "name": name }))
                })
                .await?;
            Ok(success(outcome))
        }
    }
}

fn field_str(data: Option<&Value>, key: &str) -> Option<String> {
    data.and_then(|value| value.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}
