//! Integration tests for the transaction execution command.

mod support;

use dbpulse_app::commands::{
    execute_transaction, AdditionalOperation, OperationKind, Scenario, TransactionRequest,
};

use crate::support::setup_test_context;

fn request(operation: OperationKind) -> TransactionRequest {
    TransactionRequest {
        operation,
        name: None,
        test_id: None,
        isolation: None,
        data: None,
        additional_operations: Vec::new(),
        scenario: None,
    }
}

/// Validates `execute_transaction` behavior for the create scenario.
///
/// Assertions:
/// - Confirms `data.id` is populated.
/// - Confirms `timing.durationMs >= 0`.
/// - Confirms a first-attempt success reports one attempt.
#[tokio::test]
async fn test_create_campaign() {
    let test = setup_test_context().await;

    let response = execute_transaction(&test.ctx, request(OperationKind::Create))
        .await
        .expect("create should succeed");

    assert!(response.data.get("id").and_then(|v| v.as_str()).is_some());
    assert!(response.timing.duration_ms >= 0.0);
    assert_eq!(response.attempts, 1);
}

/// Validates `execute_transaction` behavior for the update and delete flow.
///
/// Assertions:
/// - Confirms an update against a created campaign succeeds.
/// - Confirms delete reports the row as deleted.
/// - Confirms updating a missing campaign is a validation failure with one
///   attempt.
#[tokio::test]
async fn test_update_and_delete_campaign() {
    let test = setup_test_context().await;

    let mut create = request(OperationKind::Create);
    create.test_id = Some("campaign-1".to_string());
    execute_transaction(&test.ctx, create).await.expect("create should succeed");

    let mut update = request(OperationKind::Update);
    update.test_id = Some("campaign-1".to_string());
    update.data = Some(serde_json::json!({ "status": "archived" }));
    let response = execute_transaction(&test.ctx, update).await.expect("update should succeed");
    assert_eq!(response.data["status"], "archived");

    let mut delete = request(OperationKind::Delete);
    delete.test_id = Some("campaign-1".to_string());
    let response = execute_transaction(&test.ctx, delete).await.expect("delete should succeed");
    assert_eq!(response.data["deleted"], true);

    let mut missing = request(OperationKind::Update);
    missing.test_id = Some("campaign-1".to_string());
    let failure = execute_transaction(&test.ctx, missing).await.unwrap_err();
    assert_eq!(failure.error_type, "validation_error");
    assert_eq!(failure.retry_attempts, 1);
}

/// Validates `execute_transaction` behavior for the batch scenario.
///
/// Assertions:
/// - Confirms a batch with 3 additional operations returns 4 results.
/// - Confirms a single timing block covers the whole batch.
#[tokio::test]
async fn test_batch_returns_all_step_results() {
    let test = setup_test_context().await;

    let mut batch = request(OperationKind::Batch);
    batch.additional_operations = vec![
        AdditionalOperation { name: Some("impression".to_string()), data: None },
        AdditionalOperation { name: Some("click".to_string()), data: None },
        AdditionalOperation { name: None, data: None },
    ];

    let response = execute_transaction(&test.ctx, batch).await.expect("batch should succeed");

    let results = response.data.as_array().expect("batch data should be an array");
    assert_eq!(results.len(), 4);
    assert!(response.timing.duration_ms >= 0.0);

    // One metrics record for the whole batch, not one per step.
    let snapshot = test.ctx.metrics.snapshot();
    assert_eq!(snapshot.total, 1);
}

/// Validates `execute_transaction` behavior for the all-or-nothing batch
/// rollback scenario.
///
/// Assertions:
/// - Confirms a duplicate campaign id in the batch fails the whole batch.
/// - Confirms no campaign events from earlier steps persist.
#[tokio::test]
async fn test_batch_rolls_back_on_failure() {
    let test = setup_test_context().await;

    let mut first = request(OperationKind::Batch);
    first.test_id = Some("batch-campaign".to_string());
    execute_transaction(&test.ctx, first).await.expect("first batch should succeed");

    // Same id again: the primary step hits the primary key constraint after
    // no events were written yet, and the batch rolls back as a unit.
    let mut second = request(OperationKind::Batch);
    second.test_id = Some("batch-campaign".to_string());
    second.additional_operations =
        vec![AdditionalOperation { name: Some("orphaned".to_string()), data: None }];
    let failure = execute_transaction(&test.ctx, second).await.unwrap_err();
    assert_eq!(failure.error_type, "constraint_violation");

    let conn = test.ctx.pool.acquire().unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM campaign_events WHERE label = 'orphaned'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 0);
}

/// Validates `execute_transaction` behavior for the missing fields scenario.
///
/// Assertions:
/// - Confirms a validation error with one attempt and no metrics record.
#[tokio::test]
async fn test_scenario_missing_fields() {
    let test = setup_test_context().await;

    let mut error_test = request(OperationKind::ErrorTest);
    error_test.scenario = Some(Scenario::MissingFields);

    let failure = execute_transaction(&test.ctx, error_test).await.unwrap_err();
    assert_eq!(failure.error_type, "validation_error");
    assert_eq!(failure.retry_attempts, 1);
    assert_eq!(test.ctx.metrics.snapshot().total, 0);
}

/// Validates `execute_transaction` behavior for the duplicate scenario.
///
/// Assertions:
/// - Confirms a constraint violation with attempt count 1.
#[tokio::test]
async fn test_scenario_duplicate() {
    let test = setup_test_context().await;

    let mut error_test = request(OperationKind::ErrorTest);
    error_test.scenario = Some(Scenario::Duplicate);

    let failure = execute_transaction(&test.ctx, error_test).await.unwrap_err();
    assert_eq!(failure.error_type, "constraint_violation");
    assert_eq!(failure.retry_attempts, 1);
}

/// Validates `execute_transaction` behavior for the invalid reference
/// scenario.
///
/// Assertions:
/// - Confirms a foreign key violation surfaces as a constraint violation
///   with one attempt.
#[tokio::test]
async fn test_scenario_invalid_reference() {
    let test = setup_test_context().await;

    let mut error_test = request(OperationKind::ErrorTest);
    error_test.scenario = Some(Scenario::InvalidReference);

    let failure = execute_transaction(&test.ctx, error_test).await.unwrap_err();
    assert_eq!(failure.error_type, "constraint_violation");
    assert_eq!(failure.retry_attempts, 1);
}

/// Validates `execute_transaction` behavior for the temporary error
/// scenario.
///
/// Assertions:
/// - Confirms eventual success after retrying.
/// - Confirms the attempt count is between 2 and the configured maximum.
/// - Confirms exactly one success record is emitted despite the retry.
#[tokio::test]
async fn test_scenario_temporary_error() {
    let test = setup_test_context().await;

    let mut error_test = request(OperationKind::ErrorTest);
    error_test.scenario = Some(Scenario::TemporaryError);

    let response = execute_transaction(&test.ctx, error_test)
        .await
        .expect("temporary error should eventually succeed");
    assert!(response.attempts >= 2);
    assert!(response.attempts <= 3);

    let snapshot = test.ctx.metrics.snapshot();
    assert_eq!(snapshot.total, 1);
    assert_eq!(snapshot.succeeded, 1);
    assert_eq!(snapshot.failed, 0);
}

/// Validates metrics accounting across mixed command outcomes.
///
/// Assertions:
/// - Confirms `total == succeeded + failed` after a mix of outcomes.
#[tokio::test]
async fn test_metrics_counter_invariant() {
    let test = setup_test_context().await;

    execute_transaction(&test.ctx, request(OperationKind::Create)).await.unwrap();
    execute_transaction(&test.ctx, request(OperationKind::Create)).await.unwrap();

    let mut duplicate = request(OperationKind::ErrorTest);
    duplicate.scenario = Some(Scenario::Duplicate);
    execute_transaction(&test.ctx, duplicate).await.unwrap_err();

    let snapshot = test.ctx.metrics.snapshot();
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.total, snapshot.succeeded + snapshot.failed);
    assert_eq!(snapshot.recent_transactions.len(), 3);
}
