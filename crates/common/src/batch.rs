//! Batch execution
//!
//! Runs an ordered list of steps inside one transaction: all steps commit
//! together or none do. Batches default to serializable isolation since
//! they typically touch multiple tables.

use std::sync::Arc;

use rusqlite::Transaction;

use crate::error::{TxError, TxResult};
use crate::txn::{IsolationLevel, TransactionManager, TxFailure, TxSuccess};

/// One step of a batch, bound to the model it touches.
#[derive(Clone)]
pub struct BatchStep<T> {
    pub model: String,
    run: Arc<dyn Fn(&Transaction<'_>) -> TxResult<T> + Send + Sync>,
}

impl<T> BatchStep<T> {
    /// Create a step
    pub fn new<F>(model: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Transaction<'_>) -> TxResult<T> + Send + Sync + 'static,
    {
        Self { model: model.into(), run: Arc::new(run) }
    }
}

impl<T> std::fmt::Debug for BatchStep<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchStep").field("model", &self.model).finish_non_exhaustive()
    }
}

/// Batch executor
///
/// Thin layer over the transaction manager; inherits its retry, timeout,
/// and recording behavior.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    manager: Arc<TransactionManager>,
}

impl BatchExecutor {
    /// Create an executor over the given manager
    pub fn new(manager: Arc<TransactionManager>) -> Self {
        Self { manager }
    }

    /// Execute the steps in order inside a single transaction.
    ///
    /// Results are returned in step order. Any step failure rolls back the
    /// whole batch; transient failures re-run the batch from the first step.
    /// An empty batch is rejected before any transaction is opened.
    pub async fn execute_batch<T>(
        &self,
        operation: &str,
        steps: Vec<BatchStep<T>>,
        isolation: Option<IsolationLevel>,
    ) -> Result<TxSuccess<Vec<T>>, TxFailure>
    where
        T: Send + 'static,
    {
        if steps.is_empty() {
            return Err(TxFailure {
                error: TxError::validation("steps", "batch requires at least one step"),
                attempts: 1,
            });
        }

        let model = batch_model(&steps);
        let isolation = isolation.unwrap_or(IsolationLevel::Serializable);

        self.manager
            .execute(operation, &model, Some(isolation), move |tx| {
                let mut results = Vec::with_capacity(steps.len());
                for step in &steps {
                    results.push((step.run)(tx)?);
                }
                Ok(results)
            })
            .await
    }
}

/// Model label for the batch: the single model if uniform, `multiple`
/// otherwise.
fn batch_model<T>(steps: &[BatchStep<T>]) -> String {
    let first = &steps[0].model;
    if steps.iter().all(|step| &step.model == first) {
        first.clone()
    } else {
        "multiple".to_string()
    }
}
