use std::sync::Arc;
use std::time::Duration;

use dbpulse_app::context::{AppContext, ContextConfig};
use dbpulse_app::utils::logging::init_logging;
use tempfile::TempDir;

/// Shared context for integration tests that need a live database.
pub struct TestContext {
    /// Application context under test.
    pub ctx: Arc<AppContext>,
    /// Keep temporary directory alive for the lifetime of the context.
    _temp_dir: TempDir,
}

/// Create a new test context with a fresh database and fast retry delays.
pub async fn setup_test_context() -> TestContext {
    init_logging();

    let temp_dir = TempDir::new().expect("failed to create temporary database directory");
    let db_path = temp_dir.path().join("dbpulse.db");

    let mut config = ContextConfig::new(&db_path);
    config.transaction = config
        .transaction
        .clone()
        .with_base_delay(Duration::from_millis(1))
        .with_jitter_factor(0.0);

    let ctx = AppContext::new(config).await.expect("failed to initialise application context");

    TestContext { ctx, _temp_dir: temp_dir }
}
