//! Test utilities for portal
//!
//! This module provides helpers shared by unit, integration and stress tests:
//! logging setup and a small task-tracker domain (tasks, users, notifications)
//! with matching projection schemas.
//!
//! Enabled for the crate's own tests and, for downstream tests, behind the
//! `test-utils` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use portal::dump::DumpOptions;
//! use portal::engine::Engine;
//! use portal::schema::Record;
//! use portal::test_utils::{TaskModel, task_schema};
//!
//! # async fn example() -> portal::core::Result<()> {
//! let engine = Engine::default();
//! let mut record = Record::new(task_schema());
//! engine.dump(&mut record, &TaskModel::new(1, 1, "Finish your jobs.").into_value(), &DumpOptions::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;

pub use fixtures::{
    CallCounter, ErrField, NotificationModel, TaskModel, UserModel, notification_schema, task_schema, tasks,
    user_schema,
};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG` when set, otherwise leaves logging off.
///
/// ```bash
/// RUST_LOG=portal=debug,portal::cache=trace cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true) // Show targets like "portal::scheduler"
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
