//! Portal - declarative object projection
//!
//! Portal populates destination records ("schemas") from arbitrary source objects
//! ("entities") by following per-field directives. It handles field selection,
//! nested schemas and collections, concurrent resolution of expensive fields, and
//! caching of method results.
//!
//! # Architecture Overview
//!
//! A dump walks the destination schema tree top-down:
//! - Each field carries a directive such as `meth:GetName`, `attr:User.Name`,
//!   `nested;async` or `const:hidden` describing where its value comes from
//! - Fields marked `async` run as jobs on depth-scoped worker pools, so nested
//!   schemas with async fields can never starve their parents
//! - Only/Exclude selectors (`User[ID,Notifications[ID]]`) pick which fields are
//!   populated, level by level
//! - Method results are cached by `Receiver#Method#Identity` and concurrent misses
//!   for one key share a single evaluation
//!
//! # Core Modules
//!
//! ## Dumping
//! - [`engine`] - Process-wide engine: pools, cache store, entry points
//! - [`dump`] - Per-call options and context, the dump orchestrator
//! - [`scheduler`] - Depth-scoped bounded worker pools
//! - [`cache`] - Cache stores and in-flight deduplication
//!
//! ## Model
//! - [`schema`] - Schema registration, field directives, records and frames
//! - [`selector`] - Only/Exclude selector parsing
//! - [`value`] - Dynamic values, entities and conversion rules
//!
//! ## Supporting Modules
//! - [`config`] - TOML and environment configuration
//! - [`constants`] - Defaults shared across modules
//! - [`core`] - Error types
//!
//! # Directive Format
//!
//! ```text
//! nested;async;only:ID,Name;attr:User
//! meth:GetDescription
//! attr:Owner.Profile.Name;default:AUTO_INIT
//! const:fixed;required
//! ```
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
//! let task = TaskModel::new(1, 1, "Finish your jobs.").into_value();
//!
//! let mut record = Record::new(task_schema());
//! let options = DumpOptions::new().only(["ID", "User[Name]"]);
//! engine.dump(&mut record, &task, &options).await?;
//! println!("{}", record.to_json().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

// Dumping
pub mod cache;
pub mod dump;
pub mod engine;
pub mod scheduler;

// Model
pub mod schema;
pub mod selector;
pub mod value;

// Supporting modules
pub mod config;
pub mod constants;
pub mod core;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::{PortalError, Result};
pub use crate::dump::{DumpContext, DumpOptions, Dumper};
pub use crate::engine::Engine;
pub use crate::schema::{FieldDef, FieldKind, Record, SchemaType};
pub use crate::value::{Entity, Value};
