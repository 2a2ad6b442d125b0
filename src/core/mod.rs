//! Core types shared by every portal module.
//!
//! This module currently hosts the error taxonomy:
//! - [`PortalError`] - the error returned by every public dump operation
//! - [`SelectorError`] - Only/Exclude syntax errors
//! - [`WorkerCrash`] - a recovered job panic, reported as a field failure

pub mod error;

pub use error::{PortalError, SelectorError, WorkerCrash};

/// Result alias used by the public API.
pub type Result<T, E = PortalError> = std::result::Result<T, E>;
