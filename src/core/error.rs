//! Error handling for portal
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** at the crate boundary ([`PortalError`]) so callers can
//!    tell structural mistakes, selector syntax errors and field failures apart.
//! 2. **`anyhow` inside user callbacks**: schema methods, entity methods, value hooks
//!    and cache stores return [`anyhow::Result`], and the orchestrator wraps their
//!    failures with the dotted path of the field being resolved.
//!
//! # Error Categories
//!
//! - **Structural**: [`PortalError::Structural`] - the destination cannot hold what the
//!   directive asks for (a `nested` field whose kind is not a schema, a list source for a
//!   single dump, ...). Fatal, aborts the call immediately.
//! - **Selector syntax**: [`PortalError::Selector`] - unmatched brackets or a bad root
//!   prefix. Raised while options are applied, before any dumping starts.
//! - **Field resolution**: [`PortalError::FieldResolution`] - a referenced method or
//!   attribute is missing, a method failed, a hook rejected a value, a required value is
//!   missing, or a worker crashed. Aborts the enclosing dump and cancels sibling jobs.
//! - **Lifecycle**: [`PortalError::Cancelled`], [`PortalError::DeadlineExceeded`],
//!   [`PortalError::SchedulerClosed`].
//!
//! Missing values without a default and cache misses are *not* errors: they are logged
//! and the dump continues.
//!
//! # Examples
//!
//! ```rust,no_run
//! use portal::core::PortalError;
//!
//! fn report(error: &PortalError) {
//!     match error {
//!         PortalError::Selector(e) => eprintln!("bad selector: {e}"),
//!         PortalError::FieldResolution { field, .. } => eprintln!("cannot build {field}"),
//!         other => eprintln!("dump failed: {other}"),
//!     }
//! }
//! ```

use thiserror::Error;

/// The main error type for portal operations.
///
/// A dump that returns an error may have already written some fields of its
/// destination. There is no rollback: the destination must be discarded.
#[derive(Error, Debug)]
pub enum PortalError {
    /// The destination shape cannot accept the value the directives produce.
    #[error("{message}")]
    Structural {
        /// Description of the mismatch
        message: String,
    },

    /// An Only/Exclude selector could not be parsed.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// A field value could not be resolved or assigned.
    ///
    /// `field` is the dotted schema path, e.g. `TaskSchema.User.Name`.
    #[error("failed to resolve field '{field}': {source:#}")]
    FieldResolution {
        /// Dotted path of the field
        field: String,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// The dump context was cancelled before the work completed.
    #[error("dump cancelled")]
    Cancelled,

    /// The dump context deadline passed before the work completed.
    #[error("dump deadline exceeded")]
    DeadlineExceeded,

    /// Jobs were submitted after the worker pools were shut down.
    #[error("worker pools have been shut down")]
    SchedulerClosed,
}

impl PortalError {
    /// Build a [`PortalError::Structural`] from any displayable message.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }

    /// Wrap a callback failure with the path of the field being resolved.
    pub fn field(field: impl Into<String>, source: anyhow::Error) -> Self {
        Self::FieldResolution {
            field: field.into(),
            source,
        }
    }

    /// Whether the error is the cooperative cancellation of a dump.
    ///
    /// Cancellation errors from sibling jobs are never surfaced in place of the
    /// error that caused the cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Errors produced by the Only/Exclude selector parser.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorError {
    /// A `[` without its `]`, a stray `]`, or brackets closed out of order.
    #[error("unmatched brackets")]
    UnmatchedBrackets,

    /// A root-level filter string must be wrapped in `[...]`.
    #[error("filter string must start with '['")]
    PrefixIsNotBracket,

    /// A nested `[` that does not follow a field name, as in `[[A]]` or `[A,[B]]`.
    #[error("nested brackets must follow a field name")]
    MissingName,
}

/// A panic raised inside a scheduler job.
///
/// The scheduler recovers the panic at the worker boundary and reports it as the
/// source of a [`PortalError::FieldResolution`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("worker crashed: {message}")]
pub struct WorkerCrash {
    /// Panic payload rendered as text
    pub message: String,
}
