use crate::core::{PortalError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-call dump state: recursion depth, scheduler level, cancellation and deadline.
///
/// Cloned freely; clones share the cancellation token.
#[derive(Debug, Clone, Default)]
pub struct DumpContext {
    depth: usize,
    level: usize,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl DumpContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the dump with [`PortalError::DeadlineExceeded`] once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Use an externally owned token, e.g. one tied to a request.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Nested recursion depth; 0 for the top-level schema.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Level of the pool that jobs submitted with this context run on.
    pub fn scheduler_level(&self) -> usize {
        self.level
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline_passed()
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Error describing why this context stopped.
    pub fn cancellation_error(&self) -> PortalError {
        if self.deadline_passed() {
            PortalError::DeadlineExceeded
        } else {
            PortalError::Cancelled
        }
    }

    /// Fail fast when the context is cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(self.cancellation_error())
        } else {
            Ok(())
        }
    }

    /// Completes when the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    /// Context for a nested schema one level deeper.
    pub(crate) fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    /// Context owning a batch: cancelling it stops the batch, not the caller.
    pub(crate) fn batch(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    /// Context a job of this batch runs with.
    pub(crate) fn job(&self) -> Self {
        Self {
            level: self.level + 1,
            ..self.clone()
        }
    }
}
