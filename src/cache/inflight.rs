//! Request deduplication for concurrent cache misses.
//!
//! The first caller for a key becomes the *leader*: it registers an entry, evaluates,
//! and publishes the outcome. Callers arriving while the entry exists become
//! *followers* and wait on the entry's [`Notify`] instead of evaluating again.
//!
//! Outcomes, errors included, are shared with every follower. A leader that is
//! dropped before publishing publishes an error from its `Drop`, so followers never
//! wait forever: a [`WorkerCrash`] when the leader unwinds from a panic, an
//! "abandoned" error when its future was dropped.

use crate::core::WorkerCrash;
use crate::value::Value;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::Notify;

/// A failure shared between the leader and the followers of one evaluation.
#[derive(Error, Debug, Clone)]
#[error("{0:#}")]
pub struct SharedFailure(Arc<anyhow::Error>);

impl SharedFailure {
    fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// The original error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

type Outcome = Result<Value, SharedFailure>;

#[derive(Debug, Default)]
struct InFlightCall {
    notify: Notify,
    outcome: OnceLock<Outcome>,
}

impl InFlightCall {
    async fn wait(&self) -> Outcome {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking, so a publish in between is not missed.
            notified.as_mut().enable();

            if let Some(outcome) = self.outcome.get() {
                return outcome.clone();
            }
            notified.await;
        }
    }
}

/// Evaluations currently running, keyed by cache key.
///
/// One table is owned by the engine and shared by every cache group built from it.
#[derive(Debug, Default)]
pub struct InFlightTable {
    calls: DashMap<String, Arc<InFlightCall>>,
}

impl InFlightTable {
    /// Number of evaluations currently in flight.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub(crate) fn join(self: &Arc<Self>, key: &str) -> Role {
        match self.calls.entry(key.to_string()) {
            Entry::Occupied(entry) => Role::Follower(Follower {
                call: Arc::clone(entry.get()),
            }),
            Entry::Vacant(entry) => {
                let call = Arc::new(InFlightCall::default());
                entry.insert(Arc::clone(&call));
                Role::Leader(Leader {
                    table: Arc::clone(self),
                    key: key.to_string(),
                    call,
                    published: false,
                })
            }
        }
    }
}

pub(crate) enum Role {
    Leader(Leader),
    Follower(Follower),
}

pub(crate) struct Follower {
    call: Arc<InFlightCall>,
}

impl Follower {
    pub(crate) async fn wait(self) -> Outcome {
        self.call.wait().await
    }
}

/// Registration of the caller evaluating a key.
pub(crate) struct Leader {
    table: Arc<InFlightTable>,
    key: String,
    call: Arc<InFlightCall>,
    published: bool,
}

impl Leader {
    /// Share the outcome, remove the entry and wake every follower.
    pub(crate) fn publish(mut self, result: anyhow::Result<Value>) -> Outcome {
        let outcome = result.map_err(SharedFailure::new);
        self.finish(outcome.clone());
        outcome
    }

    fn finish(&mut self, outcome: Outcome) {
        self.published = true;
        // Followers only ever read the first outcome.
        let _ = self.call.outcome.set(outcome);
        self.table
            .calls
            .remove_if(&self.key, |_, call| Arc::ptr_eq(call, &self.call));
        self.call.notify.notify_waiters();
    }
}

impl Drop for Leader {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        let failure = if std::thread::panicking() {
            anyhow::Error::new(WorkerCrash {
                message: format!("evaluation of '{}' panicked", self.key),
            })
        } else {
            anyhow::anyhow!("evaluation of '{}' was abandoned", self.key)
        };
        self.finish(Err(SharedFailure::new(failure)));
    }
}
