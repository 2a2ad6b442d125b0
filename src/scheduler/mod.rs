//! Depth-scoped job scheduler.
//!
//! Async fields and collection elements are resolved as jobs on bounded pools. A
//! job may itself submit jobs (a nested schema with async fields), and its parent
//! blocks until they finish. If parent and child shared one bounded pool, a pool
//! full of waiting parents would never run the children. The scheduler therefore
//! keeps one pool per *level*: a batch submitted from level `k` runs on pool `k`,
//! and every job in it runs at level `k + 1`.
//!
//! # Capacity
//!
//! The total capacity (default [`DEFAULT_MAX_POOL_SIZE`](crate::constants::DEFAULT_MAX_POOL_SIZE))
//! is split evenly across the levels in use, `max(total / levels, 1)` each, and
//! redistributed whenever it changes or a new level appears. Any capacity of at
//! least one is deadlock-free.
//!
//! # Failure
//!
//! The first failing job cancels the rest of its batch and its error is returned.
//! Panics are caught at the join boundary and reported as field errors carrying a
//! [`WorkerCrash`].

mod pool;

use crate::constants::DEFAULT_MAX_POOL_SIZE;
use crate::core::{PortalError, Result, WorkerCrash};
use crate::dump::DumpContext;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use pool::DepthPool;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

type JobFn<T> = Box<dyn FnOnce(DumpContext) -> BoxFuture<'static, Result<T>> + Send>;

/// A unit of work submitted to the [`Scheduler`].
pub struct Job<T> {
    label: String,
    run: JobFn<T>,
}

impl<T> Job<T> {
    /// `label` names the work in errors, usually the dotted field path.
    pub fn new<F, Fut>(label: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(DumpContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            label: label.into(),
            run: Box::new(move |ctx| Box::pin(run(ctx))),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Level-keyed set of bounded worker pools.
#[derive(Debug)]
pub struct Scheduler {
    pools: DashMap<usize, Arc<DepthPool>>,
    total: AtomicUsize,
    closed: AtomicBool,
    tuning: Mutex<()>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOL_SIZE)
    }
}

impl Scheduler {
    pub fn new(capacity: usize) -> Self {
        Self {
            pools: DashMap::new(),
            total: AtomicUsize::new(capacity.max(1)),
            closed: AtomicBool::new(false),
            tuning: Mutex::new(()),
        }
    }

    /// Total capacity shared by all levels.
    pub fn capacity(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Change the total capacity and redistribute it.
    pub fn set_capacity(&self, capacity: usize) {
        debug!(target: "portal::scheduler", "set max worker pool size to {capacity}");
        let _tuning = self.tuning.lock().unwrap_or_else(|e| e.into_inner());
        self.total.store(capacity.max(1), Ordering::Release);
        self.rebalance();
    }

    /// Capacity currently assigned to `level`, if that level has a pool.
    pub fn pool_capacity(&self, level: usize) -> Option<usize> {
        self.pools.get(&level).map(|pool| pool.capacity())
    }

    /// Number of levels with a pool.
    pub fn levels(&self) -> usize {
        self.pools.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every pool. Queued and later submissions fail with
    /// [`PortalError::SchedulerClosed`].
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        for pool in self.pools.iter() {
            pool.close();
        }
        debug!(target: "portal::scheduler", "closed {} worker pools", self.pools.len());
    }

    fn pool(&self, level: usize) -> Arc<DepthPool> {
        if let Some(pool) = self.pools.get(&level) {
            return Arc::clone(pool.value());
        }

        let _tuning = self.tuning.lock().unwrap_or_else(|e| e.into_inner());
        let pool = match self.pools.entry(level) {
            Entry::Occupied(entry) => return Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                debug!(target: "portal::scheduler", "creating worker pool for level {level}");
                let pool = Arc::new(DepthPool::new(level));
                if self.is_closed() {
                    pool.close();
                }
                entry.insert(Arc::clone(&pool));
                pool
            }
        };
        self.rebalance();
        pool
    }

    // Callers hold `tuning`.
    fn rebalance(&self) {
        let levels = self.pools.len().max(1);
        let share = (self.capacity() / levels).max(1);
        for pool in self.pools.iter() {
            pool.tune(share);
        }
    }

    /// Run `jobs` on the pool of `ctx`'s level and collect their results in
    /// submission order.
    ///
    /// # Errors
    ///
    /// The first job error, returned as soon as it arrives. The remaining jobs of
    /// the batch are cancelled: queued ones never start, running ones are detached
    /// and observe the cancellation cooperatively. Cancellation errors of siblings
    /// never replace the error that caused them.
    pub async fn submit<T: Send + 'static>(&self, ctx: &DumpContext, jobs: Vec<Job<T>>) -> Result<Vec<T>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        if self.is_closed() {
            return Err(PortalError::SchedulerClosed);
        }
        ctx.check()?;

        let level = ctx.scheduler_level();
        let pool = self.pool(level);
        let batch = ctx.batch();
        // Dropping the submitter abandons the batch.
        let _abandon = batch.cancellation_token().clone().drop_guard();

        debug!(target: "portal::scheduler", "submit {} jobs to level {level}", jobs.len());

        let total = jobs.len();
        let mut running = FuturesUnordered::new();
        for (index, job) in jobs.into_iter().enumerate() {
            let pool = Arc::clone(&pool);
            let job_ctx = batch.job();
            let Job { label, run } = job;
            let handle = tokio::spawn(async move {
                let _slot = tokio::select! {
                    biased;
                    () = job_ctx.cancelled() => return Err(job_ctx.cancellation_error()),
                    slot = pool.acquire() => slot?,
                };
                job_ctx.check()?;
                run(job_ctx).await
            });
            running.push(async move { (index, label, handle.await) });
        }

        let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
        let mut failure: Option<PortalError> = None;
        while let Some((index, label, joined)) = running.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    error!(target: "portal::scheduler", "job {label} panicked: {message}");
                    Err(PortalError::field(label, WorkerCrash { message }.into()))
                }
                Err(_) => Err(PortalError::Cancelled),
            };

            match outcome {
                Ok(value) => results[index] = Some(value),
                Err(e) => {
                    batch.cancel();
                    let replace = match &failure {
                        None => true,
                        Some(current) => current.is_cancellation() && !e.is_cancellation(),
                    };
                    if replace {
                        failure = Some(e);
                    }
                }
            }
            // Jobs still running see the cancelled batch token; they are not awaited.
            if failure.as_ref().is_some_and(|e| !e.is_cancellation()) {
                debug!(
                    target: "portal::scheduler",
                    "batch at level {level} failed, detaching {} running jobs",
                    running.len()
                );
                break;
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        results
            .into_iter()
            .map(|slot| slot.ok_or(PortalError::Cancelled))
            .collect()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
