//! Method-result caching with request deduplication.
//!
//! Schema and entity methods referenced by `meth:` and `attr:` directives are often
//! expensive (a database lookup, an RPC) and are frequently requested for the same
//! source many times within one dump, e.g. the owner of every task in a list. This
//! module avoids repeating that work in two ways:
//!
//! 1. **Storage** - results are kept in a pluggable [`CacheStore`]. The built-in
//!    [`LruStore`] is a bounded in-process LRU.
//! 2. **Deduplication** - concurrent misses for the same key share one evaluation
//!    through the engine's [`InFlightTable`], so at most one evaluation per key is
//!    in flight at any time.
//!
//! # Cache Keys
//!
//! ```text
//! "{receiver}#{method}#{identity}"
//! ```
//!
//! - `receiver`: schema name for schema methods, entity type name for entity methods
//! - `method`: method name
//! - `identity`: [`Entity::cache_id`](crate::value::Entity::cache_id) of the source
//!
//! Sources without a cache identity are always evaluated directly.
//!
//! # Failure Handling
//!
//! Store errors never fail a dump: a failed `get` is a miss, a failed `set` is
//! logged. Evaluation errors are not stored but are shared with every waiter of the
//! same in-flight evaluation.

mod inflight;

pub use inflight::{InFlightTable, SharedFailure};

use crate::constants::CACHE_KEY_SEPARATOR;
use crate::core::{PortalError, WorkerCrash};
use crate::dump::DumpContext;
use crate::value::Value;
use anyhow::anyhow;
use async_trait::async_trait;
use inflight::Role;
use lru::LruCache;
use std::fmt::Debug;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// A key-value store for method results.
#[async_trait]
pub trait CacheStore: Debug + Send + Sync {
    /// Look up a key. `Ok(None)` is a miss.
    async fn get(&self, ctx: &DumpContext, key: &str) -> anyhow::Result<Option<Value>>;

    /// Store a value.
    async fn set(&self, ctx: &DumpContext, key: &str, value: Value) -> anyhow::Result<()>;
}

/// Bounded in-process LRU store.
#[derive(Debug)]
pub struct LruStore {
    entries: Mutex<LruCache<String, Value>>,
}

impl LruStore {
    /// A store holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for LruStore {
    async fn get(&self, _ctx: &DumpContext, key: &str) -> anyhow::Result<Option<Value>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("lru store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, _ctx: &DumpContext, key: &str, value: Value) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("lru store lock poisoned"))?;
        entries.put(key.to_string(), value);
        Ok(())
    }
}

/// Build a cache key from its parts.
pub fn cache_key(receiver: &str, method: &str, identity: &str) -> String {
    let sep = CACHE_KEY_SEPARATOR;
    format!("{receiver}{sep}{method}{sep}{identity}")
}

/// Cache handle carried by every projection frame.
///
/// Cloning is cheap; all clones share the same store and in-flight table.
#[derive(Debug, Clone)]
pub struct CacheGroup {
    store: Option<Arc<dyn CacheStore>>,
    in_flight: Arc<InFlightTable>,
}

impl CacheGroup {
    pub fn new(store: Option<Arc<dyn CacheStore>>, in_flight: Arc<InFlightTable>) -> Self {
        Self { store, in_flight }
    }

    /// Whether a store is attached.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Resolve `key` through the store, an in-flight evaluation, or `evaluate`.
    ///
    /// Without a store, `evaluate` runs directly.
    pub async fn resolve<F>(&self, ctx: &DumpContext, key: &str, evaluate: F) -> anyhow::Result<Value>
    where
        F: Future<Output = anyhow::Result<Value>>,
    {
        let Some(store) = &self.store else {
            return evaluate.await;
        };

        match store.get(ctx, key).await {
            Ok(Some(value)) => {
                debug!(target: "portal::cache", "cache hit: {key}");
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(target: "portal::cache", "cache get failed for {key}, treating as miss: {e:#}");
            }
        }

        match self.in_flight.join(key) {
            Role::Follower(follower) => {
                debug!(target: "portal::cache", "waiting for in-flight evaluation of {key}");
                tokio::select! {
                    outcome = follower.wait() => outcome.map_err(shared_with_follower),
                    () = ctx.cancelled() => Err(anyhow::Error::new(ctx.cancellation_error())),
                }
            }
            Role::Leader(leader) => {
                let result = evaluate.await;
                if let Ok(value) = &result {
                    if let Err(e) = store.set(ctx, key, value.clone()).await {
                        warn!(target: "portal::cache", "cache set failed for {key}: {e:#}");
                    }
                }
                leader.publish(result).map_err(unshare)
            }
        }
    }
}

/// Error returned to the leader itself.
///
/// The leader's own failure keeps its original message; lifecycle errors stay
/// recognizable as [`PortalError`]s.
fn unshare(shared: SharedFailure) -> anyhow::Error {
    match shared.inner().downcast_ref::<PortalError>() {
        Some(PortalError::Cancelled) => anyhow::Error::new(PortalError::Cancelled),
        Some(PortalError::DeadlineExceeded) => anyhow::Error::new(PortalError::DeadlineExceeded),
        _ => anyhow::Error::new(shared),
    }
}

/// Error returned to a follower. A crashed leader surfaces as the same
/// [`WorkerCrash`] the leader's own dump reports.
fn shared_with_follower(shared: SharedFailure) -> anyhow::Error {
    match shared.inner().downcast_ref::<WorkerCrash>() {
        Some(crash) => anyhow::Error::new(crash.clone()),
        None => anyhow::Error::new(shared),
    }
}
