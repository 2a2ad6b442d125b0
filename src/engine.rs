//! The projection engine.
//!
//! An [`Engine`] owns the process-wide resources shared by every dump: the
//! depth-scoped worker pools, the method-result cache store, and the in-flight
//! evaluation table. Construct one per process (or per test) and share it.
//!
//! ```rust,no_run
//! use portal::config::EngineConfig;
//! use portal::dump::DumpOptions;
//! use portal::engine::Engine;
//! use portal::schema::{FieldDef, FieldKind, Record, SchemaType};
//! use portal::value::Value;
//! use std::collections::BTreeMap;
//!
//! # async fn example() -> portal::core::Result<()> {
//! let engine = Engine::new(EngineConfig::default());
//! let schema = SchemaType::builder("UserSchema")
//!     .field(FieldDef::new("Name", FieldKind::String).tag("json", "name"))
//!     .build();
//!
//! let source = Value::Map(BTreeMap::from([("Name".to_string(), Value::from("Ada"))]));
//! let mut record = Record::new(schema);
//! engine.dump(&mut record, &source, &DumpOptions::new()).await?;
//! assert_eq!(record.get("Name"), Some(&Value::from("Ada")));
//! # Ok(())
//! # }
//! ```

use crate::cache::{CacheGroup, CacheStore, InFlightTable, LruStore};
use crate::config::EngineConfig;
use crate::core::Result;
use crate::dump::{DumpContext, DumpOptions, Dumper};
use crate::scheduler::Scheduler;
use crate::schema::{Record, SchemaType};
use crate::value::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Shared state of all dumps: worker pools, cache store and in-flight table.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    scheduler: Arc<Scheduler>,
    store: OnceLock<Arc<dyn CacheStore>>,
    in_flight: Arc<InFlightTable>,
    cache_enabled: AtomicBool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        debug!(
            target: "portal",
            "creating engine with {} workers, cache {}",
            config.max_pool_size,
            if config.cache.enabled { "enabled" } else { "disabled" }
        );
        Self {
            scheduler: Arc::new(Scheduler::new(config.max_pool_size)),
            store: OnceLock::new(),
            in_flight: Arc::new(InFlightTable::default()),
            cache_enabled: AtomicBool::new(config.cache.enabled),
            config,
        }
    }

    /// Use `store` for method results instead of the built-in LRU, and enable
    /// caching.
    pub fn with_cache_store(self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_enabled.store(true, Ordering::Release);
        Self {
            store: OnceLock::from(store),
            ..self
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Evaluations currently shared between concurrent callers.
    pub fn in_flight(&self) -> &Arc<InFlightTable> {
        &self.in_flight
    }

    /// Resize the total worker capacity.
    pub fn set_max_pool_size(&self, size: usize) {
        self.scheduler.set_capacity(size);
    }

    /// Turn method-result caching off for dumpers created afterwards.
    pub fn disable_cache(&self) {
        info!(target: "portal", "method result cache disabled");
        self.cache_enabled.store(false, Ordering::Release);
    }

    /// Turn method-result caching on for dumpers created afterwards.
    pub fn enable_cache(&self) {
        info!(target: "portal", "method result cache enabled");
        self.cache_enabled.store(true, Ordering::Release);
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::Acquire)
    }

    /// Close the worker pools. Later dumps with async fields fail with
    /// [`PortalError::SchedulerClosed`](crate::core::PortalError::SchedulerClosed).
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn store(&self) -> Arc<dyn CacheStore> {
        let store = self.store.get_or_init(|| {
            debug!(target: "portal::cache", "creating lru store of {} entries", self.config.cache.lru_size);
            Arc::new(LruStore::new(self.config.cache.lru_size))
        });
        Arc::clone(store)
    }

    /// Parse `options` once into a reusable [`Dumper`].
    ///
    /// # Errors
    ///
    /// [`PortalError::Selector`](crate::core::PortalError::Selector) when a
    /// selector is malformed.
    pub fn dumper(&self, options: &DumpOptions) -> Result<Dumper> {
        if let Some(size) = options.pool_size() {
            self.set_max_pool_size(size);
        }
        let store = (self.is_cache_enabled() && !options.is_cache_disabled()).then(|| self.store());
        let cache = CacheGroup::new(store, Arc::clone(&self.in_flight));
        Dumper::new(
            Arc::clone(&self.scheduler),
            cache,
            options,
            &self.config.field_alias_convention,
            self.config.disable_concurrency,
        )
    }

    /// Populate `dst` from `src`.
    ///
    /// # Errors
    ///
    /// See [`Dumper::dump`].
    pub async fn dump(&self, dst: &mut Record, src: &Value, options: &DumpOptions) -> Result<()> {
        self.dump_with_context(&DumpContext::new(), dst, src, options).await
    }

    /// Populate `dst` from `src` under a caller-supplied cancellation token and
    /// deadline.
    pub async fn dump_with_context(
        &self,
        ctx: &DumpContext,
        dst: &mut Record,
        src: &Value,
        options: &DumpOptions,
    ) -> Result<()> {
        self.dumper(options)?.dump(ctx, dst, src).await
    }

    /// Populate one record of `schema` per element of the list `src`.
    ///
    /// # Errors
    ///
    /// See [`Dumper::dump_many`].
    pub async fn dump_many(&self, schema: &Arc<SchemaType>, src: &Value, options: &DumpOptions) -> Result<Vec<Record>> {
        self.dump_many_with_context(&DumpContext::new(), schema, src, options).await
    }

    pub async fn dump_many_with_context(
        &self,
        ctx: &DumpContext,
        schema: &Arc<SchemaType>,
        src: &Value,
        options: &DumpOptions,
    ) -> Result<Vec<Record>> {
        self.dumper(options)?.dump_many(ctx, schema, src).await
    }
}
