//! Global constants used throughout the portal codebase.
//!
//! This module contains pool sizes, cache parameters, and naming defaults
//! that are used across multiple modules. Defining them centrally makes
//! the defaults discoverable and keeps [`crate::config::EngineConfig`] and
//! the engine in agreement.

/// Default total capacity shared by all depth-scoped worker pools.
///
/// The number of incoming dump requests is unknown, so the number of
/// concurrently running field jobs must be bounded. The capacity is split
/// across the active recursion levels (see [`crate::scheduler::Scheduler`]).
pub const DEFAULT_MAX_POOL_SIZE: usize = 10 * 1000;

/// Default number of entries kept by the built-in LRU cache store.
pub const DEFAULT_LRU_SIZE: usize = 65536;

/// Naming tag consulted for field aliases unless a dump overrides it.
pub const DEFAULT_FIELD_ALIAS_CONVENTION: &str = "json";

/// Directive value requesting an auto-initialized default.
pub const AUTO_INIT: &str = "AUTO_INIT";

/// Separator between the parts of a cache key: `Receiver#Method#Identity`.
pub const CACHE_KEY_SEPARATOR: char = '#';

/// Environment variable overriding [`crate::config::EngineConfig::max_pool_size`].
pub const ENV_MAX_POOL_SIZE: &str = "PORTAL_MAX_POOL_SIZE";

/// Environment variable disabling the cache when set to a truthy value.
pub const ENV_DISABLE_CACHE: &str = "PORTAL_DISABLE_CACHE";

/// Environment variable forcing every field to be resolved synchronously.
pub const ENV_DISABLE_CONCURRENCY: &str = "PORTAL_DISABLE_CONCURRENCY";

/// Environment variable overriding the default alias convention.
pub const ENV_FIELD_ALIAS_CONVENTION: &str = "PORTAL_FIELD_ALIAS_CONVENTION";
