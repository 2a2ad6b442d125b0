//! Engine configuration.
//!
//! An [`EngineConfig`] holds the process-wide defaults of an
//! [`Engine`](crate::engine::Engine). Every field is optional in TOML and falls
//! back to the defaults in [`constants`](crate::constants):
//!
//! ```toml
//! max_pool_size = 64
//! disable_concurrency = false
//! field_alias_convention = "json"
//!
//! [cache]
//! enabled = true
//! lru_size = 4096
//! ```
//!
//! # Configuration Priority
//!
//! 1. Per-call [`DumpOptions`](crate::dump::DumpOptions)
//! 2. Environment variables (`PORTAL_MAX_POOL_SIZE`, `PORTAL_DISABLE_CACHE`,
//!    `PORTAL_DISABLE_CONCURRENCY`, `PORTAL_FIELD_ALIAS_CONVENTION`), applied by
//!    [`EngineConfig::with_env_overrides`]
//! 3. The configuration file
//! 4. Default values

use crate::constants::{
    DEFAULT_FIELD_ALIAS_CONVENTION, DEFAULT_LRU_SIZE, DEFAULT_MAX_POOL_SIZE, ENV_DISABLE_CACHE,
    ENV_DISABLE_CONCURRENCY, ENV_FIELD_ALIAS_CONVENTION, ENV_MAX_POOL_SIZE,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Process-wide engine defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total worker capacity shared by all scheduler levels.
    pub max_pool_size: usize,

    /// Resolve every field inline for every dump.
    pub disable_concurrency: bool,

    /// Naming tag consulted for aliases when a dump does not choose one.
    pub field_alias_convention: String,

    pub cache: CacheConfig,
}

/// Method-result cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Attach the built-in LRU store. Off by default.
    pub enabled: bool,

    /// Entries kept by the built-in LRU store.
    pub lru_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            disable_concurrency: false,
            field_alias_convention: DEFAULT_FIELD_ALIAS_CONVENTION.to_string(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lru_size: DEFAULT_LRU_SIZE,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or a value has the
    /// wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse engine config")
    }

    /// Load a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read engine config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse engine config from {}", path.display()))?;
        debug!(target: "portal", "loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Apply the `PORTAL_*` environment variables on top of this configuration.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(ENV_MAX_POOL_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => self.max_pool_size = size,
                _ => warn!(target: "portal", "ignoring invalid {ENV_MAX_POOL_SIZE}={raw}"),
            }
        }
        if let Some(raw) = lookup(ENV_DISABLE_CACHE) {
            match parse_flag(&raw) {
                Some(disabled) => self.cache.enabled &= !disabled,
                None => warn!(target: "portal", "ignoring invalid {ENV_DISABLE_CACHE}={raw}"),
            }
        }
        if let Some(raw) = lookup(ENV_DISABLE_CONCURRENCY) {
            match parse_flag(&raw) {
                Some(disabled) => self.disable_concurrency = disabled,
                None => warn!(target: "portal", "ignoring invalid {ENV_DISABLE_CONCURRENCY}={raw}"),
            }
        }
        if let Some(raw) = lookup(ENV_FIELD_ALIAS_CONVENTION) {
            let convention = raw.trim();
            if !convention.is_empty() {
                self.field_alias_convention = convention.to_string();
            }
        }
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
