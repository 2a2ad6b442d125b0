//! Field directive strings.
//!
//! A directive is a `;`-separated list of `KEY` or `KEY:VALUE` tokens attached to a
//! destination field, e.g. `meth:GetUser.Name;async;default:AUTO_INIT`. Keys are
//! case-insensitive and stored uppercase; keys and values are trimmed; a value may
//! itself contain `:`.
//!
//! | Key | Meaning |
//! |---|---|
//! | `nested` | Field is a sub-projection (one schema or a list of them) |
//! | `async` | Resolve on the worker pool instead of inline |
//! | `meth:Name[.Attr...]` | Call a schema method, then walk attributes on its result |
//! | `attr:Name[.Name...]` | Walk an attribute/method chain on the source |
//! | `const:value` | Constant string |
//! | `only:a,b` / `exclude:a,b` | Static selectors for a nested field |
//! | `default:literal` / `default:AUTO_INIT` | Fallback for a missing value |
//! | `required` | A missing value is an error |
//! | `disablecache` | Never cache this field's method calls |
//!
//! Parsed directives are memoized process-wide by their literal string.

use crate::constants::AUTO_INIT;
use dashmap::DashMap;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

static DIRECTIVE_CACHE: LazyLock<DashMap<String, Arc<Directive>>> = LazyLock::new(DashMap::new);
static ALIAS_CACHE: LazyLock<DashMap<String, Option<String>>> = LazyLock::new(DashMap::new);
static ALIAS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[_a-zA-Z0-9]+(?:-*[_a-zA-Z0-9]+)*$").ok());

/// How a field's raw value is fetched, in order of precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    /// `const:value`
    Const(String),
    /// `meth:Name.Attr...`
    Method { name: String, chain: Vec<String> },
    /// `attr:A.B...`
    Attrs(Vec<String>),
    /// Attribute or method named like the field
    Plain,
}

/// Parsed value of a `default:` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultSpec {
    /// Use the field kind's auto-initialized value
    AutoInit,
    /// A literal, converted like any resolved value
    Literal(String),
}

/// A parsed directive. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Directive {
    source: String,
    settings: BTreeMap<String, String>,
    fetch: Option<Fetch>,
}

impl Directive {
    /// Parse a directive string, returning the shared memoized instance.
    pub fn parse(input: &str) -> Arc<Directive> {
        if let Some(cached) = DIRECTIVE_CACHE.get(input) {
            return Arc::clone(cached.value());
        }

        let mut settings = BTreeMap::new();
        for token in input.split(';') {
            let (key, value) = match token.split_once(':') {
                Some((key, value)) => (key, value.trim()),
                None => (token, ""),
            };
            let key = key.trim().to_uppercase();
            if key.is_empty() {
                continue;
            }
            settings.insert(key, value.to_string());
        }

        let mut directive = Directive {
            source: input.to_string(),
            settings,
            fetch: None,
        };
        directive.fetch = Some(directive.derive_fetch());

        let directive = Arc::new(directive);
        DIRECTIVE_CACHE.insert(input.to_string(), Arc::clone(&directive));
        directive
    }

    fn derive_fetch(&self) -> Fetch {
        if let Some(value) = self.get("CONST") {
            return Fetch::Const(value.to_string());
        }
        if let Some(value) = self.get("METH") {
            let mut parts = split_path(value);
            let name = if parts.is_empty() {
                String::new()
            } else {
                parts.remove(0)
            };
            return Fetch::Method { name, chain: parts };
        }
        if let Some(value) = self.get("ATTR") {
            return Fetch::Attrs(split_path(value));
        }
        Fetch::Plain
    }

    /// The directive string this was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Raw setting value by (case-insensitive) key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(&key.to_uppercase()).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Resolution strategy derived at parse time.
    pub fn fetch(&self) -> &Fetch {
        self.fetch.as_ref().unwrap_or(&Fetch::Plain)
    }

    pub fn is_nested(&self) -> bool {
        self.has("NESTED")
    }

    pub fn is_async(&self) -> bool {
        self.has("ASYNC")
    }

    pub fn is_required(&self) -> bool {
        self.has("REQUIRED")
    }

    pub fn cache_disabled(&self) -> bool {
        self.has("DISABLECACHE")
    }

    /// `meth:` target split into method name and the attribute chain after it.
    pub fn method(&self) -> Option<(&str, &[String])> {
        match self.fetch() {
            Fetch::Method { name, chain } => Some((name.as_str(), chain.as_slice())),
            _ => None,
        }
    }

    pub fn chained_attrs(&self) -> Option<&[String]> {
        match self.fetch() {
            Fetch::Attrs(chain) => Some(chain),
            _ => None,
        }
    }

    pub fn const_value(&self) -> Option<&str> {
        self.get("CONST")
    }

    pub fn default_value(&self) -> Option<DefaultSpec> {
        self.get("DEFAULT").map(|value| {
            if value == AUTO_INIT {
                DefaultSpec::AutoInit
            } else {
                DefaultSpec::Literal(value.to_string())
            }
        })
    }

    /// Static `only:` list of a nested field.
    pub fn only_names(&self) -> Vec<String> {
        self.get("ONLY").map(split_list).unwrap_or_default()
    }

    /// Static `exclude:` list of a nested field.
    pub fn exclude_names(&self) -> Vec<String> {
        self.get("EXCLUDE").map(split_list).unwrap_or_default()
    }
}

fn split_path(value: &str) -> Vec<String> {
    value.split('.').map(|part| part.trim().to_string()).collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract a field alias from a naming tag such as `"user_id,omitempty"`.
///
/// The alias is the first comma-separated part, accepted only if it is made of
/// letters, digits, underscores and inner dashes. Results are memoized by tag.
pub fn parse_alias(tag: &str) -> Option<String> {
    if let Some(cached) = ALIAS_CACHE.get(tag) {
        return cached.value().clone();
    }

    let candidate = tag.split(',').next().unwrap_or_default().trim();
    let alias = ALIAS_PATTERN
        .as_ref()
        .filter(|pattern| pattern.is_match(candidate))
        .map(|_| candidate.to_string());

    ALIAS_CACHE.insert(tag.to_string(), alias.clone());
    alias
}
