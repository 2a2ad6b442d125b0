use std::collections::HashMap;

/// Options applied to one dump call.
///
/// ```rust
/// use portal::dump::DumpOptions;
///
/// let options = DumpOptions::new()
///     .only(["ID", "User[Name]"])
///     .exclude(["User[Name]"])
///     .field_alias_convention("yaml")
///     .custom_field_directive("TaskSchema.Title", "const:hidden");
/// assert_eq!(options.only_filters(), ["ID", "User[Name]"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    only: Vec<String>,
    exclude: Vec<String>,
    field_alias_convention: Option<String>,
    disable_concurrency: bool,
    disable_cache: bool,
    custom_field_directives: HashMap<String, String>,
    worker_pool_size: Option<usize>,
}

impl DumpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the selected fields, e.g. `["ID", "User[Name,School[Name]]"]`.
    pub fn only<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Drop the selected fields. `User[Name]` drops `Name` inside `User` and keeps
    /// `User` itself.
    pub fn exclude<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Naming tag consulted for aliases in selectors (default `json`).
    pub fn field_alias_convention(mut self, convention: impl Into<String>) -> Self {
        self.field_alias_convention = Some(convention.into());
        self
    }

    /// Resolve every field inline, ignoring `async`.
    pub fn disable_concurrency(mut self) -> Self {
        self.disable_concurrency = true;
        self
    }

    /// Evaluate every method directly, bypassing the cache.
    pub fn disable_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }

    /// Replace field directives for this call, keyed `SchemaName.FieldName`.
    pub fn custom_field_directives(mut self, directives: HashMap<String, String>) -> Self {
        self.custom_field_directives = directives;
        self
    }

    pub fn custom_field_directive(mut self, field: impl Into<String>, directive: impl Into<String>) -> Self {
        self.custom_field_directives.insert(field.into(), directive.into());
        self
    }

    /// Resize the engine's worker pools before dumping.
    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = Some(size);
        self
    }

    pub fn only_filters(&self) -> &[String] {
        &self.only
    }

    pub fn exclude_filters(&self) -> &[String] {
        &self.exclude
    }

    pub fn alias_convention(&self) -> Option<&str> {
        self.field_alias_convention.as_deref()
    }

    pub fn is_concurrency_disabled(&self) -> bool {
        self.disable_concurrency
    }

    pub fn is_cache_disabled(&self) -> bool {
        self.disable_cache
    }

    pub fn field_directives(&self) -> &HashMap<String, String> {
        &self.custom_field_directives
    }

    pub fn pool_size(&self) -> Option<usize> {
        self.worker_pool_size
    }
}
