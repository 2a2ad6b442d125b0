//! Per-dump view of a schema.

use super::{FieldDescriptor, SchemaType};
use crate::cache::CacheGroup;
use crate::selector::Cursor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A schema as seen by one dump call, nested recursion level, or collection element.
///
/// Holds the field availability mask computed from Only/Exclude, the alias
/// convention, the dotted path used in diagnostics, the cache group, and the
/// frame's position in the selector forests.
#[derive(Debug, Clone)]
pub struct ProjectionSchema {
    schema: Arc<SchemaType>,
    fields: Vec<Arc<FieldDescriptor>>,
    available: Vec<bool>,
    convention: Arc<str>,
    path: String,
    cache: CacheGroup,
    pub(crate) only_cursor: Cursor,
    pub(crate) exclude_cursor: Cursor,
}

impl ProjectionSchema {
    /// A root frame with every field available.
    pub fn new(schema: Arc<SchemaType>, convention: Arc<str>, cache: CacheGroup) -> Self {
        Self {
            fields: schema.fields().to_vec(),
            available: vec![true; schema.fields().len()],
            path: schema.name().to_string(),
            schema,
            convention,
            cache,
            only_cursor: Cursor::Root,
            exclude_cursor: Cursor::Root,
        }
    }

    /// A frame for `schema` reached through `field` of this frame.
    pub fn child(&self, field: &FieldDescriptor, schema: Arc<SchemaType>) -> Self {
        let mut frame = Self::new(schema, Arc::clone(&self.convention), self.cache.clone());
        frame.path = self.field_path(field);
        frame
    }

    /// Replace field directives from a `SchemaName.FieldName -> directive` map.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        if overrides.is_empty() {
            return self;
        }
        for field in &mut self.fields {
            let key = format!("{}.{}", self.schema.name(), field.name());
            if let Some(directive) = overrides.get(&key) {
                *field = Arc::new(field.with_directive(directive));
            }
        }
        self
    }

    pub fn schema(&self) -> &Arc<SchemaType> {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Dotted path of this frame, e.g. `TaskSchema.User`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Dotted path of one of this frame's fields.
    pub fn field_path(&self, field: &FieldDescriptor) -> String {
        format!("{}.{}", self.path, field.name())
    }

    pub fn convention(&self) -> &Arc<str> {
        &self.convention
    }

    pub fn cache(&self) -> &CacheGroup {
        &self.cache
    }

    /// Whether the schema type opted out of caching.
    pub fn cache_disabled(&self) -> bool {
        self.schema.cache_disabled()
    }

    pub fn field_by_name_or_alias(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.fields.iter().find(|field| {
            field.name() == name || field.alias(&self.convention).as_deref() == Some(name)
        })
    }

    /// Keep only the named fields. An empty list leaves the mask untouched.
    pub fn set_only<S: AsRef<str>>(&mut self, names: &[S]) {
        if names.is_empty() {
            return;
        }
        self.available.iter_mut().for_each(|slot| *slot = false);
        for name in names {
            self.mark(name.as_ref(), true);
        }
    }

    /// Drop the named fields.
    pub fn set_exclude<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.mark(name.as_ref(), false);
        }
    }

    fn mark(&mut self, name: &str, available: bool) {
        match self.field_by_name_or_alias(name).map(|field| field.index()) {
            Some(index) => self.available[index] = available,
            None => warn!(target: "portal", "field name '{}.{}' not found", self.name(), name),
        }
    }

    /// Available fields in declaration order.
    pub fn available_fields(&self) -> impl Iterator<Item = &Arc<FieldDescriptor>> {
        self.fields
            .iter()
            .filter(|field| self.available[field.index()])
    }

    /// Fields resolved inline on the calling task.
    pub fn sync_fields(&self, disable_concurrency: bool) -> Vec<Arc<FieldDescriptor>> {
        self.available_fields()
            .filter(|field| disable_concurrency || !field.directive().is_async())
            .cloned()
            .collect()
    }

    /// Fields resolved as scheduler jobs.
    pub fn async_fields(&self, disable_concurrency: bool) -> Vec<Arc<FieldDescriptor>> {
        if disable_concurrency {
            return Vec::new();
        }
        self.available_fields()
            .filter(|field| field.directive().is_async())
            .cloned()
            .collect()
    }

    pub fn has_async_fields(&self, disable_concurrency: bool) -> bool {
        !disable_concurrency && self.available_fields().any(|field| field.directive().is_async())
    }
}
