use super::{FieldDescriptor, SchemaType};
use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;

/// Naming tag consulted when a record is serialized.
const SERIALIZATION_TAG: &str = "json";

/// A destination value: one slot per field of its schema.
///
/// Serializes as a JSON object keyed by each field's `json` tag (falling back to the
/// field name). A tag of `-` hides the field; `omitempty` hides it when empty.
#[derive(Clone)]
pub struct Record {
    schema: Arc<SchemaType>,
    values: Vec<Value>,
}

impl Record {
    /// A record with every field at its zero value.
    pub fn new(schema: Arc<SchemaType>) -> Self {
        let values = schema.fields().iter().map(|field| field.kind().zero()).collect();
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<SchemaType> {
        &self.schema
    }

    /// Value of a field by declared name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema
            .field(name)
            .and_then(|field| self.values.get(field.index()))
    }

    /// Overwrite a field by declared name. Returns `false` for unknown names.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.schema.field(name).map(|field| field.index()) {
            Some(index) => self.set_at(index, value),
            None => false,
        }
    }

    pub(crate) fn set_at(&mut self, index: usize, value: Value) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// `(descriptor, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.schema
            .fields()
            .iter()
            .map(AsRef::as_ref)
            .zip(self.values.iter())
    }

    /// Serialize to a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (field, value) in self.iter() {
            map.entry(&field.name(), value);
        }
        map.finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (field, value) in self.iter() {
            let tag = field.tag(SERIALIZATION_TAG).unwrap_or_default();
            if tag == "-" {
                continue;
            }
            let mut parts = tag.split(',');
            let key = parts
                .next()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(field.name());
            let omit_empty = parts.any(|option| option.trim() == "omitempty");
            if omit_empty && value.is_empty() {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
