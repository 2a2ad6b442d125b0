//! Built-in [`ValueSetter`]s for common field shapes.

use super::{Value, ValueSetter};
use anyhow::bail;

/// Stores a time as unix seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timestamp;

impl ValueSetter for Timestamp {
    fn accept(&self, value: Value) -> anyhow::Result<Value> {
        match value {
            Value::Time(time) => Ok(Value::Int(time.timestamp())),
            other => bail!("expect time value, got {}", other.kind_name()),
        }
    }
}

/// Stores a string lowercased.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowerString;

impl ValueSetter for LowerString {
    fn accept(&self, value: Value) -> anyhow::Result<Value> {
        match value {
            Value::String(s) => Ok(Value::String(s.to_lowercase())),
            other => bail!("expect string value, got {}", other.kind_name()),
        }
    }
}

/// Stores a string uppercased.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpperString;

impl ValueSetter for UpperString {
    fn accept(&self, value: Value) -> anyhow::Result<Value> {
        match value {
            Value::String(s) => Ok(Value::String(s.to_uppercase())),
            other => bail!("expect string value, got {}", other.kind_name()),
        }
    }
}
