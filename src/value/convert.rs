//! Value conversion toward a destination [`FieldKind`].
//!
//! Conversion is lenient in the usual "cast" sense: numbers become strings, numeric
//! and boolean strings are parsed, integers are read as unix timestamps for time
//! fields, and collections are converted element by element, null elements
//! becoming the element kind's zero value. Anything else is
//! rejected and the caller falls back to the value hooks.

use super::Value;
use crate::schema::FieldKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a value could not be converted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("empty input value")]
    EmptyInput,

    #[error("failed to convert from type '{from}' to '{to}'")]
    Incompatible { from: &'static str, to: String },

    #[error("unable to parse {value:?} as {to}")]
    Parse { value: String, to: String },
}

/// Convert `value` so it can be stored in a field of kind `kind`.
///
/// # Errors
///
/// [`ConvertError::EmptyInput`] for [`Value::Null`]; otherwise an error when no
/// conversion rule applies. Fields of kind [`FieldKind::Custom`] never convert.
pub fn convert(value: &Value, kind: &FieldKind) -> Result<Value, ConvertError> {
    if value.is_null() {
        return Err(ConvertError::EmptyInput);
    }
    convert_inner(value, kind)
}

fn convert_inner(value: &Value, kind: &FieldKind) -> Result<Value, ConvertError> {
    let incompatible = || ConvertError::Incompatible {
        from: value.kind_name(),
        to: kind.to_string(),
    };
    let parse_error = |text: &str| ConvertError::Parse {
        value: text.to_string(),
        to: kind.to_string(),
    };

    match (kind, value) {
        (FieldKind::Any, v) => Ok(v.clone()),
        (_, Value::Null) => Err(ConvertError::EmptyInput),

        (FieldKind::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (FieldKind::Bool, Value::Int(i)) => Ok(Value::Bool(*i != 0)),
        (FieldKind::Bool, Value::Float(f)) => Ok(Value::Bool(*f != 0.0)),
        (FieldKind::Bool, Value::String(s)) => {
            parse_bool(s.trim()).map(Value::Bool).ok_or_else(|| parse_error(s))
        }

        (FieldKind::Int, Value::Int(i)) => Ok(Value::Int(*i)),
        (FieldKind::Int, Value::Float(f)) => Ok(Value::Int(f.trunc() as i64)),
        (FieldKind::Int, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        (FieldKind::Int, Value::String(s)) => {
            s.trim().parse::<i64>().map(Value::Int).map_err(|_| parse_error(s))
        }

        (FieldKind::Float, Value::Float(f)) => Ok(Value::Float(*f)),
        (FieldKind::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
        (FieldKind::Float, Value::Bool(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        (FieldKind::Float, Value::String(s)) => {
            s.trim().parse::<f64>().map(Value::Float).map_err(|_| parse_error(s))
        }

        (FieldKind::String, Value::String(s)) => Ok(Value::String(s.clone())),
        (FieldKind::String, Value::Int(i)) => Ok(Value::String(i.to_string())),
        (FieldKind::String, Value::Float(f)) => Ok(Value::String(f.to_string())),
        (FieldKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (FieldKind::String, Value::Time(t)) => Ok(Value::String(t.to_rfc3339())),

        (FieldKind::Time, Value::Time(t)) => Ok(Value::Time(*t)),
        (FieldKind::Time, Value::Int(secs)) => DateTime::from_timestamp(*secs, 0)
            .map(Value::Time)
            .ok_or_else(|| parse_error(&secs.to_string())),
        (FieldKind::Time, Value::String(s)) => {
            parse_time(s.trim()).map(Value::Time).ok_or_else(|| parse_error(s))
        }

        (FieldKind::List(inner), Value::List(items)) => items
            .iter()
            .map(|item| convert_element(item, inner))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),

        (FieldKind::Map(inner), Value::Map(entries)) => entries
            .iter()
            .map(|(k, v)| convert_element(v, inner).map(|v| (k.clone(), v)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Value::Map),

        (FieldKind::Nested(schema), Value::Record(record))
            if record.schema().name() == schema.name() =>
        {
            Ok(value.clone())
        }

        (FieldKind::NestedList(schema), Value::List(items)) => {
            let all_match = items.iter().all(|item| {
                item.as_record()
                    .is_some_and(|record| record.schema().name() == schema.name())
            });
            if all_match { Ok(value.clone()) } else { Err(incompatible()) }
        }

        _ => Err(incompatible()),
    }
}

/// Null elements of a collection take the element kind's zero value.
fn convert_element(item: &Value, kind: &FieldKind) -> Result<Value, ConvertError> {
    if item.is_null() {
        return Ok(kind.zero());
    }
    convert_inner(item, kind)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}
