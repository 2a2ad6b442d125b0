//! Field resolution: fetching a raw value, defaulting it, and assigning it.

use super::{DumpContext, Dumper};
use crate::cache::cache_key;
use crate::core::{PortalError, Result};
use crate::schema::{DefaultSpec, FieldDescriptor, FieldKind, Fetch, ProjectionSchema, Record};
use crate::value::{Entity, Value, convert};
use anyhow::{Context, anyhow, bail};
use std::sync::Arc;
use tracing::{debug, warn};

impl Dumper {
    /// Resolve one field of `frame` from `src`.
    ///
    /// `Ok(None)` leaves the destination field at its zero value.
    pub(super) async fn resolve_field(
        &self,
        ctx: &DumpContext,
        frame: &ProjectionSchema,
        field: &FieldDescriptor,
        src: &Value,
    ) -> Result<Option<Value>> {
        ctx.check()?;
        let path = frame.field_path(field);
        debug!(target: "portal", "processing field {path}");

        let mut raw = self
            .fetch(ctx, frame, field, src)
            .await
            .map_err(|e| field_error(&path, e))?;

        if raw.is_null() {
            match field.directive().default_value() {
                Some(DefaultSpec::AutoInit) => return Ok(Some(field.kind().auto_init())),
                Some(DefaultSpec::Literal(literal)) => raw = Value::String(literal),
                None => {}
            }
        }
        if raw.is_null() {
            if field.directive().is_required() {
                return Err(PortalError::field(path, anyhow!("required value is missing")));
            }
            warn!(target: "portal", "cannot get value for field {path}, leaving it empty");
            return Ok(None);
        }

        if field.is_nested() {
            let value = if field.has_many() {
                self.dump_nested_many(ctx, frame, field, &path, &raw).await?
            } else {
                self.dump_nested_one(ctx, frame, field, &path, &raw).await?
            };
            return Ok(Some(value));
        }
        assign(&path, field.kind(), raw)
    }

    async fn dump_nested_one(
        &self,
        ctx: &DumpContext,
        frame: &ProjectionSchema,
        field: &FieldDescriptor,
        path: &str,
        raw: &Value,
    ) -> Result<Value> {
        let FieldKind::Nested(schema) = field.kind() else {
            return Err(PortalError::structural(format!(
                "field {path} is nested but its kind {} is not a single schema",
                field.kind()
            )));
        };
        match raw {
            Value::List(_) => {
                return Err(PortalError::structural(format!(
                    "field {path} expects one {} but the source is a list",
                    schema.name()
                )));
            }
            Value::Record(record) if record.schema().name() == schema.name() => {
                return Ok(raw.clone());
            }
            _ => {}
        }

        let child = self.child_frame(frame, field, Arc::clone(schema), ctx.depth());
        let mut record = Record::new(Arc::clone(schema));
        self.dump_into(&ctx.nested(), &child, raw, &mut record).await?;
        Ok(Value::Record(record))
    }

    async fn dump_nested_many(
        &self,
        ctx: &DumpContext,
        frame: &ProjectionSchema,
        field: &FieldDescriptor,
        path: &str,
        raw: &Value,
    ) -> Result<Value> {
        let FieldKind::NestedList(schema) = field.kind() else {
            return Err(PortalError::structural(format!(
                "field {path} is nested but its kind {} is not a list of schemas",
                field.kind()
            )));
        };
        let Value::List(items) = raw else {
            return Err(PortalError::structural(format!(
                "field {path} expects a list of {} but the source is {}",
                schema.name(),
                raw.kind_name()
            )));
        };
        if let Ok(records) = convert(raw, field.kind()) {
            return Ok(records);
        }

        let template = self.child_frame(frame, field, Arc::clone(schema), ctx.depth());
        let parallel = template.has_async_fields(self.inner.disable_concurrency);
        let records = self.dump_elements(&ctx.nested(), &template, items, parallel).await?;
        Ok(Value::List(records.into_iter().map(Value::Record).collect()))
    }

    /// Fetch the raw value of `field` as its directive prescribes.
    async fn fetch(
        &self,
        ctx: &DumpContext,
        frame: &ProjectionSchema,
        field: &FieldDescriptor,
        src: &Value,
    ) -> anyhow::Result<Value> {
        let directive = field.directive();
        let cached = frame.cache().is_enabled() && !frame.cache_disabled() && !directive.cache_disabled();

        match directive.fetch() {
            Fetch::Const(value) => Ok(Value::String(value.clone())),
            Fetch::Method { name, chain } => {
                require_object(frame, src)?;
                if name.is_empty() {
                    bail!("empty method name");
                }
                let method = frame
                    .schema()
                    .method(name)
                    .ok_or_else(|| anyhow!("method '{name}' not found in '{}'", frame.name()))?;
                let evaluate = method(ctx.clone(), src.clone());
                let identity = src.as_entity().filter(|_| cached).and_then(|e| e.cache_id());
                let value = match identity {
                    Some(id) => {
                        let key = cache_key(frame.name(), name, &id);
                        frame.cache().resolve(ctx, &key, evaluate).await?
                    }
                    None => evaluate.await?,
                };
                walk(ctx, frame, value, chain, false).await
            }
            Fetch::Attrs(chain) => {
                require_object(frame, src)?;
                walk(ctx, frame, src.clone(), chain, cached).await
            }
            Fetch::Plain => {
                require_object(frame, src)?;
                if let Some(value) = attr_of(src, field.name()) {
                    return Ok(value);
                }
                match src.as_entity() {
                    Some(entity) => entity.call(ctx, field.name()).await.unwrap_or(Ok(Value::Null)),
                    None => Ok(Value::Null),
                }
            }
        }
    }
}

/// Follow an attribute chain from `start`. Each hop reads an attribute, falling
/// back to a zero-argument method; method hops go through the cache when `cached`.
async fn walk(
    ctx: &DumpContext,
    frame: &ProjectionSchema,
    start: Value,
    chain: &[String],
    cached: bool,
) -> anyhow::Result<Value> {
    let mut current = start;
    for name in chain {
        if current.is_null() {
            return Ok(Value::Null);
        }
        if let Some(value) = attr_of(&current, name) {
            current = value;
            continue;
        }
        let Some(entity) = current.as_entity().cloned() else {
            bail!("attribute '{name}' not found in {}", current.kind_name());
        };
        let identity = if cached { entity.cache_id() } else { None };
        current = match identity {
            Some(id) => {
                let key = cache_key(entity.type_name(), name, &id);
                frame.cache().resolve(ctx, &key, invoke(ctx, &entity, name)).await?
            }
            None => invoke(ctx, &entity, name).await?,
        };
    }
    Ok(current)
}

async fn invoke(ctx: &DumpContext, entity: &Arc<dyn Entity>, name: &str) -> anyhow::Result<Value> {
    match entity.call(ctx, name).await {
        Some(result) => result.with_context(|| format!("method '{name}' of '{}' failed", entity.type_name())),
        None => Err(anyhow!("attribute or method '{name}' not found in '{}'", entity.type_name())),
    }
}

fn require_object(frame: &ProjectionSchema, src: &Value) -> anyhow::Result<()> {
    match src {
        Value::Entity(_) | Value::Map(_) | Value::Record(_) => Ok(()),
        other => bail!("source of {} must be an object, got {}", frame.name(), other.kind_name()),
    }
}

fn attr_of(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Entity(entity) => entity.attr(name),
        Value::Map(map) => map.get(name).cloned(),
        Value::Record(record) => record.get(name).cloned(),
        _ => None,
    }
}

/// Assign a non-nested raw value to a field of `kind`.
///
/// Conversion is tried first; an entity that can produce a plain value is
/// converted again; a custom kind hands the value to its setter. A value none of
/// these accept leaves the field at zero.
fn assign(path: &str, kind: &FieldKind, raw: Value) -> Result<Option<Value>> {
    let custom = matches!(kind, FieldKind::Custom(_));
    if !custom {
        if let Ok(value) = convert(&raw, kind) {
            return Ok(Some(value));
        }
    }

    let extracted = match raw.as_entity().and_then(|entity| entity.extract_value()) {
        Some(Ok(value)) => {
            if !custom {
                if let Ok(converted) = convert(&value, kind) {
                    return Ok(Some(converted));
                }
            }
            value
        }
        Some(Err(e)) => return Err(PortalError::field(path, e.context("value extraction failed"))),
        None => raw,
    };

    if let FieldKind::Custom(setter) = kind {
        return setter
            .accept(extracted)
            .map(Some)
            .map_err(|e| PortalError::field(path, e));
    }
    warn!(
        target: "portal",
        "cannot assign {} value to field {path} of kind {kind}",
        extracted.kind_name()
    );
    Ok(None)
}

/// Attach the field path to a fetch failure. Cancellation passes through as is.
fn field_error(path: &str, e: anyhow::Error) -> PortalError {
    match e.downcast::<PortalError>() {
        Ok(inner) if inner.is_cancellation() => inner,
        Ok(inner) => PortalError::field(path, anyhow::Error::new(inner)),
        Err(e) => PortalError::field(path, e),
    }
}
