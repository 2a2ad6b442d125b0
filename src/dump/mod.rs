//! The dump orchestrator.
//!
//! A [`Dumper`] populates [`Record`]s from source values by following each field's
//! directive. One dump walks the schema tree top-down:
//!
//! 1. The frame's available fields are split into *sync* fields, resolved in
//!    declaration order on the calling task, and *async* fields, resolved as one
//!    scheduler job each.
//! 2. Each field's raw value is fetched (constant, schema method, attribute chain or
//!    plain attribute), defaulted when missing, then either assigned through the
//!    conversion protocol or, for `nested` fields, dumped recursively into a child
//!    record (or a list of them).
//! 3. Async results are committed only after the whole batch succeeded.
//!
//! The first error aborts the dump. There is no rollback: a record whose dump
//! failed may be partially written and must be discarded.
//!
//! # Selectors
//!
//! Only/Exclude selectors are parsed once per dumper. Each frame remembers its
//! position in both selector forests; a nested field's frame moves to the selector
//! node matching the field's name or alias. When the selector says nothing about a
//! nested field, the field directive's own `only:`/`exclude:` lists apply.

mod context;
mod options;
mod resolve;

pub use context::DumpContext;
pub use options::DumpOptions;

use crate::cache::CacheGroup;
use crate::core::{PortalError, Result};
use crate::scheduler::{Job, Scheduler};
use crate::schema::{FieldDescriptor, ProjectionSchema, Record, SchemaType};
use crate::selector::{Cursor, FilterForest, parse_filters};
use crate::value::Value;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Reusable dump configuration: parsed selectors, switches and shared resources.
///
/// Obtained from [`Engine::dumper`](crate::engine::Engine::dumper). Cloning is
/// cheap.
#[derive(Debug, Clone)]
pub struct Dumper {
    inner: Arc<DumperInner>,
}

#[derive(Debug)]
struct DumperInner {
    scheduler: Arc<Scheduler>,
    cache: CacheGroup,
    only: Option<Arc<FilterForest>>,
    exclude: Option<Arc<FilterForest>>,
    convention: Arc<str>,
    disable_concurrency: bool,
    overrides: HashMap<String, String>,
}

impl Dumper {
    /// Parse `options` into a dumper.
    ///
    /// # Errors
    ///
    /// [`PortalError::Selector`] when an Only/Exclude selector is malformed.
    pub(crate) fn new(
        scheduler: Arc<Scheduler>,
        cache: CacheGroup,
        options: &DumpOptions,
        default_convention: &str,
        disable_concurrency: bool,
    ) -> Result<Self> {
        let only = parse_selector(options.only_filters())?;
        let exclude = parse_selector(options.exclude_filters())?;
        let convention = options.alias_convention().unwrap_or(default_convention);

        Ok(Self {
            inner: Arc::new(DumperInner {
                scheduler,
                cache,
                only,
                exclude,
                convention: Arc::from(convention),
                disable_concurrency: disable_concurrency || options.is_concurrency_disabled(),
                overrides: options.field_directives().clone(),
            }),
        })
    }

    /// Whether every field is resolved inline.
    pub fn is_concurrency_disabled(&self) -> bool {
        self.inner.disable_concurrency
    }

    /// Whether method results go through a cache store.
    pub fn is_cache_enabled(&self) -> bool {
        self.inner.cache.is_enabled()
    }

    /// Populate `dst` from `src`.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Structural`] if `src` is a list
    /// - [`PortalError::FieldResolution`] if a field cannot be resolved
    /// - [`PortalError::Cancelled`] / [`PortalError::DeadlineExceeded`]
    pub async fn dump(&self, ctx: &DumpContext, dst: &mut Record, src: &Value) -> Result<()> {
        if let Value::List(_) = src {
            return Err(PortalError::structural(format!(
                "cannot dump a list into a single {} record, use dump_many",
                dst.schema().name()
            )));
        }
        let frame = self.root_frame(Arc::clone(dst.schema()));
        with_deadline(ctx, self.dump_into(ctx, &frame, src, dst)).await
    }

    /// Populate one record of `schema` per element of the list `src`, keeping
    /// positions.
    ///
    /// # Errors
    ///
    /// [`PortalError::Structural`] if `src` is not a list; otherwise as [`Dumper::dump`].
    pub async fn dump_many(&self, ctx: &DumpContext, schema: &Arc<SchemaType>, src: &Value) -> Result<Vec<Record>> {
        let Value::List(items) = src else {
            return Err(PortalError::structural(format!(
                "dump_many into {} expects a list source, got {}",
                schema.name(),
                src.kind_name()
            )));
        };
        let template = self.root_frame(Arc::clone(schema));
        let parallel = !self.inner.disable_concurrency;
        with_deadline(ctx, self.dump_elements(ctx, &template, items, parallel)).await
    }

    fn root_frame(&self, schema: Arc<SchemaType>) -> ProjectionSchema {
        let mut frame = ProjectionSchema::new(
            schema,
            Arc::clone(&self.inner.convention),
            self.inner.cache.clone(),
        )
        .with_overrides(&self.inner.overrides);

        if let Some(only) = &self.inner.only {
            frame.set_only(&only.names_at(Cursor::Root, 0, false));
        }
        if let Some(exclude) = &self.inner.exclude {
            frame.set_exclude(&exclude.names_at(Cursor::Root, 0, true));
        }
        frame
    }

    /// Frame for the schema behind a nested field of `parent`, which sits at `depth`.
    fn child_frame(
        &self,
        parent: &ProjectionSchema,
        field: &FieldDescriptor,
        schema: Arc<SchemaType>,
        depth: usize,
    ) -> ProjectionSchema {
        let mut frame = parent.child(field, schema).with_overrides(&self.inner.overrides);
        let alias = field.alias(parent.convention());
        let alias = alias.as_deref();

        let (only_cursor, mut only) = match &self.inner.only {
            Some(forest) => {
                let cursor = forest.descend(parent.only_cursor, depth, field.name(), alias);
                (cursor, forest.names_at(cursor, depth + 1, false))
            }
            None => (Cursor::Detached, Vec::new()),
        };
        let (exclude_cursor, mut exclude) = match &self.inner.exclude {
            Some(forest) => {
                let cursor = forest.descend(parent.exclude_cursor, depth, field.name(), alias);
                (cursor, forest.names_at(cursor, depth + 1, true))
            }
            None => (Cursor::Detached, Vec::new()),
        };
        if only.is_empty() {
            only = field.directive().only_names();
        }
        if exclude.is_empty() {
            exclude = field.directive().exclude_names();
        }

        frame.only_cursor = only_cursor;
        frame.exclude_cursor = exclude_cursor;
        frame.set_only(&only);
        frame.set_exclude(&exclude);
        frame
    }

    fn dump_into<'a>(
        &'a self,
        ctx: &'a DumpContext,
        frame: &'a ProjectionSchema,
        src: &'a Value,
        dst: &'a mut Record,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            ctx.check()?;
            let disable_concurrency = self.inner.disable_concurrency;

            debug!(target: "portal", "dump sync fields of {}", frame.path());
            for field in frame.sync_fields(disable_concurrency) {
                if let Some(value) = self.resolve_field(ctx, frame, &field, src).await? {
                    dst.set_at(field.index(), value);
                }
            }

            let async_fields = frame.async_fields(disable_concurrency);
            if async_fields.is_empty() {
                return Ok(());
            }

            debug!(target: "portal", "dump {} async fields of {}", async_fields.len(), frame.path());
            let shared = Arc::new(frame.clone());
            let jobs = async_fields
                .iter()
                .map(|field| {
                    let dumper = self.clone();
                    let frame = Arc::clone(&shared);
                    let field = Arc::clone(field);
                    let src = src.clone();
                    Job::new(frame.field_path(&field), move |ctx: DumpContext| async move {
                        dumper.resolve_field(&ctx, &frame, &field, &src).await
                    })
                })
                .collect();

            let values = self.inner.scheduler.submit(ctx, jobs).await?;
            for (field, value) in async_fields.iter().zip(values) {
                if let Some(value) = value {
                    dst.set_at(field.index(), value);
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Dump every element of `items` with `template`, in parallel when `parallel`.
    async fn dump_elements(
        &self,
        ctx: &DumpContext,
        template: &ProjectionSchema,
        items: &[Value],
        parallel: bool,
    ) -> Result<Vec<Record>> {
        if !parallel || items.len() < 2 {
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                let mut record = Record::new(Arc::clone(template.schema()));
                self.dump_into(ctx, template, item, &mut record).await?;
                records.push(record);
            }
            return Ok(records);
        }

        let shared = Arc::new(template.clone());
        let jobs = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let dumper = self.clone();
                let frame = Arc::clone(&shared);
                let item = item.clone();
                Job::new(format!("{}[{index}]", frame.path()), move |ctx: DumpContext| async move {
                    let mut record = Record::new(Arc::clone(frame.schema()));
                    dumper.dump_into(&ctx, &frame, &item, &mut record).await?;
                    Ok(record)
                })
            })
            .collect();
        self.inner.scheduler.submit(ctx, jobs).await
    }
}

fn parse_selector(filters: &[String]) -> Result<Option<Arc<FilterForest>>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let forest = parse_filters(filters)?;
    Ok((!forest.is_empty()).then_some(forest))
}

async fn with_deadline<T>(ctx: &DumpContext, work: impl Future<Output = Result<T>>) -> Result<T> {
    match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, work)
            .await
            .map_err(|_| PortalError::DeadlineExceeded)?,
        None => work.await,
    }
}
