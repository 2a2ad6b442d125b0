//! Projection schemas.
//!
//! A [`SchemaType`] describes the shape of a destination record: its ordered fields,
//! each with a [`FieldKind`], naming tags and a [`Directive`], plus named schema
//! methods that compute values from the source. Schemas are registered once, up front,
//! with [`SchemaType::builder`]:
//!
//! ```rust
//! use portal::schema::{FieldDef, FieldKind, SchemaType};
//! use portal::value::Value;
//!
//! let user = SchemaType::builder("UserSchema")
//!     .field(FieldDef::new("ID", FieldKind::String).tag("json", "id,omitempty"))
//!     .field(FieldDef::new("Name", FieldKind::String).directive("meth:GetName"))
//!     .method("GetName", |_ctx, _source| async move { Ok(Value::from("user:1")) })
//!     .build();
//!
//! let task = SchemaType::builder("TaskSchema")
//!     .field(FieldDef::new("Title", FieldKind::String).tag("json", "title"))
//!     .field(FieldDef::new("User", FieldKind::Nested(user)).directive("nested;async"))
//!     .build();
//!
//! assert_eq!(task.fields().len(), 2);
//! ```
//!
//! During a dump each schema is viewed through a per-call [`ProjectionSchema`] frame
//! and populated into a [`Record`].

pub mod directive;
pub mod frame;
pub mod record;

pub use directive::{DefaultSpec, Directive, Fetch, parse_alias};
pub use frame::ProjectionSchema;
pub use record::Record;

use crate::dump::DumpContext;
use crate::value::{Value, ValueSetter};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A schema method: computes a value from the source being dumped.
pub type SchemaMethod =
    Arc<dyn Fn(DumpContext, Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Kind of a destination field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    String,
    Time,
    /// Accepts any value unchanged
    Any,
    List(Box<FieldKind>),
    Map(Box<FieldKind>),
    /// A single nested record
    Nested(Arc<SchemaType>),
    /// A list of nested records
    NestedList(Arc<SchemaType>),
    /// A value accepted through a custom setter
    Custom(Arc<dyn ValueSetter>),
}

impl FieldKind {
    /// Value a fresh record holds for this kind.
    pub fn zero(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::String => Value::String(String::new()),
            _ => Value::Null,
        }
    }

    /// Value assigned by `default:AUTO_INIT`.
    pub fn auto_init(&self) -> Value {
        match self {
            Self::Nested(schema) => Value::Record(Record::new(Arc::clone(schema))),
            Self::List(_) | Self::NestedList(_) => Value::List(Vec::new()),
            Self::Map(_) => Value::Map(BTreeMap::new()),
            other => other.zero(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::NestedList(_))
    }

    /// Schema of a nested kind.
    pub fn nested_schema(&self) -> Option<&Arc<SchemaType>> {
        match self {
            Self::Nested(schema) | Self::NestedList(schema) => Some(schema),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::Time => f.write_str("time"),
            Self::Any => f.write_str("any"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Map(inner) => write!(f, "map<{inner}>"),
            Self::Nested(schema) => f.write_str(schema.name()),
            Self::NestedList(schema) => write!(f, "list<{}>", schema.name()),
            Self::Custom(_) => f.write_str("custom"),
        }
    }
}

/// Declaration of one field, consumed by [`SchemaBuilder::field`].
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    kind: FieldKind,
    tags: BTreeMap<String, String>,
    directive: String,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tags: BTreeMap::new(),
            directive: String::new(),
        }
    }

    /// Attach a naming tag, e.g. `tag("json", "user_id,omitempty")`.
    pub fn tag(mut self, convention: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(convention.into(), value.into());
        self
    }

    /// Attach the directive string.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }
}

/// A registered field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    index: usize,
    kind: FieldKind,
    tags: BTreeMap<String, String>,
    directive: Arc<Directive>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the field in its schema and in every record of that schema.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    pub fn tag(&self, convention: &str) -> Option<&str> {
        self.tags.get(convention).map(String::as_str)
    }

    /// Alias under the given naming convention.
    pub fn alias(&self, convention: &str) -> Option<String> {
        self.tag(convention).and_then(parse_alias)
    }

    pub fn is_nested(&self) -> bool {
        self.directive.is_nested()
    }

    pub fn has_many(&self) -> bool {
        self.kind.is_collection()
    }

    /// Copy of this descriptor using another directive string.
    pub fn with_directive(&self, directive: &str) -> Self {
        Self {
            directive: Directive::parse(directive),
            ..self.clone()
        }
    }
}

/// A destination shape.
pub struct SchemaType {
    name: String,
    fields: Vec<Arc<FieldDescriptor>>,
    methods: HashMap<String, SchemaMethod>,
    cache_disabled: bool,
}

impl SchemaType {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            methods: HashMap::new(),
            cache_disabled: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&SchemaMethod> {
        self.methods.get(name)
    }

    /// Whether the schema opted out of method caching.
    pub fn cache_disabled(&self) -> bool {
        self.cache_disabled
    }
}

impl fmt::Debug for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(|field| field.name()).collect();
        let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("SchemaType")
            .field("name", &self.name)
            .field("fields", &fields)
            .field("methods", &methods)
            .field("cache_disabled", &self.cache_disabled)
            .finish()
    }
}

/// Builder returned by [`SchemaType::builder`].
pub struct SchemaBuilder {
    name: String,
    // (definition, promoted from an embedded schema)
    fields: Vec<(FieldDef, bool)>,
    methods: HashMap<String, SchemaMethod>,
    cache_disabled: bool,
}

impl SchemaBuilder {
    /// Declare a field. Redeclaring a name replaces the earlier declaration in place.
    pub fn field(mut self, def: FieldDef) -> Self {
        match self.fields.iter_mut().find(|(existing, promoted)| !promoted && existing.name == def.name) {
            Some(slot) => slot.0 = def,
            None => self.fields.push((def, false)),
        }
        self
    }

    /// Register a schema method.
    pub fn method<F, Fut>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(DumpContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let wrapped: SchemaMethod =
            Arc::new(move |ctx: DumpContext, source: Value| method(ctx, source).boxed());
        self.methods.insert(name.into(), wrapped);
        self
    }

    /// Promote the fields and methods of another schema into this one.
    ///
    /// Fields and methods declared directly on this schema shadow promoted ones.
    pub fn embed(mut self, other: &SchemaType) -> Self {
        for field in &other.fields {
            let def = FieldDef {
                name: field.name.clone(),
                kind: field.kind.clone(),
                tags: field.tags.clone(),
                directive: field.directive.source().to_string(),
            };
            self.fields.push((def, true));
        }
        for (name, method) in &other.methods {
            self.methods
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(method));
        }
        self
    }

    /// Opt this schema out of method caching.
    pub fn disable_cache(mut self) -> Self {
        self.cache_disabled = true;
        self
    }

    pub fn build(self) -> Arc<SchemaType> {
        let declared: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, promoted)| !promoted)
            .map(|(def, _)| def.name.clone())
            .collect();

        let mut fields: Vec<Arc<FieldDescriptor>> = Vec::with_capacity(self.fields.len());
        for (def, promoted) in self.fields {
            let shadowed = promoted
                && (declared.contains(&def.name) || fields.iter().any(|f| f.name == def.name));
            if shadowed {
                continue;
            }
            fields.push(Arc::new(FieldDescriptor {
                directive: Directive::parse(&def.directive),
                index: fields.len(),
                name: def.name,
                kind: def.kind,
                tags: def.tags,
            }));
        }

        Arc::new(SchemaType {
            name: self.name,
            fields,
            methods: self.methods,
            cache_disabled: self.cache_disabled,
        })
    }
}
