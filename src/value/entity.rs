use super::Value;
use crate::dump::DumpContext;
use async_trait::async_trait;
use std::fmt::Debug;

/// A source object the orchestrator can read from.
///
/// Implementations expose named attributes and zero-argument methods. Only
/// [`Entity::type_name`] is required; the rest default to "not available".
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use portal::dump::DumpContext;
/// use portal::value::{Entity, Value};
///
/// #[derive(Debug)]
/// struct User {
///     id: i64,
/// }
///
/// #[async_trait]
/// impl Entity for User {
///     fn type_name(&self) -> &str {
///         "User"
///     }
///
///     fn attr(&self, name: &str) -> Option<Value> {
///         match name {
///             "ID" => Some(self.id.into()),
///             _ => None,
///         }
///     }
///
///     async fn call(&self, _ctx: &DumpContext, name: &str) -> Option<anyhow::Result<Value>> {
///         match name {
///             "Name" => Some(Ok(format!("user:{}", self.id).into())),
///             _ => None,
///         }
///     }
///
///     fn cache_id(&self) -> Option<String> {
///         Some(self.id.to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Entity: Debug + Send + Sync {
    /// Type name, used as the receiver part of method cache keys.
    fn type_name(&self) -> &str;

    /// Read an attribute. `None` means the entity has no such attribute.
    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Invoke a zero-argument method. `None` means the entity has no such method.
    async fn call(&self, _ctx: &DumpContext, _name: &str) -> Option<anyhow::Result<Value>> {
        None
    }

    /// Stable identity used in cache keys. Entities without one are never cached.
    fn cache_id(&self) -> Option<String> {
        None
    }

    /// Custom value extraction, tried when a value is not directly assignable to the
    /// destination field.
    fn extract_value(&self) -> Option<anyhow::Result<Value>> {
        None
    }
}

/// Custom value acceptance for fields of kind [`crate::schema::FieldKind::Custom`].
///
/// `accept` receives the raw resolved value and returns what gets stored.
pub trait ValueSetter: Debug + Send + Sync {
    fn accept(&self, value: Value) -> anyhow::Result<Value>;
}
