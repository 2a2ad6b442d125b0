//! Task-tracker fixtures: source entities and the schemas projecting them.
//!
//! The schemas mirror a typical API layer:
//!
//! | Schema | Field | Directive |
//! |---|---|---|
//! | `TaskSchema` | `Description` | `meth:GetDescription` |
//! | `TaskSchema` | `User` | `nested;async` |
//! | `TaskSchema` | `SimpleUser` | `async;nested;only:Name;attr:User` |
//! | `UserSchema` | `Name` | `attr:Fullname` |
//! | `UserSchema` | `Notifications` | `nested;async` |
//! | `UserSchema` | `AnotherNotifications` | `nested;attr:Notifications` |

use crate::dump::DumpContext;
use crate::schema::{FieldDef, FieldKind, SchemaType};
use crate::value::{Entity, Value};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Counts entity method invocations, optionally slowing each one down.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: Arc::default(),
            delay,
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationModel {
    pub id: i64,
    pub title: String,
    pub content: String,
}

impl Entity for NotificationModel {
    fn type_name(&self) -> &str {
        "NotificationModel"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "ID" => Some(self.id.into()),
            "Title" => Some(self.title.clone().into()),
            "Content" => Some(self.content.clone().into()),
            _ => None,
        }
    }
}

/// A user whose `Fullname` and `Notifications` are methods.
#[derive(Debug, Clone)]
pub struct UserModel {
    pub id: i64,
    pub counter: CallCounter,
}

impl UserModel {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            counter: CallCounter::new(),
        }
    }
}

#[async_trait]
impl Entity for UserModel {
    fn type_name(&self) -> &str {
        "UserModel"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "ID" => Some(self.id.into()),
            _ => None,
        }
    }

    async fn call(&self, _ctx: &DumpContext, name: &str) -> Option<anyhow::Result<Value>> {
        match name {
            "Fullname" => {
                self.counter.hit().await;
                Some(Ok(format!("user:{}", self.id).into()))
            }
            "Notifications" => {
                let notifications = (0..1)
                    .map(|i| {
                        Value::entity(NotificationModel {
                            id: i,
                            title: format!("title_{i}"),
                            content: format!("content_{i}"),
                        })
                    })
                    .collect();
                Some(Ok(Value::List(notifications)))
            }
            _ => None,
        }
    }

    fn cache_id(&self) -> Option<String> {
        Some(self.id.to_string())
    }
}

/// An attribute whose value extraction always fails.
#[derive(Debug, Clone)]
pub struct ErrField;

impl Entity for ErrField {
    fn type_name(&self) -> &str {
        "ErrField"
    }

    fn extract_value(&self) -> Option<anyhow::Result<Value>> {
        Some(Err(anyhow!("err field")))
    }
}

#[derive(Debug, Clone)]
pub struct TaskModel {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    /// Shared with every user this task hands out.
    pub counter: CallCounter,
}

impl TaskModel {
    pub fn new(id: i64, user_id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            user_id,
            title: title.into(),
            counter: CallCounter::new(),
        }
    }

    pub fn with_counter(mut self, counter: CallCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn into_value(self) -> Value {
        Value::entity(self)
    }
}

#[async_trait]
impl Entity for TaskModel {
    fn type_name(&self) -> &str {
        "TaskModel"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "ID" => Some(self.id.into()),
            "UserID" => Some(self.user_id.into()),
            "Title" => Some(self.title.clone().into()),
            "ErrDescription" => Some(Value::entity(ErrField)),
            _ => None,
        }
    }

    async fn call(&self, _ctx: &DumpContext, name: &str) -> Option<anyhow::Result<Value>> {
        match name {
            "User" => Some(Ok(Value::entity(UserModel {
                id: self.user_id,
                counter: self.counter.clone(),
            }))),
            _ => None,
        }
    }

    fn cache_id(&self) -> Option<String> {
        Some(self.id.to_string())
    }
}

/// `count` tasks numbered from 0, owned by users `100 + i`.
pub fn tasks(count: i64, counter: &CallCounter) -> Value {
    Value::List(
        (0..count)
            .map(|i| {
                TaskModel::new(i, i + 100, format!("Task #{}", i + 1))
                    .with_counter(counter.clone())
                    .into_value()
            })
            .collect(),
    )
}

pub fn notification_schema() -> Arc<SchemaType> {
    SchemaType::builder("NotiSchema")
        .field(FieldDef::new("ID", FieldKind::String).tag("json", "id,omitempty"))
        .field(FieldDef::new("Title", FieldKind::String).tag("json", "title,omitempty"))
        .field(FieldDef::new("Content", FieldKind::String).tag("json", "content,omitempty"))
        .build()
}

pub fn user_schema() -> Arc<SchemaType> {
    let noti = notification_schema();
    SchemaType::builder("UserSchema")
        .field(FieldDef::new("ID", FieldKind::String).tag("json", "id,omitempty"))
        .field(
            FieldDef::new("Name", FieldKind::String)
                .tag("json", "name,omitempty")
                .directive("attr:Fullname"),
        )
        .field(
            FieldDef::new("Notifications", FieldKind::NestedList(Arc::clone(&noti)))
                .tag("json", "notifications,omitempty")
                .directive("nested;async"),
        )
        .field(
            FieldDef::new("AnotherNotifications", FieldKind::NestedList(noti))
                .tag("json", "another_notifications,omitempty")
                .directive("nested;attr:Notifications"),
        )
        .build()
}

pub fn task_schema() -> Arc<SchemaType> {
    let user = user_schema();
    SchemaType::builder("TaskSchema")
        .field(FieldDef::new("ID", FieldKind::String).tag("json", "id,omitempty"))
        .field(FieldDef::new("Title", FieldKind::String).tag("json", "title,omitempty"))
        .field(
            FieldDef::new("Description", FieldKind::String)
                .tag("json", "description,omitempty")
                .directive("meth:GetDescription"),
        )
        .field(
            FieldDef::new("User", FieldKind::Nested(Arc::clone(&user)))
                .tag("json", "user,omitempty")
                .directive("nested;async"),
        )
        .field(
            FieldDef::new("SimpleUser", FieldKind::Nested(user))
                .tag("json", "simple_user,omitempty")
                .directive("async;nested;only:Name;attr:User"),
        )
        .field(FieldDef::new("Unknown", FieldKind::String).tag("json", "unknown"))
        .method("GetDescription", |_ctx: DumpContext, _source: Value| async move {
            Ok(Value::from("Custom description"))
        })
        .build()
}
