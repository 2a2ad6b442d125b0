use crate::assert_json;
use anyhow::Result;
use portal::dump::DumpOptions;
use portal::engine::Engine;
use portal::schema::{FieldDef, FieldKind, Record, SchemaType};
use portal::test_utils::{TaskModel, init_test_logging, task_schema};
use portal::value::Value;
use std::collections::BTreeMap;

const FULL_TASK: &str = r#"{
    "id": "1",
    "title": "Finish your jobs.",
    "description": "Custom description",
    "user": {
        "id": "1",
        "name": "user:1",
        "notifications": [{"id": "0", "title": "title_0", "content": "content_0"}],
        "another_notifications": [{"id": "0", "title": "title_0", "content": "content_0"}]
    },
    "simple_user": {"name": "user:1"},
    "unknown": ""
}"#;

fn task() -> Value {
    TaskModel::new(1, 1, "Finish your jobs.").into_value()
}

#[tokio::test]
async fn test_dump_one_with_all_fields() -> Result<()> {
    init_test_logging(None);
    let engine = Engine::default();

    let mut record = Record::new(task_schema());
    engine.dump(&mut record, &task(), &DumpOptions::new()).await?;

    assert_json(&record, FULL_TASK);
    Ok(())
}

#[tokio::test]
async fn test_dump_one_without_concurrency() -> Result<()> {
    let engine = Engine::default();

    let mut record = Record::new(task_schema());
    engine
        .dump(&mut record, &task(), &DumpOptions::new().disable_concurrency())
        .await?;

    assert_json(&record, FULL_TASK);
    assert_eq!(engine.scheduler().levels(), 0, "no job reached the scheduler");
    Ok(())
}

#[tokio::test]
async fn test_dump_is_repeatable_on_one_engine() -> Result<()> {
    let engine = Engine::default();
    for _ in 0..3 {
        let mut record = Record::new(task_schema());
        engine.dump(&mut record, &task(), &DumpOptions::new()).await?;
        assert_json(&record, FULL_TASK);
    }
    Ok(())
}

#[tokio::test]
async fn test_nested_values_are_records() -> Result<()> {
    let engine = Engine::default();
    let mut record = Record::new(task_schema());
    engine.dump(&mut record, &task(), &DumpOptions::new()).await?;

    let user = record.get("User").and_then(Value::as_record).expect("user record");
    assert_eq!(user.schema().name(), "UserSchema");
    assert_eq!(user.get("Name"), Some(&Value::from("user:1")));

    let notifications = user.get("Notifications").and_then(Value::as_list).expect("notifications");
    assert_eq!(notifications.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_map_sources() -> Result<()> {
    let engine = Engine::default();
    let profile = SchemaType::builder("ProfileSchema")
        .field(FieldDef::new("City", FieldKind::String).tag("json", "city"))
        .build();
    let person = SchemaType::builder("PersonSchema")
        .field(FieldDef::new("Name", FieldKind::String).tag("json", "name"))
        .field(FieldDef::new("Age", FieldKind::Int).tag("json", "age"))
        .field(FieldDef::new("Profile", FieldKind::Nested(profile)).tag("json", "profile").directive("nested"))
        .build();

    let source = Value::from(serde_json::json!({
        "Name": "Ada",
        "Age": "36",
        "Profile": {"City": "London"}
    }));
    let mut record = Record::new(person);
    engine.dump(&mut record, &source, &DumpOptions::new()).await?;

    assert_json(&record, r#"{"name":"Ada","age":36,"profile":{"city":"London"}}"#);
    Ok(())
}

#[tokio::test]
async fn test_record_source_is_assigned_directly() -> Result<()> {
    let engine = Engine::default();
    let inner = SchemaType::builder("Inner")
        .field(FieldDef::new("X", FieldKind::Int))
        .build();
    let outer = SchemaType::builder("Outer")
        .field(FieldDef::new("In", FieldKind::Nested(inner.clone())).directive("nested"))
        .build();

    let mut prepared = Record::new(inner);
    prepared.set("X", Value::Int(7));
    let source = Value::Map(BTreeMap::from([("In".to_string(), Value::Record(prepared.clone()))]));

    let mut record = Record::new(outer);
    engine.dump(&mut record, &source, &DumpOptions::new()).await?;
    assert_eq!(record.get("In"), Some(&Value::Record(prepared)));
    Ok(())
}
