use crate::assert_json;
use anyhow::Result;
use chrono::{TimeZone, Utc};
use portal::dump::{DumpContext, DumpOptions};
use portal::engine::Engine;
use portal::schema::{FieldDef, FieldKind, Record, SchemaType};
use portal::test_utils::{TaskModel, task_schema};
use portal::value::{LowerString, Timestamp, UpperString, Value};
use serde_json::json;
use std::sync::Arc;

async fn dump(schema: Arc<SchemaType>, source: Value) -> Result<Record> {
    let engine = Engine::default();
    let mut record = Record::new(schema);
    engine.dump(&mut record, &source, &DumpOptions::new()).await?;
    Ok(record)
}

#[tokio::test]
async fn test_const_directive() -> Result<()> {
    let schema = SchemaType::builder("KindSchema")
        .field(FieldDef::new("Kind", FieldKind::String).tag("json", "kind").directive("const:task"))
        .build();
    let record = dump(schema, Value::from(json!({}))).await?;
    assert_json(&record, r#"{"kind":"task"}"#);
    Ok(())
}

#[tokio::test]
async fn test_default_literal_and_auto_init() -> Result<()> {
    let owner = SchemaType::builder("OwnerSchema")
        .field(FieldDef::new("Name", FieldKind::String).tag("json", "name"))
        .build();
    let schema = SchemaType::builder("ProfileSchema")
        .field(
            FieldDef::new("Nick", FieldKind::String)
                .tag("json", "nick")
                .directive("attr:Nickname;default:anon"),
        )
        .field(
            FieldDef::new("Score", FieldKind::Int)
                .tag("json", "score")
                .directive("default:42"),
        )
        .field(
            FieldDef::new("Tags", FieldKind::List(Box::new(FieldKind::String)))
                .tag("json", "tags")
                .directive("default:AUTO_INIT"),
        )
        .field(
            FieldDef::new("Owner", FieldKind::Nested(owner))
                .tag("json", "owner")
                .directive("nested;default:AUTO_INIT"),
        )
        .build();

    let source = Value::from(json!({"Nickname": null, "Score": null, "Tags": null, "Owner": null}));
    let record = dump(schema, source).await?;
    assert_json(&record, r#"{"nick":"anon","score":42,"tags":[],"owner":{"name":""}}"#);
    Ok(())
}

#[tokio::test]
async fn test_required_field_missing() {
    let schema = SchemaType::builder("StrictSchema")
        .field(FieldDef::new("Name", FieldKind::String).directive("required"))
        .build();
    let err = dump(schema, Value::from(json!({"Name": null}))).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to resolve field 'StrictSchema.Name': required value is missing"
    );
}

#[tokio::test]
async fn test_method_with_attribute_chain() -> Result<()> {
    let schema = SchemaType::builder("PostSchema")
        .field(
            FieldDef::new("AuthorName", FieldKind::String)
                .tag("json", "author_name")
                .directive("meth:GetAuthor.Profile.Name"),
        )
        .method("GetAuthor", |_ctx: DumpContext, source: Value| async move {
            let id = match &source {
                Value::Map(map) => map.get("AuthorID").cloned().unwrap_or_default(),
                _ => Value::Null,
            };
            Ok(Value::from(json!({"Profile": {"Name": format!("author:{}", id.as_int().unwrap_or_default())}})))
        })
        .build();

    let record = dump(schema, Value::from(json!({"AuthorID": 9}))).await?;
    assert_json(&record, r#"{"author_name":"author:9"}"#);
    Ok(())
}

#[tokio::test]
async fn test_null_in_chain_leaves_field_empty() -> Result<()> {
    let schema = SchemaType::builder("PostSchema")
        .field(
            FieldDef::new("AuthorName", FieldKind::String)
                .tag("json", "author_name")
                .directive("attr:Author.Name"),
        )
        .build();
    let record = dump(schema, Value::from(json!({"Author": null}))).await?;
    assert_json(&record, r#"{"author_name":""}"#);
    Ok(())
}

#[tokio::test]
async fn test_entity_method_chain() -> Result<()> {
    let schema = SchemaType::builder("TaskOwnerSchema")
        .field(
            FieldDef::new("Owner", FieldKind::String)
                .tag("json", "owner")
                .directive("attr:User.Fullname"),
        )
        .field(
            FieldDef::new("OwnerID", FieldKind::Int)
                .tag("json", "owner_id")
                .directive("attr:User.ID;async"),
        )
        .build();
    let record = dump(schema, TaskModel::new(1, 5, "t").into_value()).await?;
    assert_json(&record, r#"{"owner":"user:5","owner_id":5}"#);
    Ok(())
}

#[tokio::test]
async fn test_custom_setters() -> Result<()> {
    let schema = SchemaType::builder("EventSchema")
        .field(FieldDef::new("Code", FieldKind::Custom(Arc::new(UpperString))).tag("json", "code"))
        .field(FieldDef::new("Slug", FieldKind::Custom(Arc::new(LowerString))).tag("json", "slug"))
        .field(FieldDef::new("At", FieldKind::Custom(Arc::new(Timestamp))).tag("json", "at"))
        .build();

    let mut source = std::collections::BTreeMap::new();
    source.insert("Code".to_string(), Value::from("ab-1"));
    source.insert("Slug".to_string(), Value::from("Hello-World"));
    source.insert("At".to_string(), Value::from(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()));

    let record = dump(schema, Value::Map(source)).await?;
    assert_json(&record, r#"{"code":"AB-1","slug":"hello-world","at":1577934245}"#);
    Ok(())
}

#[tokio::test]
async fn test_any_kind_passes_values_through() -> Result<()> {
    let schema = SchemaType::builder("BlobSchema")
        .field(FieldDef::new("Data", FieldKind::Any).tag("json", "data"))
        .build();
    let record = dump(schema, Value::from(json!({"Data": {"a": [1, 2]}}))).await?;
    assert_json(&record, r#"{"data":{"a":[1,2]}}"#);
    Ok(())
}

#[tokio::test]
async fn test_null_list_elements_are_zero_filled() -> Result<()> {
    let schema = SchemaType::builder("ScoreSchema")
        .field(FieldDef::new("Scores", FieldKind::List(Box::new(FieldKind::Int))).tag("json", "scores"))
        .field(FieldDef::new("Labels", FieldKind::List(Box::new(FieldKind::String))).tag("json", "labels"))
        .build();
    let record = dump(
        schema,
        Value::from(json!({"Scores": [1, null, "3"], "Labels": [null, "b"]})),
    )
    .await?;
    assert_json(&record, r#"{"scores":[1,0,3],"labels":["","b"]}"#);
    Ok(())
}

#[tokio::test]
async fn test_custom_field_directives_override_declared_ones() -> Result<()> {
    let engine = Engine::default();
    let options = DumpOptions::new()
        .only(["Title", "Description"])
        .custom_field_directive("TaskSchema.Title", "const:hidden");

    let mut record = Record::new(task_schema());
    engine
        .dump(&mut record, &TaskModel::new(1, 1, "Finish your jobs.").into_value(), &options)
        .await?;
    assert_json(
        &record,
        r#"{"title":"hidden","description":"Custom description","unknown":""}"#,
    );
    Ok(())
}

#[tokio::test]
async fn test_embedded_schema_fields() -> Result<()> {
    let base = SchemaType::builder("BaseSchema")
        .field(FieldDef::new("ID", FieldKind::String).tag("json", "id"))
        .field(FieldDef::new("Kind", FieldKind::String).tag("json", "kind").directive("meth:GetKind"))
        .method("GetKind", |_ctx: DumpContext, _source: Value| async move { Ok(Value::from("base")) })
        .build();
    let schema = SchemaType::builder("ArticleSchema")
        .embed(&base)
        .field(FieldDef::new("Title", FieldKind::String).tag("json", "title"))
        .build();

    let record = dump(schema, Value::from(json!({"ID": 3, "Title": "hi"}))).await?;
    assert_json(&record, r#"{"id":"3","kind":"base","title":"hi"}"#);
    Ok(())
}
