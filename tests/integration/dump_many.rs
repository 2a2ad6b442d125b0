use crate::assert_json;
use anyhow::Result;
use portal::core::PortalError;
use portal::dump::DumpOptions;
use portal::engine::Engine;
use portal::schema::Record;
use portal::test_utils::{CallCounter, TaskModel, task_schema, tasks};
use portal::value::Value;

const TWO_TASKS: &str = r#"[
    {"id": "0", "title": "Task #1", "user": {"name": "user:100"}, "unknown": ""},
    {"id": "1", "title": "Task #2", "user": {"name": "user:101"}, "unknown": ""}
]"#;

#[tokio::test]
async fn test_dump_many() -> Result<()> {
    let engine = Engine::default();
    let options = DumpOptions::new().only(["ID", "Title", "User[Name]"]);

    let records = engine
        .dump_many(&task_schema(), &tasks(2, &CallCounter::new()), &options)
        .await?;
    assert_json(&records, TWO_TASKS);
    Ok(())
}

#[tokio::test]
async fn test_dump_many_without_concurrency() -> Result<()> {
    let engine = Engine::default();
    let options = DumpOptions::new()
        .only(["ID", "Title", "User[Name]"])
        .disable_concurrency();

    let records = engine
        .dump_many(&task_schema(), &tasks(2, &CallCounter::new()), &options)
        .await?;
    assert_json(&records, TWO_TASKS);
    Ok(())
}

#[tokio::test]
async fn test_dump_many_keeps_positions() -> Result<()> {
    let engine = Engine::default();
    let options = DumpOptions::new().only(["ID"]);

    let records = engine
        .dump_many(&task_schema(), &tasks(50, &CallCounter::new()), &options)
        .await?;
    let ids: Vec<Value> = records.iter().map(|r| r.get("ID").cloned().unwrap_or_default()).collect();
    let expected: Vec<Value> = (0..50).map(|i: i64| Value::from(i.to_string())).collect();
    assert_eq!(ids, expected);
    Ok(())
}

#[tokio::test]
async fn test_dump_many_empty_list() -> Result<()> {
    let engine = Engine::default();
    let records = engine
        .dump_many(&task_schema(), &Value::List(Vec::new()), &DumpOptions::new())
        .await?;
    assert!(records.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_dump_many_requires_a_list() {
    let engine = Engine::default();
    let single = TaskModel::new(1, 1, "one").into_value();
    let err = engine
        .dump_many(&task_schema(), &single, &DumpOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Structural { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_dump_one_rejects_a_list() {
    let engine = Engine::default();
    let mut record = Record::new(task_schema());
    let err = engine
        .dump(&mut record, &tasks(2, &CallCounter::new()), &DumpOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Structural { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_reusable_dumper() -> Result<()> {
    let engine = Engine::default();
    let dumper = engine.dumper(&DumpOptions::new().only(["ID", "Title", "User[Name]"]))?;
    let ctx = portal::dump::DumpContext::new();

    for _ in 0..2 {
        let records = dumper
            .dump_many(&ctx, &task_schema(), &tasks(2, &CallCounter::new()))
            .await?;
        assert_json(&records, TWO_TASKS);
    }
    Ok(())
}
