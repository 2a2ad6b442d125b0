use crate::assert_json;
use anyhow::Result;
use portal::dump::DumpOptions;
use portal::engine::Engine;
use portal::schema::Record;
use portal::test_utils::{TaskModel, task_schema};

async fn dump(options: DumpOptions) -> Result<Record> {
    let engine = Engine::default();
    let mut record = Record::new(task_schema());
    let task = TaskModel::new(1, 1, "Finish your jobs.").into_value();
    engine.dump(&mut record, &task, &options).await?;
    Ok(record)
}

#[tokio::test]
async fn test_only_top_level() -> Result<()> {
    let record = dump(DumpOptions::new().only(["Title", "SimpleUser"])).await?;
    assert_json(
        &record,
        r#"{"title":"Finish your jobs.","simple_user":{"name":"user:1"},"unknown":""}"#,
    );
    Ok(())
}

#[tokio::test]
async fn test_only_nested_paths() -> Result<()> {
    let options = DumpOptions::new().only([
        "ID",
        "User[ID,Notifications[ID],AnotherNotifications[Title]]",
        "SimpleUser",
    ]);
    let record = dump(options).await?;
    assert_json(
        &record,
        r#"{
            "id": "1",
            "user": {
                "id": "1",
                "notifications": [{"id": "0"}],
                "another_notifications": [{"title": "title_0"}]
            },
            "simple_user": {"name": "user:1"},
            "unknown": ""
        }"#,
    );
    Ok(())
}

#[tokio::test]
async fn test_only_by_alias() -> Result<()> {
    let options = DumpOptions::new()
        .only(["title", "simple_user"])
        .field_alias_convention("json");
    let record = dump(options).await?;
    assert_json(
        &record,
        r#"{"title":"Finish your jobs.","simple_user":{"name":"user:1"},"unknown":""}"#,
    );
    Ok(())
}

#[tokio::test]
async fn test_nested_alias_selector() -> Result<()> {
    let record = dump(DumpOptions::new().only(["user[name]"])).await?;
    assert_json(&record, r#"{"user":{"name":"user:1"},"unknown":""}"#);
    Ok(())
}

#[tokio::test]
async fn test_selector_overrides_directive_only() -> Result<()> {
    let record = dump(DumpOptions::new().only(["SimpleUser[ID]"])).await?;
    assert_json(&record, r#"{"simple_user":{"id":"1"},"unknown":""}"#);
    Ok(())
}

#[tokio::test]
async fn test_exclude_leaves_at_every_depth() -> Result<()> {
    let options = DumpOptions::new().exclude([
        "Description",
        "ID",
        "User[Name,Notifications[ID,Content],AnotherNotifications], SimpleUser",
    ]);
    let record = dump(options).await?;
    assert_json(
        &record,
        r#"{"title":"Finish your jobs.","user":{"id":"1","notifications":[{"title":"title_0"}]},"unknown":""}"#,
    );
    Ok(())
}

#[tokio::test]
async fn test_only_and_exclude_combined() -> Result<()> {
    let options = DumpOptions::new()
        .only(["ID", "Title", "User[ID,Name]"])
        .exclude(["Title", "User[ID]"]);
    let record = dump(options).await?;
    assert_json(&record, r#"{"id":"1","user":{"name":"user:1"},"unknown":""}"#);
    Ok(())
}

#[tokio::test]
async fn test_unknown_names_are_ignored() -> Result<()> {
    let record = dump(DumpOptions::new().only(["Title", "Nope[Deeper]"])).await?;
    assert_json(&record, r#"{"title":"Finish your jobs.","unknown":""}"#);
    Ok(())
}
