use anyhow::Result;
use portal::config::EngineConfig;
use portal::dump::{DumpContext, DumpOptions};
use portal::engine::Engine;
use portal::schema::{FieldDef, FieldKind, Record, SchemaType};
use portal::test_utils::{CallCounter, task_schema, tasks};
use portal::value::Value;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn tiny_engine() -> Engine {
    Engine::new(EngineConfig {
        max_pool_size: 1,
        ..EngineConfig::default()
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_worker_completes_nested_async_fields() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = tiny_engine();
    let start = Instant::now();
    let records = tokio::time::timeout(
        Duration::from_secs(30),
        engine.dump_many(&task_schema(), &tasks(40, &CallCounter::new()), &DumpOptions::new()),
    )
    .await
    .expect("dump with one worker must not deadlock")?;
    println!("40 tasks with capacity 1 dumped in {:?}", start.elapsed());

    assert_eq!(records.len(), 40);
    for (i, record) in records.iter().enumerate() {
        let user = record.get("User").and_then(Value::as_record).expect("user");
        assert_eq!(user.get("Name"), Some(&Value::from(format!("user:{}", i + 100))));
        assert_eq!(user.get("Notifications").and_then(Value::as_list).map(<[Value]>::len), Some(1));
    }
    Ok(())
}

/// `Node{N}` has an async `Value` method field and an async nested `Child` of `Node{N-1}`.
fn chain(depth: usize) -> Arc<SchemaType> {
    let mut schema = SchemaType::builder("Node0")
        .field(FieldDef::new("Value", FieldKind::Int).directive("meth:Double;async"))
        .method("Double", double)
        .build();
    for level in 1..=depth {
        schema = SchemaType::builder(format!("Node{level}"))
            .field(FieldDef::new("Value", FieldKind::Int).directive("meth:Double;async"))
            .field(FieldDef::new("Child", FieldKind::Nested(schema)).directive("nested;async"))
            .method("Double", double)
            .build();
    }
    schema
}

async fn double(_ctx: DumpContext, source: Value) -> anyhow::Result<Value> {
    let value = match &source {
        Value::Map(map) => map.get("N").and_then(Value::as_int).unwrap_or_default(),
        _ => 0,
    };
    tokio::task::yield_now().await;
    Ok(Value::Int(value * 2))
}

fn source(depth: i64) -> Value {
    let mut node = json!({"N": 0});
    for level in 1..=depth {
        node = json!({"N": level, "Child": node});
    }
    Value::from(node)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deep_async_chain_with_single_worker() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    const DEPTH: usize = 12;
    let engine = tiny_engine();
    let mut record = Record::new(chain(DEPTH));

    tokio::time::timeout(
        Duration::from_secs(30),
        engine.dump(&mut record, &source(DEPTH as i64), &DumpOptions::new()),
    )
    .await
    .expect("deep nesting must not deadlock")?;

    let mut current = record;
    for level in (1..=DEPTH as i64).rev() {
        assert_eq!(current.get("Value"), Some(&Value::Int(level * 2)));
        current = current
            .get("Child")
            .and_then(Value::as_record)
            .cloned()
            .expect("child record");
    }
    assert_eq!(current.get("Value"), Some(&Value::Int(0)));
    assert!(engine.scheduler().levels() > DEPTH);
    Ok(())
}
