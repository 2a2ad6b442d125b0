use anyhow::Result;
use portal::config::EngineConfig;
use portal::dump::DumpOptions;
use portal::engine::Engine;
use portal::test_utils::{CallCounter, task_schema, tasks};
use portal::value::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_large_collection_keeps_positions() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = Engine::default();
    let counter = CallCounter::new();

    let start = Instant::now();
    let records = engine
        .dump_many(&task_schema(), &tasks(2_000, &counter), &DumpOptions::new().only(["ID", "User[ID]"]))
        .await?;
    println!("2000 tasks dumped in {:?}", start.elapsed());

    assert_eq!(records.len(), 2_000);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.get("ID"), Some(&Value::from(i.to_string())));
        let user = record.get("User").and_then(Value::as_record).expect("user");
        assert_eq!(user.get("ID"), Some(&Value::from((i + 100).to_string())));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_methods_overlap() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = Engine::default();
    let counter = CallCounter::with_delay(Duration::from_millis(20));

    let start = Instant::now();
    let records = engine
        .dump_many(&task_schema(), &tasks(100, &counter), &DumpOptions::new().only(["User[Name]"]))
        .await?;
    println!("100 tasks with 20ms methods dumped in {:?}", start.elapsed());

    assert_eq!(records.len(), 100);
    assert_eq!(counter.count(), 100);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resizing_pool_while_dumping() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = Arc::new(Engine::new(EngineConfig {
        max_pool_size: 4,
        ..EngineConfig::default()
    }));
    let counter = CallCounter::with_delay(Duration::from_millis(2));

    let resizer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for size in [1, 16, 2, 64, 1, 8] {
                engine.set_max_pool_size(size);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    };

    let records = tokio::time::timeout(
        Duration::from_secs(30),
        engine.dump_many(&task_schema(), &tasks(200, &counter), &DumpOptions::new()),
    )
    .await
    .expect("resizing must not strand jobs")?;
    resizer.await?;

    assert_eq!(records.len(), 200);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.get("Title"), Some(&Value::from(format!("Task #{}", i + 1))));
    }
    assert_eq!(engine.scheduler().capacity(), 8);
    Ok(())
}
