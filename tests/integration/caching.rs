use anyhow::Result;
use async_trait::async_trait;
use portal::cache::{CacheStore, LruStore};
use portal::config::EngineConfig;
use portal::dump::{DumpContext, DumpOptions};
use portal::engine::Engine;
use portal::schema::{FieldDef, FieldKind, Record, SchemaType};
use portal::test_utils::{CallCounter, TaskModel, task_schema};
use portal::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn cached_engine() -> Engine {
    let mut config = EngineConfig::default();
    config.cache.enabled = true;
    Engine::new(config)
}

/// `count` tasks that all belong to user 1 and share `counter`.
fn same_user_tasks(count: i64, counter: &CallCounter) -> Value {
    Value::List(
        (0..count)
            .map(|i| {
                TaskModel::new(i, 1, format!("Task #{i}"))
                    .with_counter(counter.clone())
                    .into_value()
            })
            .collect(),
    )
}

async fn dump_user_names(engine: &Engine, counter: &CallCounter, options: DumpOptions) -> Result<Vec<Record>> {
    let options = options.only(["User[Name]"]);
    Ok(engine
        .dump_many(&task_schema(), &same_user_tasks(8, counter), &options)
        .await?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_method_is_evaluated_once() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = cached_engine();
    let counter = CallCounter::with_delay(Duration::from_millis(30));

    let records = dump_user_names(&engine, &counter, DumpOptions::new()).await?;
    assert_eq!(records.len(), 8);
    assert_eq!(counter.count(), 1);
    assert!(engine.in_flight().is_empty());

    dump_user_names(&engine, &counter, DumpOptions::new()).await?;
    assert_eq!(counter.count(), 1, "second dump is served from the store");
    Ok(())
}

#[tokio::test]
async fn test_cache_is_off_by_default() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = Engine::default();
    let counter = CallCounter::new();
    dump_user_names(&engine, &counter, DumpOptions::new()).await?;
    assert_eq!(counter.count(), 8);
    Ok(())
}

#[tokio::test]
async fn test_per_call_and_engine_switches() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = cached_engine();

    let counter = CallCounter::new();
    dump_user_names(&engine, &counter, DumpOptions::new().disable_cache()).await?;
    assert_eq!(counter.count(), 8);

    engine.disable_cache();
    let counter = CallCounter::new();
    dump_user_names(&engine, &counter, DumpOptions::new()).await?;
    assert_eq!(counter.count(), 8);

    engine.enable_cache();
    let counter = CallCounter::new();
    dump_user_names(&engine, &counter, DumpOptions::new().disable_concurrency()).await?;
    assert_eq!(counter.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_field_directive_disables_cache() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = cached_engine();
    let counter = CallCounter::new();
    let options = DumpOptions::new().custom_field_directive("UserSchema.Name", "attr:Fullname;disablecache");
    dump_user_names(&engine, &counter, options).await?;
    assert_eq!(counter.count(), 8);
    Ok(())
}

fn counted_schema(calls: &Arc<AtomicUsize>, cache_disabled: bool) -> Arc<SchemaType> {
    let calls = Arc::clone(calls);
    let builder = SchemaType::builder(if cache_disabled { "UncachedSchema" } else { "CountedSchema" })
        .field(FieldDef::new("Total", FieldKind::Int).directive("meth:Compute"))
        .method("Compute", move |_ctx: DumpContext, _source: Value| {
            let calls = Arc::clone(&calls);
            async move { Ok(Value::Int(calls.fetch_add(1, Ordering::SeqCst) as i64 + 1)) }
        });
    if cache_disabled {
        builder.disable_cache().build()
    } else {
        builder.build()
    }
}

#[tokio::test]
async fn test_schema_methods_are_cached_by_source_identity() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = cached_engine();
    let calls = Arc::new(AtomicUsize::new(0));
    let schema = counted_schema(&calls, false);

    for _ in 0..3 {
        let mut record = Record::new(Arc::clone(&schema));
        engine
            .dump(&mut record, &TaskModel::new(7, 1, "t").into_value(), &DumpOptions::new())
            .await?;
        assert_eq!(record.get("Total"), Some(&Value::Int(1)));
    }
    let mut record = Record::new(Arc::clone(&schema));
    engine
        .dump(&mut record, &TaskModel::new(8, 1, "t").into_value(), &DumpOptions::new())
        .await?;
    assert_eq!(calls.load(Ordering::SeqCst), 2, "a new identity is a new key");
    Ok(())
}

#[tokio::test]
async fn test_schema_can_opt_out_of_caching() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = cached_engine();
    let calls = Arc::new(AtomicUsize::new(0));
    let schema = counted_schema(&calls, true);

    for _ in 0..3 {
        let mut record = Record::new(Arc::clone(&schema));
        engine
            .dump(&mut record, &TaskModel::new(7, 1, "t").into_value(), &DumpOptions::new())
            .await?;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_sources_without_identity_are_not_cached() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let engine = cached_engine();
    let calls = Arc::new(AtomicUsize::new(0));
    let schema = counted_schema(&calls, false);

    for _ in 0..2 {
        let mut record = Record::new(Arc::clone(&schema));
        engine
            .dump(&mut record, &Value::from(serde_json::json!({})), &DumpOptions::new())
            .await?;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

/// Records every key written, delegating storage to an LRU.
#[derive(Debug)]
struct RecordingStore {
    inner: LruStore,
    keys: Mutex<Vec<String>>,
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn get(&self, ctx: &DumpContext, key: &str) -> anyhow::Result<Option<Value>> {
        self.inner.get(ctx, key).await
    }

    async fn set(&self, ctx: &DumpContext, key: &str, value: Value) -> anyhow::Result<()> {
        self.keys.lock().unwrap().push(key.to_string());
        self.inner.set(ctx, key, value).await
    }
}

#[tokio::test]
async fn test_custom_store_sees_cache_keys() -> Result<()> {
    portal::test_utils::init_test_logging(None);
    let store = Arc::new(RecordingStore {
        inner: LruStore::new(16),
        keys: Mutex::default(),
    });
    let engine = Engine::default().with_cache_store(store.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let mut record = Record::new(counted_schema(&calls, false));
    engine
        .dump(&mut record, &TaskModel::new(7, 1, "t").into_value(), &DumpOptions::new())
        .await?;
    dump_user_names(&engine, &CallCounter::new(), DumpOptions::new().disable_concurrency()).await?;

    let keys = store.keys.lock().unwrap().clone();
    assert_eq!(keys, vec!["CountedSchema#Compute#7", "UserModel#Fullname#1"]);
    Ok(())
}
