use std::time::Duration;

use gbe_state_store::{AddMode, Notifier, StateStore, StateStoreError, WriteOp};
use gbe_state_store_memory::{MemoryStateStore, PUBLISHED_LOG_CAPACITY, Published};

fn push(key: &str, value: &str) -> WriteOp {
    WriteOp::ListPushRight {
        key: key.to_string(),
        value: value.to_string(),
    }
}

async fn run(store: &MemoryStateStore, ops: Vec<WriteOp>) -> Result<(), StateStoreError> {
    store.batch().execute(ops).await
}

// --- Tests ---

#[tokio::test]
async fn test_ping_and_close() {
    let store = MemoryStateStore::new();
    assert!(store.ping().await.unwrap());

    store.close().await.unwrap();
    assert!(!store.ping().await.unwrap());
    assert!(store.get_string("anything").await.is_err());
    assert!(run(&store, vec![push("l", "a")]).await.is_err());
}

#[tokio::test]
async fn test_batch_applies_in_order() {
    let store = MemoryStateStore::new();
    run(
        &store,
        vec![
            WriteOp::HashSet {
                key: "h".into(),
                field: "a".into(),
                value: "1".into(),
            },
            WriteOp::Delete { key: "h".into() },
            WriteOp::HashSetMany {
                key: "h".into(),
                fields: vec![("b".into(), "2".into())],
            },
        ],
    )
    .await
    .unwrap();

    let hash = store.get_hash("h").await.unwrap();
    assert_eq!(hash.len(), 1);
    assert_eq!(hash["b"], "2");
}

#[tokio::test]
async fn test_failed_batch_leaves_no_trace() {
    let store = MemoryStateStore::new();
    run(&store, vec![push("list", "a")]).await.unwrap();

    let result = run(
        &store,
        vec![
            push("list", "b"),
            WriteOp::Increment {
                key: "counter".into(),
                delta: 1,
            },
            // list is not a hash
            WriteOp::HashSet {
                key: "list".into(),
                field: "f".into(),
                value: "v".into(),
            },
        ],
    )
    .await;

    assert!(matches!(result, Err(StateStoreError::WrongType { .. })));
    assert_eq!(store.list_range("list", 0, -1).await.unwrap(), ["a"]);
    assert!(!store.exists("counter").await.unwrap());
}

#[tokio::test]
async fn test_ttl_and_persist() {
    let store = MemoryStateStore::new();
    run(
        &store,
        vec![
            push("l", "a"),
            WriteOp::Expire {
                key: "l".into(),
                ttl: Duration::from_secs(60),
            },
        ],
    )
    .await
    .unwrap();

    let ttl = store.ttl("l").await.unwrap().expect("ttl set");
    assert!(ttl > Duration::from_secs(59) && ttl <= Duration::from_secs(60));

    run(&store, vec![WriteOp::Persist { key: "l".into() }])
        .await
        .unwrap();
    assert!(store.ttl("l").await.unwrap().is_none());
    assert!(store.exists("l").await.unwrap());
}

#[tokio::test]
async fn test_key_expires() {
    let store = MemoryStateStore::new();
    run(
        &store,
        vec![
            push("l", "a"),
            WriteOp::Expire {
                key: "l".into(),
                ttl: Duration::from_millis(50),
            },
        ],
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!store.exists("l").await.unwrap());
    assert_eq!(store.list_len("l").await.unwrap(), 0);
}

#[tokio::test]
async fn test_increment_keeps_ttl() {
    let store = MemoryStateStore::new();
    let incr = |delta| WriteOp::Increment {
        key: "c".into(),
        delta,
    };
    run(
        &store,
        vec![
            incr(1),
            WriteOp::Expire {
                key: "c".into(),
                ttl: Duration::from_secs(30),
            },
        ],
    )
    .await
    .unwrap();
    run(&store, vec![incr(5), incr(-2)]).await.unwrap();

    assert_eq!(store.get_string("c").await.unwrap().as_deref(), Some("4"));
    assert!(store.ttl("c").await.unwrap().is_some());
}

#[tokio::test]
async fn test_sorted_set_order_and_rank() {
    let store = MemoryStateStore::new();
    let add = |member: &str, score| WriteOp::SortedSetAdd {
        key: "z".into(),
        member: member.into(),
        score,
        mode: AddMode::Upsert,
    };
    run(&store, vec![add("c", 3.0), add("a", 1.0), add("b", 1.0)])
        .await
        .unwrap();

    assert_eq!(
        store.sorted_set_range("z", 0, -1).await.unwrap(),
        ["a", "b", "c"]
    );
    assert_eq!(store.sorted_set_rank("z", "c").await.unwrap(), Some(2));
    assert_eq!(store.sorted_set_rank("z", "nope").await.unwrap(), None);
    assert_eq!(store.sorted_set_score("z", "a").await.unwrap(), Some(1.0));

    run(
        &store,
        vec![WriteOp::SortedSetRemove {
            key: "z".into(),
            member: "a".into(),
        }],
    )
    .await
    .unwrap();
    assert_eq!(store.sorted_set_range("z", 0, 0).await.unwrap(), ["b"]);
}

#[tokio::test]
async fn test_read_of_wrong_type_fails() {
    let store = MemoryStateStore::new();
    run(&store, vec![push("l", "a")]).await.unwrap();
    assert!(store.get_hash("l").await.is_err());
    assert!(store.get_string("l").await.is_err());
}

#[tokio::test]
async fn test_publish_records_and_wakes() {
    let store = MemoryStateStore::new();
    let notify = store.subscribe("queue:default:notify").await;

    let notified = notify.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();

    store
        .publish("queue:default:notify", "default")
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), notified)
        .await
        .expect("subscriber should be woken");

    assert_eq!(
        store.published().await,
        [Published {
            channel: "queue:default:notify".into(),
            message: "default".into(),
        }]
    );
}

#[tokio::test]
async fn test_published_log_is_bounded_and_drainable() {
    let store = MemoryStateStore::new();
    for i in 0..PUBLISHED_LOG_CAPACITY + 10 {
        store.publish("ch", &i.to_string()).await.unwrap();
    }

    let published = store.published().await;
    assert_eq!(published.len(), PUBLISHED_LOG_CAPACITY);
    assert_eq!(published[0].message, "10");

    let drained = store.take_published().await;
    assert_eq!(drained.len(), PUBLISHED_LOG_CAPACITY);
    assert!(store.published().await.is_empty());
}

#[tokio::test]
async fn test_oversized_ttl_fails_batch() {
    let store = MemoryStateStore::new();
    run(&store, vec![push("l", "a")]).await.unwrap();

    let err = run(
        &store,
        vec![
            push("l", "b"),
            WriteOp::Expire {
                key: "l".into(),
                ttl: Duration::MAX,
            },
        ],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StateStoreError::Command(_)));
    assert_eq!(store.list_len("l").await.unwrap(), 1);
    assert!(store.ttl("l").await.unwrap().is_none());
}
