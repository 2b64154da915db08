//! End-to-end flows through the JSON operation envelopes against the
//! in-memory store: the full acquire / check / release protocol as a
//! workflow engine would drive it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use lease_gate_core::ops;
use lease_gate_core::{Lease, MemoryOpener, MemoryStore, ObjectStore, DEFAULT_COUNTER_KEY};

fn setup() -> (MemoryOpener, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (MemoryOpener::new(store.clone()), store)
}

fn base_event() -> Value {
    json!({ "bucket_name": "pipeline-bucket" })
}

#[tokio::test]
async fn single_holder_round_trip() {
    let (opener, _store) = setup();

    // Acquire grants a lease and reports its handle.
    let acquired = ops::acquire(&opener, &base_event()).await;
    assert_eq!(acquired["lockAcquired"], true);
    let lock_id = acquired["lockId"].as_str().unwrap().to_string();
    let lock_path = acquired["lockPath"].as_str().unwrap().to_string();
    assert_eq!(lock_path, format!("locks/{}", lock_id));

    // With limit 1 and the lease held, the gate is closed.
    let check = ops::check_capacity(&opener, &base_event()).await;
    assert_eq!(check["canAcquireLock"], false);
    assert_eq!(check["currentLocks"], 1);

    // Release with the handle fields merged into the event.
    let mut event = base_event();
    event["lockId"] = json!(lock_id);
    event["lockPath"] = json!(lock_path);
    let released = ops::release(&opener, &event).await;
    assert_eq!(released["lockReleased"], true);

    // Capacity is back.
    let check = ops::check_capacity(&opener, &base_event()).await;
    assert_eq!(check["canAcquireLock"], true);
    assert_eq!(check["currentLocks"], 0);
}

#[tokio::test]
async fn stale_lease_is_reclaimed_by_check() {
    let (opener, store) = setup();

    // A lease object 20 minutes old with the counter claiming 1: the
    // signature of a crashed holder.
    let stale = Lease {
        lock_id: "crashed-holder".to_string(),
        timestamp: Utc::now() - chrono::Duration::minutes(20),
    };
    store
        .put(&stale.key(), &serde_json::to_vec(&stale).unwrap())
        .await
        .unwrap();
    store
        .put(DEFAULT_COUNTER_KEY, br#"{"count":1}"#)
        .await
        .unwrap();

    // Default timeout is 15 minutes: the check reaps the lease,
    // reconciles the counter to 0, and opens the gate.
    let check = ops::check_capacity(&opener, &base_event()).await;
    assert_eq!(check["canAcquireLock"], true);
    assert_eq!(check["currentLocks"], 0);
    assert!(store.get("locks/crashed-holder").await.unwrap().is_none());
}

#[tokio::test]
async fn fresh_lease_survives_check() {
    let (opener, store) = setup();

    let event = json!({ "bucket_name": "b", "lock_timeout_minutes": 15 });
    let acquired = ops::acquire(&opener, &event).await;
    let lock_path = acquired["lockPath"].as_str().unwrap();

    let check = ops::check_capacity(&opener, &event).await;
    assert_eq!(check["currentLocks"], 1);
    assert!(store.get(lock_path).await.unwrap().is_some());
}

#[tokio::test]
async fn double_release_is_safe_and_counter_stays_at_floor() {
    let (opener, _store) = setup();

    let acquired = ops::acquire(&opener, &base_event()).await;
    let mut event = base_event();
    event["lockId"] = acquired["lockId"].clone();
    event["lockPath"] = acquired["lockPath"].clone();

    let first = ops::release(&opener, &event).await;
    assert_eq!(first["lockReleased"], true);

    // Releasing the same handle again never errors and never drives the
    // counter negative.
    let second = ops::release(&opener, &event).await;
    assert_eq!(second["lockReleased"], true);

    let check = ops::check_capacity(&opener, &base_event()).await;
    assert_eq!(check["currentLocks"], 0);
    assert_eq!(check["canAcquireLock"], true);
}

#[tokio::test]
async fn release_against_empty_container_initializes_counter() {
    let (opener, store) = setup();

    let event = json!({
        "bucket_name": "b",
        "lockId": "ghost",
        "lockPath": "locks/ghost",
    });
    let released = ops::release(&opener, &event).await;
    assert_eq!(released["lockReleased"], true);

    let body = store.get(DEFAULT_COUNTER_KEY).await.unwrap().unwrap();
    let counter: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(counter["count"], 0);
}

#[tokio::test]
async fn corrupt_lease_object_does_not_wedge_the_gate() {
    let (opener, store) = setup();

    store.put("locks/corrupt", b"{not json").await.unwrap();
    let acquired = ops::acquire(&opener, &base_event()).await;
    assert_eq!(acquired["lockAcquired"], true);

    let event = json!({ "bucket_name": "b", "concurrency_limit": 2 });
    let check = ops::check_capacity(&opener, &event).await;
    assert!(check.get("statusCode").is_none());
    assert_eq!(check["canAcquireLock"], true);
    assert_eq!(check["currentLocks"], 1);
}

#[tokio::test]
async fn higher_limit_admits_multiple_holders() {
    let (opener, _store) = setup();
    let event = json!({ "bucket_name": "b", "concurrency_limit": 3 });

    for expected in 1..=3u64 {
        let check = ops::check_capacity(&opener, &event).await;
        assert_eq!(check["canAcquireLock"], true);
        ops::acquire(&opener, &event).await;
        let check = ops::check_capacity(&opener, &event).await;
        assert_eq!(check["currentLocks"], expected);
    }

    let full = ops::check_capacity(&opener, &event).await;
    assert_eq!(full["canAcquireLock"], false);
    assert_eq!(full["currentLocks"], 3);
}
