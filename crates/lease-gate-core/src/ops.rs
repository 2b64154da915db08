//! Workflow-facing JSON envelopes for the three operations.
//!
//! Each operation takes the caller's JSON event, merges its result fields
//! into it (unknown fields pass through untouched), and never propagates
//! an error upward; the worst case is an error-flagged envelope. Field
//! names are the wire contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::coordinator::{
    GateConfig, LeaseCoordinator, DEFAULT_CONCURRENCY_LIMIT, DEFAULT_COUNTER_KEY,
    DEFAULT_LOCK_TIMEOUT_MINUTES,
};
use crate::error::GateError;
use crate::store::ObjectStore;

/// Resolves the event's container name to an object store.
///
/// Keeps the envelope layer backend-agnostic: the S3 binary opens real
/// buckets, tests open an in-memory store.
#[async_trait]
pub trait StoreOpener: Send + Sync {
    async fn open(&self, container: &str) -> Result<Arc<dyn ObjectStore>, GateError>;
}

fn str_field<'a>(event: &'a Value, key: &str) -> Option<&'a str> {
    event
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn u64_field(event: &Value, key: &str) -> Option<u64> {
    event.get(key).and_then(Value::as_u64)
}

/// Clone the event's fields and overlay the result fields. A non-object
/// event contributes nothing to pass through.
fn merged(event: &Value, extra: Value) -> Value {
    let mut out = match event {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Value::Object(extra) = extra {
        out.extend(extra);
    }
    Value::Object(out)
}

fn coordinator_for(store: Arc<dyn ObjectStore>, event: &Value) -> LeaseCoordinator {
    let timeout_minutes =
        u64_field(event, "lock_timeout_minutes").unwrap_or(DEFAULT_LOCK_TIMEOUT_MINUTES);
    let config = GateConfig {
        counter_key: str_field(event, "counter_name")
            .unwrap_or(DEFAULT_COUNTER_KEY)
            .to_string(),
        concurrency_limit: u64_field(event, "concurrency_limit")
            .unwrap_or(DEFAULT_CONCURRENCY_LIMIT),
        lock_timeout: Duration::from_secs(timeout_minutes.saturating_mul(60)),
    };
    LeaseCoordinator::new(store, config)
}

/// Acquire a lease, unconditionally. On success the event comes back with
/// `lockId`, `lockPath`, `lockAcquired: true`, and `lockTimestamp`; on any
/// failure with `lockAcquired: false` and `error`.
pub async fn acquire(opener: &dyn StoreOpener, event: &Value) -> Value {
    let Some(bucket) = str_field(event, "bucket_name") else {
        warn!("Missing required parameter 'bucket_name'");
        return merged(
            event,
            json!({
                "lockAcquired": false,
                "error": "Missing required parameter: bucket_name",
            }),
        );
    };

    info!("Attempting to acquire lease in bucket {}", bucket);

    let result = async {
        let store = opener.open(bucket).await?;
        coordinator_for(store, event).acquire().await
    }
    .await;

    match result {
        Ok(handle) => merged(
            event,
            json!({
                "lockId": handle.lock_id,
                "lockPath": handle.lock_path,
                "lockAcquired": true,
                "lockTimestamp": handle.acquired_at,
            }),
        ),
        Err(e) => {
            warn!("Error acquiring lease: {}", e);
            merged(event, json!({ "lockAcquired": false, "error": e.to_string() }))
        }
    }
}

/// Check whether a lease can be acquired, sweeping stale leases and
/// reconciling the counter along the way.
///
/// A missing `bucket_name` is a validation failure reported with
/// `statusCode: 400` and no store access; a runtime failure reports
/// `statusCode: 500`. This response replaces the event rather than
/// merging into it.
pub async fn check_capacity(opener: &dyn StoreOpener, event: &Value) -> Value {
    let Some(bucket) = str_field(event, "bucket_name") else {
        warn!("Missing required parameter 'bucket_name'");
        return json!({
            "statusCode": 400,
            "canAcquireLock": false,
            "error": "Missing required parameter: bucket_name",
        });
    };

    info!("Checking lease capacity in bucket {}", bucket);

    let result = async {
        let store = opener.open(bucket).await?;
        coordinator_for(store, event).can_acquire().await
    }
    .await;

    match result {
        Ok(admission) => json!({
            "canAcquireLock": admission.allowed,
            "currentLocks": admission.current,
        }),
        Err(e) => {
            warn!("Capacity check failed: {}", e);
            json!({
                "statusCode": 500,
                "canAcquireLock": false,
                "error": format!("An unexpected error occurred: {}", e),
            })
        }
    }
}

/// Lock info may arrive at the top level or nested under `lockAcquisition`
/// (the untouched output of a prior acquire step).
fn lock_info(event: &Value) -> (Option<&str>, Option<&str>) {
    match event.get("lockAcquisition") {
        Some(nested) => (str_field(nested, "lockId"), str_field(nested, "lockPath")),
        None => (str_field(event, "lockId"), str_field(event, "lockPath")),
    }
}

/// Release a previously acquired lease. A handle with a missing identifier
/// or path is nothing to release, reported as `lockReleased: false` with a
/// `message` rather than an error; releasing twice is safe.
pub async fn release(opener: &dyn StoreOpener, event: &Value) -> Value {
    let (lock_id, lock_path) = lock_info(event);
    let (Some(lock_id), Some(lock_path)) = (lock_id, lock_path) else {
        info!("No lease information found. Nothing to release");
        return merged(
            event,
            json!({
                "lockReleased": false,
                "message": "No lock information found",
            }),
        );
    };

    let Some(bucket) = str_field(event, "bucket_name") else {
        warn!("Missing required parameter 'bucket_name'");
        return merged(
            event,
            json!({
                "lockReleased": false,
                "error": "Missing required parameter: bucket_name",
            }),
        );
    };

    info!("Attempting to release lease '{}' from bucket {}", lock_id, bucket);

    let result = async {
        let store = opener.open(bucket).await?;
        coordinator_for(store, event).release(lock_path).await
    }
    .await;

    match result {
        Ok(released_at) => merged(
            event,
            json!({ "lockReleased": true, "releaseTimestamp": released_at }),
        ),
        Err(e) => {
            warn!("Error releasing lease: {}", e);
            merged(event, json!({ "lockReleased": false, "error": e.to_string() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryOpener, MemoryStore};

    fn opener() -> (MemoryOpener, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (MemoryOpener::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_check_missing_bucket_is_400() {
        let (opener, store) = opener();
        let response = check_capacity(&opener, &json!({})).await;

        assert_eq!(response["statusCode"], 400);
        assert_eq!(response["canAcquireLock"], false);
        assert!(response["error"].as_str().unwrap().contains("bucket_name"));
        // Validation failures never touch the store.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_acquire_merges_event_fields() {
        let (opener, _store) = opener();
        let event = json!({ "bucket_name": "b", "job_id": "job-42" });

        let response = acquire(&opener, &event).await;

        assert_eq!(response["lockAcquired"], true);
        assert_eq!(response["job_id"], "job-42");
        let path = response["lockPath"].as_str().unwrap();
        assert!(path.starts_with("locks/"));
        assert!(path.ends_with(response["lockId"].as_str().unwrap()));
        assert!(response["lockTimestamp"].is_string());
    }

    #[tokio::test]
    async fn test_release_without_lock_info_is_noop() {
        let (opener, store) = opener();
        let event = json!({ "bucket_name": "b" });

        let response = release(&opener, &event).await;

        assert_eq!(response["lockReleased"], false);
        assert_eq!(response["message"], "No lock information found");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_release_reads_nested_lock_acquisition() {
        let (opener, _store) = opener();
        let acquired = acquire(&opener, &json!({ "bucket_name": "b" })).await;

        let event = json!({
            "bucket_name": "b",
            "lockAcquisition": {
                "lockId": acquired["lockId"],
                "lockPath": acquired["lockPath"],
            },
        });
        let response = release(&opener, &event).await;

        assert_eq!(response["lockReleased"], true);
        assert!(response["releaseTimestamp"].is_string());
    }

    #[tokio::test]
    async fn test_release_with_partial_lock_info_is_noop() {
        let (opener, _store) = opener();
        let event = json!({ "bucket_name": "b", "lockId": "x" });

        let response = release(&opener, &event).await;

        assert_eq!(response["lockReleased"], false);
        assert_eq!(response["message"], "No lock information found");
    }

    #[tokio::test]
    async fn test_huge_timeout_minutes_does_not_overflow() {
        let (opener, _store) = opener();
        let event = json!({ "bucket_name": "b", "lock_timeout_minutes": u64::MAX });

        // An absurd caller-supplied timeout must still produce a
        // well-formed envelope, never an arithmetic fault.
        let response = check_capacity(&opener, &event).await;

        assert!(response.get("statusCode").is_none());
        assert_eq!(response["canAcquireLock"], true);
        assert_eq!(response["currentLocks"], 0);
    }

    #[tokio::test]
    async fn test_custom_counter_name_is_honored() {
        let (opener, store) = opener();
        let event = json!({ "bucket_name": "b", "counter_name": "gate/count.json" });

        acquire(&opener, &event).await;

        let body = store.get("gate/count.json").await.unwrap().unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["count"], 1);
    }
}
