use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::GateError;
use crate::store::ObjectStore;

/// Key prefix under which lease objects live.
pub const LEASE_PREFIX: &str = "locks/";

/// One holder's claim to capacity.
///
/// A lease's existence in the store is its liveness signal; there is no
/// separate state field. Stored as JSON at `locks/{lockId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    #[serde(rename = "lockId")]
    pub lock_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Lease {
    /// Store key for this lease.
    pub fn key(&self) -> String {
        format!("{}{}", LEASE_PREFIX, self.lock_id)
    }
}

/// CRUD over lease objects under the [`LEASE_PREFIX`].
pub struct LeaseStore {
    store: Arc<dyn ObjectStore>,
}

impl LeaseStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Create a fresh lease: random identifier, now-timestamp, one object
    /// written. A write failure is fatal to the acquisition attempt; there
    /// is no retry at this layer.
    #[instrument(skip(self), level = "debug")]
    pub async fn create(&self) -> Result<Lease, GateError> {
        let lease = Lease {
            lock_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        };

        let body = serde_json::to_vec(&lease).map_err(|e| {
            GateError::Serialization(format!("Failed to serialize lease: {}", e))
        })?;
        self.store.put(&lease.key(), &body).await?;

        debug!("Created lease {} at {}", lease.lock_id, lease.timestamp);
        Ok(lease)
    }

    /// Delete the lease object at `key`. Deleting an already-absent key is
    /// not an error; idempotent release depends on this.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete(&self, key: &str) -> Result<bool, GateError> {
        let existed = self.store.delete(key).await?;
        if !existed {
            debug!("Lease object {} already gone", key);
        }
        Ok(existed)
    }

    /// List every lease under the prefix.
    ///
    /// One unreadable object (corrupt body, or deleted between list and
    /// get) is logged and skipped; it must not wedge capacity checks for
    /// everyone else.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_all(&self) -> Result<Vec<Lease>, GateError> {
        let keys = self.store.list(LEASE_PREFIX).await?;

        let mut leases = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get(&key).await {
                Ok(Some(body)) => match serde_json::from_slice::<Lease>(&body) {
                    Ok(lease) => leases.push(lease),
                    Err(e) => warn!("Skipping corrupt lease object {}: {}", key, e),
                },
                Ok(None) => debug!("Lease object {} vanished during scan", key),
                Err(e) => warn!("Skipping unreadable lease object {}: {}", key, e),
            }
        }
        Ok(leases)
    }
}
