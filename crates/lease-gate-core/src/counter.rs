use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::GateError;
use crate::store::ObjectStore;

/// Persisted counter body: `{"count": N}`.
#[derive(Debug, Serialize, Deserialize)]
struct CounterState {
    count: u64,
}

/// Shared approximate count of live leases, kept in a single object.
///
/// Increment and decrement are read-then-write with no optimistic
/// concurrency control; concurrent callers can lose updates. The store
/// offers no conditional writes, so the count is an approximation that
/// [`crate::LeaseCoordinator::can_acquire`] periodically reconciles
/// against the actual lease objects.
///
/// The unsigned type plus saturating arithmetic means a negative count can
/// never be persisted.
pub struct CounterLedger {
    store: Arc<dyn ObjectStore>,
    key: String,
}

impl CounterLedger {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Current count. An absent counter object reads as zero; it is
    /// initialized lazily on the next write, not here.
    #[instrument(skip(self), level = "debug")]
    pub async fn read(&self) -> Result<u64, GateError> {
        match self.store.get(&self.key).await? {
            Some(body) => {
                let state: CounterState = serde_json::from_slice(&body).map_err(|e| {
                    GateError::Serialization(format!(
                        "Failed to parse counter object {}: {}",
                        self.key, e
                    ))
                })?;
                Ok(state.count)
            }
            None => Ok(0),
        }
    }

    /// Write the counter object directly. Used by both ledger operations
    /// and by the reconciliation path.
    #[instrument(skip(self), level = "debug")]
    pub async fn initialize(&self, value: u64) -> Result<(), GateError> {
        let body = serde_json::to_vec(&CounterState { count: value }).map_err(|e| {
            GateError::Serialization(format!("Failed to serialize counter: {}", e))
        })?;
        self.store.put(&self.key, &body).await
    }

    /// Read-then-write `count + 1`. An absent counter initializes to 1.
    #[instrument(skip(self), level = "debug")]
    pub async fn increment(&self) -> Result<u64, GateError> {
        let current = self.read().await?;
        let next = current.saturating_add(1);
        self.initialize(next).await?;
        debug!("Incremented active leases from {} to {}", current, next);
        Ok(next)
    }

    /// Read-then-write `count - n`, clamped at zero. An absent counter
    /// persists 0.
    #[instrument(skip(self), level = "debug")]
    pub async fn decrement(&self, n: u64) -> Result<u64, GateError> {
        let current = self.read().await?;
        let next = current.saturating_sub(n);
        self.initialize(next).await?;
        debug!("Decremented active leases from {} to {}", current, next);
        Ok(next)
    }
}
