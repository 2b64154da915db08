use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::counter::CounterLedger;
use crate::error::GateError;
use crate::lease::LeaseStore;
use crate::reaper::StaleLeaseReaper;
use crate::store::ObjectStore;

/// Default key of the counter object.
pub const DEFAULT_COUNTER_KEY: &str = "active_locks.json";
/// Default maximum number of concurrent leases.
pub const DEFAULT_CONCURRENCY_LIMIT: u64 = 1;
/// Default staleness budget for abandoned leases, in minutes.
pub const DEFAULT_LOCK_TIMEOUT_MINUTES: u64 = 15;

/// Gate configuration shared by the three operations.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Key of the counter object.
    pub counter_key: String,
    /// Maximum number of concurrent leases.
    pub concurrency_limit: u64,
    /// Leases older than this are reclaimed by the sweep.
    pub lock_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            counter_key: DEFAULT_COUNTER_KEY.to_string(),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_MINUTES * 60),
        }
    }
}

/// Outcome of a capacity check.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    /// Whether a new lease may be granted.
    pub allowed: bool,
    /// The reconciled count of active leases.
    pub current: u64,
}

/// Handle returned by a successful acquisition. The holder keeps it to
/// release the lease later; there is no session binding the operations
/// together beyond this handle's identifier and path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseHandle {
    #[serde(rename = "lockId")]
    pub lock_id: String,
    #[serde(rename = "lockPath")]
    pub lock_path: String,
    #[serde(rename = "lockTimestamp")]
    pub acquired_at: DateTime<Utc>,
}

/// Orchestrates the lease protocol over a shared object store.
///
/// The three operations are independent, short-lived units of work; any
/// number of holders may invoke them concurrently with no mutual exclusion
/// at any layer. Two callers can both observe spare capacity and both
/// acquire, transiently exceeding the limit until the next
/// [`can_acquire`](Self::can_acquire) reconciles. The counter is an
/// approximation, not a linearizable gate.
pub struct LeaseCoordinator {
    leases: LeaseStore,
    counter: CounterLedger,
    reaper: StaleLeaseReaper,
    limit: u64,
}

impl LeaseCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, config: GateConfig) -> Self {
        Self {
            leases: LeaseStore::new(Arc::clone(&store)),
            counter: CounterLedger::new(store, config.counter_key),
            reaper: StaleLeaseReaper::new(config.lock_timeout),
            limit: config.concurrency_limit,
        }
    }

    /// Check whether capacity exists for a new lease.
    ///
    /// Maintenance and check in one: sweeps stale leases, reconciles the
    /// counter against the reaped count, persists the adjusted value, and
    /// only then compares it to the limit. Callers must not treat this as
    /// a pure query; it deletes lease objects and writes the counter even
    /// when nothing changed.
    #[instrument(skip(self), level = "debug")]
    pub async fn can_acquire(&self) -> Result<Admission, GateError> {
        let reaped = self.reaper.sweep(&self.leases).await?;

        let counted = self.counter.read().await?;
        let adjusted = counted.saturating_sub(reaped as u64);
        self.counter.initialize(adjusted).await?;

        let allowed = adjusted < self.limit;
        debug!(
            "Active leases: {} ({} reaped), can acquire: {}",
            adjusted, reaped, allowed
        );
        Ok(Admission {
            allowed,
            current: adjusted,
        })
    }

    /// Grant a lease unconditionally: write the lease object, then bump
    /// the counter. The capacity check is a separate prior call by
    /// protocol; the window between the two is an accepted race. A counter
    /// increment failure fails the whole acquisition; the already-written
    /// lease object is left behind for the reaper.
    #[instrument(skip(self), level = "debug")]
    pub async fn acquire(&self) -> Result<LeaseHandle, GateError> {
        let lease = self.leases.create().await?;
        self.counter.increment().await?;

        info!("Lease '{}' acquired at {}", lease.lock_id, lease.timestamp);
        Ok(LeaseHandle {
            lock_path: lease.key(),
            lock_id: lease.lock_id,
            acquired_at: lease.timestamp,
        })
    }

    /// Release the lease at `lock_path`: delete the object (idempotent)
    /// and decrement the counter by one. Returns the release timestamp.
    #[instrument(skip(self), level = "debug")]
    pub async fn release(&self, lock_path: &str) -> Result<DateTime<Utc>, GateError> {
        self.leases.delete(lock_path).await?;
        self.counter.decrement(1).await?;

        let released_at = Utc::now();
        info!("Lease at {} released at {}", lock_path, released_at);
        Ok(released_at)
    }
}
