use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::error::GateError;
use crate::lease::{Lease, LeaseStore};

/// Timeout-based reclamation of abandoned leases.
///
/// A lease's only liveness evidence is its creation timestamp; it is never
/// refreshed. Any lease strictly older than the timeout is reclaimed,
/// whether or not its holder is still working. This runs as a synchronous
/// sweep inside every capacity check rather than as a scheduled background
/// task, trading check latency for the absence of a separate process.
pub struct StaleLeaseReaper {
    timeout: Duration,
}

impl StaleLeaseReaper {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Delete every lease older than the timeout; returns how many were
    /// reclaimed. A failed individual delete is logged and the sweep
    /// continues with the remaining leases.
    #[instrument(skip(self, leases), level = "debug")]
    pub async fn sweep(&self, leases: &LeaseStore) -> Result<usize, GateError> {
        let now = Utc::now();
        let mut reaped = 0;

        for lease in leases.list_all().await? {
            if self.is_stale(&lease, now) {
                info!("Stale lease detected: {}. Removing", lease.key());
                match leases.delete(&lease.key()).await {
                    Ok(_) => reaped += 1,
                    Err(e) => warn!("Failed to remove stale lease {}: {}", lease.key(), e),
                }
            } else {
                debug!("Active lease found: {}", lease.key());
            }
        }

        Ok(reaped)
    }

    /// Strictly-older-than check; a lease exactly at the timeout boundary
    /// is still live. A timestamp in the future (clock skew) is never
    /// stale.
    fn is_stale(&self, lease: &Lease, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(lease.timestamp)
            .to_std()
            .map(|age| age > self.timeout)
            .unwrap_or(false)
    }
}
