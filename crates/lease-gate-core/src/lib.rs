//! Admission-controlled distributed lease over a shared object store.
//!
//! Independent, stateless workers with no network link to each other
//! coordinate through a bounded-concurrency gate kept entirely in a
//! key/object store:
//! - `ObjectStore`: the minimal single-key capability the protocol assumes
//! - `LeaseStore`: one object per outstanding lease under `locks/`
//! - `CounterLedger`: a single object approximating the live-lease count
//! - `StaleLeaseReaper`: timeout-based reclamation of abandoned leases
//! - `LeaseCoordinator`: acquire / can-acquire / release orchestration
//! - `ops`: the JSON event envelopes for the three operations
//!
//! The store offers no locking, no compare-and-swap, and no transactions,
//! so the limit is approximate by design: check-then-act races can
//! transiently exceed it until the next capacity check reconciles.

mod coordinator;
mod counter;
mod error;
mod lease;
mod memory;
pub mod ops;
mod reaper;
mod store;

pub use coordinator::{
    Admission, GateConfig, LeaseCoordinator, LeaseHandle, DEFAULT_CONCURRENCY_LIMIT,
    DEFAULT_COUNTER_KEY, DEFAULT_LOCK_TIMEOUT_MINUTES,
};
pub use counter::CounterLedger;
pub use error::GateError;
pub use lease::{Lease, LeaseStore, LEASE_PREFIX};
pub use memory::{MemoryOpener, MemoryStore};
pub use reaper::StaleLeaseReaper;
pub use store::ObjectStore;
