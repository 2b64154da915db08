use async_trait::async_trait;

use crate::error::GateError;

/// Byte-blob store addressed by key within a single container.
///
/// This is the only capability the lease protocol assumes of its backing
/// store: single-key read, write, delete, and prefix listing. There is no
/// compare-and-swap and no multi-key transaction, so every invariant built
/// on top of this trait is best-effort under concurrent access.
///
/// Implementations must hand the store to callers explicitly (constructor
/// injection); nothing in this crate reaches for ambient state.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the backend identifier (e.g., "s3", "memory").
    fn store_name(&self) -> &'static str;

    /// Read an object. Returns `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, GateError>;

    /// Write an object, replacing any existing value.
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), GateError>;

    /// Delete an object. Deleting an absent key is not an error. Returns
    /// whether the key was known to be present; backends whose delete
    /// gives no feedback (S3) report `true`.
    async fn delete(&self, key: &str) -> Result<bool, GateError>;

    /// List all keys under a prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, GateError>;
}
