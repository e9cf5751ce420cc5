use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::entry::{Collection, ItemId, SavedItemEntry};
use crate::identity::Identity;

/// Local cache failures. Non-fatal: the in-memory collection stays
/// authoritative for the session and failures are only logged.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache read failed for '{namespace}': {reason}")]
    Read { namespace: String, reason: String },
    #[error("cache write failed for '{namespace}': {reason}")]
    Write { namespace: String, reason: String },
}

/// Remote store failures. A call either fully succeeds or fully fails;
/// there are no partial-failure semantics at this boundary.
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    #[error("remote write failed: {0}")]
    Write(String),
    #[error("remote read failed: {0}")]
    Read(String),
    #[error("remote write abandoned before completion")]
    Canceled,
}

/// Namespaced persistent key/value store holding whole-collection snapshots.
///
/// Writes are full snapshots, never deltas. The namespace is derived from
/// the current identity (see [`Identity::namespace`]), which is the only
/// isolation mechanism between users sharing a device.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Read the snapshot stored under a namespace. `Ok(None)` when the
    /// namespace has never been written.
    async fn read(&self, namespace: &str) -> Result<Option<Collection>, CacheError>;

    /// Replace the snapshot stored under a namespace.
    async fn write(&self, namespace: &str, collection: &Collection) -> Result<(), CacheError>;

    /// Drop a namespace entirely. Erasing an absent namespace succeeds.
    async fn erase(&self, namespace: &str) -> Result<(), CacheError>;
}

/// Per-identity remote document collection, conceptually addressed as
/// `users/{identity}/savedItems/{itemId}`.
///
/// The change feed is push-based: every received value is the complete
/// current remote collection, not a delta.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create or replace one entry's remote document.
    async fn upsert(&self, identity: &Identity, entry: &SavedItemEntry) -> Result<(), RemoteError>;

    /// Delete one entry's remote document. Deleting an absent document
    /// succeeds.
    async fn delete(&self, identity: &Identity, item_id: &ItemId) -> Result<(), RemoteError>;

    /// Full snapshot of the identity's remote collection.
    async fn list_all(&self, identity: &Identity) -> Result<Collection, RemoteError>;

    /// Subscribe to the identity's change feed. Dropping the receiver ends
    /// the subscription.
    async fn subscribe(&self, identity: &Identity) -> broadcast::Receiver<Collection>;
}
