//! In-memory storage fakes.
//!
//! [`MemoryCache`] and [`InMemoryRemote`] back the test suite and the demo.
//! Both support failure injection so the engine's degraded paths (write
//! failures, rollback, stale-cache serving) can be exercised without a
//! network.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::broadcast;

use super::traits::{CacheError, LocalCache, RemoteError, RemoteStore};
use crate::entry::{Collection, ItemId, SavedItemEntry};
use crate::identity::Identity;

/// In-memory [`LocalCache`] storing serialized snapshots per namespace.
///
/// Snapshots round-trip through JSON, same as the persistent backend, so
/// serde behavior is covered even in fast tests.
pub struct MemoryCache {
    data: DashMap<String, String>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    delay_next_write_ms: AtomicU64,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            delay_next_write_ms: AtomicU64::new(0),
        }
    }

    /// Make subsequent reads fail until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }

    /// Make subsequent writes (and erases) fail until cleared.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Stall the next write by the given amount, keeping it observably
    /// in flight. One-shot; later writes run at full speed.
    pub fn delay_next_write_ms(&self, ms: u64) {
        self.delay_next_write_ms.store(ms, Ordering::Release);
    }

    /// Number of namespaces holding a snapshot.
    #[must_use]
    pub fn namespace_count(&self) -> usize {
        self.data.len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn read(&self, namespace: &str) -> Result<Option<Collection>, CacheError> {
        if self.fail_reads.load(Ordering::Acquire) {
            return Err(CacheError::Read {
                namespace: namespace.to_string(),
                reason: "injected read failure".to_string(),
            });
        }
        match self.data.get(namespace) {
            Some(raw) => {
                let collection =
                    serde_json::from_str(raw.value()).map_err(|e| CacheError::Read {
                        namespace: namespace.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(collection))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, namespace: &str, collection: &Collection) -> Result<(), CacheError> {
        let delay = self.delay_next_write_ms.swap(0, Ordering::AcqRel);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(CacheError::Write {
                namespace: namespace.to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        let raw = serde_json::to_string(collection).map_err(|e| CacheError::Write {
            namespace: namespace.to_string(),
            reason: e.to_string(),
        })?;
        self.data.insert(namespace.to_string(), raw);
        Ok(())
    }

    async fn erase(&self, namespace: &str) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(CacheError::Write {
                namespace: namespace.to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        self.data.remove(namespace);
        Ok(())
    }
}

const FEED_CAPACITY: usize = 16;

/// In-memory [`RemoteStore`] fake with per-identity documents and change
/// feeds.
///
/// Successful writes push the updated snapshot to the identity's feed, the
/// way a document store notifies its listeners. [`push_snapshot`] simulates
/// a change made by another device.
///
/// [`push_snapshot`]: InMemoryRemote::push_snapshot
pub struct InMemoryRemote {
    docs: DashMap<Identity, IndexMap<ItemId, SavedItemEntry>>,
    feeds: DashMap<Identity, broadcast::Sender<Collection>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
    list_calls: AtomicUsize,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
            feeds: DashMap::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_delay_ms: AtomicU64::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Make subsequent upserts/deletes fail until cleared.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Make subsequent `list_all` calls fail until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }

    /// Delay each write by the given amount, keeping it observably in
    /// flight.
    pub fn set_write_delay_ms(&self, ms: u64) {
        self.write_delay_ms.store(ms, Ordering::Release);
    }

    /// How many times `list_all` has been called, across identities.
    #[must_use]
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::Acquire)
    }

    /// Number of documents stored for an identity.
    #[must_use]
    pub fn entry_count(&self, identity: &Identity) -> usize {
        self.docs.get(identity).map_or(0, |d| d.len())
    }

    /// Fetch one stored document, for assertions.
    #[must_use]
    pub fn server_entry(&self, identity: &Identity, id: &ItemId) -> Option<SavedItemEntry> {
        self.docs.get(identity).and_then(|d| d.get(id).cloned())
    }

    /// Replace an identity's server-side collection and notify its feed, as
    /// if another device had written it.
    pub fn push_snapshot(&self, identity: &Identity, entries: Vec<SavedItemEntry>) {
        let mut map = IndexMap::with_capacity(entries.len());
        for entry in entries {
            map.insert(entry.item_id.clone(), entry);
        }
        self.docs.insert(identity.clone(), map);
        self.notify(identity);
    }

    /// Drop an identity's change feed, closing every subscribed receiver.
    /// Later writes for the identity go unannounced.
    pub fn close_feed(&self, identity: &Identity) {
        self.feeds.remove(identity);
    }

    fn snapshot(&self, identity: &Identity) -> Collection {
        let entries = self
            .docs
            .get(identity)
            .map(|d| d.values().cloned().collect())
            .unwrap_or_default();
        Collection::from_entries(entries)
    }

    fn notify(&self, identity: &Identity) {
        if let Some(tx) = self.feeds.get(identity) {
            // No receivers is fine; the feed just goes unobserved.
            let _ = tx.send(self.snapshot(identity));
        }
    }

    async fn simulate_latency(&self) {
        let delay = self.write_delay_ms.load(Ordering::Acquire);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn upsert(&self, identity: &Identity, entry: &SavedItemEntry) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(RemoteError::Write("injected write failure".to_string()));
        }
        self.docs
            .entry(identity.clone())
            .or_default()
            .insert(entry.item_id.clone(), entry.clone());
        self.notify(identity);
        Ok(())
    }

    async fn delete(&self, identity: &Identity, item_id: &ItemId) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(RemoteError::Write("injected write failure".to_string()));
        }
        if let Some(mut docs) = self.docs.get_mut(identity) {
            docs.shift_remove(item_id);
        }
        self.notify(identity);
        Ok(())
    }

    async fn list_all(&self, identity: &Identity) -> Result<Collection, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_reads.load(Ordering::Acquire) {
            return Err(RemoteError::Read("injected read failure".to_string()));
        }
        Ok(self.snapshot(identity))
    }

    async fn subscribe(&self, identity: &Identity) -> broadcast::Receiver<Collection> {
        let tx = self
            .feeds
            .entry(identity.clone())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone();
        let rx = tx.subscribe();
        // Deliver the current snapshot right away, like a document store
        // firing its listener on attach.
        let _ = tx.send(self.snapshot(identity));
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_entry(id: i64, saved_at: i64) -> SavedItemEntry {
        SavedItemEntry::new(ItemId::from(id), json!({"id": id}), saved_at)
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = MemoryCache::new();
        let mut collection = Collection::new();
        collection.insert_front(test_entry(1, 100));

        cache.write("ns", &collection).await.unwrap();
        let back = cache.read("ns").await.unwrap().unwrap();
        assert_eq!(back, collection);
    }

    #[tokio::test]
    async fn test_cache_read_missing_namespace() {
        let cache = MemoryCache::new();
        assert!(cache.read("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_namespaces_are_isolated() {
        let cache = MemoryCache::new();
        let mut a = Collection::new();
        a.insert_front(test_entry(1, 100));
        cache.write("ns_a", &a).await.unwrap();

        assert!(cache.read("ns_b").await.unwrap().is_none());
        assert_eq!(cache.namespace_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_erase() {
        let cache = MemoryCache::new();
        cache.write("ns", &Collection::new()).await.unwrap();
        cache.erase("ns").await.unwrap();
        assert!(cache.read("ns").await.unwrap().is_none());

        // Erasing an absent namespace is fine
        cache.erase("ns").await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_failure_injection() {
        let cache = MemoryCache::new();
        cache.fail_writes(true);
        assert!(matches!(
            cache.write("ns", &Collection::new()).await,
            Err(CacheError::Write { .. })
        ));

        cache.fail_writes(false);
        cache.write("ns", &Collection::new()).await.unwrap();

        cache.fail_reads(true);
        assert!(matches!(cache.read("ns").await, Err(CacheError::Read { .. })));
    }

    #[tokio::test]
    async fn test_remote_upsert_delete_list() {
        let remote = InMemoryRemote::new();
        let user = Identity::user("u1");

        remote.upsert(&user, &test_entry(1, 100)).await.unwrap();
        remote.upsert(&user, &test_entry(2, 200)).await.unwrap();
        assert_eq!(remote.entry_count(&user), 2);

        let listed = remote.list_all(&user).await.unwrap();
        assert_eq!(listed.len(), 2);

        remote.delete(&user, &ItemId::from(1)).await.unwrap();
        assert_eq!(remote.entry_count(&user), 1);
        assert!(remote.server_entry(&user, &ItemId::from(1)).is_none());

        // Deleting an absent document succeeds
        remote.delete(&user, &ItemId::from(99)).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_identities_are_isolated() {
        let remote = InMemoryRemote::new();
        remote.upsert(&Identity::user("a"), &test_entry(1, 100)).await.unwrap();

        assert_eq!(remote.entry_count(&Identity::user("b")), 0);
        assert!(remote.list_all(&Identity::user("b")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_snapshot() {
        let remote = InMemoryRemote::new();
        let user = Identity::user("u1");
        remote.upsert(&user, &test_entry(1, 100)).await.unwrap();

        let mut rx = remote.subscribe(&user).await;
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&ItemId::from(1)));
    }

    #[tokio::test]
    async fn test_feed_notifies_on_writes() {
        let remote = InMemoryRemote::new();
        let user = Identity::user("u1");
        let mut rx = remote.subscribe(&user).await;
        let _ = rx.recv().await.unwrap(); // initial empty snapshot

        remote.upsert(&user, &test_entry(1, 100)).await.unwrap();
        let after_upsert = rx.recv().await.unwrap();
        assert_eq!(after_upsert.len(), 1);

        remote.delete(&user, &ItemId::from(1)).await.unwrap();
        let after_delete = rx.recv().await.unwrap();
        assert!(after_delete.is_empty());
    }

    #[tokio::test]
    async fn test_push_snapshot_replaces_and_notifies() {
        let remote = InMemoryRemote::new();
        let user = Identity::user("u1");
        remote.upsert(&user, &test_entry(1, 100)).await.unwrap();

        let mut rx = remote.subscribe(&user).await;
        let _ = rx.recv().await.unwrap();

        remote.push_snapshot(&user, vec![test_entry(7, 700), test_entry(8, 800)]);
        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.len(), 2);
        assert!(!pushed.contains(&ItemId::from(1)));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_documents_untouched() {
        let remote = InMemoryRemote::new();
        let user = Identity::user("u1");
        remote.upsert(&user, &test_entry(1, 100)).await.unwrap();

        remote.fail_writes(true);
        assert!(remote.upsert(&user, &test_entry(2, 200)).await.is_err());
        assert!(remote.delete(&user, &ItemId::from(1)).await.is_err());
        assert_eq!(remote.entry_count(&user), 1);
    }

    #[tokio::test]
    async fn test_close_feed_ends_subscriptions() {
        let remote = InMemoryRemote::new();
        let user = Identity::user("u1");
        let mut rx = remote.subscribe(&user).await;
        let _ = rx.recv().await.unwrap();

        remote.close_feed(&user);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));

        // Writes after close still land in the documents, unannounced
        remote.upsert(&user, &test_entry(1, 100)).await.unwrap();
        assert_eq!(remote.entry_count(&user), 1);
    }

    #[tokio::test]
    async fn test_delayed_write_is_one_shot() {
        tokio::time::pause();
        let cache = MemoryCache::new();
        cache.delay_next_write_ms(50);

        let start = tokio::time::Instant::now();
        cache.write("ns", &Collection::new()).await.unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_millis(50));

        let again = tokio::time::Instant::now();
        cache.write("ns", &Collection::new()).await.unwrap();
        assert_eq!(again.elapsed(), std::time::Duration::ZERO);
    }

    #[tokio::test]
    async fn test_list_call_count() {
        let remote = InMemoryRemote::new();
        let user = Identity::user("u1");
        assert_eq!(remote.list_call_count(), 0);
        let _ = remote.list_all(&user).await;
        remote.fail_reads(true);
        let _ = remote.list_all(&user).await;
        assert_eq!(remote.list_call_count(), 2);
    }
}
