// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Saved-item engine coordinator.
//!
//! The [`SyncEngine`] is the main orchestrator that ties together all components:
//! - In-memory collection, the single source of truth for reads
//! - Local cache for instant cold starts (SQLite or in-memory)
//! - Remote store holding the authoritative per-user collection
//! - Identity watch channel driving cache namespaces and teardown
//!
//! # Lifecycle
//!
//! ```text
//! Created → Hydrating → Ready → ShuttingDown
//! ```
//!
//! An identity switch re-enters `Hydrating` while the new account's state
//! is loaded, then returns to `Ready`.
//!
//! # Example
//!
//! ```rust,no_run
//! use cookbook_sync::{
//!     SyncEngine, SyncConfig, EngineState, Identity,
//!     MemoryCache, InMemoryRemote, SystemClock,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (_identity_tx, identity_rx) = watch::channel(Identity::Anonymous);
//! let engine = SyncEngine::new(
//!     SyncConfig::default(),
//!     Arc::new(MemoryCache::new()),
//!     Arc::new(InMemoryRemote::new()),
//!     Arc::new(SystemClock),
//!     identity_rx,
//! );
//!
//! assert_eq!(engine.state(), EngineState::Created);
//!
//! engine.start().await;
//! engine.save_item(json!({"id": 42, "title": "Miso Ramen"})).await;
//! assert!(engine.is_saved(42));
//! # }
//! ```

mod types;
mod mutate;
mod listener;
mod reconcile;
mod lifecycle;

pub use types::{EngineState, MutationKind, PendingWrite};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::entry::{Collection, ItemId, SavedItemEntry};
use crate::identity::Identity;
use crate::storage::traits::{LocalCache, RemoteStore};

/// Main saved-item engine.
///
/// Reads are served synchronously from the in-memory collection. Mutations
/// apply locally first, persist to the cache, then push to the remote store
/// in the background (see [`PendingWrite`]).
///
/// # Thread Safety
///
/// The engine is `Send + Sync` and designed for concurrent access. All
/// methods take `&self`; share it behind an `Arc` to drive the run loop
/// and the public API from different tasks. Mutations commit one at a
/// time (apply + cache persist); queries never wait on a commit.
pub struct SyncEngine {
    /// Static configuration
    pub(super) config: SyncConfig,

    /// Local snapshot cache (SQLite on device, in-memory in tests)
    pub(super) cache: Arc<dyn LocalCache>,

    /// Authoritative remote store
    pub(super) remote: Arc<dyn RemoteStore>,

    /// Time source (swap for a manual clock in tests)
    pub(super) clock: Arc<dyn Clock>,

    /// In-memory collection, newest first (source of truth for reads)
    pub(super) collection: Arc<RwLock<Collection>>,

    /// Identity whose collection is currently loaded
    pub(super) identity: Arc<RwLock<Identity>>,

    /// Identity updates (Mutex for interior mutability in run loop)
    pub(super) identity_rx: Mutex<watch::Receiver<Identity>>,

    /// Engine state (broadcast to watchers)
    pub(super) state: watch::Sender<EngineState>,

    /// Engine state receiver (for internal use)
    pub(super) state_rx: watch::Receiver<EngineState>,

    /// Remote writes currently in flight
    pub(super) in_flight: Arc<AtomicUsize>,

    /// Epoch millis of the last successful remote reconcile
    pub(super) last_sync: Arc<RwLock<Option<i64>>>,

    /// Session generation, bumped on every identity switch. Stale
    /// background work checks this before touching shared state.
    pub(super) generation: Arc<AtomicU64>,

    /// Serializes the apply+persist section of mutations and snapshot
    /// installs, so whole-snapshot cache writes land in apply order
    pub(super) commit_lock: Mutex<()>,
}

impl SyncEngine {
    /// Create a new engine for the identity currently in `identity_rx`.
    ///
    /// The engine starts in `Created` state with an empty collection.
    /// Call [`start()`](Self::start) to hydrate from cache and remote.
    pub fn new(
        config: SyncConfig,
        cache: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        identity_rx: watch::Receiver<Identity>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let initial_identity = identity_rx.borrow().clone();

        Self {
            config,
            cache,
            remote,
            clock,
            collection: Arc::new(RwLock::new(Collection::new())),
            identity: Arc::new(RwLock::new(initial_identity)),
            identity_rx: Mutex::new(identity_rx),
            state: state_tx,
            state_rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
            last_sync: Arc::new(RwLock::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            commit_lock: Mutex::new(()),
        }
    }

    /// Get current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Check if the engine is hydrated and serving.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state(), EngineState::Ready)
    }

    /// The identity whose collection is currently loaded.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.identity.read().clone()
    }

    /// Cache namespace for the current identity.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.identity.read().namespace(&self.config.cache_base_key)
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // API: Synchronous collection queries
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check whether an item is saved.
    #[must_use]
    pub fn is_saved(&self, id: impl Into<ItemId>) -> bool {
        self.collection.read().contains(&id.into())
    }

    /// Get a snapshot of a single saved entry.
    #[must_use]
    pub fn get_entry(&self, id: impl Into<ItemId>) -> Option<SavedItemEntry> {
        self.collection.read().get(&id.into()).cloned()
    }

    /// Check whether a saved item is flagged as favorite.
    ///
    /// Returns `false` for items that are not saved at all.
    #[must_use]
    pub fn is_favorite(&self, id: impl Into<ItemId>) -> bool {
        self.collection
            .read()
            .get(&id.into())
            .map(|e| e.is_favorite)
            .unwrap_or(false)
    }

    /// Check whether a saved item has been cooked.
    #[must_use]
    pub fn is_cooked(&self, id: impl Into<ItemId>) -> bool {
        self.collection
            .read()
            .get(&id.into())
            .map(|e| e.is_cooked)
            .unwrap_or(false)
    }

    /// All saved entries, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<SavedItemEntry> {
        self.collection.read().entries().cloned().collect()
    }

    /// Saved entries flagged as favorite, newest first.
    #[must_use]
    pub fn favorites(&self) -> Vec<SavedItemEntry> {
        self.collection
            .read()
            .entries()
            .filter(|e| e.is_favorite)
            .cloned()
            .collect()
    }

    /// Saved entries the user has cooked, newest first.
    #[must_use]
    pub fn cooked(&self) -> Vec<SavedItemEntry> {
        self.collection
            .read()
            .entries()
            .filter(|e| e.is_cooked)
            .cloned()
            .collect()
    }

    /// Saved entries not yet cooked, newest first.
    #[must_use]
    pub fn uncooked(&self) -> Vec<SavedItemEntry> {
        self.collection
            .read()
            .entries()
            .filter(|e| !e.is_cooked)
            .cloned()
            .collect()
    }

    /// Number of saved items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collection.read().len()
    }

    /// Check if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collection.read().is_empty()
    }

    /// Check if any remote writes are still in flight.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Epoch millis of the last successful remote reconcile, if any.
    #[must_use]
    pub fn last_sync(&self) -> Option<i64> {
        *self.last_sync.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{InMemoryRemote, MemoryCache};
    use serde_json::json;

    fn test_engine() -> SyncEngine {
        let (_tx, rx) = watch::channel(Identity::Anonymous);
        SyncEngine::new(
            SyncConfig::default(),
            Arc::new(MemoryCache::new()),
            Arc::new(InMemoryRemote::new()),
            Arc::new(crate::clock::ManualClock::new(1_000)),
            rx,
        )
    }

    #[test]
    fn test_new_engine_starts_created_and_empty() {
        let engine = test_engine();
        assert_eq!(engine.state(), EngineState::Created);
        assert!(!engine.is_ready());
        assert!(engine.is_empty());
        assert_eq!(engine.len(), 0);
        assert!(engine.last_sync().is_none());
        assert!(!engine.is_syncing());
    }

    #[test]
    fn test_namespace_follows_identity() {
        let (tx, rx) = watch::channel(Identity::user("rosa"));
        let engine = SyncEngine::new(
            SyncConfig::default(),
            Arc::new(MemoryCache::new()),
            Arc::new(InMemoryRemote::new()),
            Arc::new(crate::clock::ManualClock::new(0)),
            rx,
        );
        drop(tx);

        assert_eq!(engine.identity(), Identity::user("rosa"));
        assert_eq!(engine.namespace(), "savedItems_rosa");
    }

    #[tokio::test]
    async fn test_queries_on_missing_items_are_false() {
        let engine = test_engine();
        assert!(!engine.is_saved(7));
        assert!(!engine.is_favorite(7));
        assert!(!engine.is_cooked(7));
        assert!(engine.get_entry(7).is_none());
    }

    #[tokio::test]
    async fn test_filtered_views() {
        let engine = test_engine();
        engine.save_item(json!({"id": 1, "title": "Pho"})).await;
        engine
            .save_item_with(
                json!({"id": 2, "title": "Bibimbap"}),
                crate::entry::SaveOptions::default().favorite(),
            )
            .await;
        engine
            .save_item_with(
                json!({"id": 3, "title": "Dal"}),
                crate::entry::SaveOptions::default().cooked(),
            )
            .await;

        let fav_ids: Vec<_> = engine.favorites().iter().map(|e| e.item_id.clone()).collect();
        assert_eq!(fav_ids, [ItemId::from(2)]);

        let cooked_ids: Vec<_> = engine.cooked().iter().map(|e| e.item_id.clone()).collect();
        assert_eq!(cooked_ids, [ItemId::from(3)]);

        assert_eq!(engine.uncooked().len(), 2);
        assert_eq!(engine.entries().len(), 3);
    }
}
