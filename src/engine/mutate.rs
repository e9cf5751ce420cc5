// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Optimistic mutations: save, unsave, toggle favorite, cooked flags, clear.
//!
//! Every mutation follows the same sequence:
//! 1. Apply to the in-memory collection under the write lock
//! 2. Persist the new snapshot to the local cache (failure is logged, not fatal)
//! 3. Push the change to the remote store in a background task
//!
//! Steps 1–2 form one commit section, serialized per engine, so cache
//! snapshots always land in apply order even when mutations are issued from
//! concurrent tasks. Reads observe step 1 immediately and never wait on a
//! commit. If step 3 fails and the rollback policy covers the mutation, the
//! in-memory collection is restored to its state from before the mutation.
//! The cache is NOT restored, so until the next successful reconcile a
//! restart may resurrect the optimistic state.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::entry::{Collection, ItemId, SaveOptions, SavedItemEntry};
use crate::identity::Identity;
use crate::storage::traits::{RemoteError, RemoteStore};

use super::types::InFlightGuard;
use super::{MutationKind, PendingWrite, SyncEngine};

/// Remote side effect of a locally applied mutation.
pub(super) enum RemoteAction {
    Upsert(SavedItemEntry),
    Delete(ItemId),
    DeleteMany(Vec<ItemId>),
}

impl SyncEngine {
    // ═══════════════════════════════════════════════════════════════════════════
    // API: Mutations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Save an item with default options.
    ///
    /// If the item is already saved it moves back to the front of the
    /// collection with a fresh `savedAt` and default flags.
    ///
    /// Returns `None` if the payload carries no usable `id` field.
    pub async fn save_item(&self, payload: serde_json::Value) -> Option<PendingWrite> {
        self.save_item_with(payload, SaveOptions::default()).await
    }

    /// Save an item with explicit initial flags.
    #[tracing::instrument(skip(self, payload, opts), fields(item_id))]
    pub async fn save_item_with(
        &self,
        payload: serde_json::Value,
        opts: SaveOptions,
    ) -> Option<PendingWrite> {
        let Some(item_id) = ItemId::from_payload(&payload) else {
            warn!("payload has no usable id field, refusing to save");
            return None;
        };
        tracing::Span::current().record("item_id", item_id.as_str());

        let entry = SavedItemEntry::with_options(item_id, payload, self.clock.now_ms(), &opts);
        self.mutate(MutationKind::Save, move |collection| {
            collection.insert_front(entry.clone());
            Some(RemoteAction::Upsert(entry))
        })
        .await
    }

    /// Remove a saved item.
    ///
    /// Returns `None` if the item was not saved.
    pub async fn unsave_item(&self, id: impl Into<ItemId>) -> Option<PendingWrite> {
        let item_id = id.into();
        self.mutate(MutationKind::Unsave, move |collection| {
            collection.remove(&item_id)?;
            Some(RemoteAction::Delete(item_id))
        })
        .await
    }

    /// Flip the favorite flag on a saved item.
    ///
    /// Returns `None` if the item is not saved.
    pub async fn toggle_favorite(&self, id: impl Into<ItemId>) -> Option<PendingWrite> {
        let item_id = id.into();
        self.mutate(MutationKind::ToggleFavorite, move |collection| {
            let entry = collection.get_mut(&item_id)?;
            entry.is_favorite = !entry.is_favorite;
            Some(RemoteAction::Upsert(entry.clone()))
        })
        .await
    }

    /// Mark a saved item as cooked, stamping `cookedAt` with the current time.
    ///
    /// `notes` replaces any previous cooking notes; pass `None` to clear them.
    /// Returns `None` if the item is not saved.
    pub async fn mark_cooked(
        &self,
        id: impl Into<ItemId>,
        notes: Option<String>,
    ) -> Option<PendingWrite> {
        let item_id = id.into();
        let now = self.clock.now_ms();
        self.mutate(MutationKind::MarkCooked, move |collection| {
            let entry = collection.get_mut(&item_id)?;
            entry.is_cooked = true;
            entry.cooked_at = Some(now);
            entry.notes = notes;
            Some(RemoteAction::Upsert(entry.clone()))
        })
        .await
    }

    /// Clear the cooked flag and timestamp. Cooking notes are kept.
    ///
    /// Returns `None` if the item is not saved.
    pub async fn unmark_cooked(&self, id: impl Into<ItemId>) -> Option<PendingWrite> {
        let item_id = id.into();
        self.mutate(MutationKind::UnmarkCooked, move |collection| {
            let entry = collection.get_mut(&item_id)?;
            entry.is_cooked = false;
            entry.cooked_at = None;
            Some(RemoteAction::Upsert(entry.clone()))
        })
        .await
    }

    /// Remove every saved item for the current identity.
    ///
    /// The remote side issues one delete per entry; the first failure is
    /// reported but the remaining deletes still run. Returns `None` if the
    /// collection was already empty.
    #[tracing::instrument(skip(self))]
    pub async fn clear_all(&self) -> Option<PendingWrite> {
        let _commit = self.commit_lock.lock().await;
        let namespace = self.namespace();
        let (before, ids, generation) = {
            let mut guard = self.collection.write();
            if guard.is_empty() {
                debug!("collection already empty, nothing to clear");
                return None;
            }
            let before = guard.clone();
            let ids: Vec<ItemId> = guard.ids().cloned().collect();
            guard.clear();
            (before, ids, self.generation.load(Ordering::Acquire))
        };

        crate::metrics::record_mutation(MutationKind::ClearAll.as_str());
        crate::metrics::set_saved_items(0);

        if let Err(e) = self.cache.erase(&namespace).await {
            warn!(namespace = %namespace, error = %e, "failed to erase local cache");
            crate::metrics::record_cache_failure("erase");
        }

        Some(self.spawn_remote(
            MutationKind::ClearAll,
            RemoteAction::DeleteMany(ids),
            before,
            generation,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Mutation driver
    // ═══════════════════════════════════════════════════════════════════════════

    /// Apply a mutation locally, persist it, and push it to the remote store.
    ///
    /// `apply` runs under the collection write lock and returns the remote
    /// side effect, or `None` when the mutation turned out to be a no-op
    /// (nothing changed, nothing is written anywhere).
    async fn mutate<F>(&self, kind: MutationKind, apply: F) -> Option<PendingWrite>
    where
        F: FnOnce(&mut Collection) -> Option<RemoteAction>,
    {
        let _commit = self.commit_lock.lock().await;
        let namespace = self.namespace();
        let (before, after, action, generation) = {
            let mut guard = self.collection.write();
            let before = guard.clone();
            let Some(action) = apply(&mut guard) else {
                debug!(kind = %kind, "mutation is a no-op, skipping");
                return None;
            };
            let generation = self.generation.load(Ordering::Acquire);
            (before, guard.clone(), action, generation)
        };

        crate::metrics::record_mutation(kind.as_str());
        crate::metrics::set_saved_items(after.len());

        if let Err(e) = self.cache.write(&namespace, &after).await {
            warn!(namespace = %namespace, error = %e, "failed to persist mutation to local cache");
            crate::metrics::record_cache_failure("write");
        }

        Some(self.spawn_remote(kind, action, before, generation))
    }

    /// Spawn the background remote write for an applied mutation.
    ///
    /// On failure, the in-memory collection is reverted to `before` when the
    /// rollback policy covers `kind` and no identity switch happened since
    /// the mutation (checked via the session generation).
    fn spawn_remote(
        &self,
        kind: MutationKind,
        action: RemoteAction,
        before: Collection,
        generation: u64,
    ) -> PendingWrite {
        let (tx, rx) = oneshot::channel();

        let remote = self.remote.clone();
        let identity = self.identity.read().clone();
        let collection = self.collection.clone();
        let generations = self.generation.clone();
        let rollback = self.config.rollback;
        let guard = InFlightGuard::new(self.in_flight.clone());

        tokio::spawn(async move {
            let _guard = guard;
            let _timer = crate::time_operation!("remote_write");

            let result = match &action {
                RemoteAction::Upsert(entry) => remote.upsert(&identity, entry).await,
                RemoteAction::Delete(item_id) => remote.delete(&identity, item_id).await,
                RemoteAction::DeleteMany(ids) => Self::delete_many(&remote, &identity, ids).await,
            };

            if let Err(ref e) = result {
                warn!(kind = %kind, identity = %identity, error = %e, "remote write failed");
                crate::metrics::record_remote_failure(kind.as_str());

                if rollback.applies_to(kind) {
                    // Generation is checked under the collection lock;
                    // switch_identity bumps it before touching the
                    // collection, so a stale rollback can never install
                    // the previous identity's entries
                    let mut guard = collection.write();
                    if generations.load(Ordering::Acquire) == generation {
                        warn!(kind = %kind, "reverting in-memory collection after failed remote write");
                        crate::metrics::record_rollback(kind.as_str());
                        *guard = before;
                    } else {
                        debug!(kind = %kind, "session changed, skipping rollback");
                    }
                }
            }

            // Drop the guard before reporting so is_syncing() is already
            // false for anyone awaiting the outcome
            drop(_guard);
            let _ = tx.send(result);
        });

        PendingWrite { kind, rx }
    }

    /// Delete a batch of items in parallel, reporting the first failure.
    async fn delete_many(
        remote: &Arc<dyn RemoteStore>,
        identity: &Identity,
        ids: &[ItemId],
    ) -> Result<(), RemoteError> {
        let mut join_set: JoinSet<Result<(), RemoteError>> = JoinSet::new();

        for id in ids {
            let remote = remote.clone();
            let identity = identity.clone();
            let id = id.clone();
            join_set.spawn(async move { remote.delete(&identity, &id).await });
        }

        let mut first_err = None;
        while let Some(joined) = join_set.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "delete task did not complete");
                    Err(RemoteError::Canceled)
                }
            };
            if let Err(e) = outcome {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
