// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote snapshot application.
//!
//! The remote store is authoritative: whenever a full snapshot arrives
//! (push event or reconcile), it replaces the in-memory collection
//! wholesale. There is no per-entry merging. A snapshot that races with
//! a local optimistic mutation simply wins or loses by arrival order,
//! and the periodic reconcile converges whichever way it lands.

use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use crate::entry::Collection;

use super::SyncEngine;

impl SyncEngine {
    /// Replace local state with an authoritative remote snapshot.
    ///
    /// The snapshot is normalized (ordered newest first, duplicates
    /// collapsed) before installing, then persisted to the local cache.
    /// `generation` is the session the snapshot was fetched under: a
    /// snapshot from a previous session is discarded and `false` is
    /// returned, so an identity switch can never surface another
    /// identity's entries. With `record_sync` the install also stamps
    /// `last_sync`, inside the same fenced region.
    pub(super) async fn apply_remote_snapshot(
        &self,
        snapshot: Collection,
        source: &'static str,
        generation: u64,
        record_sync: bool,
    ) -> bool {
        let snapshot = snapshot.normalized();
        let entries = snapshot.len();

        let _commit = self.commit_lock.lock().await;

        // Generation check, install, and cache-key derivation happen in
        // one collection lock hold; switch_identity bumps the generation
        // before it touches the collection or the identity
        let namespace = {
            let mut guard = self.collection.write();
            if self.generation.load(Ordering::Acquire) != generation {
                debug!(source, "snapshot belongs to a previous session, discarding");
                return false;
            }
            *guard = snapshot.clone();
            if record_sync {
                *self.last_sync.write() = Some(self.clock.now_ms());
            }
            self.identity.read().namespace(&self.config.cache_base_key)
        };

        crate::metrics::record_snapshot_applied(source);
        crate::metrics::set_saved_items(entries);

        if let Err(e) = self.cache.write(&namespace, &snapshot).await {
            warn!(namespace = %namespace, error = %e, "failed to persist remote snapshot to cache");
            crate::metrics::record_cache_failure("write");
        }

        debug!(entries, source, "applied remote snapshot");
        true
    }
}
