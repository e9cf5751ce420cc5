//! Cache hydration and periodic remote reconciliation.
//!
//! Hydration is cache-then-network: the cached snapshot goes live
//! immediately so cold starts render without waiting on I/O, then a
//! remote refresh replaces it with the authoritative collection. The
//! run loop re-runs the refresh on a fixed interval to pull in changes
//! made on other devices.

use std::sync::atomic::Ordering;

use tracing::{debug, info, warn};

use crate::entry::Collection;
use crate::storage::traits::RemoteError;

use super::types::InFlightGuard;
use super::SyncEngine;

impl SyncEngine {
    /// Load state for the current identity: cache first, then remote.
    ///
    /// Cache failures are survivable (start empty, refresh fills in);
    /// remote failures leave the cached state serving.
    pub(super) async fn hydrate_session(&self) {
        let namespace = self.namespace();

        match self.cache.read(&namespace).await {
            Ok(Some(collection)) => {
                let collection = collection.normalized();
                info!(
                    namespace = %namespace,
                    entries = collection.len(),
                    "hydrated from local cache"
                );
                crate::metrics::set_saved_items(collection.len());
                *self.collection.write() = collection;
            }
            Ok(None) => {
                debug!(namespace = %namespace, "no cached snapshot, starting empty");
                *self.collection.write() = Collection::new();
            }
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "cache read failed, starting empty");
                crate::metrics::record_cache_failure("read");
                *self.collection.write() = Collection::new();
            }
        }

        let _ = self.refresh().await;
    }

    /// Fetch the authoritative collection from the remote store and
    /// replace local state with it.
    ///
    /// On failure the engine keeps serving whatever it already has,
    /// cached or optimistic.
    pub async fn refresh(&self) -> Result<(), RemoteError> {
        let _guard = InFlightGuard::new(self.in_flight.clone());
        let _timer = crate::time_operation!("refresh");

        let identity = self.identity();
        let generation = self.generation.load(Ordering::Acquire);

        match self.remote.list_all(&identity).await {
            Ok(snapshot) => {
                // An identity switch while the fetch was in flight makes
                // this snapshot belong to the previous session
                if !self
                    .apply_remote_snapshot(snapshot, "reconcile", generation, true)
                    .await
                {
                    debug!(identity = %identity, "identity changed during refresh, discarding result");
                    crate::metrics::record_reconcile("stale");
                    return Ok(());
                }

                crate::metrics::record_reconcile("success");
                Ok(())
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "remote refresh failed, serving cached state");
                crate::metrics::record_reconcile("error");
                Err(e)
            }
        }
    }

    /// Run one reconcile check: refresh if the interval has elapsed.
    ///
    /// Called by the run loop on every poll tick; also available for
    /// manual stepping in apps that drive their own scheduler.
    pub async fn tick(&self) {
        let due = match *self.last_sync.read() {
            None => true,
            Some(at) => {
                let elapsed = self.clock.now_ms().saturating_sub(at);
                elapsed >= (self.config.reconcile_interval_secs as i64).saturating_mul(1000)
            }
        };

        if due {
            debug!("reconcile interval elapsed, refreshing from remote");
            let _ = self.refresh().await;
        }
    }
}
