//! Engine lifecycle management: start, run loop, identity switches, shutdown.

use std::sync::atomic::Ordering;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::identity::Identity;

use super::{EngineState, SyncEngine};

impl SyncEngine {
    /// Start the engine: hydrate from local cache, then refresh from remote.
    ///
    /// Hydration flow:
    /// 1. Read the cached snapshot for the current identity (instant reads)
    /// 2. Fetch the authoritative collection from the remote store
    /// 3. Ready
    ///
    /// Neither step is fatal. A missing or failing cache starts empty; a
    /// failing remote leaves the cached snapshot serving until the next
    /// reconcile succeeds.
    #[tracing::instrument(skip(self), fields(identity = %self.identity()))]
    pub async fn start(&self) {
        info!("starting saved-item engine");
        self.set_state(EngineState::Hydrating);

        self.hydrate_session().await;

        self.set_state(EngineState::Ready);
        info!(entries = self.len(), "saved-item engine ready");
    }

    /// Run the main event loop.
    ///
    /// Drives three concerns until [`shutdown()`](Self::shutdown) is called:
    /// - identity updates from the watch channel (tear down and rehydrate)
    /// - push events from the remote feed (apply snapshot)
    /// - the periodic reconcile timer (see [`tick()`](Self::tick))
    ///
    /// Only one run loop per engine; a second concurrent call logs a
    /// warning and returns immediately.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) {
        let mut identity_rx = match self.identity_rx.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("run loop already active for this engine, ignoring second call");
                return;
            }
        };

        info!("saved-item engine run loop started");

        // The generation captured at subscribe time fences the feed: if
        // the identity changes out from under the subscription, buffered
        // snapshots for the old identity are discarded on apply
        let mut feed_gen = self.generation.load(Ordering::Acquire);
        let mut feed = self.remote.subscribe(&self.identity()).await;
        let mut feed_open = true;
        let mut identity_open = true;

        let mut poll = tokio::time::interval(tokio::time::Duration::from_secs(
            self.config.reconcile_poll_secs,
        ));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut state_rx = self.state_rx.clone();

        loop {
            tokio::select! {
                changed = identity_rx.changed(), if identity_open => {
                    match changed {
                        Ok(()) => {
                            let next = identity_rx.borrow_and_update().clone();
                            self.switch_identity(next).await;
                            feed_gen = self.generation.load(Ordering::Acquire);
                            feed = self.remote.subscribe(&self.identity()).await;
                            feed_open = true;
                        }
                        Err(_) => {
                            debug!("identity channel closed, keeping current identity");
                            identity_open = false;
                        }
                    }
                }

                msg = feed.recv(), if feed_open => {
                    match msg {
                        Ok(snapshot) => {
                            self.apply_remote_snapshot(snapshot, "push", feed_gen, false).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "push feed lagged, skipping ahead to latest");
                        }
                        Err(RecvError::Closed) => {
                            warn!("push feed closed, relying on periodic reconcile");
                            feed_open = false;
                        }
                    }
                }

                _ = poll.tick() => {
                    self.tick().await;
                }

                // The watch::Ref returned by wait_for wraps a non-Send
                // read guard; drop it inside the branch future so the run
                // loop stays Send and can be tokio::spawn'ed
                _ = async {
                    let _ = state_rx
                        .wait_for(|s| matches!(s, EngineState::ShuttingDown))
                        .await;
                } => {
                    break;
                }
            }
        }

        info!("saved-item engine run loop stopped");
    }

    /// Replace the active identity, tearing down the previous session.
    ///
    /// The in-memory collection is cleared before the first await point;
    /// the new session must never observe the old account's items. The
    /// old session's cache namespace is left intact for its next login.
    ///
    /// Switching to the identity already active is a no-op.
    ///
    /// When the run loop is active, prefer sending the new identity
    /// through the watch channel: a direct call leaves the loop's push
    /// subscription on the previous identity until the next watch event.
    /// That gap is safe (the session fence discards the old feed's
    /// snapshots and periodic reconciliation covers missed pushes) but
    /// push delivery for the new identity is delayed.
    #[tracing::instrument(skip(self), fields(to = %identity))]
    pub async fn switch_identity(&self, identity: Identity) {
        let previous = self.identity();
        if previous == identity {
            debug!(identity = %identity, "identity unchanged, nothing to do");
            return;
        }

        info!(from = %previous, to = %identity, "switching identity");
        crate::metrics::record_identity_switch();

        // Fence: in-flight writes and refreshes from the old session
        // compare against this counter before touching shared state
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.set_state(EngineState::Hydrating);

        self.collection.write().clear();
        crate::metrics::set_saved_items(0);
        *self.identity.write() = identity;
        *self.last_sync.write() = None;

        self.hydrate_session().await;
        self.set_state(EngineState::Ready);
    }

    /// Initiate shutdown. The run loop observes the state change and exits.
    #[tracing::instrument(skip(self))]
    pub fn shutdown(&self) {
        info!("initiating saved-item engine shutdown");
        self.set_state(EngineState::ShuttingDown);
    }

    fn set_state(&self, state: EngineState) {
        let _ = self.state.send(state);
        crate::metrics::set_engine_state(&state.to_string());
    }
}
