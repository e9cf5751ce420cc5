//! Public types for the saved-item engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::storage::traits::RemoteError;

/// Engine lifecycle state.
///
/// The engine progresses through states during startup, identity switches,
/// and shutdown. Use [`super::SyncEngine::state()`] to check current state
/// or [`super::SyncEngine::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Just created, not yet started
    Created,
    /// Loading cached state and refreshing from the remote store
    Hydrating,
    /// Serving reads and accepting mutations
    Ready,
    /// Graceful shutdown in progress
    ShuttingDown,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Hydrating => write!(f, "Hydrating"),
            Self::Ready => write!(f, "Ready"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
        }
    }
}

/// Which mutation produced a pending remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// A new item was saved (or re-saved)
    Save,
    /// An item was removed
    Unsave,
    /// The favorite flag was flipped
    ToggleFavorite,
    /// An item was marked as cooked
    MarkCooked,
    /// The cooked flag was cleared
    UnmarkCooked,
    /// The whole collection was emptied
    ClearAll,
}

impl MutationKind {
    /// Stable lowercase label, used for logging and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Unsave => "unsave",
            Self::ToggleFavorite => "toggle_favorite",
            Self::MarkCooked => "mark_cooked",
            Self::UnmarkCooked => "unmark_cooked",
            Self::ClearAll => "clear_all",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle to a remote write that is still in flight.
///
/// Every mutation returns one of these after the local state has already
/// been updated. Await [`outcome()`](Self::outcome) to learn whether the
/// background write succeeded; dropping the handle leaves the write
/// running fire-and-forget.
#[derive(Debug)]
pub struct PendingWrite {
    pub(super) kind: MutationKind,
    pub(super) rx: oneshot::Receiver<Result<(), RemoteError>>,
}

impl PendingWrite {
    /// Which mutation this write belongs to.
    #[must_use]
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Wait for the background remote write to finish.
    ///
    /// Returns [`RemoteError::Canceled`] if the engine dropped the write
    /// before reporting (for example on shutdown).
    pub async fn outcome(self) -> Result<(), RemoteError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Canceled),
        }
    }
}

/// Guard that tracks one in-flight remote write.
///
/// Increments the shared counter on creation and decrements on drop, so
/// `is_syncing()` stays accurate even when the write task panics.
pub(super) struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl InFlightGuard {
    pub(super) fn new(counter: Arc<AtomicUsize>) -> Self {
        let now = counter.fetch_add(1, Ordering::AcqRel) + 1;
        crate::metrics::set_in_flight_writes(now);
        Self { counter }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let now = self.counter.fetch_sub(1, Ordering::AcqRel) - 1;
        crate::metrics::set_in_flight_writes(now);
    }
}
