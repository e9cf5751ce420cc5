//! Configuration for the sync engine.
//!
//! # Example
//!
//! ```
//! use cookbook_sync::{SyncConfig, RollbackPolicy};
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.cache_base_key, "savedItems");
//! assert_eq!(config.reconcile_interval_secs, 30 * 60); // 30 minutes
//!
//! // Full config
//! let config = SyncConfig {
//!     cache_base_key: "savedRecipes".into(),
//!     reconcile_interval_secs: 10 * 60,
//!     reconcile_poll_secs: 30,
//!     rollback: RollbackPolicy::All,
//! };
//! ```

use serde::Deserialize;

/// Configuration for the sync engine.
///
/// All fields have sensible defaults matching the shipped mobile app
/// behavior: a 30-minute reconciliation window and rollback limited to
/// save/unsave failures.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Base cache key; the identity id is appended for authenticated scopes
    #[serde(default = "default_cache_base_key")]
    pub cache_base_key: String,

    /// Force a full remote refresh when this much time has passed since the
    /// last successful sync (default: 30 minutes)
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// How often the run loop checks whether the interval has elapsed
    #[serde(default = "default_reconcile_poll_secs")]
    pub reconcile_poll_secs: u64,

    /// Which failed mutations revert the in-memory collection
    #[serde(default)]
    pub rollback: RollbackPolicy,
}

fn default_cache_base_key() -> String {
    "savedItems".to_string()
}
fn default_reconcile_interval_secs() -> u64 {
    30 * 60
}
fn default_reconcile_poll_secs() -> u64 {
    60
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_base_key: default_cache_base_key(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            reconcile_poll_secs: default_reconcile_poll_secs(),
            rollback: RollbackPolicy::default(),
        }
    }
}

/// Rollback behavior when a mutation's remote write fails.
///
/// The shipped app reverts only save/unsave failures and absorbs the rest,
/// an asymmetry kept here as the default. Rollback always targets the
/// in-memory collection only; the cache snapshot written before the remote
/// call stays on the new value until the next reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Revert failed save/unsave; absorb toggle, cook, and clear failures
    #[default]
    SaveUnsave,
    /// Never revert; every failure is absorbed
    None,
    /// Revert every failed mutation
    All,
}

impl RollbackPolicy {
    /// Whether a failed mutation of this kind gets reverted.
    #[must_use]
    pub fn applies_to(self, kind: crate::engine::MutationKind) -> bool {
        use crate::engine::MutationKind;
        match self {
            Self::SaveUnsave => matches!(kind, MutationKind::Save | MutationKind::Unsave),
            Self::None => false,
            Self::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MutationKind;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.cache_base_key, "savedItems");
        assert_eq!(config.reconcile_interval_secs, 1800);
        assert_eq!(config.reconcile_poll_secs, 60);
        assert_eq!(config.rollback, RollbackPolicy::SaveUnsave);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: SyncConfig = serde_json::from_str(r#"{"reconcile_interval_secs": 600}"#).unwrap();
        assert_eq!(config.reconcile_interval_secs, 600);
        assert_eq!(config.cache_base_key, "savedItems");
        assert_eq!(config.rollback, RollbackPolicy::SaveUnsave);
    }

    #[test]
    fn test_deserialize_rollback_policy() {
        let config: SyncConfig = serde_json::from_str(r#"{"rollback": "all"}"#).unwrap();
        assert_eq!(config.rollback, RollbackPolicy::All);

        let config: SyncConfig = serde_json::from_str(r#"{"rollback": "none"}"#).unwrap();
        assert_eq!(config.rollback, RollbackPolicy::None);
    }

    #[test]
    fn test_rollback_policy_eligibility() {
        let save_unsave = RollbackPolicy::SaveUnsave;
        assert!(save_unsave.applies_to(MutationKind::Save));
        assert!(save_unsave.applies_to(MutationKind::Unsave));
        assert!(!save_unsave.applies_to(MutationKind::ToggleFavorite));
        assert!(!save_unsave.applies_to(MutationKind::MarkCooked));
        assert!(!save_unsave.applies_to(MutationKind::ClearAll));

        assert!(RollbackPolicy::All.applies_to(MutationKind::ClearAll));
        assert!(!RollbackPolicy::None.applies_to(MutationKind::Save));
    }
}
