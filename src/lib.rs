//! # Cookbook Sync
//!
//! An offline-first engine for a user's saved-recipe collection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Application UI                        │
//! │  • Synchronous reads: is_saved(), entries(), favorites()   │
//! │  • Optimistic mutations: save_item(), toggle_favorite()    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    In-Memory Collection                     │
//! │  • Ordered newest first, source of truth for reads         │
//! │  • Mutations apply here before any I/O                     │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   │
//!   (snapshot after every change)      (background write per op)
//!            ▼                                   ▼
//! ┌──────────────────────────┐    ┌──────────────────────────────┐
//! │       Local Cache        │    │        Remote Store          │
//! │  • SQLite on device      │    │  • Authoritative per user    │
//! │  • Instant cold starts   │    │  • Push feed + reconcile     │
//! └──────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cookbook_sync::{
//!     SyncEngine, SyncConfig, Identity,
//!     MemoryCache, InMemoryRemote, SystemClock,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (identity_tx, identity_rx) = watch::channel(Identity::Anonymous);
//!
//!     let engine = Arc::new(SyncEngine::new(
//!         SyncConfig::default(),
//!         Arc::new(MemoryCache::new()),
//!         Arc::new(InMemoryRemote::new()),
//!         Arc::new(SystemClock),
//!         identity_rx,
//!     ));
//!
//!     // Hydrate from cache, then from the remote store
//!     engine.start().await;
//!
//!     // Drive push events, identity switches, and periodic reconciles
//!     let runner = engine.clone();
//!     let loop_task = tokio::spawn(async move { runner.run().await });
//!
//!     // Mutations return instantly; the remote write continues in background
//!     let pending = engine
//!         .save_item(json!({"id": 42, "title": "Miso Ramen"}))
//!         .await
//!         .expect("payload has an id");
//!     assert!(engine.is_saved(42));
//!     pending.outcome().await.expect("remote write succeeded");
//!
//!     // Logging in tears down anonymous state and hydrates the account
//!     identity_tx.send(Identity::user("rosa")).expect("engine listening");
//!
//!     engine.shutdown();
//!     let _ = loop_task.await;
//! }
//! ```
//!
//! ## Features
//!
//! - **Offline-first reads**: every query answers from memory, no awaits
//! - **Optimistic mutations**: local apply + cache persist, remote write in background
//! - **Cache-then-network startup**: cached snapshot serves until the remote answers
//! - **Last-writer-wins snapshots**: remote push events replace state wholesale
//! - **Identity switching**: login/logout tears down and rehydrates per account
//! - **Periodic reconcile**: drift from missed pushes converges on a fixed interval
//! - **Failure rollback**: failed save/unsave writes revert the optimistic change
//!
//! ## Configuration
//!
//! See [`SyncConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`engine`]: The main [`SyncEngine`] orchestrating all components
//! - [`entry`]: Saved entries, item ids, and the ordered collection
//! - [`identity`]: User identity and cache namespacing
//! - [`storage`]: Local cache and remote store backends
//! - [`clock`]: Time source abstraction for deterministic tests

pub mod clock;
pub mod config;
pub mod engine;
pub mod entry;
pub mod identity;
pub mod metrics;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RollbackPolicy, SyncConfig};
pub use engine::{EngineState, MutationKind, PendingWrite, SyncEngine};
pub use entry::{Collection, ItemId, SaveOptions, SavedItemEntry};
pub use identity::Identity;
pub use metrics::LatencyTimer;
pub use storage::memory::{InMemoryRemote, MemoryCache};
pub use storage::sqlite::SqliteCache;
pub use storage::traits::{CacheError, LocalCache, RemoteError, RemoteStore};
