// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic saved-item engine usage example.
//!
//! Demonstrates:
//! 1. Building an engine over the in-memory backends
//! 2. Saving recipes and querying them synchronously
//! 3. Flags: favorites, cooked with notes
//! 4. A push event from "another device"
//! 5. Failure rollback for an unsave that never reached the server
//! 6. Identity switch (anonymous → logged in → back)
//! 7. Listing the metrics the run recorded
//! 8. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use tokio::sync::watch;

use cookbook_sync::{
    EngineState, Identity, InMemoryRemote, ItemId, MemoryCache, SaveOptions, SyncConfig,
    SyncEngine, SystemClock,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Capture metrics in-process so the demo can print them at the end
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    // Simple logging (no filter for simplicity)
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║          cookbook-sync: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and start the engine
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Configuring cookbook-sync...");

    let cache = Arc::new(MemoryCache::new());
    let remote = Arc::new(InMemoryRemote::new());
    let (identity_tx, identity_rx) = watch::channel(Identity::Anonymous);

    let engine = Arc::new(SyncEngine::new(
        SyncConfig::default(),
        cache,
        remote.clone(),
        Arc::new(SystemClock),
        identity_rx,
    ));

    println!("   State: {:?}", engine.state());

    println!("\n🚀 Starting engine (hydrating from cache + remote)...");
    engine.start().await;

    assert_eq!(engine.state(), EngineState::Ready);
    println!("   ✅ Engine ready! State: {:?}", engine.state());

    // Run loop drives push events, identity switches, periodic reconciles
    let runner = engine.clone();
    let loop_task = tokio::spawn(async move { runner.run().await });

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Save 5 recipes (with timing)
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Saving 5 recipes...");
    println!("   ⏱️  Timing each save to showcase optimistic local writes");

    let recipes = vec![
        json!({"id": 101, "title": "Miso Ramen", "minutes": 45}),
        json!({"id": 102, "title": "Shakshuka", "minutes": 25}),
        json!({"id": 103, "title": "Beef Rendang", "minutes": 240}),
        json!({"id": 104, "title": "Dal Tadka", "minutes": 40}),
        json!({"id": 105, "title": "Pho Bo", "minutes": 180}),
    ];

    let mut pendings = Vec::new();
    for recipe in &recipes {
        let start = std::time::Instant::now();
        let pending = engine.save_item(recipe.clone()).await.expect("recipe has an id");
        let elapsed = start.elapsed();
        println!(
            "   └─ Saved: {} ({:?}, remote write in background)",
            recipe["title"], elapsed
        );
        pendings.push(pending);
    }

    println!("   ⏳ Waiting for background remote writes...");
    for pending in pendings {
        pending.outcome().await?;
    }
    println!("   ✅ All {} recipes on the server", remote.entry_count(&Identity::Anonymous));

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Flags: favorites and cooked-with-notes
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n⭐ Flagging recipes...");

    engine.toggle_favorite(101).await;
    engine.toggle_favorite(103).await;
    engine
        .mark_cooked(102, Some("doubled the paprika, would again".into()))
        .await;

    println!("   └─ Favorites: {:?}",
        engine.favorites().iter().map(|e| e.payload["title"].clone()).collect::<Vec<_>>());
    println!("   └─ Cooked:    {:?}",
        engine.cooked().iter().map(|e| e.payload["title"].clone()).collect::<Vec<_>>());
    let notes = engine.get_entry(102).and_then(|e| e.notes);
    println!("   └─ Notes on Shakshuka: {:?}", notes);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Push event from another device
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📡 Simulating a push from another device (adds a 6th recipe)...");

    let mut snapshot: Vec<_> = engine.entries();
    snapshot.push(cookbook_sync::SavedItemEntry::new(
        ItemId::from(106),
        json!({"id": 106, "title": "Tonkotsu Broth", "minutes": 720}),
        now_ms() + 1,
    ));
    remote.push_snapshot(&Identity::Anonymous, snapshot);

    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("   └─ Collection now has {} recipes", engine.len());
    println!("   └─ Newest first: {:?}",
        engine.entries().first().map(|e| e.payload["title"].clone()));

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Failure rollback
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n💥 Unsaving while the server rejects writes...");

    remote.fail_writes(true);
    let doomed = engine.unsave_item(105).await.expect("Pho Bo is saved");
    println!("   └─ Optimistically removed: is_saved(105) = {}", engine.is_saved(105));

    let result = doomed.outcome().await;
    println!("   └─ Remote write failed: {:?}", result.err().map(|e| e.to_string()));
    println!("   └─ Rolled back: is_saved(105) = {}", engine.is_saved(105));
    remote.fail_writes(false);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Identity switch: log in, save under the account, log back out
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n👤 Logging in as 'rosa'...");

    identity_tx.send(Identity::user("rosa"))?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("   └─ Identity: {} ({} recipes visible)", engine.identity(), engine.len());

    engine
        .save_item_with(
            json!({"id": 201, "title": "Arepas", "minutes": 35}),
            SaveOptions::default().favorite(),
        )
        .await
        .expect("recipe has an id")
        .outcome()
        .await?;
    println!("   └─ Saved 'Arepas' to rosa's collection");

    println!("\n👤 Logging back out...");
    identity_tx.send(Identity::Anonymous)?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("   └─ Identity: {} ({} recipes visible)", engine.identity(), engine.len());

    // ─────────────────────────────────────────────────────────────────────────
    // 7. List the metrics this run recorded
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Metrics recorded during this run:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 8. Clean shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Shutting down...");
    engine.shutdown();
    loop_task.await?;
    println!("   ✅ Shutdown complete! State: {:?}", engine.state());

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Print every recorded series on its own line, sorted by name.
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_kind, key) = composite_key.into_parts();
            let mut series = key.name().to_string();
            let labels: Vec<_> = key
                .labels()
                .map(|l| format!("{}={}", l.key(), l.value()))
                .collect();
            if !labels.is_empty() {
                series.push_str(&format!("{{{}}}", labels.join(",")));
            }
            match value {
                DebugValue::Counter(v) => format!("{series} = {v}"),
                DebugValue::Gauge(v) => format!("{series} = {:.2}", v.into_inner()),
                DebugValue::Histogram(samples) => {
                    let total_ms = samples.iter().map(|v| v.into_inner()).sum::<f64>() * 1_000.0;
                    format!("{series} = {} samples, {total_ms:.2} ms total", samples.len())
                }
            }
        })
        .collect();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
        return;
    }
    lines.sort();
    for line in &lines {
        println!("   └─ {line}");
    }
}
