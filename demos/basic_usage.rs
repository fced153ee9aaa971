// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic pipelined-cache usage example.
//!
//! Demonstrates:
//! 1. Connecting to Redis with a key namespace
//! 2. Direct string/entity writes, including a compare-and-set
//! 3. Pipelined writes resolved through completion tokens
//! 4. Scored sets and maps of entities
//! 5. A namespaced pattern scan
//! 6. Health probe, captured metrics, clean shutdown
//!
//! # Prerequisites
//!
//! ```bash
//! docker run -d -p 6379:6379 redis:7-alpine
//! ```
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::collections::HashMap;
use std::time::Instant;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use pipelined_cache::request::{
    AddScoredStringRequest, DeleteMapOfEntitiesRequest, GetMapOfEntitiesRequest, GetScoredStringsRequest,
    PutEntityRequest, PutMapOfEntitiesRequest, PutStringRequest,
};
use pipelined_cache::{CacheConfig, PipelinedCache};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Vehicle {
    vin: String,
    speed_kph: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           pipelined-cache: Basic Usage Example                ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Connect
    // ─────────────────────────────────────────────────────────────────────────
    let config = CacheConfig {
        redis_url: Some("redis://localhost:6379".into()),
        // Keys become "demo:<key>"
        key_namespace: Some("demo".into()),
        // Small batches so the pipeline visibly rotates
        pipeline_size: 4,
        ..Default::default()
    };
    let cache = PipelinedCache::connect(&config).await?;
    println!("📦 Connected, namespace '{}'", cache.namespacer().namespace());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Direct writes
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Direct writes...");
    cache
        .put_string(PutStringRequest::new().with_key("depot.status").with_value("open".into()))
        .await?;

    // Compare-and-set: only applied when the current value matches
    cache
        .put_string(
            PutStringRequest::new()
                .with_key("depot.status")
                .with_value("closed".into())
                .if_current_matches("open".into()),
        )
        .await?;
    println!("   └─ depot.status = {:?}", cache.get_string("depot.status").await?);

    let truck = Vehicle { vin: "TRUCK-1".into(), speed_kph: 0 };
    cache
        .put_entity(PutEntityRequest::new().with_key("vehicle.TRUCK-1").with_value(truck).with_ttl_ms(60_000))
        .await?;
    let back: Option<Vehicle> = cache.get_entity("vehicle.TRUCK-1").await?;
    println!("   └─ vehicle.TRUCK-1 = {:?}", back);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Pipelined writes
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚀 Queueing 10 pipelined writes (batch size 4)...");
    let started = Instant::now();
    let mut tokens = Vec::new();
    for n in 0..10u32 {
        let vehicle = Vehicle { vin: format!("CAR-{}", n), speed_kph: n * 10 };
        tokens.push(cache.queue_put_entity(
            PutEntityRequest::new()
                .with_key(format!("vehicle.CAR-{}", n))
                .with_value(vehicle)
                .with_mutation_id(format!("m-{}", n)),
        )?);
    }
    println!("   ⚡ Queued in {:?} (no store round trip)", started.elapsed());

    // Two full batches went out on their own; send the remaining 2 now
    let last = cache.flush_pipeline().await;
    println!("   └─ Flushed partial batch of {}", last.total);
    for token in tokens {
        let mutation_id = token.await?;
        println!("   └─ acknowledged {:?}", mutation_id);
    }
    println!("   📊 {:?}", cache.pipeline_stats());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Scored sets and maps
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🏁 Scored set...");
    for (score, event) in [(3.0, "arrived"), (1.0, "departed"), (2.0, "refuelled")] {
        cache
            .add_string_to_scored_set(
                AddScoredStringRequest::new()
                    .with_key("events.TRUCK-1")
                    .with_score(score)
                    .with_value(event.to_string()),
            )
            .await?;
    }
    let latest = cache
        .get_strings_from_scored_set(
            GetScoredStringsRequest::new()
                .with_key("events.TRUCK-1")
                .with_end_index(1)
                .with_reversed(true),
        )
        .await?;
    println!("   └─ two latest events: {:?}", latest);

    println!("\n🗂️  Map of entities...");
    let fleet: HashMap<String, Vehicle> = (0..3)
        .map(|n| (format!("slot-{}", n), Vehicle { vin: format!("VAN-{}", n), speed_kph: 0 }))
        .collect();
    cache
        .put_map_of_entities(PutMapOfEntitiesRequest::new().with_key("depot.slots").with_value(fleet))
        .await?;
    let slot: HashMap<String, Vehicle> = cache
        .get_map_of_entities(GetMapOfEntitiesRequest::new().with_key("depot.slots").with_fields(["slot-1"]))
        .await?;
    println!("   └─ slot-1: {:?}", slot.get("slot-1"));
    cache
        .delete_map_of_entities(DeleteMapOfEntitiesRequest::new().with_key("depot.slots"))
        .await?;

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Pattern scan
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Scanning 'vehicle.CAR-*'...");
    let found: HashMap<String, Vehicle> = cache.scan_by_pattern("vehicle.CAR-*", None).await?;
    let mut keys: Vec<_> = found.keys().collect();
    keys.sort();
    println!("   └─ {} matches: {:?}", found.len(), keys);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Health, metrics, shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🩺 Health probe: {}", cache.health_check(true).await);

    for n in 0..10 {
        cache.delete(&format!("vehicle.CAR-{}", n)).await?;
    }
    cache.delete("vehicle.TRUCK-1").await?;
    cache.delete("events.TRUCK-1").await?;
    cache.delete("depot.status").await?;

    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    println!("\n🛑 Shutting down...");
    let result = cache.shutdown().await;
    println!("   ✅ Shutdown complete ({} ops in final batch)", result.total);

    Ok(())
}

/// Print captured counters, gauges and histogram summaries, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let labels = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        let rendered = match value {
            DebugValue::Counter(v) => format!("{} (counter)", v),
            DebugValue::Gauge(v) => format!("{:.2} (gauge)", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                format!("count={} avg={:.4} (histogram)", count, avg)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), labels, rendered));
    }

    lines.sort();
    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
