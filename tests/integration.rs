//! Integration Tests for Pipelined Cache
//!
//! These tests run the cache against a real Redis. They use testcontainers for
//! portability, so no external docker-compose is required.
//!
//! # Running Tests
//! ```bash
//! # Run all integration tests (requires Docker)
//! cargo test --test integration -- --ignored
//!
//! # Run only pipeline tests
//! cargo test --test integration pipeline -- --ignored
//! ```
//!
//! # Test Organization
//! - `direct_*` - Awaited operations: strings, entities, scored sets, maps
//! - `pipeline_*` - Queued mutations and completion tokens
//! - `scan_*` - Pattern scan through the Lua script
//! - `failure_*` - Unreachable Redis, undecodable data

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use pipelined_cache::request::{
    AddScoredEntityRequest, AddScoredStringRequest, DeleteMapOfEntitiesRequest, GetMapOfEntitiesRequest,
    GetScoredEntitiesRequest, GetScoredStringsRequest, PutEntityRequest, PutMapOfEntitiesRequest,
    PutStringRequest,
};
use pipelined_cache::{CacheConfig, CacheError, PipelinedCache, RedisStore, StoreClient};

use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

// =============================================================================
// Container Helpers
// =============================================================================

/// Create a Redis container with health check
fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

fn config_for(redis: &Container<'_, GenericImage>, namespace: Option<&str>, pipeline_size: usize) -> CacheConfig {
    CacheConfig {
        redis_url: Some(format!("redis://127.0.0.1:{}", redis.get_host_port_ipv4(6379))),
        key_namespace: namespace.map(str::to_string),
        pipeline_size,
        ..Default::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Vehicle {
    vin: String,
    speed: u32,
}

fn vehicle(vin: &str, speed: u32) -> Vehicle {
    Vehicle { vin: vin.to_string(), speed }
}

const WAIT: Duration = Duration::from_secs(10);

// =============================================================================
// Direct operations
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn direct_string_roundtrip_and_compare_and_set() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, Some("ecsp"), 100))
        .await
        .expect("Failed to connect");

    cache
        .put_string(PutStringRequest::new().with_key("k").with_value("old".into()))
        .await
        .unwrap();
    // Stored under the namespaced key
    assert_eq!(cache.store().get("ecsp:k").await.unwrap(), Some(b"old".to_vec()));

    let cas = || {
        PutStringRequest::new()
            .with_key("k")
            .with_value("new".into())
            .if_current_matches("old".into())
    };
    cache.put_string(cas()).await.unwrap();
    assert_eq!(cache.get_string("k").await.unwrap(), Some("new".to_string()));

    cache
        .put_string(PutStringRequest::new().with_key("k").with_value("other".into()))
        .await
        .unwrap();
    cache.put_string(cas()).await.expect("mismatch must not be an error");
    assert_eq!(cache.get_string("k").await.unwrap(), Some("other".to_string()));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn direct_ttl_expires() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, None, 100)).await.unwrap();

    cache
        .put_entity(
            PutEntityRequest::new()
                .with_key("short")
                .with_value(vehicle("V", 1))
                .with_ttl_ms(200),
        )
        .await
        .unwrap();
    assert!(cache.get_entity::<Vehicle>("short").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(cache.get_entity::<Vehicle>("short").await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn direct_scored_sets() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, Some("ecsp"), 100)).await.unwrap();

    for (score, member) in [(2.0, "b"), (1.0, "a"), (3.0, "c")] {
        cache
            .add_string_to_scored_set(
                AddScoredStringRequest::new()
                    .with_key("z")
                    .with_score(score)
                    .with_value(member.to_string()),
            )
            .await
            .unwrap();
    }
    let asc = cache
        .get_strings_from_scored_set(GetScoredStringsRequest::new().with_key("z"))
        .await
        .unwrap();
    assert_eq!(asc, vec!["a", "b", "c"]);

    let desc = cache
        .get_strings_from_scored_set(GetScoredStringsRequest::new().with_key("z").with_reversed(true))
        .await
        .unwrap();
    assert_eq!(desc, vec!["c", "b", "a"]);

    cache
        .add_entity_to_scored_set(
            AddScoredEntityRequest::new()
                .with_key("ze")
                .with_score(1.0)
                .with_value(vehicle("E", 1)),
        )
        .await
        .unwrap();
    let entities: Vec<Vehicle> = cache
        .get_entities_from_scored_set(GetScoredEntitiesRequest::new().with_key("ze"))
        .await
        .unwrap();
    assert_eq!(entities, vec![vehicle("E", 1)]);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn direct_maps_merge_and_partial_delete() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, Some("ecsp"), 100)).await.unwrap();

    let first: HashMap<String, Vehicle> = [("a".into(), vehicle("A", 1)), ("b".into(), vehicle("B", 2))]
        .into_iter()
        .collect();
    let second: HashMap<String, Vehicle> = [("c".into(), vehicle("C", 3))].into_iter().collect();
    for value in [first, second] {
        cache
            .put_map_of_entities(PutMapOfEntitiesRequest::new().with_key("m").with_value(value))
            .await
            .unwrap();
    }

    let all: HashMap<String, Vehicle> = cache
        .get_map_of_entities(GetMapOfEntitiesRequest::new().with_key("m"))
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let subset: HashMap<String, Vehicle> = cache
        .get_map_of_entities(GetMapOfEntitiesRequest::new().with_key("m").with_fields(["b", "zz"]))
        .await
        .unwrap();
    assert_eq!(subset.len(), 1);

    cache
        .delete_map_of_entities(DeleteMapOfEntitiesRequest::new().with_key("m").with_fields(["a", "b"]))
        .await
        .unwrap();
    let rest: HashMap<String, Vehicle> = cache
        .get_map_of_entities(GetMapOfEntitiesRequest::new().with_key("m"))
        .await
        .unwrap();
    assert_eq!(rest.keys().collect::<Vec<_>>(), vec!["c"]);

    cache
        .delete_map_of_entities(DeleteMapOfEntitiesRequest::new().with_key("m"))
        .await
        .unwrap();
    assert!(cache.store().hget_all("ecsp:m").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn direct_health_probe() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, Some("ecsp"), 100)).await.unwrap();

    assert!(cache.health_check(true).await);
    assert_eq!(cache.store().get("hello").await.unwrap(), None);
}

// =============================================================================
// Pipeline
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn pipeline_tokens_resolve_per_batch() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, Some("ecsp"), 5)).await.unwrap();

    let put = |n: u32| {
        PutStringRequest::new()
            .with_key(format!("p{}", n))
            .with_value(n.to_string())
            .with_mutation_id(n.to_string())
    };

    let mut tokens: Vec<_> = (1..=7).map(|n| cache.queue_put_string(put(n)).unwrap()).collect();
    let mut late = tokens.split_off(5);

    for (i, token) in tokens.into_iter().enumerate() {
        assert_eq!(timeout(WAIT, token).await.unwrap().unwrap(), Some((i + 1).to_string()));
    }
    assert!(timeout(Duration::from_millis(200), &mut late[0]).await.is_err());

    for n in 8..=10 {
        late.push(cache.queue_put_string(put(n)).unwrap());
    }
    for token in late {
        timeout(WAIT, token).await.unwrap().unwrap();
    }
    assert_eq!(cache.get_string("p10").await.unwrap(), Some("10".to_string()));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn pipeline_failed_compare_and_set_fails_token() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, None, 100)).await.unwrap();

    cache
        .put_string(PutStringRequest::new().with_key("k").with_value("other".into()))
        .await
        .unwrap();
    let token = cache
        .queue_put_string(
            PutStringRequest::new()
                .with_key("k")
                .with_value("new".into())
                .if_current_matches("old".into())
                .with_mutation_id("cas"),
        )
        .unwrap();
    cache.flush_pipeline().await;

    let err = token.await.unwrap_err();
    assert!(err.is_batch_processing());
    assert_eq!(cache.get_string("k").await.unwrap(), Some("other".to_string()));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn pipeline_concurrent_writers_lose_nothing() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = Arc::new(PipelinedCache::connect(&config_for(&redis, Some("load"), 25)).await.unwrap());

    let mut writers = Vec::new();
    for w in 0..4 {
        let cache = Arc::clone(&cache);
        writers.push(tokio::spawn(async move {
            let mut tokens = Vec::new();
            for n in 0..100 {
                let request = PutStringRequest::new()
                    .with_key(format!("w{}-{}", w, n))
                    .with_value("x".into());
                tokens.push(cache.queue_put_string(request).unwrap());
            }
            tokens
        }));
    }

    let mut tokens = Vec::new();
    for writer in writers {
        tokens.extend(writer.await.unwrap());
    }
    cache.flush_pipeline().await;
    for token in tokens {
        timeout(WAIT, token).await.unwrap().unwrap();
    }

    let mut count = 0;
    for w in 0..4 {
        for n in 0..100 {
            if cache.get_string(&format!("w{}-{}", w, n)).await.unwrap().is_some() {
                count += 1;
            }
        }
    }
    assert_eq!(count, 400);
    assert_eq!(cache.pipeline_stats().ops_enqueued, 400);
}

// =============================================================================
// Scan
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn scan_matches_namespaced_pattern() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, Some("ecsp"), 100)).await.unwrap();

    for (key, speed) in [("TESTKEY1", 1), ("TESTKEY2", 2), ("OTHERKEY", 3)] {
        cache
            .put_entity(PutEntityRequest::new().with_key(key).with_value(vehicle(key, speed)))
            .await
            .unwrap();
    }
    // A hash under a matching name is skipped by the scan script
    let map: HashMap<String, Vehicle> = [("f".into(), vehicle("H", 0))].into_iter().collect();
    cache
        .put_map_of_entities(PutMapOfEntitiesRequest::new().with_key("TESTKEY_HASH").with_value(map))
        .await
        .unwrap();

    let found: HashMap<String, Vehicle> = cache.scan_by_pattern("TESTKEY*", None).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["ecsp:TESTKEY1"], vehicle("TESTKEY1", 1));
    assert_eq!(found["ecsp:TESTKEY2"], vehicle("TESTKEY2", 2));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn scan_many_keys_across_pages() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let mut config = config_for(&redis, None, 50);
    config.scan_limit = 10;
    let cache = PipelinedCache::connect(&config).await.unwrap();

    for n in 0..120 {
        cache
            .queue_put_entity(PutEntityRequest::new().with_key(format!("bulk:{}", n)).with_value(vehicle("B", n)))
            .unwrap();
    }
    cache.flush_pipeline().await;

    let found: HashMap<String, Vehicle> = cache.scan_by_pattern("bulk:*", None).await.unwrap();
    assert_eq!(found.len(), 120);
}

// =============================================================================
// Failure scenarios
// =============================================================================

#[tokio::test]
#[ignore] // Slow: exhausts startup retries
async fn failure_redis_unavailable_at_startup() {
    let config = CacheConfig {
        redis_url: Some("redis://127.0.0.1:1".into()),
        ..Default::default()
    };
    let result = timeout(Duration::from_secs(30), PipelinedCache::connect(&config)).await;
    match result {
        Ok(Err(CacheError::Store(_))) => {}
        Ok(Ok(_)) => panic!("connected to a closed port"),
        Ok(Err(other)) => panic!("unexpected error: {}", other),
        Err(_) => panic!("startup retries did not give up"),
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn failure_scan_aborts_on_corrupt_value() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = PipelinedCache::connect(&config_for(&redis, Some("ecsp"), 100)).await.unwrap();

    cache
        .put_entity(PutEntityRequest::new().with_key("ok").with_value(vehicle("OK", 1)))
        .await
        .unwrap();
    cache
        .put_string(PutStringRequest::new().with_key("bad").with_value("{not json".into()))
        .await
        .unwrap();

    let err = cache.scan_by_pattern::<Vehicle>("*", None).await.unwrap_err();
    assert!(matches!(err, CacheError::Decode { ref key, .. } if key == "ecsp:bad"));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn failure_store_handle_from_existing_connection() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let url = format!("redis://127.0.0.1:{}", redis.get_host_port_ipv4(6379));

    let store = RedisStore::connect(&url).await.unwrap();
    let shared = RedisStore::from_connection(store.connection());
    shared.set("raw", b"1", None).await.unwrap();
    assert_eq!(store.get("raw").await.unwrap(), Some(b"1".to_vec()));
}
