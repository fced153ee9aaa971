// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache facade.
//!
//! [`PipelinedCache`] exposes typed operations over strings, entities, scored
//! sets and maps of entities. Each operation namespaces its key, validates
//! its request and then takes one of two paths:
//!
//! ```text
//!                      ┌──────────────────────────────┐
//!   async fn op() ───▶ │ validate → namespace → store │  (direct, awaited)
//!                      └──────────────────────────────┘
//!                      ┌──────────────────────────────┐
//!   fn queue_op() ───▶ │ validate → namespace → batch │──▶ MutationToken
//!                      └──────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `api` - Direct operations (strings, entities, scored sets, maps, delete)
//! - `queued_api` - Pipelined mutations returning completion tokens
//! - `scan_api` - Cursor-driven pattern scan
//! - `health` - Write/delete health probe
//!
//! # Compare-and-set
//!
//! A put with an expected value is a compare-and-set. On the direct path a
//! mismatch is silent: the call returns `Ok(())` and the stored value is left
//! as it was. On the queued path a mismatch fails the token with
//! [`CacheError::BatchProcessing`].

mod api;
mod health;
mod queued_api;
mod scan_api;

pub use health::{HEALTH_METRIC_NAME, HEALTH_MONITOR_NAME, HEALTH_PROBE_KEY};

use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::batching::{BatchPipeline, BatchResult, PipelineStats};
use crate::codec::{Codec, JsonCodec};
use crate::config::{CacheConfig, MIN_SCAN_LIMIT};
use crate::error::CacheError;
use crate::metrics;
use crate::namespace::KeyNamespacer;
use crate::storage::redis::RedisStore;
use crate::storage::traits::StoreClient;

/// Typed cache operations over a [`StoreClient`].
///
/// # Example
///
/// ```rust,no_run
/// use pipelined_cache::{CacheConfig, PipelinedCache};
/// use pipelined_cache::request::PutStringRequest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CacheConfig {
///     redis_url: Some("redis://localhost:6379".into()),
///     key_namespace: Some("fleet".into()),
///     ..Default::default()
/// };
/// let cache = PipelinedCache::connect(&config).await?;
///
/// cache.put_string(PutStringRequest::new().with_key("v1").with_value("parked".into())).await?;
/// assert_eq!(cache.get_string("v1").await?, Some("parked".to_string()));
///
/// let token = cache.queue_put_string(
///     PutStringRequest::new().with_key("v2").with_value("moving".into()).with_mutation_id("m-7"),
/// )?;
/// cache.flush_pipeline().await;
/// assert_eq!(token.await?, Some("m-7".to_string()));
/// # Ok(())
/// # }
/// ```
pub struct PipelinedCache<S: StoreClient, C: Codec = JsonCodec> {
    store: Arc<S>,
    codec: C,
    namespacer: KeyNamespacer,
    pipeline: BatchPipeline<S>,
    scan_limit: usize,
    healthy: AtomicBool,
    health_monitor_enabled: bool,
    needs_restart_on_failure: bool,
}

impl<S: StoreClient, C: Codec> PipelinedCache<S, C> {
    /// Build a cache over an already-connected store.
    ///
    /// Must be called from within a Tokio runtime. A `scan_limit` below 10 is
    /// raised to 10.
    pub fn new(store: Arc<S>, codec: C, config: &CacheConfig) -> Result<Self, CacheError> {
        let pipeline = BatchPipeline::new(Arc::clone(&store), config.pipeline_size, config.batch_retries)?;

        let scan_limit = if config.scan_limit < MIN_SCAN_LIMIT {
            warn!(
                configured = config.scan_limit,
                min = MIN_SCAN_LIMIT,
                "Scan limit should be at least {}, using {}",
                MIN_SCAN_LIMIT,
                MIN_SCAN_LIMIT
            );
            MIN_SCAN_LIMIT
        } else {
            config.scan_limit
        };

        let namespacer = KeyNamespacer::new(config.namespace());
        info!(
            namespace = namespacer.namespace(),
            pipeline_size = config.pipeline_size,
            scan_limit,
            "Pipelined cache ready"
        );

        Ok(Self {
            store,
            codec,
            namespacer,
            pipeline,
            scan_limit,
            healthy: AtomicBool::new(true),
            health_monitor_enabled: config.health_monitor_enabled,
            needs_restart_on_failure: config.needs_restart_on_failure,
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn namespacer(&self) -> &KeyNamespacer {
        &self.namespacer
    }

    /// Effective scan page size, after clamping.
    #[must_use]
    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    #[must_use]
    pub fn pipeline_stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Send the partially-filled batch now and wait for it.
    pub async fn flush_pipeline(&self) -> BatchResult {
        self.pipeline.flush().await
    }

    /// Flush what is queued and stop accepting queued mutations.
    ///
    /// Direct operations keep working; only the pipeline is closed.
    pub async fn shutdown(&self) -> BatchResult {
        self.pipeline.shutdown().await
    }

    fn wire_key(&self, key: &str, namespace_enabled: bool) -> String {
        self.namespacer.apply(key, namespace_enabled)
    }
}

impl<S: StoreClient> PipelinedCache<S> {
    /// Build a cache that encodes entities as JSON.
    pub fn with_json(store: Arc<S>, config: &CacheConfig) -> Result<Self, CacheError> {
        Self::new(store, JsonCodec, config)
    }
}

impl PipelinedCache<RedisStore> {
    /// Connect to `config.redis_url` and build a JSON-encoding cache.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| CacheError::Config("redis_url is required to connect".into()))?;
        let store = RedisStore::connect(url).await?;
        Self::with_json(Arc::new(store), config)
    }
}

/// Time a direct operation and count its outcome.
async fn instrumented<T, F>(operation: &'static str, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    let started = Instant::now();
    let result = fut.await;
    record_outcome(operation, &result);
    metrics::record_latency(operation, started.elapsed());
    result
}

fn record_outcome<T>(operation: &'static str, result: &Result<T, CacheError>) {
    let status = match result {
        Ok(_) => "success",
        Err(e) if e.is_validation() => {
            metrics::record_validation_error(operation);
            "rejected"
        }
        Err(_) => "error",
    };
    metrics::record_operation(operation, status);
}
