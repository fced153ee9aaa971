//! # Pipelined Cache
//!
//! A typed cache-access layer over Redis with an asynchronous, pipelined
//! mutation path for throughput-sensitive callers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PipelinedCache                         │
//! │  • Validates requests before any store call                 │
//! │  • Namespaces every key exactly once                        │
//! └─────────────────────────────────────────────────────────────┘
//!            │ async fn (direct)              │ queue_* (pipelined)
//!            │                                ▼
//!            │        ┌─────────────────────────────────────────┐
//!            │        │             BatchPipeline               │
//!            │        │  • Lock-light enqueue into current batch│
//!            │        │  • Rotates when a batch holds N ops     │
//!            │        │  • Per-op MutationToken completion      │
//!            │        └─────────────────────────────────────────┘
//!            ▼                                │ one round trip per batch
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  StoreClient (RedisStore)                   │
//! │  • Strings, scored sets, hashes                             │
//! │  • Lua scripts for compare-and-set and pattern scan         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pipelined_cache::{CacheConfig, PipelinedCache};
//! use pipelined_cache::request::{PutEntityRequest, PutStringRequest};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Vehicle { vin: String, speed: u32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pipelined_cache::CacheError> {
//!     let config = CacheConfig {
//!         redis_url: Some("redis://localhost:6379".into()),
//!         key_namespace: Some("fleet".into()),
//!         pipeline_size: 100,
//!         ..Default::default()
//!     };
//!     let cache = PipelinedCache::connect(&config).await?;
//!
//!     // Direct write, awaited
//!     cache.put_string(PutStringRequest::new().with_key("depot").with_value("north".into())).await?;
//!
//!     // Pipelined write, resolved when its batch is acknowledged
//!     let token = cache.queue_put_entity(
//!         PutEntityRequest::new()
//!             .with_key("V1")
//!             .with_value(Vehicle { vin: "V1".into(), speed: 42 })
//!             .with_mutation_id("m-1"),
//!     )?;
//!     cache.flush_pipeline().await;
//!     assert_eq!(token.await?, Some("m-1".to_string()));
//!
//!     cache.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: The [`PipelinedCache`] facade
//! - [`batching`]: Batch accumulator and the rotating pipeline
//! - [`storage`]: Store boundary, Redis backend and an in-memory store
//! - [`request`]: Typed request builders
//! - [`namespace`]: Key namespacing
//! - [`codec`]: Entity encoding
//! - [`resilience`]: Connection retry

pub mod batching;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod namespace;
pub mod request;
pub mod resilience;
pub mod storage;

pub use batching::{BatchResult, MutationToken, PipelineStats};
pub use cache::PipelinedCache;
pub use codec::{Codec, CodecError, JsonCodec};
pub use config::CacheConfig;
pub use error::{BatchError, CacheError};
pub use namespace::KeyNamespacer;
pub use resilience::retry::RetryConfig;
pub use storage::memory::InMemoryStore;
pub use storage::redis::RedisStore;
pub use storage::traits::{BatchOp, OpReply, ScanPage, StoreClient, StoreError};
