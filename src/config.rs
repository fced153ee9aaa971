// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the pipelined cache.
//!
//! # Example
//!
//! ```
//! use pipelined_cache::CacheConfig;
//!
//! // Minimal config (uses defaults)
//! let config = CacheConfig::default();
//! assert_eq!(config.pipeline_size, 1000);
//! assert_eq!(config.scan_limit, 100);
//!
//! // Namespaced tenant with small batches
//! let config = CacheConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     key_namespace: Some("tenant-a".into()),
//!     pipeline_size: 50,
//!     ..Default::default()
//! };
//! assert_eq!(config.namespace(), Some("tenant-a"));
//! ```

use serde::Deserialize;

/// Smallest page size the pattern scan will ask the store for.
pub const MIN_SCAN_LIMIT: usize = 10;

/// Configuration for the pipelined cache.
///
/// All fields have sensible defaults. Connection topology beyond a single
/// `redis_url` is the embedding application's concern.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Optional key namespace; keys become `{namespace}:{key}`
    #[serde(default)]
    pub key_namespace: Option<String>,

    /// Operations per pipelined batch before it is flushed
    #[serde(default = "default_pipeline_size")]
    pub pipeline_size: usize,

    /// Page size hint for pattern scans (clamped to at least 10)
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,

    /// Attempts to queue into the current batch before giving up
    #[serde(default = "default_batch_retries")]
    pub batch_retries: usize,

    /// Health monitoring toggles, reported as-is to the embedding monitor
    #[serde(default)]
    pub health_monitor_enabled: bool,
    #[serde(default)]
    pub needs_restart_on_failure: bool,
}

fn default_pipeline_size() -> usize { 1000 }
fn default_scan_limit() -> usize { 100 }
fn default_batch_retries() -> usize { 5 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_namespace: None,
            pipeline_size: default_pipeline_size(),
            scan_limit: default_scan_limit(),
            batch_retries: default_batch_retries(),
            health_monitor_enabled: false,
            needs_restart_on_failure: false,
        }
    }
}

impl CacheConfig {
    /// Trimmed namespace, `None` when unset or blank.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.key_namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.pipeline_size, 1000);
        assert_eq!(config.scan_limit, 100);
        assert_eq!(config.batch_retries, 5);
        assert!(config.namespace().is_none());
        assert!(!config.health_monitor_enabled);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"key_namespace": " fleet ", "pipeline_size": 5}"#).unwrap();
        assert_eq!(config.pipeline_size, 5);
        assert_eq!(config.scan_limit, 100);
        assert_eq!(config.namespace(), Some("fleet"));
    }

    #[test]
    fn test_blank_namespace_is_none() {
        let config = CacheConfig {
            key_namespace: Some("   ".into()),
            ..Default::default()
        };
        assert!(config.namespace().is_none());
    }
}
