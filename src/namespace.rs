// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key namespacing.
//!
//! Every key (and scan pattern) passes through [`KeyNamespacer::apply`]
//! exactly once before it reaches the store.
//!
//! ```
//! use pipelined_cache::namespace::KeyNamespacer;
//!
//! let ns = KeyNamespacer::new(Some("tenant-a"));
//! assert_eq!(ns.apply("vehicle.1", true), "tenant-a:vehicle.1");
//! assert_eq!(ns.apply("vehicle.1", false), "vehicle.1");
//! ```

use tracing::trace;

/// Separator between namespace and raw key.
pub const NAMESPACE_DELIMITER: &str = ":";

#[derive(Debug, Clone, Default)]
pub struct KeyNamespacer {
    namespace: String,
}

impl KeyNamespacer {
    /// Create a namespacer. The namespace is trimmed; blank means "none".
    pub fn new(namespace: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::trim).unwrap_or("").to_string(),
        }
    }

    /// The configured namespace (empty when none).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Produce the wire key for `key`.
    #[must_use]
    pub fn apply(&self, key: &str, namespace_enabled: bool) -> String {
        if self.namespace.is_empty() || !namespace_enabled {
            return key.to_string();
        }
        let wire = format!("{}{}{}", self.namespace, NAMESPACE_DELIMITER, key);
        trace!(key, wire = %wire, "Applied key namespace");
        wire
    }
}
