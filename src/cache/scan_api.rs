// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cursor-driven pattern scan.
//!
//! ```text
//! cursor = 0
//! loop:
//!   page = store.scan_match(cursor, scan_limit, pattern)
//!   None            → done (empty reply)
//!   decode each (key, value), abort on the first failure
//!   cursor = page.cursor; 0 → done
//! ```

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::CacheError;
use crate::metrics;
use crate::storage::traits::StoreClient;

use super::{instrumented, PipelinedCache};

impl<S: StoreClient, C: Codec> PipelinedCache<S, C> {
    /// Fetch and decode every string value whose key matches `pattern`.
    ///
    /// The pattern is a Redis glob, namespaced like a key when
    /// `namespace_enabled` is `None` or `Some(true)`. Keys in the result are
    /// the store keys, namespace included. A value that fails to decode
    /// aborts the whole scan with [`CacheError::Decode`].
    pub async fn scan_by_pattern<T: DeserializeOwned>(
        &self,
        pattern: &str,
        namespace_enabled: Option<bool>,
    ) -> Result<HashMap<String, T>, CacheError> {
        instrumented("scan_by_pattern", async {
            let pattern = self.wire_key(pattern, namespace_enabled.unwrap_or(true));
            debug!(scan_limit = self.scan_limit, pattern = %pattern, "Scanning by pattern");

            let mut found = HashMap::new();
            let mut cursor = 0;
            let mut pages = 0;
            loop {
                let Some(page) = self.store.scan_match(cursor, self.scan_limit, &pattern).await? else {
                    debug!(pattern = %pattern, "Empty scan reply, no more matches");
                    break;
                };
                pages += 1;
                debug!(cursor = page.cursor, "Received scan cursor");

                for (key, value) in page.pairs() {
                    let entity = self.codec.decode(value).map_err(|source| {
                        warn!(key = %key, error = %source, "Unable to decode scanned value");
                        CacheError::Decode { key: key.clone(), source }
                    })?;
                    found.insert(key, entity);
                }

                cursor = page.cursor;
                if cursor == 0 {
                    break;
                }
            }

            debug!(pattern = %pattern, pages, matches = found.len(), "Pattern scan complete");
            metrics::record_scan(pages, found.len());
            Ok(found)
        })
        .await
    }
}
