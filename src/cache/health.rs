// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write/delete health probe.
//!
//! The verdict is cached; a forced check refreshes it by writing and then
//! deleting a probe key outside the namespace. Registering the probe with a
//! monitor is left to the embedding application, which reads the names and
//! flags exposed here.

use std::sync::atomic::Ordering;

use tracing::{debug, error};

use crate::codec::Codec;
use crate::error::CacheError;
use crate::metrics;
use crate::request::{DeleteEntryRequest, PutStringRequest};
use crate::storage::traits::StoreClient;

use super::PipelinedCache;

pub const HEALTH_MONITOR_NAME: &str = "REDIS_HEALTH_MONITOR";
pub const HEALTH_METRIC_NAME: &str = "REDIS_HEALTH_GUAGE";
pub const HEALTH_PROBE_KEY: &str = "hello";
const HEALTH_PROBE_VALUE: &str = "world";

impl<S: StoreClient, C: Codec> PipelinedCache<S, C> {
    /// Last known health. With `force` the store is probed first.
    pub async fn health_check(&self, force: bool) -> bool {
        if force {
            let healthy = match self.probe().await {
                Ok(()) => true,
                Err(e) => {
                    error!(error = %e, "Redis health probe failed");
                    false
                }
            };
            self.set_healthy(healthy);
        }
        self.is_healthy()
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
        metrics::set_backend_healthy(healthy);
    }

    #[must_use]
    pub fn health_monitor_enabled(&self) -> bool {
        self.health_monitor_enabled
    }

    #[must_use]
    pub fn needs_restart_on_failure(&self) -> bool {
        self.needs_restart_on_failure
    }

    async fn probe(&self) -> Result<(), CacheError> {
        self.put_string(
            PutStringRequest::new()
                .with_key(HEALTH_PROBE_KEY)
                .with_value(HEALTH_PROBE_VALUE.to_string())
                .with_namespace_enabled(false),
        )
        .await?;
        self.delete_with(
            DeleteEntryRequest::new()
                .with_key(HEALTH_PROBE_KEY)
                .with_namespace_enabled(false),
        )
        .await?;
        debug!("Redis health probe passed");
        Ok(())
    }
}
