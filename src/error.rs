// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types surfaced by the cache facade.
//!
//! The taxonomy mirrors how failures are handled:
//! - **Validation**: missing mandatory request fields, raised before any store call
//! - **BatchProcessing**: rotation retries exhausted, or the store rejected a
//!   queued mutation (failed compare-and-set, member not added)
//! - **Config**: rejected at construction time
//! - **Decode**: a scanned value could not be decoded, aborting the scan
//! - **Store**: transport/backend failures, passed through untouched

use thiserror::Error;

use crate::codec::CodecError;
use crate::storage::traits::StoreError;

/// Message used when a request has no key.
pub const MANDATORY_KEY: &str = "key is mandatory";
/// Message used when a request has no value.
pub const MANDATORY_VALUE: &str = "value is mandatory";

#[derive(Error, Debug)]
pub enum CacheError {
    /// A mandatory request field was missing
    #[error("{0}")]
    Validation(&'static str),

    /// Batch pipeline could not accept or complete an operation
    #[error("batch processing failed: {0}")]
    BatchProcessing(String),

    /// Unusable settings, or no async runtime to run batches on
    #[error("configuration error: {0}")]
    Config(String),

    /// A scanned value could not be decoded
    #[error("unable to decode value from cache for key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: CodecError,
    },

    /// Encoding a value (or decoding a direct read) failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Store/transport error, never retried by this layer
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    /// True for errors raised before any network call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[must_use]
    pub fn is_batch_processing(&self) -> bool {
        matches!(self, Self::BatchProcessing(_))
    }
}

/// The two expected races when queueing into the current batch.
///
/// Both are absorbed by the pipeline's bounded retry loop and never reach
/// the caller directly.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchError {
    /// The batch was already taken for execution
    #[error("batch already has been executed")]
    Retired,
    /// No batch is installed in the pipeline slot
    #[error("no batch installed")]
    NotInitialized,
}
