// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Entity encoding for values stored in Redis.
//!
//! Strings are stored as raw UTF-8. Entities go through a [`Codec`], which is
//! injected into the cache facade. [`JsonCodec`] is the default.
//!
//! # Example
//!
//! ```
//! use pipelined_cache::codec::{Codec, JsonCodec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Vehicle { vin: String, speed: u32 }
//!
//! let codec = JsonCodec;
//! let bytes = codec.encode(&Vehicle { vin: "V1".into(), speed: 42 }).unwrap();
//! let back: Vehicle = codec.decode(&bytes).unwrap();
//! assert_eq!(back.speed, 42);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Codec error types
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a value
    #[error("encode failed: {0}")]
    Encode(String),

    /// Failed to decode bytes into the requested type
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Encode/decode capability for entities.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
