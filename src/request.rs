// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Request model for cache operations.
//!
//! Requests are single-use value objects built with `with_*` methods. Mandatory
//! fields are optional in the struct so that a missing key or value is caught
//! by validation at the facade boundary, before any store call.
//!
//! Every request defaults to `namespace_enabled = true`.
//!
//! # Example
//!
//! ```
//! use pipelined_cache::request::PutStringRequest;
//!
//! let request = PutStringRequest::new()
//!     .with_key("vehicle.42.status")
//!     .with_value("parked".to_string())
//!     .with_ttl_ms(30_000)
//!     .with_mutation_id("m-1");
//!
//! assert_eq!(request.key(), Some("vehicle.42.status"));
//! assert!(request.namespace_enabled());
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::{CacheError, MANDATORY_KEY, MANDATORY_VALUE};

const PUT_MAP_KEY: &str = "Received null/empty key in put map request.Aborting the request.";
const PUT_MAP_VALUE: &str = "Received null/empty value in put map request.Aborting the request.";
const GET_MAP_KEY: &str = "Received null/empty key in get map request.Aborting the request.";
const DELETE_MAP_KEY: &str = "Received null/empty key in delete map request.Aborting the request.";

fn require<'a, T>(field: &'a Option<T>, message: &'static str) -> Result<&'a T, CacheError> {
    field.as_ref().ok_or(CacheError::Validation(message))
}

// ═══════════════════════════════════════════════════════════════════════════
// Single-key reads
// ═══════════════════════════════════════════════════════════════════════════

/// Read a string or entity by key.
#[derive(Debug, Clone)]
pub struct GetRequest {
    key: Option<String>,
    namespace_enabled: bool,
}

pub type GetStringRequest = GetRequest;
pub type GetEntityRequest = GetRequest;

impl Default for GetRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl GetRequest {
    pub fn new() -> Self {
        Self { key: None, namespace_enabled: true }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_namespace_enabled(mut self, enabled: bool) -> Self {
        self.namespace_enabled = enabled;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn namespace_enabled(&self) -> bool {
        self.namespace_enabled
    }

    pub(crate) fn validate(&self) -> Result<&str, CacheError> {
        require(&self.key, MANDATORY_KEY).map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Puts (direct and queued)
// ═══════════════════════════════════════════════════════════════════════════

/// Write a string or entity.
///
/// With an expected value the put becomes a compare-and-set: it is applied
/// only if the current stored value equals the expected one.
#[derive(Debug, Clone)]
pub struct PutRequest<V> {
    key: Option<String>,
    value: Option<V>,
    ttl: Option<Duration>,
    expected_value: Option<V>,
    mutation_id: Option<String>,
    namespace_enabled: bool,
}

pub type PutStringRequest = PutRequest<String>;
pub type PutEntityRequest<T> = PutRequest<T>;

impl<V> Default for PutRequest<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PutRequest<V> {
    pub fn new() -> Self {
        Self {
            key: None,
            value: None,
            ttl: None,
            expected_value: None,
            mutation_id: None,
            namespace_enabled: true,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }

    /// Expire the entry after `ttl`. Without it the entry is durable.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_ttl_ms(self, ttl_ms: u64) -> Self {
        self.with_ttl(Duration::from_millis(ttl_ms))
    }

    /// Turn the put into a compare-and-set against `expected`.
    pub fn if_current_matches(mut self, expected: V) -> Self {
        self.expected_value = Some(expected);
        self
    }

    /// Opaque token returned by the completion token of a queued put.
    pub fn with_mutation_id(mut self, mutation_id: impl Into<String>) -> Self {
        self.mutation_id = Some(mutation_id.into());
        self
    }

    pub fn with_namespace_enabled(mut self, enabled: bool) -> Self {
        self.namespace_enabled = enabled;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn expected_value(&self) -> Option<&V> {
        self.expected_value.as_ref()
    }

    pub fn mutation_id(&self) -> Option<&str> {
        self.mutation_id.as_deref()
    }

    pub fn namespace_enabled(&self) -> bool {
        self.namespace_enabled
    }

    pub(crate) fn validate(&self) -> Result<(&str, &V), CacheError> {
        let key = require(&self.key, MANDATORY_KEY)?;
        let value = require(&self.value, MANDATORY_VALUE)?;
        Ok((key, value))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Scored sets
// ═══════════════════════════════════════════════════════════════════════════

/// Add a member with a score to a scored set.
#[derive(Debug, Clone)]
pub struct AddScoredRequest<V> {
    key: Option<String>,
    score: f64,
    value: Option<V>,
    mutation_id: Option<String>,
    namespace_enabled: bool,
}

pub type AddScoredStringRequest = AddScoredRequest<String>;
pub type AddScoredEntityRequest<T> = AddScoredRequest<T>;

impl<V> Default for AddScoredRequest<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> AddScoredRequest<V> {
    pub fn new() -> Self {
        Self {
            key: None,
            score: 0.0,
            value: None,
            mutation_id: None,
            namespace_enabled: true,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_mutation_id(mut self, mutation_id: impl Into<String>) -> Self {
        self.mutation_id = Some(mutation_id.into());
        self
    }

    pub fn with_namespace_enabled(mut self, enabled: bool) -> Self {
        self.namespace_enabled = enabled;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn mutation_id(&self) -> Option<&str> {
        self.mutation_id.as_deref()
    }

    pub fn namespace_enabled(&self) -> bool {
        self.namespace_enabled
    }

    pub(crate) fn validate(&self) -> Result<(&str, &V), CacheError> {
        let key = require(&self.key, MANDATORY_KEY)?;
        let value = require(&self.value, MANDATORY_VALUE)?;
        Ok((key, value))
    }
}

/// Read an index range from a scored set.
///
/// Indexes follow the store's native addressing: `0` is the first member,
/// `-1` the last. With `reversed` the range is taken in descending score order.
#[derive(Debug, Clone)]
pub struct GetScoredRequest {
    key: Option<String>,
    start_index: isize,
    end_index: isize,
    reversed: bool,
    namespace_enabled: bool,
}

pub type GetScoredStringsRequest = GetScoredRequest;
pub type GetScoredEntitiesRequest = GetScoredRequest;

impl Default for GetScoredRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl GetScoredRequest {
    pub fn new() -> Self {
        Self {
            key: None,
            start_index: 0,
            end_index: -1,
            reversed: false,
            namespace_enabled: true,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_start_index(mut self, start: isize) -> Self {
        self.start_index = start;
        self
    }

    pub fn with_end_index(mut self, end: isize) -> Self {
        self.end_index = end;
        self
    }

    pub fn with_reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    pub fn with_namespace_enabled(mut self, enabled: bool) -> Self {
        self.namespace_enabled = enabled;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn start_index(&self) -> isize {
        self.start_index
    }

    pub fn end_index(&self) -> isize {
        self.end_index
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn namespace_enabled(&self) -> bool {
        self.namespace_enabled
    }

    pub(crate) fn validate(&self) -> Result<&str, CacheError> {
        require(&self.key, MANDATORY_KEY).map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Deletes
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct DeleteEntryRequest {
    key: Option<String>,
    mutation_id: Option<String>,
    namespace_enabled: bool,
}

impl Default for DeleteEntryRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl DeleteEntryRequest {
    pub fn new() -> Self {
        Self { key: None, mutation_id: None, namespace_enabled: true }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_mutation_id(mut self, mutation_id: impl Into<String>) -> Self {
        self.mutation_id = Some(mutation_id.into());
        self
    }

    pub fn with_namespace_enabled(mut self, enabled: bool) -> Self {
        self.namespace_enabled = enabled;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn mutation_id(&self) -> Option<&str> {
        self.mutation_id.as_deref()
    }

    pub fn namespace_enabled(&self) -> bool {
        self.namespace_enabled
    }

    pub(crate) fn validate(&self) -> Result<&str, CacheError> {
        require(&self.key, MANDATORY_KEY).map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Maps of entities
// ═══════════════════════════════════════════════════════════════════════════

/// Merge field/value pairs into a store-side hash.
#[derive(Debug, Clone)]
pub struct PutMapOfEntitiesRequest<T> {
    key: Option<String>,
    value: Option<HashMap<String, T>>,
    namespace_enabled: bool,
}

impl<T> Default for PutMapOfEntitiesRequest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PutMapOfEntitiesRequest<T> {
    pub fn new() -> Self {
        Self { key: None, value: None, namespace_enabled: true }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: HashMap<String, T>) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_namespace_enabled(mut self, enabled: bool) -> Self {
        self.namespace_enabled = enabled;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> Option<&HashMap<String, T>> {
        self.value.as_ref()
    }

    pub fn namespace_enabled(&self) -> bool {
        self.namespace_enabled
    }

    pub(crate) fn validate(&self) -> Result<(&str, &HashMap<String, T>), CacheError> {
        let key = require(&self.key, PUT_MAP_KEY)?;
        let value = require(&self.value, PUT_MAP_VALUE)?;
        Ok((key, value))
    }
}

/// Read a whole hash, or only `fields` when a non-empty set is given.
#[derive(Debug, Clone)]
pub struct GetMapOfEntitiesRequest {
    key: Option<String>,
    fields: Option<HashSet<String>>,
    namespace_enabled: bool,
}

impl Default for GetMapOfEntitiesRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl GetMapOfEntitiesRequest {
    pub fn new() -> Self {
        Self { key: None, fields: None, namespace_enabled: true }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_namespace_enabled(mut self, enabled: bool) -> Self {
        self.namespace_enabled = enabled;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Requested field subset; `None` when the whole map is wanted.
    pub fn fields(&self) -> Option<&HashSet<String>> {
        self.fields.as_ref().filter(|f| !f.is_empty())
    }

    pub fn namespace_enabled(&self) -> bool {
        self.namespace_enabled
    }

    pub(crate) fn validate(&self) -> Result<&str, CacheError> {
        require(&self.key, GET_MAP_KEY).map(String::as_str)
    }
}

/// Delete a whole hash, or only `fields` when a non-empty set is given.
#[derive(Debug, Clone)]
pub struct DeleteMapOfEntitiesRequest {
    key: Option<String>,
    fields: Option<HashSet<String>>,
    namespace_enabled: bool,
}

impl Default for DeleteMapOfEntitiesRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl DeleteMapOfEntitiesRequest {
    pub fn new() -> Self {
        Self { key: None, fields: None, namespace_enabled: true }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_namespace_enabled(mut self, enabled: bool) -> Self {
        self.namespace_enabled = enabled;
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn fields(&self) -> Option<&HashSet<String>> {
        self.fields.as_ref().filter(|f| !f.is_empty())
    }

    pub fn namespace_enabled(&self) -> bool {
        self.namespace_enabled
    }

    pub(crate) fn validate(&self) -> Result<&str, CacheError> {
        require(&self.key, DELETE_MAP_KEY).map(String::as_str)
    }
}
