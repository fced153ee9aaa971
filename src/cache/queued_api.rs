// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pipelined mutations.
//!
//! These calls never wait on the store. They validate and namespace like the
//! direct ones, queue a [`BatchOp`] and hand back a [`MutationToken`] that
//! resolves to the request's mutation id once the store acknowledges it.
//!
//! A compare-and-set that does not match, and a scored add of a member that
//! is already present, resolve the token to [`CacheError::BatchProcessing`].

use serde::Serialize;

use crate::batching::MutationToken;
use crate::codec::Codec;
use crate::error::CacheError;
use crate::request::{
    AddScoredEntityRequest, AddScoredStringRequest, DeleteEntryRequest, PutEntityRequest, PutStringRequest,
};
use crate::storage::traits::{BatchOp, StoreClient};

use super::{record_outcome, PipelinedCache};

type Queued = (BatchOp, Option<String>);

impl<S: StoreClient, C: Codec> PipelinedCache<S, C> {
    pub fn queue_put_string(&self, request: PutStringRequest) -> Result<MutationToken, CacheError> {
        self.queued("queue_put_string", || {
            let (key, value) = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            let value = value.as_bytes().to_vec();
            let op = match request.expected_value() {
                Some(expected) => BatchOp::CompareAndSet { key, expected: expected.as_bytes().to_vec(), value },
                None => BatchOp::Set { key, value, ttl: request.ttl() },
            };
            Ok((op, request.mutation_id().map(str::to_string)))
        })
    }

    pub fn queue_put_entity<T: Serialize>(&self, request: PutEntityRequest<T>) -> Result<MutationToken, CacheError> {
        self.queued("queue_put_entity", || {
            let (key, value) = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            let value = self.codec.encode(value)?;
            let op = match request.expected_value() {
                Some(expected) => BatchOp::CompareAndSet { key, expected: self.codec.encode(expected)?, value },
                None => BatchOp::Set { key, value, ttl: request.ttl() },
            };
            Ok((op, request.mutation_id().map(str::to_string)))
        })
    }

    pub fn queue_add_string_to_scored_set(&self, request: AddScoredStringRequest) -> Result<MutationToken, CacheError> {
        self.queued("queue_add_string_to_scored_set", || {
            let (key, value) = request.validate()?;
            let op = BatchOp::ScoredAdd {
                key: self.wire_key(key, request.namespace_enabled()),
                score: request.score(),
                member: value.as_bytes().to_vec(),
            };
            Ok((op, request.mutation_id().map(str::to_string)))
        })
    }

    pub fn queue_add_entity_to_scored_set<T: Serialize>(
        &self,
        request: AddScoredEntityRequest<T>,
    ) -> Result<MutationToken, CacheError> {
        self.queued("queue_add_entity_to_scored_set", || {
            let (key, value) = request.validate()?;
            let op = BatchOp::ScoredAdd {
                key: self.wire_key(key, request.namespace_enabled()),
                score: request.score(),
                member: self.codec.encode(value)?,
            };
            Ok((op, request.mutation_id().map(str::to_string)))
        })
    }

    /// Resolves to the mutation id whether or not the key existed.
    pub fn queue_delete(&self, request: DeleteEntryRequest) -> Result<MutationToken, CacheError> {
        self.queued("queue_delete", || {
            let key = request.validate()?;
            let op = BatchOp::Delete { key: self.wire_key(key, request.namespace_enabled()) };
            Ok((op, request.mutation_id().map(str::to_string)))
        })
    }

    fn queued<F>(&self, operation: &'static str, build: F) -> Result<MutationToken, CacheError>
    where
        F: FnOnce() -> Result<Queued, CacheError>,
    {
        let result = build().and_then(|(op, mutation_id)| self.pipeline.enqueue(op, mutation_id));
        record_outcome(operation, &result);
        result
    }
}
