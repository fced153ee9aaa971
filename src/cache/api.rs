// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Direct operations: each call validates, namespaces and awaits the store.
//!
//! Strings are stored as raw UTF-8. Entities go through the cache's codec.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::codec::{Codec, CodecError};
use crate::error::CacheError;
use crate::request::{
    AddScoredEntityRequest, AddScoredStringRequest, DeleteEntryRequest, DeleteMapOfEntitiesRequest,
    GetEntityRequest, GetMapOfEntitiesRequest, GetScoredEntitiesRequest, GetScoredStringsRequest,
    GetStringRequest, PutEntityRequest, PutMapOfEntitiesRequest, PutStringRequest,
};
use crate::storage::traits::StoreClient;

use super::{instrumented, PipelinedCache};

pub(super) fn utf8(bytes: Vec<u8>) -> Result<String, CodecError> {
    String::from_utf8(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

impl<S: StoreClient, C: Codec> PipelinedCache<S, C> {
    // ═══════════════════════════════════════════════════════════════════════════
    // Strings
    // ═══════════════════════════════════════════════════════════════════════════

    /// Read a string. The key is always namespaced.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get_string_with(GetStringRequest::new().with_key(key)).await
    }

    pub async fn get_string_with(&self, request: GetStringRequest) -> Result<Option<String>, CacheError> {
        instrumented("get_string", async {
            let raw = self.read(&request).await?;
            Ok(raw.map(utf8).transpose()?)
        })
        .await
    }

    /// Write a string, or compare-and-set it when an expected value is given.
    ///
    /// A compare-and-set that does not match still returns `Ok(())`; read the
    /// key back to find out whether it was applied. The ttl only applies to
    /// unconditional writes.
    pub async fn put_string(&self, request: PutStringRequest) -> Result<(), CacheError> {
        instrumented("put_string", async {
            let (key, value) = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            let expected = request.expected_value().map(String::as_bytes);
            self.write(&key, value.as_bytes(), expected, request.ttl()).await
        })
        .await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Entities
    // ═══════════════════════════════════════════════════════════════════════════

    /// Read an entity. The key is always namespaced.
    pub async fn get_entity<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        self.get_entity_with(GetEntityRequest::new().with_key(key)).await
    }

    pub async fn get_entity_with<T: DeserializeOwned>(&self, request: GetEntityRequest) -> Result<Option<T>, CacheError> {
        instrumented("get_entity", async {
            match self.read(&request).await? {
                Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Entity counterpart of [`put_string`](Self::put_string), same
    /// compare-and-set contract. Expected and stored values are compared in
    /// encoded form.
    pub async fn put_entity<T: Serialize>(&self, request: PutEntityRequest<T>) -> Result<(), CacheError> {
        instrumented("put_entity", async {
            let (key, value) = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            let value = self.codec.encode(value)?;
            let expected = match request.expected_value() {
                Some(expected) => Some(self.codec.encode(expected)?),
                None => None,
            };
            self.write(&key, &value, expected.as_deref(), request.ttl()).await
        })
        .await
    }

    async fn read(&self, request: &GetStringRequest) -> Result<Option<Vec<u8>>, CacheError> {
        let key = request.validate()?;
        let key = self.wire_key(key, request.namespace_enabled());
        Ok(self.store.get(&key).await?)
    }

    async fn write(
        &self,
        key: &str,
        value: &[u8],
        expected: Option<&[u8]>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        match expected {
            None => self.store.set(key, value, ttl).await?,
            Some(expected) => {
                if !self.store.compare_and_set(key, expected, value).await? {
                    debug!(key, "Compare-and-set did not match, value left unchanged");
                }
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Scored sets
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add a string member. Re-adding a member updates its score.
    pub async fn add_string_to_scored_set(&self, request: AddScoredStringRequest) -> Result<(), CacheError> {
        instrumented("add_string_to_scored_set", async {
            let (key, value) = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            self.store.zadd(&key, request.score(), value.as_bytes()).await?;
            Ok(())
        })
        .await
    }

    /// Members by index range, ascending by score unless reversed.
    /// Negative indices count from the end.
    pub async fn get_strings_from_scored_set(&self, request: GetScoredStringsRequest) -> Result<Vec<String>, CacheError> {
        instrumented("get_strings_from_scored_set", async {
            let members = self.range(&request).await?;
            Ok(members.into_iter().map(utf8).collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    pub async fn add_entity_to_scored_set<T: Serialize>(&self, request: AddScoredEntityRequest<T>) -> Result<(), CacheError> {
        instrumented("add_entity_to_scored_set", async {
            let (key, value) = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            let member = self.codec.encode(value)?;
            self.store.zadd(&key, request.score(), &member).await?;
            Ok(())
        })
        .await
    }

    pub async fn get_entities_from_scored_set<T: DeserializeOwned>(
        &self,
        request: GetScoredEntitiesRequest,
    ) -> Result<Vec<T>, CacheError> {
        instrumented("get_entities_from_scored_set", async {
            let members = self.range(&request).await?;
            let mut entities = Vec::with_capacity(members.len());
            for member in members {
                entities.push(self.codec.decode(&member)?);
            }
            Ok(entities)
        })
        .await
    }

    async fn range(&self, request: &GetScoredStringsRequest) -> Result<Vec<Vec<u8>>, CacheError> {
        let key = request.validate()?;
        let key = self.wire_key(key, request.namespace_enabled());
        Ok(self
            .store
            .zrange(&key, request.start_index(), request.end_index(), request.is_reversed())
            .await?)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Delete
    // ═══════════════════════════════════════════════════════════════════════════

    /// Delete a key of any type. The key is always namespaced.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.delete_with(DeleteEntryRequest::new().with_key(key)).await
    }

    pub async fn delete_with(&self, request: DeleteEntryRequest) -> Result<(), CacheError> {
        instrumented("delete", async {
            let key = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            self.store.delete(&key).await?;
            Ok(())
        })
        .await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Maps of entities
    // ═══════════════════════════════════════════════════════════════════════════

    /// Merge fields into the map. Fields not in the request are left alone.
    pub async fn put_map_of_entities<T: Serialize>(&self, request: PutMapOfEntitiesRequest<T>) -> Result<(), CacheError> {
        instrumented("put_map_of_entities", async {
            let (key, value) = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            let mut fields = Vec::with_capacity(value.len());
            for (field, entity) in value {
                fields.push((field.clone(), self.codec.encode(entity)?));
            }
            self.store.hset_all(&key, &fields).await?;
            debug!(key = %key, fields = fields.len(), "Put map of entities");
            Ok(())
        })
        .await
    }

    /// The whole map, or only the requested fields that exist.
    pub async fn get_map_of_entities<T: DeserializeOwned>(
        &self,
        request: GetMapOfEntitiesRequest,
    ) -> Result<HashMap<String, T>, CacheError> {
        instrumented("get_map_of_entities", async {
            let key = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            let raw = match request.fields() {
                Some(fields) => {
                    let fields: Vec<String> = fields.iter().cloned().collect();
                    debug!(key = %key, ?fields, "Getting map fields");
                    self.store.hget_fields(&key, &fields).await?
                }
                None => {
                    debug!(key = %key, "Getting whole map");
                    self.store.hget_all(&key).await?
                }
            };

            let mut map = HashMap::with_capacity(raw.len());
            for (field, bytes) in raw {
                let entity = self.codec.decode(&bytes)?;
                map.insert(field, entity);
            }
            Ok(map)
        })
        .await
    }

    /// Remove the requested fields, or the whole map when none are given.
    pub async fn delete_map_of_entities(&self, request: DeleteMapOfEntitiesRequest) -> Result<(), CacheError> {
        instrumented("delete_map_of_entities", async {
            let key = request.validate()?;
            let key = self.wire_key(key, request.namespace_enabled());
            match request.fields() {
                Some(fields) => {
                    let fields: Vec<String> = fields.iter().cloned().collect();
                    let removed = self.store.hdel_fields(&key, &fields).await?;
                    debug!(key = %key, requested = fields.len(), removed, "Removed map fields");
                }
                None => {
                    self.store.delete(&key).await?;
                    debug!(key = %key, "Removed whole map");
                }
            }
            Ok(())
        })
        .await
    }
}
