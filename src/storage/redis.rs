// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis store backend.
//!
//! Value layout:
//! - **Strings / entities** → Redis STRING (`SET`, `SET .. PX` with a ttl)
//! - **Scored sets** → Redis ZSET (`ZADD`, `ZRANGE` / `ZREVRANGE`)
//! - **Maps of entities** → Redis HASH (`HSET`, `HGETALL`, `HMGET`, `HDEL`)
//!
//! Compare-and-set and the pattern scan run as Lua scripts so each is a
//! single server-side step:
//! ```text
//! CAS:  GET key == expected ? SET key new : no-op      → 1 | 0
//! SCAN: SCAN cursor MATCH pattern COUNT n + GET each   → {cursor, k1, v1, k2, v2, ...}
//! ```
//!
//! Batches go out as one `redis::pipe()` round trip.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, from_redis_value, pipe, AsyncCommands, Client, Script, Value};
use tracing::{debug, info};

use super::traits::{BatchOp, OpReply, ScanPage, StoreClient, StoreError};
use crate::resilience::retry::{retry, RetryConfig};

const CAS_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

const SCAN_SCRIPT: &str = r#"
local reply = redis.call('SCAN', ARGV[1], 'MATCH', ARGV[3], 'COUNT', ARGV[2])
local result = { reply[1] }
for _, key in ipairs(reply[2]) do
    if redis.call('TYPE', key)['ok'] == 'string' then
        local value = redis.call('GET', key)
        if value then
            table.insert(result, key)
            table.insert(result, value)
        end
    end
end
return result
"#;

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// `PX` rejects zero, so sub-millisecond ttls round up.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

pub struct RedisStore {
    connection: ConnectionManager,
    cas_script: Script,
    scan_script: Script,
}

impl RedisStore {
    /// Connect to a single Redis node.
    ///
    /// Uses the startup retry preset: fails after ~5 attempts so that a bad
    /// URL is reported quickly instead of hanging.
    ///
    /// ```rust,no_run
    /// # use pipelined_cache::storage::redis::RedisStore;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = RedisStore::connect("redis://localhost:6379").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(connection_string: &str) -> Result<Self, StoreError> {
        let client = Client::open(connection_string).map_err(backend)?;

        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(backend)?;

        info!("Connected to Redis");
        Ok(Self::from_connection(connection))
    }

    /// Wrap an already-connected manager (sentinel/cluster setups build their own).
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            cas_script: Script::new(CAS_SCRIPT),
            scan_script: Script::new(SCAN_SCRIPT),
        }
    }

    /// Get a clone of the connection manager
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl StoreClient for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection.clone();
        let data: Option<Vec<u8>> = conn.get(key).await.map_err(backend)?;
        Ok(data)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        match ttl {
            None => {
                let _: () = conn.set(key, value).await.map_err(backend)?;
            }
            Some(ttl) => {
                let _: () = cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async(&mut conn)
                    .await
                    .map_err(backend)?;
            }
        }
        Ok(())
    }

    async fn compare_and_set(&self, key: &str, expected: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let applied: i64 = self
            .cas_script
            .key(key)
            .arg(expected)
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(applied == 1)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(key).await.map_err(backend)?;
        Ok(removed > 0)
    }

    async fn zadd(&self, key: &str, score: f64, member: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let added: i64 = conn.zadd(key, member, score).await.map_err(backend)?;
        Ok(added > 0)
    }

    async fn zrange(&self, key: &str, start: isize, end: isize, reversed: bool) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut conn = self.connection.clone();
        let members: redis::RedisResult<Vec<Vec<u8>>> = if reversed {
            conn.zrevrange(key, start, end).await
        } else {
            conn.zrange(key, start, end).await
        };
        members.map_err(backend)
    }

    async fn hset_all(&self, key: &str, fields: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        let _: () = conn.hset_multiple(key, fields).await.map_err(backend)?;
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let mut conn = self.connection.clone();
        let map: HashMap<String, Vec<u8>> = conn.hgetall(key).await.map_err(backend)?;
        Ok(map)
    }

    async fn hget_fields(&self, key: &str, fields: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        if fields.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.connection.clone();
        let values: Vec<Option<Vec<u8>>> = cmd("HMGET")
            .arg(key)
            .arg(fields)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        Ok(fields
            .iter()
            .zip(values)
            .filter_map(|(field, value)| value.map(|v| (field.clone(), v)))
            .collect())
    }

    async fn hdel_fields(&self, key: &str, fields: &[String]) -> Result<u64, StoreError> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let removed: u64 = conn.hdel(key, fields).await.map_err(backend)?;
        Ok(removed)
    }

    async fn scan_match(&self, cursor: u64, count: usize, pattern: &str) -> Result<Option<ScanPage>, StoreError> {
        let mut conn = self.connection.clone();
        let reply: Vec<Value> = self
            .scan_script
            .arg(cursor)
            .arg(count)
            .arg(pattern)
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        let Some((head, rest)) = reply.split_first() else {
            return Ok(None);
        };
        let next: u64 = from_redis_value(head)
            .map_err(|e| StoreError::UnexpectedReply(format!("scan cursor: {}", e)))?;
        let entries = rest
            .iter()
            .map(|v| from_redis_value::<Vec<u8>>(v))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::UnexpectedReply(format!("scan entry: {}", e)))?;

        debug!(cursor = next, entries = entries.len() / 2, "Scan page received");
        Ok(Some(ScanPage { cursor: next, entries }))
    }

    /// Pipelined batch execution: one round trip, one reply per op.
    async fn execute_batch(&self, ops: &[BatchOp]) -> Result<Vec<OpReply>, StoreError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline = pipe();
        for op in ops {
            match op {
                BatchOp::Set { key, value, ttl: None } => {
                    pipeline.set(key, value.as_slice());
                }
                BatchOp::Set { key, value, ttl: Some(ttl) } => {
                    pipeline.cmd("SET").arg(key).arg(value.as_slice()).arg("PX").arg(ttl_millis(*ttl));
                }
                BatchOp::CompareAndSet { key, expected, value } => {
                    pipeline
                        .cmd("EVAL")
                        .arg(CAS_SCRIPT)
                        .arg(1)
                        .arg(key)
                        .arg(expected.as_slice())
                        .arg(value.as_slice());
                }
                BatchOp::Delete { key } => {
                    pipeline.del(key);
                }
                BatchOp::ScoredAdd { key, score, member } => {
                    pipeline.zadd(key, member.as_slice(), *score);
                }
            }
        }

        // Redis runs every command; redis-rs turns a server error on any one
        // of them into an error for the whole query.
        let mut conn = self.connection.clone();
        let replies: Vec<Value> = pipeline.query_async(&mut conn).await.map_err(backend)?;
        if replies.len() != ops.len() {
            return Err(StoreError::UnexpectedReply(format!(
                "pipeline returned {} replies for {} operations",
                replies.len(),
                ops.len()
            )));
        }

        ops.iter()
            .zip(replies.iter())
            .map(|(op, reply)| {
                if op.requires_ack() {
                    let n: i64 = from_redis_value(reply)
                        .map_err(|e| StoreError::UnexpectedReply(format!("{}: {}", op.kind(), e)))?;
                    Ok(OpReply::Applied(n > 0))
                } else {
                    Ok(OpReply::Done)
                }
            })
            .collect()
    }
}
