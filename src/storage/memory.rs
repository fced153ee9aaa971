// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process store with Redis-like semantics.
//!
//! Backs unit and concurrency tests: it counts every call and records the
//! size of each executed batch, so tests can assert that validation happens
//! before any store interaction and that no queued operation is lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::traits::{BatchOp, OpReply, ScanPage, StoreClient, StoreError};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
enum Entry {
    Str { value: Vec<u8>, expires_at: Option<Instant> },
    Scored(Vec<(f64, Vec<u8>)>),
    Hash(HashMap<String, Vec<u8>>),
}

impl Entry {
    fn is_expired(&self) -> bool {
        matches!(self, Entry::Str { expires_at: Some(at), .. } if *at <= Instant::now())
    }
}

pub struct InMemoryStore {
    data: DashMap<String, Entry>,
    calls: AtomicU64,
    batches: Mutex<Vec<usize>>,
    failing: AtomicBool,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            calls: AtomicU64::new(0),
            batches: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Total calls made through [`StoreClient`].
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sizes of every executed batch, in execution order.
    #[must_use]
    pub fn executed_batches(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }

    /// Make every subsequent call fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Remaining time to live of a string key, if it has one.
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        match self.data.get(key).as_deref() {
            Some(Entry::Str { expires_at: Some(at), .. }) => Some(at.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    /// Get current key count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear all keys
    pub fn clear(&self) {
        self.data.clear();
    }

    fn record_call(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Backend("injected failure".into()))
        } else {
            Ok(())
        }
    }

    fn read_string(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.data.remove_if(key, |_, entry| entry.is_expired());
        match self.data.get(key).as_deref() {
            None => Ok(None),
            Some(Entry::Str { value, .. }) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::Backend(WRONG_TYPE.into())),
        }
    }

    fn write_string(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.data.insert(key.to_string(), Entry::Str { value: value.to_vec(), expires_at });
    }

    fn cas_string(&self, key: &str, expected: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        self.data.remove_if(key, |_, entry| entry.is_expired());
        match self.data.get_mut(key).as_deref_mut() {
            Some(Entry::Str { value: current, expires_at }) => {
                if current.as_slice() == expected {
                    *current = value.to_vec();
                    *expires_at = None;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Some(_) => Err(StoreError::Backend(WRONG_TYPE.into())),
            None => Ok(false),
        }
    }

    fn remove_key(&self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    fn add_scored(&self, key: &str, score: f64, member: &[u8]) -> Result<bool, StoreError> {
        match self.data.entry(key.to_string()) {
            MapEntry::Vacant(slot) => {
                slot.insert(Entry::Scored(vec![(score, member.to_vec())]));
                Ok(true)
            }
            MapEntry::Occupied(mut slot) => match slot.get_mut() {
                Entry::Scored(members) => {
                    let position = members.iter().position(|(_, m)| m.as_slice() == member);
                    match position {
                        Some(index) => members[index].0 = score,
                        None => members.push((score, member.to_vec())),
                    }
                    members.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
                    Ok(position.is_none())
                }
                _ => Err(StoreError::Backend(WRONG_TYPE.into())),
            },
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve Redis-style inclusive index range against `len`.
fn index_range(len: usize, start: isize, end: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end.min(len - 1) };
    if len == 0 || start > end || start >= len || end < 0 {
        return None;
    }
    Some((start as usize, end as usize))
}

/// Redis glob subset: `*`, `?` and `\` escapes.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some((b'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((b'\\', rest)) if !rest.is_empty() => {
            text.first() == Some(&rest[0]) && glob_match(&rest[1..], &text[1..])
        }
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.record_call()?;
        self.read_string(key)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        self.record_call()?;
        self.write_string(key, value, ttl);
        Ok(())
    }

    async fn compare_and_set(&self, key: &str, expected: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        self.record_call()?;
        self.cas_string(key, expected, value)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.record_call()?;
        Ok(self.remove_key(key))
    }

    async fn zadd(&self, key: &str, score: f64, member: &[u8]) -> Result<bool, StoreError> {
        self.record_call()?;
        self.add_scored(key, score, member)
    }

    async fn zrange(&self, key: &str, start: isize, end: isize, reversed: bool) -> Result<Vec<Vec<u8>>, StoreError> {
        self.record_call()?;
        let mut members = match self.data.get(key).as_deref() {
            None => return Ok(Vec::new()),
            Some(Entry::Scored(members)) => members.iter().map(|(_, m)| m.clone()).collect::<Vec<_>>(),
            Some(_) => return Err(StoreError::Backend(WRONG_TYPE.into())),
        };
        if reversed {
            members.reverse();
        }
        Ok(match index_range(members.len(), start, end) {
            Some((from, to)) => members[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    async fn hset_all(&self, key: &str, fields: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        self.record_call()?;
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry.value_mut() {
            Entry::Hash(hash) => {
                for (field, value) in fields {
                    hash.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            _ => Err(StoreError::Backend(WRONG_TYPE.into())),
        }
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        self.record_call()?;
        match self.data.get(key).as_deref() {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(StoreError::Backend(WRONG_TYPE.into())),
        }
    }

    async fn hget_fields(&self, key: &str, fields: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        self.record_call()?;
        match self.data.get(key).as_deref() {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(hash)) => Ok(fields
                .iter()
                .filter_map(|f| hash.get(f).map(|v| (f.clone(), v.clone())))
                .collect()),
            Some(_) => Err(StoreError::Backend(WRONG_TYPE.into())),
        }
    }

    async fn hdel_fields(&self, key: &str, fields: &[String]) -> Result<u64, StoreError> {
        self.record_call()?;
        let removed = match self.data.get_mut(key).as_deref_mut() {
            None => 0,
            Some(Entry::Hash(hash)) => fields.iter().filter(|f| hash.remove(*f).is_some()).count() as u64,
            Some(_) => return Err(StoreError::Backend(WRONG_TYPE.into())),
        };
        self.data.remove_if(key, |_, entry| matches!(entry, Entry::Hash(h) if h.is_empty()));
        Ok(removed)
    }

    async fn scan_match(&self, cursor: u64, count: usize, pattern: &str) -> Result<Option<ScanPage>, StoreError> {
        self.record_call()?;
        if self.data.is_empty() {
            return Ok(None);
        }
        let mut keys: Vec<String> = self.data.iter().map(|e| e.key().clone()).collect();
        keys.sort();

        let from = (cursor as usize).min(keys.len());
        let to = (from + count.max(1)).min(keys.len());
        let next = if to >= keys.len() { 0 } else { to as u64 };

        let mut entries = Vec::new();
        for key in &keys[from..to] {
            if !glob_match(pattern.as_bytes(), key.as_bytes()) {
                continue;
            }
            if let Some(Entry::Str { value, .. }) = self.data.get(key).as_deref().filter(|e| !e.is_expired()) {
                entries.push(key.as_bytes().to_vec());
                entries.push(value.clone());
            }
        }
        Ok(Some(ScanPage { cursor: next, entries }))
    }

    async fn execute_batch(&self, ops: &[BatchOp]) -> Result<Vec<OpReply>, StoreError> {
        self.record_call()?;
        let mut replies = Vec::with_capacity(ops.len());
        for op in ops {
            let reply = match op {
                BatchOp::Set { key, value, ttl } => {
                    self.write_string(key, value, *ttl);
                    OpReply::Done
                }
                BatchOp::CompareAndSet { key, expected, value } => {
                    OpReply::Applied(applied_or_rejected(op, self.cas_string(key, expected, value)))
                }
                BatchOp::Delete { key } => OpReply::Applied(self.remove_key(key)),
                BatchOp::ScoredAdd { key, score, member } => {
                    OpReply::Applied(applied_or_rejected(op, self.add_scored(key, *score, member)))
                }
            };
            replies.push(reply);
        }
        self.batches.lock().push(ops.len());
        Ok(replies)
    }
}

/// A per-op rejection (WRONGTYPE) inside a batch fails only that op.
/// Ops around it are still applied and keep their own replies.
fn applied_or_rejected(op: &BatchOp, outcome: Result<bool, StoreError>) -> bool {
    outcome.unwrap_or_else(|e| {
        debug!(key = op.key(), kind = op.kind(), error = %e, "Batched op rejected");
        false
    })
}
