// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Unexpected store reply: {0}")]
    UnexpectedReply(String),
}

/// A mutation queued into a pipelined batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Unconditional write, optionally expiring after `ttl`
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Option<Duration>,
    },
    /// Write `value` only if the current value equals `expected`
    CompareAndSet {
        key: String,
        expected: Vec<u8>,
        value: Vec<u8>,
    },
    Delete { key: String },
    /// Add `member` to the scored set at `key`
    ScoredAdd {
        key: String,
        score: f64,
        member: Vec<u8>,
    },
}

impl BatchOp {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. }
            | Self::CompareAndSet { key, .. }
            | Self::Delete { key }
            | Self::ScoredAdd { key, .. } => key,
        }
    }

    /// Whether the store's boolean acknowledgment decides success.
    ///
    /// Plain sets and deletes succeed whatever the reply; a compare-and-set
    /// that did not match, or a scored add that did not add, is a failure.
    #[must_use]
    pub fn requires_ack(&self) -> bool {
        matches!(self, Self::CompareAndSet { .. } | Self::ScoredAdd { .. })
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::CompareAndSet { .. } => "compare_and_set",
            Self::Delete { .. } => "delete",
            Self::ScoredAdd { .. } => "scored_add",
        }
    }
}

/// Per-operation reply from a batch execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpReply {
    /// The store executed the operation
    Done,
    /// The store reported whether the operation took effect
    Applied(bool),
}

impl OpReply {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        match self {
            Self::Done => true,
            Self::Applied(applied) => *applied,
        }
    }
}

/// One page of a server-side pattern scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` when the scan is complete
    pub cursor: u64,
    /// Flat alternating key/value sequence
    pub entries: Vec<Vec<u8>>,
}

impl ScanPage {
    /// Iterate `(key, value)` pairs. A trailing unpaired element is ignored.
    pub fn pairs(&self) -> impl Iterator<Item = (String, &[u8])> {
        self.entries
            .chunks_exact(2)
            .map(|pair| (String::from_utf8_lossy(&pair[0]).into_owned(), pair[1].as_slice()))
    }
}

/// Connected handle to a Redis-compatible store.
///
/// Keys handed to the store are already namespaced. Implementations must not
/// retry transport errors; they are surfaced to the caller as-is.
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Returns `true` if the value matched `expected` and was replaced.
    async fn compare_and_set(&self, key: &str, expected: &[u8], value: &[u8]) -> Result<bool, StoreError>;

    /// Returns `true` if a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns `true` if `member` was newly added (not just re-scored).
    async fn zadd(&self, key: &str, score: f64, member: &[u8]) -> Result<bool, StoreError>;

    /// Members by index range, ascending score order unless `reversed`.
    async fn zrange(&self, key: &str, start: isize, end: isize, reversed: bool) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Merge fields into the hash at `key`; other fields are untouched.
    async fn hset_all(&self, key: &str, fields: &[(String, Vec<u8>)]) -> Result<(), StoreError>;

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, StoreError>;

    /// Only fields that exist are returned.
    async fn hget_fields(&self, key: &str, fields: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError>;

    async fn hdel_fields(&self, key: &str, fields: &[String]) -> Result<u64, StoreError>;

    /// One page of `SCAN cursor MATCH pattern COUNT count`, with values.
    /// `None` means the store returned an empty reply.
    async fn scan_match(&self, cursor: u64, count: usize, pattern: &str) -> Result<Option<ScanPage>, StoreError>;

    /// Send `ops` in one round trip. Replies are in op order.
    ///
    /// `Err` means the batch as a whole failed. Ops the store ran before the
    /// failure are not rolled back. A store that can tell a single op was
    /// rejected reports it as `Applied(false)` and carries on.
    async fn execute_batch(&self, ops: &[BatchOp]) -> Result<Vec<OpReply>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_required_only_for_conditional_ops() {
        let set = BatchOp::Set { key: "a".into(), value: vec![1], ttl: None };
        let cas = BatchOp::CompareAndSet { key: "a".into(), expected: vec![1], value: vec![2] };
        let del = BatchOp::Delete { key: "a".into() };
        let zadd = BatchOp::ScoredAdd { key: "z".into(), score: 1.0, member: vec![3] };

        assert!(!set.requires_ack());
        assert!(cas.requires_ack());
        assert!(!del.requires_ack());
        assert!(zadd.requires_ack());
        assert_eq!(zadd.key(), "z");
        assert_eq!(cas.kind(), "compare_and_set");
    }

    #[test]
    fn test_reply_applied() {
        assert!(OpReply::Done.is_applied());
        assert!(OpReply::Applied(true).is_applied());
        assert!(!OpReply::Applied(false).is_applied());
    }

    #[test]
    fn test_scan_page_pairs_skip_dangling_key() {
        let page = ScanPage {
            cursor: 0,
            entries: vec![b"k1".to_vec(), b"v1".to_vec(), b"k2".to_vec()],
        };
        let pairs: Vec<_> = page.pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "k1");
        assert_eq!(pairs[0].1, b"v1");
    }
}
