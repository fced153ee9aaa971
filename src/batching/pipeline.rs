// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lock-light batch pipeline.
//!
//! Callers queue ops into the current [`Batch`] without waiting on the store.
//! Every `batch_size`-th successful enqueue rotates the batch: a fresh one is
//! installed and the full one is executed on the runtime in the background.
//!
//! ```text
//! enqueue ──▶ current batch ──(count hits batch_size)──▶ rotate
//!    ▲             │                                       │
//!    │      Retired / NotInitialized                        ▼
//!    └──── retry (bounded) ◀──┘                 spawn execute(old batch)
//! ```
//!
//! The trigger is the batch's own length, read under the batch lock as part
//! of the push: only the push that makes the batch exactly `batch_size` long
//! rotates it. A batch may end up a little larger than `batch_size` because
//! ops that grabbed it before the swap still land in it, but a batch that
//! rotates out is never smaller than `batch_size`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::batch::{Batch, BatchResult, MutationToken, PendingOp};
use crate::error::{BatchError, CacheError};
use crate::metrics;
use crate::storage::traits::{BatchOp, StoreClient};

/// Counters describing pipeline activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Batches installed, including the initial one
    pub batches_created: u64,
    /// Batches handed off for execution
    pub batches_flushed: u64,
    /// Ops accepted into a batch
    pub ops_enqueued: u64,
    /// Enqueue attempts that found the batch unavailable
    pub retries: u64,
}

pub struct BatchPipeline<S: StoreClient> {
    store: Arc<S>,
    runtime: Handle,
    current: RwLock<Option<Arc<Batch>>>,
    batch_size: usize,
    max_attempts: usize,
    next_batch_id: AtomicU64,
    in_flight: Mutex<Vec<JoinHandle<BatchResult>>>,

    batches_created: AtomicU64,
    batches_flushed: AtomicU64,
    ops_enqueued: AtomicU64,
    retries: AtomicU64,
}

impl<S: StoreClient> BatchPipeline<S> {
    /// Create a pipeline with its first batch installed.
    ///
    /// Must be called from within a Tokio runtime; background executions are
    /// spawned on that runtime even when ops are queued from other threads.
    pub fn new(store: Arc<S>, batch_size: usize, max_attempts: usize) -> Result<Self, CacheError> {
        if batch_size == 0 {
            return Err(CacheError::Config("pipeline size must be at least 1".into()));
        }
        let runtime = Handle::try_current()
            .map_err(|e| CacheError::Config(format!("no tokio runtime for batch execution: {}", e)))?;

        let pipeline = Self {
            store,
            runtime,
            current: RwLock::new(None),
            batch_size,
            max_attempts: max_attempts.max(1),
            next_batch_id: AtomicU64::new(1),
            in_flight: Mutex::new(Vec::new()),
            batches_created: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            ops_enqueued: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        };
        *pipeline.current.write() = Some(Arc::new(pipeline.new_batch()));
        debug!(batch_size, max_attempts = pipeline.max_attempts, "Batch pipeline started");
        Ok(pipeline)
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// False once [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current.read().is_some()
    }

    /// Ops waiting in the current batch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.current.read().as_ref().map_or(0, |batch| batch.len())
    }

    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            batches_created: self.batches_created.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            ops_enqueued: self.ops_enqueued.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    /// Queue an op into the current batch.
    ///
    /// Never blocks on the store. If the batch is mid-rotation (retired, or
    /// the slot is momentarily empty) the attempt is repeated up to
    /// `max_attempts` times before failing with
    /// [`CacheError::BatchProcessing`].
    pub fn enqueue(&self, op: BatchOp, mutation_id: Option<String>) -> Result<MutationToken, CacheError> {
        let kind = op.kind();
        let (mut pending, token) = PendingOp::new(op, mutation_id);

        for attempt in 1..=self.max_attempts {
            let outcome = match self.current.read().clone() {
                Some(batch) => batch.push(pending).map(|len| (len, batch)),
                None => Err((BatchError::NotInitialized, pending)),
            };

            match outcome {
                Ok((len, batch)) => {
                    self.ops_enqueued.fetch_add(1, Ordering::Relaxed);
                    metrics::record_enqueue(kind);
                    if len == self.batch_size {
                        self.rotate_full(&batch);
                    }
                    return Ok(token);
                }
                Err((reason, returned)) => {
                    pending = returned;
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    metrics::record_batch_retry(match reason {
                        BatchError::Retired => "retired",
                        BatchError::NotInitialized => "not_initialized",
                    });
                    debug!(attempt, kind, reason = %reason, "Batch unavailable, retrying enqueue");
                    std::thread::yield_now();
                }
            }
        }

        warn!(kind, attempts = self.max_attempts, "Giving up on enqueue, no batch available");
        metrics::record_enqueue_rejected(kind);
        Err(CacheError::BatchProcessing(format!(
            "Batch operation failed despite trying {} times",
            self.max_attempts
        )))
    }

    /// Swap out `full` and execute it in the background.
    ///
    /// If a flush or shutdown already took it from the slot, that caller
    /// executes it instead.
    fn rotate_full(&self, full: &Arc<Batch>) {
        let mut slot = self.current.write();
        if !slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, full)) {
            debug!(batch_id = full.id(), "Full batch already taken from the slot");
            return;
        }
        *slot = Some(Arc::new(self.new_batch()));
        drop(slot);

        metrics::record_batch_rotation();
        self.spawn_execution(Arc::clone(full));
    }

    /// Install a fresh batch and return the one it replaced.
    /// Does nothing after shutdown.
    fn rotate(&self) -> Option<Arc<Batch>> {
        let mut slot = self.current.write();
        if slot.is_none() {
            return None;
        }
        let fresh = Arc::new(self.new_batch());
        metrics::record_batch_rotation();
        slot.replace(fresh)
    }

    fn new_batch(&self) -> Batch {
        self.batches_created.fetch_add(1, Ordering::Relaxed);
        Batch::new(self.next_batch_id.fetch_add(1, Ordering::Relaxed))
    }

    fn spawn_execution(&self, batch: Arc<Batch>) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        let store = Arc::clone(&self.store);
        debug!(batch_id = batch.id(), "Executing batch in background");
        let handle = self
            .runtime
            .spawn(async move { batch.execute(store.as_ref()).await });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
        metrics::set_batches_in_flight(in_flight.len());
    }

    /// Wait for every background execution started so far.
    async fn drain_in_flight(&self) {
        let handles = std::mem::take(&mut *self.in_flight.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background batch execution did not complete");
            }
        }
        metrics::set_batches_in_flight(0);
    }

    /// Execute the current partial batch now and wait for it, along with any
    /// batch already executing in the background.
    ///
    /// Returns the result of the partial batch.
    pub async fn flush(&self) -> BatchResult {
        let taken = self.rotate();
        self.drain_in_flight().await;

        match taken {
            Some(batch) => {
                self.batches_flushed.fetch_add(1, Ordering::Relaxed);
                batch.execute(self.store.as_ref()).await
            }
            None => BatchResult::default(),
        }
    }

    /// Stop accepting ops and execute whatever is still queued.
    ///
    /// Later enqueues fail with [`CacheError::BatchProcessing`] once their
    /// retries are used up.
    pub async fn shutdown(&self) -> BatchResult {
        let last = self.current.write().take();
        self.drain_in_flight().await;

        let result = match last {
            Some(batch) => {
                self.batches_flushed.fetch_add(1, Ordering::Relaxed);
                batch.execute(self.store.as_ref()).await
            }
            None => BatchResult::default(),
        };
        info!(ops = result.total, failed = result.failed, "Batch pipeline shut down");
        result
    }

    #[cfg(test)]
    pub(crate) fn current_batch(&self) -> Option<Arc<Batch>> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStore;
    use std::time::Duration;
    use tokio::time::timeout;

    fn set(n: usize) -> BatchOp {
        BatchOp::Set { key: format!("key{}", n), value: n.to_string().into_bytes(), ttl: None }
    }

    fn pipeline(batch_size: usize) -> (Arc<InMemoryStore>, BatchPipeline<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = BatchPipeline::new(Arc::clone(&store), batch_size, 5).unwrap();
        (store, pipeline)
    }

    #[test]
    fn test_requires_runtime() {
        let store = Arc::new(InMemoryStore::new());
        let err = BatchPipeline::new(store, 10, 5).err().unwrap();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let store = Arc::new(InMemoryStore::new());
        assert!(BatchPipeline::new(store, 0, 5).is_err());
    }

    #[tokio::test]
    async fn test_starts_with_one_batch() {
        let (_, pipeline) = pipeline(10);
        assert!(pipeline.is_running());
        assert_eq!(pipeline.pending(), 0);
        assert_eq!(pipeline.stats().batches_created, 1);
    }

    #[tokio::test]
    async fn test_full_batch_rotates_exactly_once() {
        let (store, pipeline) = pipeline(5);
        let tokens: Vec<_> = (0..5).map(|n| pipeline.enqueue(set(n), None).unwrap()).collect();

        let stats = pipeline.stats();
        assert_eq!(stats.batches_created, 2);
        assert_eq!(stats.batches_flushed, 1);
        assert_eq!(pipeline.pending(), 0);

        for token in tokens {
            timeout(Duration::from_secs(5), token).await.unwrap().unwrap();
        }
        assert_eq!(store.executed_batches(), vec![5]);
    }

    #[tokio::test]
    async fn test_partial_batch_waits_for_flush() {
        let (store, pipeline) = pipeline(5);
        let tokens: Vec<_> = (0..7).map(|n| pipeline.enqueue(set(n), Some(n.to_string())).unwrap()).collect();

        // 5 went out in the background, 2 wait for the next trigger
        assert_eq!(pipeline.pending(), 2);
        assert_eq!(pipeline.stats().batches_flushed, 1);

        let result = pipeline.flush().await;
        assert_eq!(result.total, 2);
        assert_eq!(store.executed_batches(), vec![5, 2]);

        for (n, token) in tokens.into_iter().enumerate() {
            assert_eq!(token.await.unwrap(), Some(n.to_string()));
        }
    }

    #[tokio::test]
    async fn test_flush_of_empty_batch_skips_store() {
        let (store, pipeline) = pipeline(5);
        let result = pipeline.flush().await;
        assert_eq!(result, BatchResult::default());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_trigger_restarts_after_flush() {
        let (store, pipeline) = pipeline(3);
        pipeline.enqueue(set(0), None).unwrap();
        pipeline.enqueue(set(1), None).unwrap();
        pipeline.flush().await;

        // A full batch's worth after the flush triggers a rotation again
        for n in 2..5 {
            pipeline.enqueue(set(n), None).unwrap();
        }
        pipeline.flush().await;
        assert_eq!(store.executed_batches(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_retired_batch_exhausts_retries() {
        let (store, pipeline) = pipeline(100);
        // Retire the installed batch without swapping in a new one
        let stale = pipeline.current_batch().unwrap();
        stale.execute(store.as_ref()).await;

        let err = pipeline.enqueue(set(1), None).unwrap_err();
        assert!(err.is_batch_processing());
        assert!(err.to_string().contains("5 times"));
        assert_eq!(pipeline.stats().retries, 5);

        // A flush installs a fresh batch and the pipeline recovers
        pipeline.flush().await;
        assert!(pipeline.enqueue(set(2), None).is_ok());
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let (store, pipeline) = pipeline(10);
        let token = pipeline.enqueue(set(1), Some("last".into())).unwrap();

        let result = pipeline.shutdown().await;
        assert_eq!(result.total, 1);
        assert_eq!(token.await.unwrap(), Some("last".to_string()));
        assert!(!pipeline.is_running());

        let err = pipeline.enqueue(set(2), None).unwrap_err();
        assert!(err.is_batch_processing());
        assert_eq!(store.executed_batches(), vec![1]);
    }

    #[tokio::test]
    async fn test_failed_compare_and_set_fails_token() {
        let (store, pipeline) = pipeline(10);
        store.set("k", b"other", None).await.unwrap();

        let token = pipeline
            .enqueue(
                BatchOp::CompareAndSet { key: "k".into(), expected: b"old".to_vec(), value: b"new".to_vec() },
                None,
            )
            .unwrap();
        pipeline.flush().await;

        let err = token.await.unwrap_err();
        assert!(err.to_string().contains("Redis batch update failed"));
        assert_eq!(store.get("k").await.unwrap(), Some(b"other".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rotated_batches_are_never_undersized() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 2000;
        const BATCH: usize = 16;

        for _ in 0..20 {
            let (store, pipeline) = pipeline(BATCH);
            std::thread::scope(|scope| {
                for worker in 0..THREADS {
                    let pipeline = &pipeline;
                    scope.spawn(move || {
                        for n in 0..PER_THREAD {
                            pipeline.enqueue(set(worker * PER_THREAD + n), None).unwrap();
                        }
                    });
                }
            });
            let partial = pipeline.flush().await;

            let mut sizes = store.executed_batches();
            if partial.total > 0 {
                assert_eq!(sizes.pop(), Some(partial.total));
            }
            let undersized: Vec<_> = sizes.iter().filter(|&&size| size < BATCH).collect();
            assert!(undersized.is_empty(), "rotated batches below {}: {:?}", BATCH, undersized);
            assert_eq!(sizes.iter().sum::<usize>() + partial.total, THREADS * PER_THREAD);
        }
    }

    #[tokio::test]
    async fn test_full_batch_taken_by_flush_is_not_rotated_twice() {
        let (store, pipeline) = pipeline(3);
        pipeline.enqueue(set(0), None).unwrap();
        pipeline.enqueue(set(1), None).unwrap();
        let taken = pipeline.current_batch().unwrap();
        pipeline.flush().await;

        // The batch is gone from the slot; its trigger must not swap the new one
        pipeline.rotate_full(&taken);
        assert_eq!(pipeline.stats().batches_created, 2);
        assert_eq!(store.executed_batches(), vec![2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueue_loses_nothing() {
        let (store, pipeline) = pipeline(16);
        let pipeline = Arc::new(pipeline);

        let mut workers = Vec::new();
        for worker in 0..8 {
            let pipeline = Arc::clone(&pipeline);
            workers.push(tokio::spawn(async move {
                let mut tokens = Vec::new();
                for n in 0..50 {
                    tokens.push(pipeline.enqueue(set(worker * 1000 + n), None).unwrap());
                    tokio::task::yield_now().await;
                }
                tokens
            }));
        }

        let mut tokens = Vec::new();
        for worker in workers {
            tokens.extend(worker.await.unwrap());
        }
        pipeline.flush().await;

        for token in tokens {
            timeout(Duration::from_secs(5), token).await.unwrap().unwrap();
        }
        assert_eq!(store.executed_batches().iter().sum::<usize>(), 400);
        assert_eq!(store.len(), 400);
        assert_eq!(pipeline.stats().ops_enqueued, 400);
    }
}
