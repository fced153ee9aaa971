// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! A single pipelined batch and its per-operation completion tokens.
//!
//! A [`Batch`] accumulates [`BatchOp`]s until it is executed. Execution
//! retires it: any later attempt to queue fails with [`BatchError::Retired`].
//! Each queued op gets a [`MutationToken`] that resolves on its own, as soon
//! as the store reply for that op is known.
//!
//! ```text
//! Accumulating ──execute()──▶ Retired
//!   queue() ok                  queue() → BatchError::Retired
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{BatchError, CacheError};
use crate::metrics;
use crate::storage::traits::{BatchOp, OpReply, StoreClient, StoreError};

/// What a [`MutationToken`] resolves to: the caller's mutation id.
pub type Completion = Result<Option<String>, CacheError>;

/// Completion token for a queued mutation.
///
/// Resolves to the request's mutation id once the store acknowledges the
/// operation, or to [`CacheError::BatchProcessing`] if the store reported
/// that it did not take effect. Dropping the token does not cancel the op.
#[derive(Debug)]
pub struct MutationToken {
    rx: oneshot::Receiver<Completion>,
}

impl Future for MutationToken {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(completion)) => Poll::Ready(completion),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CacheError::BatchProcessing(
                "batch dropped before the operation completed".into(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// An op waiting in a batch together with its completion handle.
#[derive(Debug)]
pub(crate) struct PendingOp {
    op: BatchOp,
    mutation_id: Option<String>,
    done: oneshot::Sender<Completion>,
}

impl PendingOp {
    pub(crate) fn new(op: BatchOp, mutation_id: Option<String>) -> (Self, MutationToken) {
        let (done, rx) = oneshot::channel();
        (Self { op, mutation_id, done }, MutationToken { rx })
    }
}

/// Result of executing a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Operations in the batch
    pub total: usize,
    /// Operations the store acknowledged
    pub succeeded: usize,
    /// Operations rejected by the store or lost to a transport error
    pub failed: usize,
}

impl BatchResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug)]
enum BatchState {
    Accumulating(Vec<PendingOp>),
    Retired,
}

#[derive(Debug)]
pub struct Batch {
    id: u64,
    state: Mutex<BatchState>,
}

impl Batch {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: Mutex::new(BatchState::Accumulating(Vec::new())),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue an op. Fails once the batch has been taken for execution.
    pub fn queue(&self, op: BatchOp, mutation_id: Option<String>) -> Result<MutationToken, BatchError> {
        let (pending, token) = PendingOp::new(op, mutation_id);
        self.push(pending).map(|_| token).map_err(|(reason, _)| reason)
    }

    /// Queue a pending op, handing it back on rejection so it can be retried.
    ///
    /// Returns the batch length including this op. Exactly one push sees
    /// any given length.
    pub(crate) fn push(&self, pending: PendingOp) -> Result<usize, (BatchError, PendingOp)> {
        match &mut *self.state.lock() {
            BatchState::Accumulating(ops) => {
                ops.push(pending);
                Ok(ops.len())
            }
            BatchState::Retired => Err((BatchError::Retired, pending)),
        }
    }

    /// Ops queued so far (0 once retired).
    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.state.lock() {
            BatchState::Accumulating(ops) => ops.len(),
            BatchState::Retired => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_retired(&self) -> bool {
        matches!(&*self.state.lock(), BatchState::Retired)
    }

    fn retire(&self) -> Vec<PendingOp> {
        match std::mem::replace(&mut *self.state.lock(), BatchState::Retired) {
            BatchState::Accumulating(ops) => ops,
            BatchState::Retired => Vec::new(),
        }
    }

    /// Retire the batch and send its ops to the store in one round trip.
    ///
    /// Every token is resolved before this returns. Executing an already
    /// retired batch is a no-op.
    pub async fn execute<S: StoreClient + ?Sized>(&self, store: &S) -> BatchResult {
        let pending = self.retire();
        if pending.is_empty() {
            return BatchResult::default();
        }

        let total = pending.len();
        let (ops, completions): (Vec<BatchOp>, Vec<_>) = pending
            .into_iter()
            .map(|p| (p.op, (p.mutation_id, p.done)))
            .unzip();

        debug!(batch_id = self.id, ops = total, "Executing batch");
        let outcome = store.execute_batch(&ops).await;

        let mut result = BatchResult { total, ..Default::default() };
        match outcome {
            Ok(replies) => {
                for (index, (op, (mutation_id, done))) in ops.iter().zip(completions).enumerate() {
                    let completion = match replies.get(index) {
                        Some(reply) => complete(op, *reply, mutation_id),
                        None => Err(CacheError::Store(StoreError::UnexpectedReply(format!(
                            "no reply for operation {} of batch {}",
                            index, self.id
                        )))),
                    };
                    if completion.is_ok() {
                        result.succeeded += 1;
                    } else {
                        result.failed += 1;
                    }
                    // Receiver may be gone if the caller never awaited.
                    let _ = done.send(completion);
                }
            }
            Err(e) => {
                warn!(batch_id = self.id, ops = total, error = %e, "Batch execution failed");
                let message = e.to_string();
                for (_, done) in completions {
                    let _ = done.send(Err(CacheError::Store(StoreError::Backend(message.clone()))));
                }
                result.failed = total;
            }
        }

        metrics::record_batch_executed(result.total, result.failed);
        trace!(batch_id = self.id, ?result, "Batch executed");
        result
    }
}

/// Resolve one op from its reply.
fn complete(op: &BatchOp, reply: OpReply, mutation_id: Option<String>) -> Completion {
    if op.requires_ack() && !reply.is_applied() {
        return Err(CacheError::BatchProcessing("Redis batch update failed".into()));
    }
    Ok(mutation_id)
}
