use crate::model::{Operation, OperationId, PendingOperation};
use crate::store::LocalStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of failed replays after which an operation is dropped.
pub const MAX_ATTEMPTS: u32 = 20;

/// Default age after which an operation is dropped: 30 days.
pub const MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// When a queued operation stops being retried.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_age: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            max_age: MAX_AGE,
        }
    }
}

impl RetryPolicy {
    fn is_exhausted(&self, op: &PendingOperation, now: i64) -> bool {
        let max_age = i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX);
        op.attempts >= self.max_attempts || now.saturating_sub(op.enqueued_at) > max_age
    }
}

/// The ordered, durable log of mutations that the remote store has not confirmed.
///
/// Every change is written through to the `LocalStore` before the method returns. A failed write
/// is logged and the in-memory queue stays authoritative for the rest of the session.
pub struct SyncQueue {
    ops: Vec<PendingOperation>,
    store: Arc<dyn LocalStore>,
}

impl SyncQueue {
    /// Loads the persisted queue.
    pub async fn load(store: Arc<dyn LocalStore>) -> Self {
        let mut ops = store.load_queue().await;
        ops.sort_by_key(|op| op.enqueued_at);
        debug!("Loaded {} pending operations", ops.len());
        Self { ops, store }
    }

    /// Appends `operation` and persists the queue.
    ///
    /// `enqueued_at` is `now` unless that would not be later than the newest entry, in which case
    /// it is one millisecond after it. This keeps the queue strictly ordered and makes every
    /// `OperationId` unique even when the clock stalls or steps backwards.
    pub async fn enqueue(&mut self, operation: Operation, now: i64) -> PendingOperation {
        let enqueued_at = match self.ops.iter().map(|op| op.enqueued_at).max() {
            Some(last) if last >= now => last + 1,
            _ => now,
        };
        let op = PendingOperation::new(operation, enqueued_at);
        debug!(
            "Queued {} for {} at {}",
            op.kind(),
            op.target_id(),
            op.enqueued_at
        );
        self.ops.push(op.clone());
        self.persist().await;
        op
    }

    /// Removes every operation whose identity is in `confirmed` and persists once. Returns the
    /// number removed.
    pub async fn dequeue_confirmed(&mut self, confirmed: &HashSet<OperationId>) -> usize {
        if confirmed.is_empty() {
            return 0;
        }
        let before = self.ops.len();
        self.ops.retain(|op| !confirmed.contains(&op.identity()));
        let removed = before - self.ops.len();
        if removed > 0 {
            self.persist().await;
        }
        removed
    }

    /// Increments the attempt count of every operation in `failed` and persists once.
    pub async fn record_failures(&mut self, failed: &HashSet<OperationId>) {
        if failed.is_empty() {
            return;
        }
        for op in self.ops.iter_mut() {
            if failed.contains(&op.identity()) {
                op.attempts += 1;
            }
        }
        self.persist().await;
    }

    /// Drops operations that have exhausted `policy`. Once an operation for a target is dropped,
    /// every later operation for that target is dropped with it, since those depend on a write the
    /// remote store will never see. Returns the dropped operations.
    pub async fn expire(&mut self, now: i64, policy: &RetryPolicy) -> Vec<PendingOperation> {
        self.ops.sort_by_key(|op| op.enqueued_at);
        let mut dead_targets: HashSet<String> = HashSet::new();
        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(self.ops.len());
        for op in self.ops.drain(..) {
            if dead_targets.contains(op.target_id()) || policy.is_exhausted(&op, now) {
                dead_targets.insert(op.target_id().to_string());
                expired.push(op);
            } else {
                kept.push(op);
            }
        }
        self.ops = kept;
        if !expired.is_empty() {
            for op in &expired {
                warn!(
                    "Giving up on {} for {} after {} attempts",
                    op.kind(),
                    op.target_id(),
                    op.attempts
                );
            }
            self.persist().await;
        }
        expired
    }

    /// A snapshot of the queue in replay order, ascending `enqueued_at`.
    pub fn pending(&self) -> Vec<PendingOperation> {
        let mut ops = self.ops.clone();
        ops.sort_by_key(|op| op.enqueued_at);
        ops
    }

    /// Whether any queued operation targets `id`.
    pub fn has_target(&self, id: &str) -> bool {
        self.ops.iter().any(|op| op.target_id() == id)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save_queue(&self.ops).await {
            warn!("Unable to persist the pending-operation queue: {e:#}");
        }
    }
}
