use crate::api::{RemoteStore, Session};
use crate::backup::Backup;
use crate::model::{Expense, Operation, OperationId, PendingOperation};
use crate::store::LocalStore;
use crate::sync::{ConnectivitySignal, RetryPolicy, Subscription, SyncQueue};
use crate::utils::{Clock, SystemClock};
use crate::Result;
use anyhow::{bail, Context};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default limit on the startup fetch from the remote store.
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(7);

/// Tunables for a `SyncEngine`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EngineSettings {
    pub bootstrap_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            bootstrap_timeout: BOOTSTRAP_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to the remote side of a mutation. The local side always succeeds.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The remote store confirmed the write.
    Synced,
    /// The write is in the queue and will be replayed by a later drain.
    Queued { reason: String },
    /// There is no signed-in user, nothing was sent or queued.
    LocalOnly,
}

/// Counts from one pass over the queue.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct DrainReport {
    /// Operations sent to the remote store.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Operations not sent, because the engine is offline or an earlier operation for the same
    /// expense failed in this pass.
    pub skipped: usize,
    /// Operations dropped by the retry policy after the pass.
    pub expired: usize,
}

/// Where the expense collection came from after `bootstrap`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BootstrapSource {
    /// Fetched from the remote store, with `reapplied` unconfirmed local operations on top.
    Remote { fetched: usize, reapplied: usize },
    /// The local snapshot was kept.
    Local,
}

struct Remote {
    store: Arc<dyn RemoteStore>,
    session: Session,
}

impl Remote {
    async fn replay(&self, operation: &Operation) -> Result<()> {
        let owner = self.session.user_id.as_str();
        match operation {
            Operation::Add(expense) => self.store.create(expense, owner).await,
            Operation::Update(expense) => self.store.update(expense, owner).await,
            Operation::Delete { target_id } => self.store.delete(target_id).await,
        }
    }
}

struct State {
    expenses: Vec<Expense>,
    queue: SyncQueue,
}

struct Inner {
    store: Arc<dyn LocalStore>,
    remote: Option<Remote>,
    connectivity: Arc<dyn ConnectivitySignal>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    backup: Option<Backup>,
    state: Mutex<State>,
    draining: AtomicBool,
    subscription: std::sync::Mutex<Option<Subscription>>,
}

/// Collects the collaborators of a `SyncEngine`.
pub struct EngineBuilder {
    store: Arc<dyn LocalStore>,
    connectivity: Arc<dyn ConnectivitySignal>,
    remote: Option<Remote>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    backup: Option<Backup>,
}

impl EngineBuilder {
    /// Enables remote sync for the user in `session`. Without this the engine is local-only.
    pub fn remote(mut self, store: Arc<dyn RemoteStore>, session: Session) -> Self {
        self.remote = Some(Remote { store, session });
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Backs up the local snapshot before `bootstrap` replaces it.
    pub fn backup(mut self, backup: Backup) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Loads the snapshot and the queue from the local store.
    pub async fn build(self) -> SyncEngine {
        let expenses = self.store.load().await;
        let queue = SyncQueue::load(self.store.clone()).await;
        debug!(
            "Sync engine loaded {} expenses and {} pending operations",
            expenses.len(),
            queue.len()
        );
        SyncEngine {
            inner: Arc::new(Inner {
                store: self.store,
                remote: self.remote,
                connectivity: self.connectivity,
                clock: self.clock,
                settings: self.settings,
                backup: self.backup,
                state: Mutex::new(State { expenses, queue }),
                draining: AtomicBool::new(false),
                subscription: std::sync::Mutex::new(None),
            }),
        }
    }
}

/// The single owner of the expense collection and the pending-operation queue.
///
/// Every mutation is applied locally first and written through to the `LocalStore`. When a user
/// is signed in the engine then tries the remote store, and queues the operation if that is not
/// possible. Queued operations are replayed in order by `drain`, which runs when connectivity
/// comes back and at `start`.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    pub fn builder(
        store: Arc<dyn LocalStore>,
        connectivity: Arc<dyn ConnectivitySignal>,
    ) -> EngineBuilder {
        EngineBuilder {
            store,
            connectivity,
            remote: None,
            clock: Arc::new(SystemClock),
            settings: EngineSettings::default(),
            backup: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.remote.is_some()
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    /// Subscribes to connectivity so that every offline to online transition drains the queue,
    /// then drains right away if there is pending work and the network is up.
    pub async fn start(&self) -> Option<DrainReport> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let subscription = Subscription::on_online(self.inner.connectivity.as_ref(), move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    SyncEngine { inner }.drain().await;
                }
            }
        });
        if let Ok(mut slot) = self.inner.subscription.lock() {
            *slot = Some(subscription);
        }

        let has_pending = !self.inner.state.lock().await.queue.is_empty();
        if has_pending && self.is_online() && self.is_authenticated() {
            info!("Draining pending operations at startup");
            self.drain().await
        } else {
            None
        }
    }

    /// Stops reacting to connectivity changes. Used at logout.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.inner.subscription.lock() {
            if let Some(mut subscription) = slot.take() {
                subscription.unsubscribe();
                debug!("Sync engine unsubscribed from connectivity");
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .map(|s| s.as_ref().is_some_and(|s| s.is_active()))
            .unwrap_or(false)
    }

    /// Replaces the local collection with the remote one when the remote store answers within the
    /// bootstrap timeout. Operations still in the queue are applied on top of the fetched records
    /// so that unconfirmed local work stays visible. Otherwise the local snapshot is kept. Mutations
    /// wait for the bootstrap to finish.
    pub async fn bootstrap(&self) -> BootstrapSource {
        let Some(remote) = &self.inner.remote else {
            debug!("Not signed in, using the local snapshot");
            return BootstrapSource::Local;
        };
        if !self.is_online() {
            debug!("Offline, using the local snapshot");
            return BootstrapSource::Local;
        }

        // Held across the fetch so no mutation can land between the fetch and the replacement.
        let mut state = self.inner.state.lock().await;
        let timeout = self.inner.settings.bootstrap_timeout;
        let fetched = tokio::time::timeout(timeout, remote.store.fetch_all(&remote.session.user_id))
            .await
            .context("Timed out")
            .and_then(|r| r);
        let mut records = match fetched {
            Ok(records) => records,
            Err(e) => {
                warn!("Unable to fetch remote expenses, using the local snapshot: {e:#}");
                return BootstrapSource::Local;
            }
        };

        if let Some(backup) = &self.inner.backup {
            if !state.expenses.is_empty() {
                match backup
                    .save_snapshot(&state.expenses, self.inner.clock.today())
                    .await
                {
                    Ok(path) => debug!("Backed up the local snapshot to {}", path.display()),
                    Err(e) => warn!("Unable to back up the local snapshot: {e:#}"),
                }
            }
        }

        let fetched = records.len();
        let pending = state.queue.pending();
        for op in &pending {
            apply(&mut records, &op.operation);
        }
        state.expenses = records;
        self.write_through(&state.expenses).await;
        info!(
            "Loaded {fetched} remote expenses and re-applied {} pending operations",
            pending.len()
        );
        BootstrapSource::Remote {
            fetched,
            reapplied: pending.len(),
        }
    }

    /// Records a new expense.
    pub async fn add(&self, expense: Expense) -> Result<MutationOutcome> {
        expense.validate()?;
        let mut state = self.inner.state.lock().await;
        if state.expenses.iter().any(|e| e.id == expense.id) {
            bail!("An expense with id '{}' already exists", expense.id);
        }
        self.mutate(&mut state, Operation::Add(expense)).await
    }

    /// Replaces the stored expense that has the same id.
    pub async fn update(&self, expense: Expense) -> Result<MutationOutcome> {
        expense.validate()?;
        let mut state = self.inner.state.lock().await;
        if !state.expenses.iter().any(|e| e.id == expense.id) {
            bail!("There is no expense with id '{}'", expense.id);
        }
        self.mutate(&mut state, Operation::Update(expense)).await
    }

    pub async fn delete(&self, id: &str) -> Result<MutationOutcome> {
        let mut state = self.inner.state.lock().await;
        if !state.expenses.iter().any(|e| e.id == id) {
            bail!("There is no expense with id '{id}'");
        }
        self.mutate(
            &mut state,
            Operation::Delete {
                target_id: id.to_string(),
            },
        )
        .await
    }

    /// A snapshot of the expense collection.
    pub async fn expenses(&self) -> Vec<Expense> {
        self.inner.state.lock().await.expenses.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Expense> {
        self.inner
            .state
            .lock()
            .await
            .expenses
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// A snapshot of the queue in replay order.
    pub async fn pending(&self) -> Vec<PendingOperation> {
        self.inner.state.lock().await.queue.pending()
    }

    /// Replays the queue against the remote store.
    ///
    /// Only one drain runs at a time: if another is in flight this returns `None` without doing
    /// anything. Operations are sent one after another in queue order. When one fails it stays in
    /// the queue and every later operation for the same expense is skipped until the next drain.
    /// Confirmed operations are removed together at the end of the pass, then the retry policy
    /// drops whatever has been failing for too long.
    pub async fn drain(&self) -> Option<DrainReport> {
        let Some(_guard) = DrainGuard::acquire(&self.inner.draining) else {
            debug!("A drain is already running");
            return None;
        };
        let mut report = DrainReport::default();
        let Some(remote) = &self.inner.remote else {
            return Some(report);
        };

        let pending = self.inner.state.lock().await.queue.pending();
        if pending.is_empty() {
            return Some(report);
        }
        if !self.is_online() {
            report.skipped = pending.len();
            debug!("Offline, not draining {} operations", pending.len());
            return Some(report);
        }

        debug!("Draining {} pending operations", pending.len());
        let mut confirmed: HashSet<OperationId> = HashSet::new();
        let mut failed: HashSet<OperationId> = HashSet::new();
        let mut blocked: HashSet<String> = HashSet::new();
        for op in &pending {
            if blocked.contains(op.target_id()) {
                report.skipped += 1;
                continue;
            }
            report.attempted += 1;
            match remote.replay(&op.operation).await {
                Ok(()) => {
                    report.succeeded += 1;
                    confirmed.insert(op.identity());
                }
                Err(e) => {
                    warn!(
                        "Replay of {} for {} failed: {e:#}",
                        op.kind(),
                        op.target_id()
                    );
                    report.failed += 1;
                    failed.insert(op.identity());
                    blocked.insert(op.target_id().to_string());
                }
            }
        }

        let mut state = self.inner.state.lock().await;
        state.queue.dequeue_confirmed(&confirmed).await;
        state.queue.record_failures(&failed).await;
        let now = self.inner.clock.now_millis();
        report.expired = state
            .queue
            .expire(now, &self.inner.settings.retry)
            .await
            .len();
        info!(
            "Drain finished: {} synced, {} failed, {} skipped, {} expired, {} still pending",
            report.succeeded,
            report.failed,
            report.skipped,
            report.expired,
            state.queue.len()
        );
        Some(report)
    }

    /// Applies `operation` locally, writes through, then either sends it or queues it. The caller
    /// holds the state lock for the whole call so mutations never interleave.
    async fn mutate(&self, state: &mut State, operation: Operation) -> Result<MutationOutcome> {
        apply(&mut state.expenses, &operation);
        self.write_through(&state.expenses).await;

        let Some(remote) = &self.inner.remote else {
            return Ok(MutationOutcome::LocalOnly);
        };
        let reason = if !self.is_online() {
            "offline".to_string()
        } else if state.queue.has_target(operation.target_id()) {
            // Sending now would overtake the queued writes for this expense.
            "earlier changes to this expense are still pending".to_string()
        } else {
            match remote.replay(&operation).await {
                Ok(()) => return Ok(MutationOutcome::Synced),
                Err(e) => format!("{e:#}"),
            }
        };
        let now = self.inner.clock.now_millis();
        let op = state.queue.enqueue(operation, now).await;
        warn!(
            "Queued {} for {} ({reason})",
            op.kind(),
            op.target_id()
        );
        Ok(MutationOutcome::Queued { reason })
    }

    async fn write_through(&self, expenses: &[Expense]) {
        if let Err(e) = self.inner.store.save(expenses).await {
            warn!("Unable to save the local snapshot: {e:#}");
        }
    }
}

/// Applies `operation` to a collection of expenses. Writes are upserts keyed by id.
fn apply(expenses: &mut Vec<Expense>, operation: &Operation) {
    match operation {
        Operation::Add(expense) | Operation::Update(expense) => {
            match expenses.iter_mut().find(|e| e.id == expense.id) {
                Some(existing) => *existing = expense.clone(),
                None => expenses.push(expense.clone()),
            }
        }
        Operation::Delete { target_id } => expenses.retain(|e| &e.id != target_id),
    }
}

/// Holds the single-flight flag for the duration of a drain and clears it on drop, including
/// when the drain future is cancelled.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
