//! Implements `RemoteStore` in memory.
//!
//! Note: this is compiled even in the "production" version of this app so that the whole program
//! can run top-to-bottom without a remote service.

use crate::api::RemoteStore;
use crate::model::Expense;
use crate::Result;
use anyhow::bail;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A call received by a `TestRemote`, in the order it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Create(Expense),
    Update(Expense),
    Delete(String),
    FetchAll(String),
}

#[derive(Debug, Default)]
struct State {
    /// Records keyed by id, with their owner.
    records: BTreeMap<String, (String, Expense)>,
    calls: Vec<RemoteCall>,
    offline: bool,
    failing_ids: HashSet<String>,
    delay: Option<Duration>,
}

/// An in-memory remote store. Clones share the same state, so a test can keep a handle while the
/// engine owns another.
#[derive(Debug, Default, Clone)]
pub struct TestRemote {
    state: Arc<Mutex<State>>,
}

impl TestRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock can only come from a test; keep using the data.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every call fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Makes writes for `id` fail until cleared.
    pub fn fail_id(&self, id: &str) {
        self.state().failing_ids.insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        self.state().failing_ids.clear();
    }

    /// Delays every call by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    pub fn get(&self, id: &str) -> Option<Expense> {
        self.state().records.get(id).map(|(_, e)| e.clone())
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Puts a record in place without recording a call.
    pub fn seed(&self, expense: Expense, owner_id: &str) {
        self.state()
            .records
            .insert(expense.id.clone(), (owner_id.to_string(), expense));
    }

    async fn begin(&self, call: RemoteCall, id: Option<&str>) -> Result<()> {
        let delay = {
            let mut state = self.state();
            state.calls.push(call);
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state();
        if state.offline {
            bail!("The test remote is offline");
        }
        if let Some(id) = id {
            if state.failing_ids.contains(id) {
                bail!("The test remote rejected a write for {id}");
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for TestRemote {
    async fn create(&self, expense: &Expense, owner_id: &str) -> Result<()> {
        self.begin(RemoteCall::Create(expense.clone()), Some(&expense.id))
            .await?;
        self.seed(expense.clone(), owner_id);
        Ok(())
    }

    async fn update(&self, expense: &Expense, owner_id: &str) -> Result<()> {
        self.begin(RemoteCall::Update(expense.clone()), Some(&expense.id))
            .await?;
        let mut state = self.state();
        if let Some(record) = state.records.get_mut(&expense.id) {
            *record = (owner_id.to_string(), expense.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.begin(RemoteCall::Delete(id.to_string()), Some(id))
            .await?;
        self.state().records.remove(id);
        Ok(())
    }

    async fn fetch_all(&self, owner_id: &str) -> Result<Vec<Expense>> {
        self.begin(RemoteCall::FetchAll(owner_id.to_string()), None)
            .await?;
        Ok(self
            .state()
            .records
            .values()
            .filter(|(owner, _)| owner == owner_id)
            .map(|(_, e)| e.clone())
            .collect())
    }
}
