//! Durable on-device persistence for the expense snapshot and the pending-operation queue.
//!
//! Both collections are stored as named JSON documents. Loading never fails: a missing document
//! is an empty collection, and so is a document that cannot be parsed, because a corrupt local
//! copy must never keep the app from starting.

use crate::model::{Expense, PendingOperation};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

/// The name of the expense snapshot collection.
pub const EXPENSES: &str = "spendwise_expenses";

/// The name of the pending-operation queue collection.
pub const PENDING_OPS: &str = "spendwise_pending_ops";

/// Durable key-value persistence for the two local collections.
#[async_trait::async_trait]
pub trait LocalStore: Send + Sync {
    /// Loads the expense snapshot, or an empty collection if it is missing or corrupt.
    async fn load(&self) -> Vec<Expense>;

    /// Replaces the expense snapshot.
    async fn save(&self, expenses: &[Expense]) -> Result<()>;

    /// Loads the pending-operation queue, or an empty queue if it is missing or corrupt.
    async fn load_queue(&self) -> Vec<PendingOperation>;

    /// Replaces the pending-operation queue.
    async fn save_queue(&self, ops: &[PendingOperation]) -> Result<()>;
}

/// Parses a stored collection, treating absence and corruption alike as empty.
pub(crate) fn decode<T>(name: &str, raw: Option<String>) -> Vec<T>
where
    T: DeserializeOwned,
{
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("The local collection '{name}' is corrupt and will be treated as empty: {e}");
            Vec::new()
        }
    }
}

pub(crate) fn encode<T>(items: &[T]) -> Result<String>
where
    T: Serialize,
{
    Ok(serde_json::to_string(items)?)
}

/// A `LocalStore` that lives in memory. Used in tests and whenever durability is not wanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a collection with raw text, e.g. to simulate corruption.
    pub fn set_raw(&self, name: &str, data: impl Into<String>) {
        if let Ok(mut collections) = self.collections.lock() {
            collections.insert(name.to_string(), data.into());
        }
    }

    pub fn raw(&self, name: &str) -> Option<String> {
        self.collections
            .lock()
            .ok()
            .and_then(|c| c.get(name).cloned())
    }

    fn put(&self, name: &str, data: String) -> Result<()> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| anyhow::anyhow!("The in-memory store lock is poisoned"))?;
        collections.insert(name.to_string(), data);
        Ok(())
    }
}

#[async_trait::async_trait]
impl LocalStore for MemoryStore {
    async fn load(&self) -> Vec<Expense> {
        decode(EXPENSES, self.raw(EXPENSES))
    }

    async fn save(&self, expenses: &[Expense]) -> Result<()> {
        self.put(EXPENSES, encode(expenses)?)
    }

    async fn load_queue(&self) -> Vec<PendingOperation> {
        decode(PENDING_OPS, self.raw(PENDING_OPS))
    }

    async fn save_queue(&self, ops: &[PendingOperation]) -> Result<()> {
        self.put(PENDING_OPS, encode(ops)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::expense::expense;
    use crate::model::Operation;

    #[tokio::test]
    async fn test_missing_collections_are_empty() {
        let store = MemoryStore::new();
        assert!(store.load().await.is_empty());
        assert!(store.load_queue().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemoryStore::new();
        let expenses = vec![expense("a", 1.0, "USD"), expense("b", 2.0, "EUR")];
        store.save(&expenses).await.unwrap();
        assert_eq!(store.load().await, expenses);

        let ops = vec![PendingOperation::new(
            Operation::Add(expense("a", 1.0, "USD")),
            10,
        )];
        store.save_queue(&ops).await.unwrap();
        assert_eq!(store.load_queue().await, ops);
    }

    #[tokio::test]
    async fn test_corrupt_collections_are_empty() {
        let store = MemoryStore::new();
        store.set_raw(EXPENSES, "{not json");
        store.set_raw(PENDING_OPS, r#"[{"type":"ADD","payload":null}]"#);
        assert!(store.load().await.is_empty());
        assert!(store.load_queue().await.is_empty());
    }
}
