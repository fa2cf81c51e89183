//! Mutations that have been applied locally but not yet confirmed by the remote store.

use crate::model::Expense;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// The kind of a mutation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Add,
    Update,
    Delete,
}

serde_plain::derive_display_from_serialize!(OperationKind);
serde_plain::derive_fromstr_from_deserialize!(OperationKind);

/// A mutation and its payload. `Add` and `Update` carry the full expense while `Delete` carries
/// only the id of the expense it removes.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Add(Expense),
    Update(Expense),
    Delete { target_id: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Add(_) => OperationKind::Add,
            Operation::Update(_) => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }

    /// The id of the expense this operation applies to.
    pub fn target_id(&self) -> &str {
        match self {
            Operation::Add(e) | Operation::Update(e) => &e.id,
            Operation::Delete { target_id } => target_id,
        }
    }
}

/// The composite identity of a queued operation. `enqueued_at` is unique within a queue, so this
/// identifies exactly one entry.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct OperationId {
    pub target_id: String,
    pub kind: OperationKind,
    pub enqueued_at: i64,
}

/// A mutation waiting to be replayed against the remote store.
///
/// Persisted as:
/// ```json
/// {
///   "type": "UPDATE",
///   "payload": { "id": "e1", "amount": 20.0, ... },
///   "targetId": "e1",
///   "enqueuedAt": 1764504000000,
///   "attempts": 0
/// }
/// ```
/// `payload` is `null` for `DELETE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredOperation", into = "StoredOperation")]
pub struct PendingOperation {
    pub operation: Operation,
    /// Epoch millis at which the operation was queued. Replay order is ascending `enqueued_at`.
    pub enqueued_at: i64,
    /// The number of failed replay attempts so far.
    pub attempts: u32,
}

impl PendingOperation {
    pub fn new(operation: Operation, enqueued_at: i64) -> Self {
        Self {
            operation,
            enqueued_at,
            attempts: 0,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn target_id(&self) -> &str {
        self.operation.target_id()
    }

    pub fn identity(&self) -> OperationId {
        OperationId {
            target_id: self.target_id().to_string(),
            kind: self.kind(),
            enqueued_at: self.enqueued_at,
        }
    }
}

/// The flat persisted shape of a `PendingOperation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredOperation {
    #[serde(rename = "type")]
    kind: OperationKind,
    payload: Option<Expense>,
    target_id: String,
    enqueued_at: i64,
    #[serde(default)]
    attempts: u32,
}

/// A persisted operation whose payload does not agree with its type or target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedOperation(String);

impl Display for MalformedOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed pending operation: {}", self.0)
    }
}

impl std::error::Error for MalformedOperation {}

impl TryFrom<StoredOperation> for PendingOperation {
    type Error = MalformedOperation;

    fn try_from(stored: StoredOperation) -> Result<Self, Self::Error> {
        let operation = match (stored.kind, stored.payload) {
            (OperationKind::Delete, _) => Operation::Delete {
                target_id: stored.target_id,
            },
            (kind, Some(expense)) => {
                if expense.id != stored.target_id {
                    return Err(MalformedOperation(format!(
                        "{kind} payload id '{}' does not match target '{}'",
                        expense.id, stored.target_id
                    )));
                }
                match kind {
                    OperationKind::Add => Operation::Add(expense),
                    _ => Operation::Update(expense),
                }
            }
            (kind, None) => {
                return Err(MalformedOperation(format!(
                    "{kind} for '{}' has no payload",
                    stored.target_id
                )))
            }
        };
        Ok(Self {
            operation,
            enqueued_at: stored.enqueued_at,
            attempts: stored.attempts,
        })
    }
}

impl From<PendingOperation> for StoredOperation {
    fn from(op: PendingOperation) -> Self {
        let kind = op.kind();
        let (payload, target_id) = match op.operation {
            Operation::Add(e) | Operation::Update(e) => {
                let id = e.id.clone();
                (Some(e), id)
            }
            Operation::Delete { target_id } => (None, target_id),
        };
        Self {
            kind,
            payload,
            target_id,
            enqueued_at: op.enqueued_at,
            attempts: op.attempts,
        }
    }
}
