//! Offline-first synchronization between the local expense collection and the remote store.

mod connectivity;
mod engine;
mod queue;

pub use connectivity::{Connectivity, ConnectivitySignal, Subscription};
pub use engine::{
    BootstrapSource, DrainReport, EngineBuilder, EngineSettings, MutationOutcome, SyncEngine,
    BOOTSTRAP_TIMEOUT,
};
pub use queue::{RetryPolicy, SyncQueue, MAX_AGE, MAX_ATTEMPTS};
