use crate::api::Mode;
use crate::commands::{open_engine, Out, SyncOptions};
use crate::model::PendingOperation;
use crate::sync::{BootstrapSource, DrainReport};
use crate::{Config, Result};
use chrono::DateTime;
use serde::Serialize;

/// The result of `spendwise sync`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub source: BootstrapSource,
    pub drain: Option<DrainReport>,
    /// Changes still waiting after the sync.
    pub pending: usize,
}

/// Loads the remote expenses on top of the local queue, then replays whatever is still queued.
pub async fn sync(config: Config, mode: Mode, options: &SyncOptions) -> Result<Out<SyncReport>> {
    let engine = open_engine(&config, mode, options).await?;
    if !engine.is_authenticated() {
        engine.shutdown();
        return Ok("Not signed in, nothing to sync. Pass --user-id to sync.".into());
    }
    if !engine.is_online() {
        let pending = engine.pending().await.len();
        engine.shutdown();
        return Ok(format!("Offline, {pending} changes are waiting to sync").into());
    }

    let source = engine.bootstrap().await;
    let drain = engine.drain().await;
    let pending = engine.pending().await.len();
    engine.shutdown();

    let loaded = match source {
        BootstrapSource::Remote { fetched, .. } => format!("Loaded {fetched} remote expenses"),
        BootstrapSource::Local => "Kept the local expenses".to_string(),
    };
    let synced = drain.map(|d| d.succeeded).unwrap_or_default();
    Ok(Out::new(
        format!("{loaded}, synced {synced} changes, {pending} still pending"),
        SyncReport {
            source,
            drain,
            pending,
        },
    ))
}

/// Lists the changes waiting to be synced, oldest first.
pub async fn status(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
) -> Result<Out<Vec<PendingOperation>>> {
    let engine = open_engine(&config, mode, options).await?;
    let pending = engine.pending().await;
    engine.shutdown();

    let mut message = format!("{} changes waiting to sync", pending.len());
    for op in &pending {
        let queued = DateTime::from_timestamp_millis(op.enqueued_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| op.enqueued_at.to_string());
        message.push_str(&format!(
            "\n  {:<6} {} queued {queued}, {} failed attempts",
            op.kind().to_string(),
            op.target_id(),
            op.attempts
        ));
    }
    Ok(Out::new(message, pending))
}
