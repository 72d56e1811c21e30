//! Startup replay of historical ticks.
//!
//! The current period's ticks are fetched from history and replayed through
//! `FixingManager::ingest` in ascending timestamp order before any live tick
//! is admitted. Live ingestion waits on a [`ReadinessGate`] that only opens
//! once the replay has finished; a failed or timed-out backfill leaves the
//! gate closed and is fatal.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::error::BootstrapError;
use crate::fixing::manager::{FixingManager, IngestOutcome};
use crate::history::TickHistory;

/// One-way latch: closed at construction, opened once, never closed again.
#[derive(Clone, Debug)]
pub struct ReadinessGate {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the gate is open.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub ticks: usize,
    pub paired: usize,
    pub stale: usize,
}

/// Fetches `[from, to]` from `history` within `timeout` and replays it.
#[instrument(skip_all, target = "bootstrap", fields(from = %from, to = %to))]
pub async fn replay_history<H>(
    history: &H,
    manager: &FixingManager,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    timeout: Duration,
) -> Result<ReplayStats, BootstrapError>
where
    H: TickHistory + ?Sized,
{
    let mut ticks = tokio::time::timeout(timeout, history.query(from, to))
        .await
        .map_err(|_| BootstrapError::Timeout(timeout))?
        .map_err(BootstrapError::Backfill)?;

    // Stable: equal timestamps keep the order history returned them in.
    ticks.sort_by_key(|t| t.timestamp);

    let mut stats = ReplayStats {
        ticks: ticks.len(),
        ..Default::default()
    };
    for tick in &ticks {
        match manager.ingest(tick) {
            IngestOutcome::Paired => stats.paired += 1,
            IngestOutcome::Stale => stats.stale += 1,
            IngestOutcome::Stored => {}
        }
    }

    info!(
        ticks = stats.ticks,
        paired = stats.paired,
        stale = stats.stale,
        "historical replay complete"
    );
    Ok(stats)
}

/// Replays history, drops ticks older than `from`, then opens `gate` for
/// live ingestion.
///
/// On a replay error the gate stays closed. A failed prune is only logged.
pub async fn bootstrap<H>(
    history: &H,
    manager: &FixingManager,
    gate: &ReadinessGate,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    timeout: Duration,
) -> Result<ReplayStats, BootstrapError>
where
    H: TickHistory + ?Sized,
{
    let stats = replay_history(history, manager, from, to, timeout).await?;

    match history.prune_before(from).await {
        Ok(pruned) => info!(pruned, cutoff = %from, "tick history pruned"),
        Err(e) => warn!(error = %format!("{e:#}"), cutoff = %from, "tick history prune failed"),
    }

    gate.open();
    info!("live ingestion admitted");
    Ok(stats)
}
