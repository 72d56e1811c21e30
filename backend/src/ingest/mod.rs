//! Live tick ingestion.
//!
//! A pool of workers shares one bounded channel. Workers wait on the
//! readiness gate before taking the first tick, so ticks that arrive during
//! the startup replay stay queued in the channel.

pub mod feed;

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use crate::bootstrap::ReadinessGate;
use crate::fixing::manager::FixingManager;
use crate::history::TickHistory;
use crate::quotes::Tick;

/// Spawns `workers` tasks draining `rx` into `manager`.
///
/// When `history` is set every admitted tick is also appended to it.
/// Workers exit once the channel is closed and drained.
pub fn spawn_ingest_workers(
    workers: usize,
    rx: mpsc::Receiver<Tick>,
    manager: Arc<FixingManager>,
    gate: ReadinessGate,
    history: Option<Arc<dyn TickHistory>>,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));

    (0..workers.max(1))
        .map(|worker| {
            let rx = Arc::clone(&rx);
            let manager = Arc::clone(&manager);
            let gate = gate.clone();
            let history = history.clone();
            let span = tracing::info_span!("ingest_worker", worker);

            tokio::spawn(
                async move {
                    gate.wait().await;
                    debug!("ingest worker admitted");

                    loop {
                        // Hold the receiver lock only for the dequeue.
                        let next = { rx.lock().await.recv().await };
                        let Some(tick) = next else {
                            break;
                        };

                        manager.ingest(&tick);

                        if let Some(history) = &history {
                            if let Err(e) = history.append(&tick).await {
                                warn!(error = %format!("{e:#}"), asset_pair = %tick.asset_pair, "failed to record tick");
                            }
                        }
                    }

                    info!("ingest worker stopped");
                }
                .instrument(span),
            )
        })
        .collect()
}
