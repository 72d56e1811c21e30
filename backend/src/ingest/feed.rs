//! Newline-delimited JSON quote feed.
//!
//! Each line is one `RawQuote`. Malformed or invalid lines are logged and
//! dropped; they never stop the feed.
//!
//! The reader runs on its own OS thread: a blocking read on stdin cannot be
//! cancelled, and parking it on the runtime's blocking pool would keep the
//! runtime from shutting down while the input is idle.

use std::io::BufRead;
use std::thread::JoinHandle;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::quotes::{RawQuote, Tick};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// Reads quotes from `reader` until EOF or until the receiving side closes.
///
/// Blocks the calling thread; must not be called from async context.
pub fn read_json_lines<R>(reader: R, tx: &mpsc::Sender<Tick>) -> Result<FeedStats>
where
    R: BufRead,
{
    let mut stats = FeedStats::default();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tick = match serde_json::from_str::<RawQuote>(line)
            .map_err(anyhow::Error::from)
            .and_then(|raw| Tick::try_from(raw).map_err(anyhow::Error::from))
        {
            Ok(tick) => tick,
            Err(e) => {
                stats.rejected += 1;
                warn!(error = %e, line, "rejected feed record");
                continue;
            }
        };

        if tx.blocking_send(tick).is_err() {
            warn!("tick channel closed; stopping feed");
            break;
        }
        stats.accepted += 1;
    }

    info!(accepted = stats.accepted, rejected = stats.rejected, "feed finished");
    Ok(stats)
}

/// Runs [`read_json_lines`] on a dedicated thread.
///
/// The thread is never joined on shutdown; it ends with the process, at EOF,
/// or on the next line after the channel closes.
pub fn spawn_feed<R>(reader: R, tx: mpsc::Sender<Tick>) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("quote-feed".into())
        .spawn(move || {
            if let Err(e) = read_json_lines(reader, &tx) {
                error!(error = %format!("{e:#}"), "quote feed failed");
            }
        })
}
