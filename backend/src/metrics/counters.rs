use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub ticks_ingested: Arc<AtomicU64>,
    pub ticks_stale: Arc<AtomicU64>,
    pub paired_updates: Arc<AtomicU64>,

    pub fixings: Arc<AtomicU64>,
    pub assets_quoted: Arc<AtomicU64>,
    pub assets_skipped: Arc<AtomicU64>,
    pub publish_failures: Arc<AtomicU64>,
}

/// Point-in-time copy of [`Counters`], for logs and assertions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub ticks_ingested: u64,
    pub ticks_stale: u64,
    pub paired_updates: u64,
    pub fixings: u64,
    pub assets_quoted: u64,
    pub assets_skipped: u64,
    pub publish_failures: u64,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            ticks_ingested: self.ticks_ingested.load(Ordering::Relaxed),
            ticks_stale: self.ticks_stale.load(Ordering::Relaxed),
            paired_updates: self.paired_updates.load(Ordering::Relaxed),
            fixings: self.fixings.load(Ordering::Relaxed),
            assets_quoted: self.assets_quoted.load(Ordering::Relaxed),
            assets_skipped: self.assets_skipped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}
