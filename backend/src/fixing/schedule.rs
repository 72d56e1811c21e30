//! Daily fixing schedule.
//!
//! The fixing fires once a day at a fixed hour of the UTC day. If that hour
//! has already passed when the loop starts, the first fixing is tomorrow.
//! After every fixing the next one is 24h later, whatever the outcome of
//! the publish.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use common::logger::{TraceId, cycle_span};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, info, warn};

use crate::fixing::manager::FixingManager;
use crate::history::TickHistory;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixingSchedule {
    fixing_hour: u32,
}

impl FixingSchedule {
    /// `fixing_hour` is an offset from midnight UTC, 0..=24.
    pub fn new(fixing_hour: u32) -> Self {
        Self { fixing_hour }
    }

    pub fn fixing_hour(&self) -> u32 {
        self.fixing_hour
    }

    /// First fixing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(NaiveTime::MIN).and_utc()
            + Duration::hours(i64::from(self.fixing_hour));
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }

    /// Start of the accumulation period that the next fixing closes.
    pub fn period_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.next_after(now) - Duration::days(1)
    }
}

/// Time between two fixings.
pub const FIXING_PERIOD: std::time::Duration = std::time::Duration::from_secs(24 * 3600);

/// Fixings that start further than this from their scheduled instant are logged.
pub const DRIFT_TOLERANCE: Duration = Duration::seconds(30);

/// How far `actual` is from `scheduled`, if beyond [`DRIFT_TOLERANCE`].
pub fn schedule_drift(scheduled: DateTime<Utc>, actual: DateTime<Utc>) -> Option<Duration> {
    let drift = actual - scheduled;
    (drift.abs() > DRIFT_TOLERANCE).then_some(drift)
}

/// Runs fixings until `shutdown` flips to `true` or its sender is dropped.
///
/// The first fixing is aligned to the wall clock; later ones follow on a
/// monotonic 24h cadence. Shutdown is only observed while waiting, so a
/// fixing that has started always completes. After each fixing, ticks older
/// than the fixing instant are pruned from `history`.
pub async fn run_fixing_loop(
    manager: Arc<FixingManager>,
    schedule: FixingSchedule,
    history: Option<Arc<dyn TickHistory>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let now = Utc::now();
    let mut next = schedule.next_after(now);
    let first_wait = (next - now).to_std().unwrap_or_default();

    let mut ticker = tokio::time::interval_at(Instant::now() + first_wait, FIXING_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(next_fixing = %next, fixing_hour = schedule.fixing_hour(), "fixing loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        let started = Utc::now();
        if let Some(drift) = schedule_drift(next, started) {
            warn!(
                fixing_time = %next,
                started_at = %started,
                drift_secs = drift.num_seconds(),
                "fixing started off schedule"
            );
        }

        let trace_id = TraceId::new();
        manager
            .on_fixing_timer(next)
            .instrument(cycle_span("fixing", &trace_id))
            .await;

        if let Some(history) = &history {
            match history.prune_before(next).await {
                Ok(pruned) => info!(pruned, cutoff = %next, "tick history pruned"),
                Err(e) => warn!(error = %format!("{e:#}"), cutoff = %next, "tick history prune failed"),
            }
        }

        next += Duration::days(1);
        info!(next_fixing = %next, "next fixing scheduled");
    }

    info!("fixing loop stopped");
}
