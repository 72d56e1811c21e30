//! Multi-asset fixing manager.
//!
//! Responsibilities:
//! - Merge independently arriving ask and bid ticks into paired prices per asset.
//! - Drive one `PriceDiscovery` per asset pair.
//! - At fixing time, turn every asset's projection into a `FixQuote`, reset
//!   the period state and publish the batch once.
//!
//! Concurrency:
//! - Each asset's last quotes and discovery state live behind one
//!   `parking_lot::Mutex`; ingest, finish and reset for an asset serialize on it.
//! - The asset map is only write-locked to insert a new asset.
//! - No lock is held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fixquotes_engine::{DiscoveryError, Price, PriceDiscovery, Projection};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::metrics::counters::Counters;
use crate::publish::FixQuotePublisher;
use crate::quotes::{FixQuote, Side, Tick};
use crate::time::years_between;
use common::logger::warn_if_slow;

/// Price discovery settings applied to every asset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineParams {
    pub threshold: f64,
    pub min_samples: u64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            threshold: 0.001,
            min_samples: fixquotes_engine::volatility::MIN_SAMPLES,
        }
    }
}

/// Fixing settings applied to every asset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixingParams {
    pub premium_pct: f64,
    pub dividend_yield: f64,
    /// Trade time relative to the fixing time.
    pub trade_offset: chrono::Duration,
}

impl Default for FixingParams {
    fn default() -> Self {
        Self {
            premium_pct: 0.0,
            dividend_yield: 0.0001,
            trade_offset: chrono::Duration::hours(1),
        }
    }
}

/// What a single tick did to its asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Older than or as old as the stored tick of the same side; ignored.
    Stale,
    /// Stored, but the other side is still unknown.
    Stored,
    /// Stored and fed to price discovery as a paired price.
    Paired,
}

/// An asset left out of a fixing and why.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedAsset {
    pub asset_pair: String,
    pub reason: DiscoveryError,
}

/// Outcome of one fixing or one on-demand query.
#[derive(Clone, Debug, PartialEq)]
pub struct FixingReport {
    pub fixing_time: DateTime<Utc>,
    pub trade_time: DateTime<Utc>,
    pub quotes: Vec<FixQuote>,
    pub skipped: Vec<SkippedAsset>,
    /// `None` for on-demand queries, which never publish.
    pub published: Option<bool>,
}

/// Read-only view of one asset, for inspection.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetSnapshot {
    pub asset_pair: String,
    pub last_ask: Option<f64>,
    pub last_bid: Option<f64>,
    pub observations: u64,
    pub directional_changes: u64,
}

#[derive(Clone, Copy, Debug)]
struct SideQuote {
    price: f64,
    ts: DateTime<Utc>,
}

/// Everything the manager keeps for one asset pair.
struct AssetSlot {
    last_ask: Option<SideQuote>,
    last_bid: Option<SideQuote>,
    discovery: PriceDiscovery,
}

impl AssetSlot {
    fn new(engine: EngineParams) -> Self {
        Self {
            last_ask: None,
            last_bid: None,
            discovery: PriceDiscovery::new(engine.threshold, engine.min_samples),
        }
    }
}

/// Publish calls slower than this are logged.
const SLOW_PUBLISH: Duration = Duration::from_secs(2);

pub struct FixingManager {
    assets: RwLock<HashMap<String, Arc<Mutex<AssetSlot>>>>,
    engine: EngineParams,
    params: FixingParams,
    publisher: Arc<dyn FixQuotePublisher>,
    counters: Counters,
}

impl FixingManager {
    pub fn new(
        engine: EngineParams,
        params: FixingParams,
        publisher: Arc<dyn FixQuotePublisher>,
        counters: Counters,
    ) -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
            engine,
            params,
            publisher,
            counters,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    fn slot(&self, asset_pair: &str) -> Arc<Mutex<AssetSlot>> {
        if let Some(slot) = self.assets.read().get(asset_pair) {
            return Arc::clone(slot);
        }

        let mut map = self.assets.write();
        let slot = map.entry(asset_pair.to_string()).or_insert_with(|| {
            debug!(asset_pair, "tracking new asset pair");
            Arc::new(Mutex::new(AssetSlot::new(self.engine)))
        });
        Arc::clone(slot)
    }

    /// Slots sorted by asset pair, so batches come out in a stable order.
    fn slots(&self) -> Vec<(String, Arc<Mutex<AssetSlot>>)> {
        let mut slots: Vec<_> = self
            .assets
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));
        slots
    }

    /// Applies one tick.
    ///
    /// Per side the newest timestamp wins; once both sides are known the pair
    /// is fed to price discovery with the later of the two timestamps.
    pub fn ingest(&self, tick: &Tick) -> IngestOutcome {
        Counters::incr(&self.counters.ticks_ingested);

        let slot = self.slot(&tick.asset_pair);
        let mut guard = slot.lock();
        let asset = &mut *guard;

        let stored = match tick.side {
            Side::Ask => &mut asset.last_ask,
            Side::Bid => &mut asset.last_bid,
        };
        if let Some(prev) = stored {
            if tick.timestamp <= prev.ts {
                Counters::incr(&self.counters.ticks_stale);
                trace!(
                    asset_pair = %tick.asset_pair,
                    side = ?tick.side,
                    tick_ts = %tick.timestamp,
                    stored_ts = %prev.ts,
                    "stale tick ignored"
                );
                return IngestOutcome::Stale;
            }
        }
        *stored = Some(SideQuote {
            price: tick.price,
            ts: tick.timestamp,
        });

        let (Some(ask), Some(bid)) = (asset.last_ask, asset.last_bid) else {
            return IngestOutcome::Stored;
        };

        let time = ask.ts.max(bid.ts);
        asset
            .discovery
            .run(Price::new(bid.price, ask.price, time.timestamp_millis()));
        Counters::incr(&self.counters.paired_updates);

        IngestOutcome::Paired
    }

    /// Scheduled fixing: quote every asset, reset all period state, publish once.
    ///
    /// A failed publish is logged and counted; the reset has already happened
    /// and the batch is not replayed.
    #[instrument(skip_all, target = "fixing", fields(fixing_time = %fixing_time))]
    pub async fn on_fixing_timer(&self, fixing_time: DateTime<Utc>) -> FixingReport {
        let trade_time = fixing_time + self.params.trade_offset;
        let mut report = self.finish_all(trade_time, fixing_time, true);

        Counters::incr(&self.counters.fixings);

        let result = warn_if_slow(
            "publish_fix_quotes",
            SLOW_PUBLISH,
            self.publisher.publish(&report.quotes),
        )
        .await;

        match result {
            Ok(()) => {
                report.published = Some(true);
                info!(
                    records = report.quotes.len(),
                    skipped = report.skipped.len(),
                    counters = ?self.counters.snapshot(),
                    "fixing published"
                );
            }
            Err(e) => {
                report.published = Some(false);
                Counters::incr(&self.counters.publish_failures);
                error!(
                    error = %format!("{e:#}"),
                    records = report.quotes.len(),
                    "publishing fix quotes failed; period state already reset"
                );
            }
        }

        report
    }

    /// On-demand fix prices for a trade at `trade_time`.
    ///
    /// Finishes every asset under its lock like the scheduled path, but keeps
    /// the accumulated state and publishes nothing.
    #[instrument(skip_all, target = "fixing", fields(trade_time = %trade_time, fixing_time = %fixing_time))]
    pub fn get_fix_prices(&self, trade_time: DateTime<Utc>, fixing_time: DateTime<Utc>) -> FixingReport {
        self.finish_all(trade_time, fixing_time, false)
    }

    fn finish_all(
        &self,
        trade_time: DateTime<Utc>,
        fixing_time: DateTime<Utc>,
        reset: bool,
    ) -> FixingReport {
        let years_to_maturity = years_between(fixing_time, trade_time);
        let mut quotes = Vec::new();
        let mut skipped = Vec::new();

        for (asset_pair, slot) in self.slots() {
            let outcome = {
                let mut asset = slot.lock();
                let outcome = asset
                    .discovery
                    .finish(self.params.dividend_yield, years_to_maturity);
                if reset {
                    asset.discovery.reset();
                }
                outcome
            };

            match outcome {
                Ok(projection) => {
                    let (ask, bid) = apply_premium(&projection, self.params.premium_pct);
                    debug!(
                        %asset_pair,
                        volatility = projection.volatility,
                        strike = projection.strike,
                        ask,
                        bid,
                        "asset quoted"
                    );
                    Counters::incr(&self.counters.assets_quoted);
                    quotes.push(FixQuote {
                        asset_pair,
                        fixing_time,
                        trade_time,
                        ask,
                        bid,
                    });
                }
                Err(reason) => {
                    Counters::incr(&self.counters.assets_skipped);
                    if reason.is_warming_up() {
                        info!(%asset_pair, %reason, "asset skipped");
                    } else {
                        warn!(%asset_pair, %reason, "asset skipped");
                    }
                    skipped.push(SkippedAsset { asset_pair, reason });
                }
            }
        }

        FixingReport {
            fixing_time,
            trade_time,
            quotes,
            skipped,
            published: None,
        }
    }

    pub fn tracked_assets(&self) -> Vec<String> {
        self.slots().into_iter().map(|(k, _)| k).collect()
    }

    pub fn snapshot(&self, asset_pair: &str) -> Option<AssetSnapshot> {
        let slot = self.assets.read().get(asset_pair).map(Arc::clone)?;
        let asset = slot.lock();
        let estimator = asset.discovery.estimator();

        Some(AssetSnapshot {
            asset_pair: asset_pair.to_string(),
            last_ask: asset.last_ask.map(|q| q.price),
            last_bid: asset.last_bid.map(|q| q.price),
            observations: estimator.observations(),
            directional_changes: estimator.directional_changes(),
        })
    }
}

/// Symmetric premium: added to the call strike, taken off the put strike.
pub fn apply_premium(projection: &Projection, premium_pct: f64) -> (f64, f64) {
    let ask = projection.call_strike * (1.0 + premium_pct / 100.0);
    let bid = projection.put_strike * (1.0 - premium_pct / 100.0);
    (ask, bid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::LogPublisher;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    struct Unreachable;

    #[async_trait]
    impl FixQuotePublisher for Unreachable {
        async fn publish(&self, _quotes: &[FixQuote]) -> anyhow::Result<()> {
            anyhow::bail!("broker unreachable")
        }
    }

    fn manager() -> FixingManager {
        FixingManager::new(
            EngineParams::default(),
            FixingParams::default(),
            Arc::new(LogPublisher),
            Counters::default(),
        )
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_496_300_000 + secs, 0).unwrap()
    }

    #[test]
    fn pairs_only_once_both_sides_are_known() {
        let m = manager();

        assert_eq!(m.ingest(&Tick::ask("EURCHF", 1.0862, t(0))), IngestOutcome::Stored);
        assert_eq!(m.ingest(&Tick::ask("EURCHF", 1.0863, t(1))), IngestOutcome::Stored);
        assert_eq!(m.ingest(&Tick::bid("EURCHF", 1.0861, t(2))), IngestOutcome::Paired);

        let snap = m.snapshot("EURCHF").unwrap();
        assert_eq!(snap.last_ask, Some(1.0863));
        assert_eq!(snap.last_bid, Some(1.0861));
        assert_eq!(snap.observations, 1);
    }

    #[test]
    fn last_timestamp_wins_per_side() {
        let m = manager();
        m.ingest(&Tick::ask("EURCHF", 1.0862, t(10)));
        m.ingest(&Tick::bid("EURCHF", 1.0861, t(10)));

        // older and equal timestamps on the ask side are dropped
        assert_eq!(m.ingest(&Tick::ask("EURCHF", 9.0, t(5))), IngestOutcome::Stale);
        assert_eq!(m.ingest(&Tick::ask("EURCHF", 9.0, t(10))), IngestOutcome::Stale);
        // the bid side keeps its own clock
        assert_eq!(m.ingest(&Tick::bid("EURCHF", 1.0860, t(11))), IngestOutcome::Paired);

        let snap = m.snapshot("EURCHF").unwrap();
        assert_eq!(snap.last_ask, Some(1.0862));
        assert_eq!(m.counters().snapshot().ticks_stale, 2);
    }

    #[test]
    fn premium_shifts_call_up_and_put_down() {
        let projection = Projection {
            call_strike: 1.08801276,
            put_strike: 1.08412712,
            volatility: 0.029297,
            strike: 1.08607,
            latest_price: Price::new(1.08602, 1.08612, 0),
        };

        for p in [0.0, 0.1, 0.5, 2.0] {
            let (ask, bid) = apply_premium(&projection, p);
            assert_eq!(ask, projection.call_strike * (1.0 + p / 100.0));
            assert_eq!(bid, projection.put_strike * (1.0 - p / 100.0));
        }
    }

    #[test]
    fn unseen_assets_have_no_snapshot() {
        let m = manager();
        assert!(m.snapshot("EURUSD").is_none());
        assert!(m.tracked_assets().is_empty());
    }

    #[test]
    fn on_demand_query_skips_warming_assets_without_reset() {
        let m = manager();
        m.ingest(&Tick::ask("EURCHF", 1.0862, t(0)));
        m.ingest(&Tick::bid("EURCHF", 1.0861, t(1)));

        let report = m.get_fix_prices(t(3600), t(0));

        assert!(report.quotes.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.is_warming_up());
        assert_eq!(report.published, None);
        assert_eq!(report.trade_time - report.fixing_time, ChronoDuration::hours(1));
        assert_eq!(m.snapshot("EURCHF").unwrap().observations, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn publish_failure_is_logged_with_cause() {
        let m = FixingManager::new(
            EngineParams::default(),
            FixingParams::default(),
            Arc::new(Unreachable),
            Counters::default(),
        );
        m.ingest(&Tick::ask("EURCHF", 1.0862, t(0)));

        let report = m.on_fixing_timer(t(3600)).await;

        assert_eq!(report.published, Some(false));
        assert!(logs_contain("publishing fix quotes failed"));
        assert!(logs_contain("broker unreachable"));
    }

    proptest! {
        #[test]
        fn newest_tick_per_side_wins_in_any_arrival_order(
            offsets in prop::collection::vec(0i64..500, 1..60),
        ) {
            let m = manager();
            for (i, secs) in offsets.iter().enumerate() {
                m.ingest(&Tick::ask("EURCHF", 1.0 + i as f64, t(*secs)));
            }

            // first arrival among the newest timestamps
            let newest = *offsets.iter().max().unwrap();
            let winner = offsets.iter().position(|s| *s == newest).unwrap();

            let snap = m.snapshot("EURCHF").unwrap();
            prop_assert_eq!(snap.last_ask, Some(1.0 + winner as f64));
            prop_assert_eq!(snap.last_bid, None);
            prop_assert_eq!(snap.observations, 0);
        }
    }
}
