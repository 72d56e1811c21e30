use std::io::BufReader;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use common::logger::init_logger;
use fixquotes::{
    bootstrap::{ReadinessGate, bootstrap},
    config::AppConfig,
    db::Db,
    fixing::{manager::FixingManager, schedule::run_fixing_loop},
    history::{TickHistory, repository_sqlx::SqlxTickHistory},
    ingest::{feed::spawn_feed, spawn_ingest_workers},
    metrics::counters::Counters,
    publish::{FanoutPublisher, FixQuotePublisher, LogPublisher, store_sqlx::SqlxFixQuoteStore},
    quotes::Tick,
};
use tokio::sync::{mpsc, watch};

/// Connects, migrates and builds the persistence-backed collaborators.
async fn init_storage(
    cfg: &AppConfig,
) -> anyhow::Result<(Arc<dyn TickHistory>, Arc<dyn FixQuotePublisher>)> {
    let db = Db::connect(&cfg.database_url)
        .await
        .with_context(|| format!("connect {}", cfg.database_url))?;
    db.migrate().await.context("migrate schema")?;

    let history: Arc<dyn TickHistory> = Arc::new(SqlxTickHistory::new(db.pool.clone()));
    let publisher: Arc<dyn FixQuotePublisher> = Arc::new(FanoutPublisher::new(vec![
        Arc::new(SqlxFixQuoteStore::new(db.pool.clone())),
        Arc::new(LogPublisher),
    ]));

    Ok((history, publisher))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load()?;
    init_logger("fixquotes", cfg.log_format());

    tracing::info!(?cfg, "starting fix quotes service");

    let (history, publisher) = init_storage(&cfg).await?;
    let counters = Counters::default();
    let manager = Arc::new(FixingManager::new(
        cfg.engine_params(),
        cfg.fixing_params(),
        publisher,
        counters.clone(),
    ));
    let schedule = cfg.schedule();

    // Live ticks queue in the channel until the replay opens the gate.
    let gate = ReadinessGate::new();
    let (tick_tx, tick_rx) = mpsc::channel::<Tick>(cfg.ingest_queue_capacity);
    let workers = spawn_ingest_workers(
        cfg.ingest_workers,
        tick_rx,
        Arc::clone(&manager),
        gate.clone(),
        Some(Arc::clone(&history)),
    );

    // Not joined: an idle stdin read cannot be interrupted.
    spawn_feed(BufReader::new(std::io::stdin()), tick_tx).context("spawn quote feed")?;

    let now = Utc::now();
    let stats = bootstrap(
        history.as_ref(),
        &manager,
        &gate,
        schedule.period_start(now),
        now,
        cfg.backfill_timeout(),
    )
    .await
    .context("startup backfill")?;
    tracing::info!(?stats, assets = manager.tracked_assets().len(), "ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let fixing = tokio::spawn(run_fixing_loop(
        Arc::clone(&manager),
        schedule,
        Some(Arc::clone(&history)),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    shutdown_tx.send_replace(true);
    if let Err(e) = fixing.await {
        tracing::error!(error = %e, "fixing loop panicked");
    }

    // The feed may still hold the sender, so workers are stopped rather than drained.
    for worker in workers {
        worker.abort();
    }

    tracing::info!(counters = ?counters.snapshot(), "stopped");
    Ok(())
}
