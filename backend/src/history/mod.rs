pub mod repository_sqlx;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::quotes::Tick;

/// Source of past ticks for the startup replay.
#[async_trait]
pub trait TickHistory: Send + Sync {
    /// Ticks with `from <= timestamp <= to`, ascending by timestamp.
    async fn query(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Tick>>;

    /// Appends a live tick so a restart can replay it.
    async fn append(&self, tick: &Tick) -> Result<()>;

    /// Deletes ticks with `timestamp < cutoff`; returns how many were removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
