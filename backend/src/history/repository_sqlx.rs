use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};

use crate::history::TickHistory;
use crate::quotes::{Side, Tick};

/// SQLx-backed tick history.
/// Responsible only for persistence and row mapping.
pub struct SqlxTickHistory {
    pool: AnyPool,
}

impl SqlxTickHistory {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TickHistory for SqlxTickHistory {
    async fn query(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> anyhow::Result<Vec<Tick>> {
        let rows = sqlx::query(
            r#"
SELECT asset_pair, is_ask, price, ts_ms
FROM ticks
WHERE ts_ms >= ? AND ts_ms <= ?
ORDER BY ts_ms ASC;
"#,
        )
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_tick(&r) {
                Ok(t) => out.push(t),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the replay
                    tracing::warn!(error = %e, "skipping malformed tick row");
                }
            }
        }

        Ok(out)
    }

    async fn append(&self, tick: &Tick) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO ticks (asset_pair, is_ask, price, ts_ms)
VALUES (?, ?, ?, ?);
"#,
        )
        .bind(tick.asset_pair.as_str())
        .bind(i64::from(tick.is_ask()))
        .bind(tick.price)
        .bind(tick.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM ticks WHERE ts_ms < ?;"#)
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected())
    }
}

fn row_to_tick(r: &sqlx::any::AnyRow) -> anyhow::Result<Tick> {
    let asset_pair: String = r.try_get("asset_pair")?;
    let is_ask: i64 = r.try_get("is_ask")?;
    let price: f64 = r.try_get("price")?;
    let ts_ms: i64 = r.try_get("ts_ms")?;

    let timestamp = DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .with_context(|| format!("tick timestamp out of range: {ts_ms}"))?;

    Ok(Tick {
        asset_pair,
        side: if is_ask != 0 { Side::Ask } else { Side::Bid },
        price,
        timestamp,
    })
}
