use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};

use crate::publish::FixQuotePublisher;
use crate::quotes::FixQuote;

/// Keeps a copy of every published batch, one row per asset and fixing.
///
/// Re-publishing the same fixing replaces the earlier rows.
pub struct SqlxFixQuoteStore {
    pool: AnyPool,
}

impl SqlxFixQuoteStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// All quotes stored for one fixing, ordered by asset pair.
    pub async fn fetch_for_fixing(&self, fixing_time: DateTime<Utc>) -> anyhow::Result<Vec<FixQuote>> {
        let rows = sqlx::query(
            r#"
SELECT asset_pair, fixing_ms, trade_ms, ask, bid
FROM fix_quotes
WHERE fixing_ms = ?
ORDER BY asset_pair ASC;
"#,
        )
        .bind(fixing_time.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_fix_quote).collect()
    }
}

#[async_trait]
impl FixQuotePublisher for SqlxFixQuoteStore {
    async fn publish(&self, quotes: &[FixQuote]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for q in quotes {
            sqlx::query(
                r#"
INSERT INTO fix_quotes (asset_pair, fixing_ms, trade_ms, ask, bid)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (asset_pair, fixing_ms)
DO UPDATE SET trade_ms = excluded.trade_ms, ask = excluded.ask, bid = excluded.bid;
"#,
            )
            .bind(q.asset_pair.as_str())
            .bind(q.fixing_time.timestamp_millis())
            .bind(q.trade_time.timestamp_millis())
            .bind(q.ask)
            .bind(q.bid)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("store fix quote for {}", q.asset_pair))?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn row_to_fix_quote(r: &sqlx::any::AnyRow) -> anyhow::Result<FixQuote> {
    let fixing_ms: i64 = r.try_get("fixing_ms")?;
    let trade_ms: i64 = r.try_get("trade_ms")?;

    Ok(FixQuote {
        asset_pair: r.try_get("asset_pair")?,
        fixing_time: DateTime::<Utc>::from_timestamp_millis(fixing_ms)
            .context("fixing_ms out of range")?,
        trade_time: DateTime::<Utc>::from_timestamp_millis(trade_ms)
            .context("trade_ms out of range")?,
        ask: r.try_get("ask")?,
        bid: r.try_get("bid")?,
    })
}
