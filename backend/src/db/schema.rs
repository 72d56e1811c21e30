use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Tick history, replayed at startup
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS ticks (
  asset_pair TEXT NOT NULL,
  is_ask INTEGER NOT NULL CHECK (is_ask IN (0,1)),
  price REAL NOT NULL,
  ts_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Published fix quotes
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS fix_quotes (
  asset_pair TEXT NOT NULL,
  fixing_ms BIGINT NOT NULL,
  trade_ms BIGINT NOT NULL,
  ask REAL NOT NULL,
  bid REAL NOT NULL,
  PRIMARY KEY (asset_pair, fixing_ms)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_ticks_ts ON ticks(ts_ms);"#)
        .execute(pool)
        .await?;

    Ok(())
}
