use std::time::Duration;

use clap::Parser;
use common::logger::LogFormat;

use crate::error::ConfigError;
use crate::fixing::manager::{EngineParams, FixingParams};
use crate::fixing::schedule::FixingSchedule;

#[derive(Clone, Debug, Parser)]
#[command(name = "fixquotes", version, about = "Intrinsic-time FIX quote service")]
pub struct AppConfig {
    /// Database connection string.
    ///
    /// Holds the tick history replayed at startup and the backup of every
    /// published fix quote batch.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://fixquotes.db?mode=rwc")]
    pub database_url: String,

    // =========================
    // Fixing schedule
    // =========================
    /// Hour of the UTC day (0-24) at which fix prices are computed and published.
    ///
    /// If the hour has already passed when the service starts, the first
    /// fixing happens tomorrow at that hour.
    #[arg(long, env = "FIXING_HOUR", default_value_t = 21)]
    pub fixing_hour: u32,

    /// Hours between the fixing time and the trade time the quote is valid for.
    ///
    /// Drives the time to maturity of the option approximation.
    #[arg(long, env = "TRADE_OFFSET_HOURS", default_value_t = 1)]
    pub trade_offset_hours: u32,

    /// Symmetric premium in percent added to the ask and taken off the bid.
    #[arg(long, env = "PREMIUM_PCT", default_value_t = 0.0)]
    pub premium_pct: f64,

    // =========================
    // Price discovery
    // =========================
    /// Directional change / overshoot threshold (0.001 = 0.1%).
    #[arg(long = "threshold", env = "DC_THRESHOLD", default_value_t = 0.001)]
    pub threshold: f64,

    /// Observations required before an asset gets a fix price.
    #[arg(long, env = "MIN_SAMPLES", default_value_t = 5)]
    pub min_samples: u64,

    /// Dividend yield used by the near-expiry option formula.
    #[arg(long, env = "DIVIDEND_YIELD", default_value_t = 0.0001)]
    pub dividend_yield: f64,

    // =========================
    // Startup
    // =========================
    /// Upper bound on the historical backfill query.
    ///
    /// Exceeding it is fatal: the service never serves from a partial baseline.
    #[arg(long, env = "BACKFILL_TIMEOUT_SECS", default_value_t = 30)]
    pub backfill_timeout_secs: u64,

    // =========================
    // Ingestion
    // =========================
    /// Number of parallel ingestion workers.
    #[arg(long, env = "INGEST_WORKERS", default_value_t = 4)]
    pub ingest_workers: usize,

    /// Capacity of the tick channel between the feed and the workers.
    ///
    /// Live ticks queue here while the backfill replays; a full queue
    /// backpressures the feed.
    #[arg(long = "ingest-queue", env = "INGEST_QUEUE", default_value_t = 4096)]
    pub ingest_queue_capacity: usize,

    /// Emit JSON logs instead of the pretty format.
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl AppConfig {
    /// Parses command line and environment, then validates.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Self::parse();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fixing_hour > 24 {
            return Err(ConfigError::FixingHour(self.fixing_hour));
        }
        if self.trade_offset_hours == 0 {
            return Err(ConfigError::TradeOffset);
        }
        if !(0.0..100.0).contains(&self.premium_pct) {
            return Err(ConfigError::Premium(self.premium_pct));
        }
        positive("threshold", self.threshold)?;
        positive("dividend yield", self.dividend_yield)?;
        if self.min_samples == 0 {
            return Err(ConfigError::Zero("min samples"));
        }
        if self.backfill_timeout_secs == 0 {
            return Err(ConfigError::Zero("backfill timeout"));
        }
        if self.ingest_workers == 0 {
            return Err(ConfigError::Zero("ingest workers"));
        }
        if self.ingest_queue_capacity == 0 {
            return Err(ConfigError::Zero("ingest queue"));
        }
        Ok(())
    }

    pub fn engine_params(&self) -> EngineParams {
        EngineParams {
            threshold: self.threshold,
            min_samples: self.min_samples,
        }
    }

    pub fn fixing_params(&self) -> FixingParams {
        FixingParams {
            premium_pct: self.premium_pct,
            dividend_yield: self.dividend_yield,
            trade_offset: chrono::Duration::hours(i64::from(self.trade_offset_hours)),
        }
    }

    pub fn schedule(&self) -> FixingSchedule {
        FixingSchedule::new(self.fixing_hour)
    }

    pub fn backfill_timeout(&self) -> Duration {
        Duration::from_secs(self.backfill_timeout_secs)
    }

    pub fn log_format(&self) -> LogFormat {
        let production = std::env::var("APP_ENV").unwrap_or_default() == "production";
        if self.json_logs || production {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}
