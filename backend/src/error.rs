use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("fixing hour must be within 0..=24, got {0}")]
    FixingHour(u32),

    #[error("trade offset must be at least one hour")]
    TradeOffset,

    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("premium percent must be within [0, 100), got {0}")]
    Premium(f64),

    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// Startup failures; any of these stops the service before it serves.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("historical backfill did not complete within {0:?}")]
    Timeout(Duration),

    #[error("historical backfill failed: {0:#}")]
    Backfill(anyhow::Error),
}

/// Reasons a raw feed record is rejected before reaching the fixing manager.
#[derive(Error, Debug, PartialEq)]
pub enum QuoteValidationError {
    #[error("invalid asset pair: '{0}'")]
    AssetPair(String),

    #[error("invalid price: {0}")]
    Price(f64),

    #[error("invalid timestamp range: {0}")]
    Timestamp(String),
}
