use chrono::{DateTime, Utc};
use fixquotes_engine::volatility::MILLIS_PER_YEAR;

/// Signed span from `from` to `to` in 365-day years.
pub fn years_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_YEAR
}
