//! Volatility measured in intrinsic time.
//!
//! Each directional change contributes the squared deviation of its overshoot
//! length from the threshold. The square root of that sum is the total
//! volatility over the observed window, annualized by the ratio of a 365-day
//! year to the elapsed time between the first and last observation.

use crate::dcos::{DcOs, Mode, Moves, Thresholds};
use crate::error::VolatilityError;
use crate::price::Price;

/// Observations required before a volatility is reported.
pub const MIN_SAMPLES: u64 = 5;

/// A 365-day year in the unit of [`Price::time_ms`].
pub const MILLIS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0 * 1000.0;

/// Accumulates overshoot deviations for one asset over one fixing period.
#[derive(Clone, Debug)]
pub struct VolatilityEstimator {
    dcos: DcOs,
    min_samples: u64,

    sum_sq_deviation: f64,
    first_time_ms: Option<i64>,
    last_time_ms: i64,
    observations: u64,
    directional_changes: u64,
}

impl VolatilityEstimator {
    /// Relative-move estimator with symmetric thresholds, expecting a downward DC first.
    pub fn new(threshold: f64) -> Self {
        Self::with_detector(
            DcOs::new(Thresholds::symmetric(threshold), Mode::Down, Moves::Relative),
            MIN_SAMPLES,
        )
    }

    pub fn with_detector(dcos: DcOs, min_samples: u64) -> Self {
        Self {
            dcos,
            min_samples,
            sum_sq_deviation: 0.0,
            first_time_ms: None,
            last_time_ms: 0,
            observations: 0,
            directional_changes: 0,
        }
    }

    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Runs the detector on `price` and records the observation.
    pub fn run(&mut self, price: &Price) {
        let event = self.dcos.run(price);
        let sq_deviation = if event.is_directional_change() {
            self.directional_changes += 1;
            self.dcos.sqrt_os_deviation()
        } else {
            0.0
        };
        self.record(sq_deviation, price.time_ms);
    }

    /// Adds `sq_deviation` and advances the observation clock to `time_ms`.
    pub fn record(&mut self, sq_deviation: f64, time_ms: i64) {
        self.sum_sq_deviation += sq_deviation;
        if self.first_time_ms.is_none() {
            self.first_time_ms = Some(time_ms);
        }
        self.last_time_ms = time_ms;
        self.observations += 1;
    }

    /// Square root of the accumulated squared deviations, not annualized.
    pub fn total_volatility(&self) -> f64 {
        self.sum_sq_deviation.sqrt()
    }

    pub fn normalized_volatility(&self) -> Result<f64, VolatilityError> {
        if self.observations < self.min_samples {
            return Err(VolatilityError::InsufficientSamples {
                observed: self.observations,
                required: self.min_samples,
            });
        }

        let first = self.first_time_ms.unwrap_or(self.last_time_ms);
        let elapsed_ms = self.last_time_ms - first;
        if elapsed_ms <= 0 {
            return Err(VolatilityError::ZeroElapsedTime);
        }

        let coef = MILLIS_PER_YEAR / elapsed_ms as f64;
        Ok(self.total_volatility() * coef.sqrt())
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn directional_changes(&self) -> u64 {
        self.directional_changes
    }

    pub fn first_time_ms(&self) -> Option<i64> {
        self.first_time_ms
    }

    pub fn last_time_ms(&self) -> i64 {
        self.last_time_ms
    }
}
