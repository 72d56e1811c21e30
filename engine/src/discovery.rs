use crate::american_option;
use crate::error::DiscoveryError;
use crate::price::Price;
use crate::volatility::VolatilityEstimator;

/// Result of [`PriceDiscovery::finish`] for one asset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub call_strike: f64,
    pub put_strike: f64,
    pub volatility: f64,
    /// Mid price the strikes were projected from.
    pub strike: f64,
    pub latest_price: Price,
}

/// Price discovery for one asset over one fixing period.
///
/// `run` for every paired price, `finish` at fixing time, then `reset`.
#[derive(Clone, Debug)]
pub struct PriceDiscovery {
    threshold: f64,
    min_samples: u64,
    estimator: VolatilityEstimator,
    latest_price: Option<Price>,
    latest_call_strike: f64,
    latest_put_strike: f64,
    latest_volatility: Option<f64>,
}

impl PriceDiscovery {
    /// `threshold` is the intrinsic-time threshold, 0.01 being 1%.
    pub fn new(threshold: f64, min_samples: u64) -> Self {
        Self {
            threshold,
            min_samples,
            estimator: VolatilityEstimator::new(threshold).with_min_samples(min_samples),
            latest_price: None,
            latest_call_strike: f64::NAN,
            latest_put_strike: f64::NAN,
            latest_volatility: None,
        }
    }

    pub fn run(&mut self, price: Price) {
        self.estimator.run(&price);
        self.latest_price = Some(price);
    }

    pub fn finish(
        &mut self,
        dividend: f64,
        years_to_maturity: f64,
    ) -> Result<Projection, DiscoveryError> {
        let volatility = self.estimator.normalized_volatility()?;
        let latest_price = self.latest_price.ok_or(DiscoveryError::NoPrice)?;
        let strike = latest_price.mid();

        let call_strike =
            american_option::price_call(volatility, dividend, strike, years_to_maturity);
        let put_strike =
            american_option::price_put(volatility, dividend, strike, years_to_maturity);

        if !call_strike.is_finite() || !put_strike.is_finite() {
            return Err(DiscoveryError::NonFiniteStrike {
                volatility,
                dividend,
                years_to_maturity,
            });
        }

        self.latest_volatility = Some(volatility);
        self.latest_call_strike = call_strike;
        self.latest_put_strike = put_strike;

        Ok(Projection {
            call_strike,
            put_strike,
            volatility,
            strike,
            latest_price,
        })
    }

    /// Drops all accumulated state; the next period starts empty.
    pub fn reset(&mut self) {
        self.estimator = VolatilityEstimator::new(self.threshold).with_min_samples(self.min_samples);
        self.latest_call_strike = f64::NAN;
        self.latest_put_strike = f64::NAN;
        self.latest_volatility = None;
        self.latest_price = None;
    }

    /// Call strike of the last successful finish, NaN if none since reset.
    pub fn latest_call_strike(&self) -> f64 {
        self.latest_call_strike
    }

    /// Put strike of the last successful finish, NaN if none since reset.
    pub fn latest_put_strike(&self) -> f64 {
        self.latest_put_strike
    }

    pub fn latest_volatility(&self) -> Option<f64> {
        self.latest_volatility
    }

    pub fn latest_price(&self) -> Option<Price> {
        self.latest_price
    }

    pub fn estimator(&self) -> &VolatilityEstimator {
        &self.estimator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VolatilityError;

    const MINUTE_MS: i64 = 60_000;
    const ONE_HOUR_IN_YEARS: f64 = 1.0 / 365.0 / 24.0;

    /// Oscillating EUR/CHF-like series with enough swing to trigger 0.1% DCs.
    fn series() -> Vec<Price> {
        let mids = [
            1.08600, 1.08650, 1.08720, 1.08800, 1.08690, 1.08580, 1.08450, 1.08520, 1.08610,
            1.08700, 1.08640, 1.08530, 1.08400, 1.08470, 1.08560, 1.08680, 1.08607,
        ];
        mids.iter()
            .enumerate()
            .map(|(i, m)| Price::new(m - 0.00005, m + 0.00005, i as i64 * MINUTE_MS))
            .collect()
    }

    fn discovered() -> PriceDiscovery {
        let mut pd = PriceDiscovery::new(0.001, 5);
        for p in series() {
            pd.run(p);
        }
        pd
    }

    #[test]
    fn finish_projects_symmetric_strikes_around_latest_mid() {
        let mut pd = discovered();
        let proj = pd.finish(0.0001, ONE_HOUR_IN_YEARS).unwrap();

        assert!(proj.volatility > 0.0 && proj.volatility.is_finite());
        assert!((proj.strike - 1.08607).abs() < 1e-12);
        assert!(proj.call_strike > proj.strike);
        assert!(proj.put_strike < proj.strike);
        assert!(((proj.call_strike - proj.strike) - (proj.strike - proj.put_strike)).abs() < 1e-12);

        let expected_call = american_option::price_call(
            proj.volatility,
            0.0001,
            proj.strike,
            ONE_HOUR_IN_YEARS,
        );
        assert_eq!(proj.call_strike, expected_call);
        assert_eq!(pd.latest_call_strike(), proj.call_strike);
        assert_eq!(pd.latest_volatility(), Some(proj.volatility));
    }

    #[test]
    fn volatility_follows_detector_events_on_a_fixed_series() {
        // (bid, ask) one minute apart; starts expecting a downward DC.
        let quotes = [
            (1.08600, 1.08610), // seed: extreme = dc = 1.08600
            (1.08700, 1.08710), // new high, ln(1.08700/1.08600) < 0.1%
            (1.08750, 1.08760), // OS up, reference = 1.08750
            (1.08580, 1.08590), // DC down on ask: overshoot ln(1.08750/1.08600)
            (1.08480, 1.08490), // new low, ln(1.08590/1.08490) < 0.1%
            (1.08440, 1.08450), // OS down, reference = 1.08450
            (1.08570, 1.08580), // DC up on bid: overshoot ln(1.08590/1.08450)
            (1.08600, 1.08610), // new high only
        ];

        let mut pd = PriceDiscovery::new(0.001, 5);
        for (i, (bid, ask)) in quotes.iter().enumerate() {
            pd.run(Price::new(*bid, *ask, i as i64 * MINUTE_MS));
        }

        let est = pd.estimator();
        assert_eq!(est.observations(), 8);
        assert_eq!(est.directional_changes(), 2);

        let first_os = (1.08750f64 / 1.08600).ln() - 0.001;
        let second_os = (1.08590f64 / 1.08450).ln() - 0.001;
        let total = (first_os.powi(2) + second_os.powi(2)).sqrt();
        let expected = total * (crate::volatility::MILLIS_PER_YEAR / (7 * MINUTE_MS) as f64).sqrt();

        let vol = est.normalized_volatility().unwrap();
        assert!((vol - expected).abs() < 1e-12, "vol={vol} expected={expected}");
        assert!((vol - 0.1310563583).abs() < 1e-9);

        let proj = pd.finish(0.0001, ONE_HOUR_IN_YEARS).unwrap();
        assert_eq!(proj.volatility, vol);
        assert!((proj.strike - 1.08605).abs() < 1e-12);
    }

    #[test]
    fn reset_then_finish_yields_no_strikes() {
        let mut pd = discovered();
        pd.finish(0.0001, ONE_HOUR_IN_YEARS).unwrap();
        pd.reset();

        let err = pd.finish(0.0001, ONE_HOUR_IN_YEARS).unwrap_err();
        assert_eq!(
            err,
            DiscoveryError::Volatility(VolatilityError::InsufficientSamples {
                observed: 0,
                required: 5
            })
        );
        assert!(err.is_warming_up());
        assert!(pd.latest_call_strike().is_nan());
        assert!(pd.latest_put_strike().is_nan());
        assert!(pd.latest_price().is_none());
    }

    #[test]
    fn replay_after_reset_is_deterministic() {
        let mut pd = discovered();
        let first = pd.finish(0.0001, ONE_HOUR_IN_YEARS).unwrap();

        pd.reset();
        for p in series() {
            pd.run(p);
        }
        let second = pd.finish(0.0001, ONE_HOUR_IN_YEARS).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn out_of_regime_maturity_is_rejected_not_nan() {
        let mut pd = discovered();
        let err = pd.finish(0.5, 1.0).unwrap_err();

        assert!(matches!(err, DiscoveryError::NonFiniteStrike { .. }));
        assert!(!err.is_warming_up());
        assert!(pd.latest_call_strike().is_nan());
    }
}
