//! Near-expiry American option strikes.
//!
//! Closed-form approximation from "American Options on Assets with Dividends
//! Near Expiry" (J. D. Evans et al., eq. 1.6). Valid for small times to
//! maturity; not a full Black-Scholes solve.

use std::f64::consts::PI;

/// Shared square-root term of the call and put formulas.
///
/// `sqrt(2 T ln(1 / (4 sqrt(pi) q T)))`. NaN when `4 sqrt(pi) q T >= 1`.
pub fn expiry_term(dividend: f64, years_to_maturity: f64) -> f64 {
    let t = years_to_maturity;
    (2.0 * t * (1.0 / (4.0 * PI.sqrt() * dividend * t)).ln()).sqrt()
}

pub fn price_call(volatility: f64, dividend: f64, strike: f64, years_to_maturity: f64) -> f64 {
    strike * (1.0 + volatility * expiry_term(dividend, years_to_maturity))
}

pub fn price_put(volatility: f64, dividend: f64, strike: f64, years_to_maturity: f64) -> f64 {
    strike * (1.0 - volatility * expiry_term(dividend, years_to_maturity))
}
