use thiserror::Error;

/// Reasons a normalized volatility cannot be produced.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum VolatilityError {
    #[error("not enough prices to calculate volatility: {observed} observed, {required} required")]
    InsufficientSamples { observed: u64, required: u64 },

    /// First and last observation share a timestamp; annualizing would divide by zero.
    #[error("observations span zero elapsed time")]
    ZeroElapsedTime,
}

/// Reasons a price projection cannot be produced for an asset.
///
/// Every variant is a per-asset condition: the asset is skipped, the fixing goes on.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum DiscoveryError {
    #[error(transparent)]
    Volatility(#[from] VolatilityError),

    #[error("no price observed since the last reset")]
    NoPrice,

    #[error("option formula produced a non-finite strike (vol={volatility}, q={dividend}, t={years_to_maturity})")]
    NonFiniteStrike {
        volatility: f64,
        dividend: f64,
        years_to_maturity: f64,
    },
}

impl DiscoveryError {
    /// True when the asset simply has not accumulated enough data yet.
    pub fn is_warming_up(&self) -> bool {
        matches!(
            self,
            DiscoveryError::NoPrice
                | DiscoveryError::Volatility(VolatilityError::InsufficientSamples { .. })
        )
    }
}
