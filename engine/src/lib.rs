//! Intrinsic-time pricing engine.
//!
//! Pure, synchronous building blocks used by the fixing service:
//! - [`dcos::DcOs`]: directional-change / overshoot detector
//! - [`volatility::VolatilityEstimator`]: annualized volatility from overshoot deviations
//! - [`american_option`]: near-expiry American option strike approximation
//! - [`discovery::PriceDiscovery`]: ties the above together for one asset pair
//!
//! Nothing in this crate is synchronized; callers own exclusion.

pub mod american_option;
pub mod dcos;
pub mod discovery;
pub mod error;
pub mod price;
pub mod volatility;

pub use dcos::{DcOs, Event, Mode, Moves};
pub use discovery::{PriceDiscovery, Projection};
pub use error::{DiscoveryError, VolatilityError};
pub use price::Price;
pub use volatility::VolatilityEstimator;
