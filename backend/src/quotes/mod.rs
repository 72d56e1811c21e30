use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QuoteValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Ask,
    Bid,
}

/// One validated price update for one side of an asset pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub asset_pair: String,
    pub side: Side,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn ask(asset_pair: impl Into<String>, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            asset_pair: asset_pair.into(),
            side: Side::Ask,
            price,
            timestamp,
        }
    }

    pub fn bid(asset_pair: impl Into<String>, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            asset_pair: asset_pair.into(),
            side: Side::Bid,
            price,
            timestamp,
        }
    }

    pub fn is_ask(&self) -> bool {
        self.side == Side::Ask
    }
}

/// Quote record as it arrives on the feed, before validation.
///
/// `isBuy` is accepted as an alias of `isAsk`: a buy quote is the ask side.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuote {
    pub asset_pair: String,
    #[serde(alias = "isBuy")]
    pub is_ask: bool,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<RawQuote> for Tick {
    type Error = QuoteValidationError;

    fn try_from(raw: RawQuote) -> Result<Self, Self::Error> {
        if raw.asset_pair.trim().is_empty() {
            return Err(QuoteValidationError::AssetPair(raw.asset_pair));
        }
        if !raw.price.is_finite() || raw.price <= 0.0 {
            return Err(QuoteValidationError::Price(raw.price));
        }
        if raw.timestamp == DateTime::<Utc>::MIN_UTC
            || raw.timestamp == DateTime::<Utc>::MAX_UTC
            || raw.timestamp.timestamp_millis() <= 0
        {
            return Err(QuoteValidationError::Timestamp(raw.timestamp.to_rfc3339()));
        }

        Ok(Tick {
            asset_pair: raw.asset_pair,
            side: if raw.is_ask { Side::Ask } else { Side::Bid },
            price: raw.price,
            timestamp: raw.timestamp,
        })
    }
}

/// Fix price for one asset pair, valid for a trade at `trade_time`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixQuote {
    pub asset_pair: String,
    /// When the price was calculated.
    pub fixing_time: DateTime<Utc>,
    /// When the trade can be done.
    pub trade_time: DateTime<Utc>,
    pub ask: f64,
    pub bid: f64,
}
