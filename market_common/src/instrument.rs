//! Instrument model and the broadcast payloads derived from it.
//!
//! An `Instrument` is owned by the store; the simulator only rewrites its price fields.
//! Every completed cycle produces one `PriceUpdate` holding an `InstrumentSnapshot` per
//! instrument processed in that cycle.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// Stable instrument identifier assigned by the store.
pub type InstrumentId = u32;

/// A simulated tradable asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    /// Unique, stable identifier.
    pub id: InstrumentId,
    /// Ticker symbol, e.g. `AAPL`.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Latest simulated price.
    pub current_price: Decimal,
    /// Price before the most recent update.
    pub previous_price: Decimal,
    /// Time of the most recent update.
    pub last_updated_at: DateTime<Utc>,
}

impl Instrument {
    /// Creates an instrument that has not moved yet (`previous == current`).
    pub fn new(
        id: InstrumentId,
        symbol: &str,
        name: &str,
        price: Decimal,
        listed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            symbol: String::from(symbol),
            name: String::from(name),
            current_price: price,
            previous_price: price,
            last_updated_at: listed_at,
        }
    }

    /// Captures the broadcast view of this instrument.
    pub fn snapshot(&self) -> InstrumentSnapshot {
        InstrumentSnapshot::from(self)
    }
}

/// Broadcast view of one instrument after a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSnapshot {
    /// Identifier of the instrument.
    pub id: InstrumentId,
    /// Ticker symbol.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Price written by the cycle.
    pub current_price: Decimal,
    /// Price the cycle started from.
    pub previous_price: Decimal,
    /// Timestamp written by the cycle.
    pub last_updated_at: DateTime<Utc>,
}

impl InstrumentSnapshot {
    /// Relative move of this cycle in percent, `None` when the previous price is zero.
    pub fn change_percent(&self) -> Option<Decimal> {
        if self.previous_price.is_zero() {
            return None;
        }
        let delta = self.current_price - self.previous_price;
        delta
            .checked_div(self.previous_price)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
    }
}

impl From<&Instrument> for InstrumentSnapshot {
    fn from(instrument: &Instrument) -> Self {
        Self {
            id: instrument.id,
            symbol: instrument.symbol.clone(),
            name: instrument.name.clone(),
            current_price: instrument.current_price,
            previous_price: instrument.previous_price,
            last_updated_at: instrument.last_updated_at,
        }
    }
}

/// One message per completed cycle, published on a named topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    /// Sequence number of the cycle that produced the update.
    pub cycle: u64,
    /// Instruments processed by the cycle, in store order.
    pub instruments: Vec<InstrumentSnapshot>,
}

impl PriceUpdate {
    /// Encode the update to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, MarketError> {
        let json = serde_json::to_vec(self)?;
        Ok(json)
    }
}
