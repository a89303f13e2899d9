//! Error types shared between the simulator and the watch client.
//!
//! `MarketError` unifies I/O, serialization, channel, store and pricing failures so
//! crates can propagate a single error type. `ConfigError` describes an invalid
//! `SimulationConfig`; it is fatal at startup and wrapped by `MarketError::Config`.
use std::io;
use std::sync::PoisonError;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::instrument::InstrumentId;

/// Unified error type shared by the simulator and the client.
#[derive(Error, Debug)]
pub enum MarketError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// The simulation configuration was rejected.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),

    /// A batch referenced an instrument the store does not know.
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(InstrumentId),

    /// The store refused to read or apply a batch.
    #[error("Instrument store error: {0}")]
    Store(String),

    /// The random sample or the configured bounds produced a non-finite change.
    #[error("Invalid price change for {symbol}: {change}")]
    InvalidChange {
        /// Symbol of the instrument being priced.
        symbol: String,
        /// The offending change ratio.
        change: f64,
    },

    /// Decimal arithmetic overflowed while computing the next price.
    #[error("Price overflow for {symbol} at {price}")]
    PriceOverflow {
        /// Symbol of the instrument being priced.
        symbol: String,
        /// Price the overflow started from.
        price: Decimal,
    },
}

impl<T> From<PoisonError<T>> for MarketError {
    fn from(err: PoisonError<T>) -> Self {
        MarketError::MutexLock(err.to_string())
    }
}

/// Reasons a `SimulationConfig` is rejected at load time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The update interval must lie between 1 ms and 24 h.
    #[error("intervalSeconds must be between 0.001 and 86400 seconds, got {0}")]
    InvalidInterval(f64),

    /// A change percentage is NaN or infinite.
    #[error("{field} must be a finite percentage, got {value}")]
    NonFinitePercent {
        /// Name of the offending key.
        field: &'static str,
        /// Value that was read.
        value: f64,
    },

    /// `minChangePercent` is greater than `maxChangePercent`.
    #[error("minChangePercent ({min}) must not exceed maxChangePercent ({max})")]
    InvertedBounds {
        /// Lower bound that was read.
        min: f64,
        /// Upper bound that was read.
        max: f64,
    },

    /// The floor price is below zero.
    #[error("floorPrice must be >= 0, got {0}")]
    NegativeFloor(Decimal),
}
