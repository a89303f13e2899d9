//!
//! Common types and utilities shared by the market simulator and its watch client.
//!
//! This crate aggregates:
//! - `error` — unified error type `MarketError` and configuration `ConfigError`.
//! - `result` — handy `Result<T, MarketError>` alias.
//! - `config` — `SimulationConfig`, loaded once at process start.
//! - `instrument` — instruments, broadcast snapshots and per-cycle `PriceUpdate` payloads.
//! - `command` — TCP subscription payloads exchanged between client and server.
//! - `net` — networking constants and small helpers.
#![warn(missing_docs)]
pub mod command;
pub mod config;
pub mod error;
pub mod instrument;
pub mod net;
pub mod result;

pub use command::Command;
pub use config::SimulationConfig;
pub use error::{ConfigError, MarketError};
pub use instrument::{Instrument, InstrumentId, InstrumentSnapshot, PriceUpdate};
pub use result::Result;
