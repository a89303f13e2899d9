//! Live market price simulator.
//!
//! The crate wires together the building blocks of the simulation:
//!
//! - `engine` — `PriceUpdateEngine`, the bounded random walk, and its `PriceSampler`s.
//! - `store` — the `InstrumentStore` seam and an in-memory implementation.
//! - `broadcast` — the `Publisher` capability and the topic-based `BroadcastHub`.
//! - `cycle` — one read/reprice/write/publish cycle, reported as a `CycleReport`.
//! - `scheduler` — fixed-interval tick source with drop-on-overlap semantics.
//! - `control` — `SimulationController`, the start/stop/restart state machine.
//! - `observer` — structured cycle reports and their consumers.
//! - `net` — TCP subscription intake and UDP fan-out to remote watchers.
//! - `console` — operator commands read from stdin.
#![warn(missing_docs)]
pub mod broadcast;
pub mod console;
pub mod control;
pub mod cycle;
pub mod engine;
pub mod net;
pub mod observer;
pub mod scheduler;
pub mod store;

pub use broadcast::{BroadcastHub, Publisher, Subscription};
pub use control::{
    ControlError, ControlState, SimulationController, SimulationStatus, StartOutcome, StopOutcome,
};
pub use observer::{ChannelObserver, CycleObserver, CycleOutcome, CycleReport};
pub use store::{InMemoryInstrumentStore, InstrumentStore};
