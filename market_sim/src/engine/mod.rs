//! Pricing: the bounded random walk and the sources of randomness feeding it.
pub mod price;
pub mod sampler;

pub use price::{BatchUpdate, InstrumentFailure, PriceUpdateEngine};
pub use sampler::{FixedSampler, PriceSampler, ThreadRngSampler};
