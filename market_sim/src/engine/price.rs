//! Bounded random walk applied to every instrument once per cycle.
//!
//! For each instrument the engine draws `r` in `[0, 1)`, maps it linearly onto
//! `[minChangePercent, maxChangePercent]`, applies the change, rounds to cents
//! (banker's rounding) and clamps to the floor price. Instruments are independent:
//! they are all priced from the same snapshot and a failure on one of them is
//! recorded without touching the others.
use chrono::{DateTime, TimeDelta, Utc};
use market_common::{Instrument, InstrumentId, MarketError, SimulationConfig};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::engine::sampler::PriceSampler;

/// Decimal places prices are rounded to.
const PRICE_SCALE: u32 = 2;

/// Pure pricing function parameterised by the simulation bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdateEngine {
    min_change_percent: f64,
    max_change_percent: f64,
    floor_price: Decimal,
}

/// An instrument that could not be repriced this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentFailure {
    /// Identifier of the skipped instrument.
    pub id: InstrumentId,
    /// Its symbol.
    pub symbol: String,
    /// Rendered error.
    pub reason: String,
}

/// Result of repricing a snapshot: what to write, and what was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchUpdate {
    /// Repriced instruments, in snapshot order, ready for one batch write.
    pub updated: Vec<Instrument>,
    /// Instruments left untouched because their update failed.
    pub failures: Vec<InstrumentFailure>,
}

impl PriceUpdateEngine {
    /// Builds an engine from the change bounds and floor of `config`.
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            min_change_percent: config.min_change_percent,
            max_change_percent: config.max_change_percent,
            floor_price: config.floor_price,
        }
    }

    /// Change ratio for sample `r`: `(r * (max - min) + min) / 100`.
    pub fn change_percent(&self, r: f64) -> f64 {
        let range = self.max_change_percent - self.min_change_percent;
        (r * range + self.min_change_percent) / 100.0
    }

    /// Next price of `current` for sample `r`, never below the floor.
    pub fn next_price(&self, symbol: &str, current: Decimal, r: f64) -> Result<Decimal, MarketError> {
        let change = self.change_percent(r);
        let change = Decimal::from_f64(change)
            .filter(|_| change.is_finite())
            .ok_or_else(|| MarketError::InvalidChange {
                symbol: String::from(symbol),
                change,
            })?;
        let raw = Decimal::ONE
            .checked_add(change)
            .and_then(|factor| current.checked_mul(factor))
            .ok_or_else(|| MarketError::PriceOverflow {
                symbol: String::from(symbol),
                price: current,
            })?;
        Ok(raw.round_dp(PRICE_SCALE).max(self.floor_price))
    }

    /// Reprice a single instrument, stamping it no earlier than `now`.
    ///
    /// The stamp is forced strictly past the previous one so that two updates landing on
    /// the same clock reading still order correctly.
    pub fn update(&self, instrument: &Instrument, r: f64, now: DateTime<Utc>) -> Result<Instrument, MarketError> {
        let next = self.next_price(&instrument.symbol, instrument.current_price, r)?;
        let stamp = if now > instrument.last_updated_at {
            now
        } else {
            instrument.last_updated_at + TimeDelta::microseconds(1)
        };
        Ok(Instrument {
            previous_price: instrument.current_price,
            current_price: next,
            last_updated_at: stamp,
            ..instrument.clone()
        })
    }

    /// Reprice every instrument of `snapshot`, one sample each.
    pub fn update_all(
        &self,
        snapshot: &[Instrument],
        sampler: &mut dyn PriceSampler,
        now: DateTime<Utc>,
    ) -> BatchUpdate {
        let mut batch = BatchUpdate {
            updated: Vec::with_capacity(snapshot.len()),
            failures: Vec::new(),
        };
        for instrument in snapshot {
            let r = sampler.sample();
            match self.update(instrument, r, now) {
                Ok(updated) => batch.updated.push(updated),
                Err(e) => batch.failures.push(InstrumentFailure {
                    id: instrument.id,
                    symbol: instrument.symbol.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sampler::{FixedSampler, ThreadRngSampler};
    use rust_decimal_macros::dec;

    fn engine(min: f64, max: f64) -> PriceUpdateEngine {
        PriceUpdateEngine::new(&SimulationConfig {
            min_change_percent: min,
            max_change_percent: max,
            floor_price: dec!(0.01),
            ..SimulationConfig::default()
        })
    }

    #[test]
    fn midpoint_sample_keeps_price() {
        let engine = engine(-5.0, 5.0);
        assert_eq!(engine.next_price("A", dec!(100.00), 0.5).unwrap(), dec!(100.00));
    }

    #[test]
    fn lower_bound_sample_drops_five_percent() {
        let engine = engine(-5.0, 5.0);
        assert_eq!(engine.next_price("A", dec!(100.00), 0.0).unwrap(), dec!(95.00));
    }

    #[test]
    fn upper_bound_sample_adds_five_percent() {
        let engine = engine(-5.0, 5.0);
        assert_eq!(engine.next_price("A", dec!(100.00), 1.0).unwrap(), dec!(105.00));
    }

    #[test]
    fn sub_floor_result_is_clamped() {
        let engine = engine(-90.0, 5.0);
        assert_eq!(engine.next_price("A", dec!(0.02), 0.0).unwrap(), dec!(0.01));
    }

    #[test]
    fn result_is_rounded_to_cents() {
        let engine = engine(-5.0, 5.0);
        // 33.33 * 1.01 = 33.6633
        let next = engine.next_price("A", dec!(33.33), 0.6).unwrap();
        assert_eq!(next, dec!(33.66));
        assert!(next.scale() <= 2);
    }

    #[test]
    fn non_finite_sample_is_an_error() {
        let engine = engine(-5.0, 5.0);
        let err = engine.next_price("NAN", dec!(1.00), f64::NAN).unwrap_err();
        assert!(matches!(err, MarketError::InvalidChange { .. }));
    }

    #[test]
    fn sampled_change_stays_within_bounds() {
        let engine = engine(-7.5, 3.25);
        let mut sampler = ThreadRngSampler;
        for _ in 0..100_000 {
            let change = engine.change_percent(sampler.sample());
            assert!(change >= -0.075 && change <= 0.0325, "change {change} escaped bounds");
        }
    }

    #[test]
    fn update_records_previous_price_and_advances_stamp() {
        let engine = engine(-5.0, 5.0);
        let listed = Utc::now();
        let instrument = Instrument::new(1, "AAPL", "Apple Inc.", dec!(100.00), listed);

        let updated = engine.update(&instrument, 0.0, listed).unwrap();

        assert_eq!(updated.previous_price, dec!(100.00));
        assert_eq!(updated.current_price, dec!(95.00));
        assert!(updated.last_updated_at > instrument.last_updated_at);
        assert_eq!(updated.symbol, "AAPL");
    }

    #[test]
    fn one_failure_does_not_abort_the_batch() {
        let engine = engine(-5.0, 5.0);
        let now = Utc::now();
        let snapshot = vec![
            Instrument::new(1, "A", "A", dec!(100.00), now),
            Instrument::new(2, "HUGE", "Overflow", Decimal::MAX, now),
            Instrument::new(3, "C", "C", dec!(50.00), now),
        ];
        let mut sampler = FixedSampler::new(vec![1.0]);

        let batch = engine.update_all(&snapshot, &mut sampler, now);

        assert_eq!(batch.updated.len(), 2);
        assert_eq!(batch.updated[0].current_price, dec!(105.00));
        assert_eq!(batch.updated[1].current_price, dec!(52.50));
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].id, 2);
    }

    #[test]
    fn every_updated_price_respects_the_floor() {
        let engine = engine(-60.0, 10.0);
        let now = Utc::now();
        let mut instruments: Vec<Instrument> = (1..=20)
            .map(|i| Instrument::new(i, "S", "S", Decimal::from(i), now))
            .collect();
        let mut sampler = ThreadRngSampler;

        for _ in 0..50 {
            let before: Vec<Decimal> = instruments.iter().map(|i| i.current_price).collect();
            let batch = engine.update_all(&instruments, &mut sampler, Utc::now());
            assert!(batch.failures.is_empty());
            for (updated, previous) in batch.updated.iter().zip(before) {
                assert!(updated.current_price >= dec!(0.01));
                assert_eq!(updated.previous_price, previous);
            }
            instruments = batch.updated;
        }
    }
}
