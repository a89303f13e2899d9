//! One update cycle: read the instrument set, reprice it, write it back, publish.
//!
//! The four steps form a single logical unit. Callers serialize runs (see the cycle gate
//! in `control`), so there is never a second writer between the read and the write.
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, error, warn};
use market_common::{InstrumentSnapshot, PriceUpdate};

use crate::broadcast::Publisher;
use crate::engine::{PriceSampler, PriceUpdateEngine};
use crate::observer::{CycleObserver, CycleOutcome, CycleReport, CycleStats};
use crate::store::InstrumentStore;

/// Everything a cycle needs besides its random source.
pub struct CycleRunner {
    engine: PriceUpdateEngine,
    store: Arc<dyn InstrumentStore>,
    publisher: Arc<dyn Publisher>,
    topic: String,
    observers: Vec<Arc<dyn CycleObserver>>,
    stats: Mutex<CycleStats>,
}

impl CycleRunner {
    /// Wire a runner publishing on `topic`.
    pub fn new(
        engine: PriceUpdateEngine,
        store: Arc<dyn InstrumentStore>,
        publisher: Arc<dyn Publisher>,
        topic: &str,
        observers: Vec<Arc<dyn CycleObserver>>,
    ) -> Self {
        Self {
            engine,
            store,
            publisher,
            topic: String::from(topic),
            observers,
            stats: Mutex::new(CycleStats::default()),
        }
    }

    /// Topic updates are published on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Store the runner reads from and writes to.
    pub fn store(&self) -> &Arc<dyn InstrumentStore> {
        &self.store
    }

    /// Totals over all cycles run so far.
    pub fn stats(&self) -> CycleStats {
        match self.stats.lock() {
            Ok(stats) => *stats,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Run cycle number `cycle` and report it to every observer.
    pub fn run(&self, cycle: u64, generation: u64, sampler: &mut dyn PriceSampler) -> CycleReport {
        let started_at = Utc::now();
        let outcome = self.execute(cycle, sampler);
        let report = CycleReport {
            cycle,
            generation,
            started_at,
            finished_at: Utc::now(),
            outcome,
        };
        match self.stats.lock() {
            Ok(mut stats) => stats.record(&report),
            Err(poisoned) => poisoned.into_inner().record(&report),
        }
        for observer in &self.observers {
            observer.on_cycle(&report);
        }
        report
    }

    fn execute(&self, cycle: u64, sampler: &mut dyn PriceSampler) -> CycleOutcome {
        let snapshot = match self.store.list_all() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Cycle {}: failed to read instruments: {}", cycle, e);
                return CycleOutcome::ReadFailed(e.to_string());
            }
        };

        let batch = self.engine.update_all(&snapshot, sampler, Utc::now());
        for failure in &batch.failures {
            warn!(
                "Cycle {}: {} (id {}) kept its price: {}",
                cycle, failure.symbol, failure.id, failure.reason
            );
        }

        if let Err(e) = self.store.apply_batch(&batch.updated) {
            error!("Cycle {}: batch write failed, nothing published: {}", cycle, e);
            return CycleOutcome::WriteFailed {
                reason: e.to_string(),
                failures: batch.failures,
            };
        }

        let update = Arc::new(PriceUpdate {
            cycle,
            instruments: batch.updated.iter().map(InstrumentSnapshot::from).collect(),
        });
        let updated = batch.updated.len();
        match self.publisher.publish(&self.topic, update) {
            Ok(publish) => {
                debug!(
                    "Cycle {}: {} prices updated, delivered to {} subscribers ({} lagging)",
                    cycle, updated, publish.delivered, publish.dropped
                );
                CycleOutcome::Completed {
                    updated,
                    failures: batch.failures,
                    publish,
                }
            }
            Err(e) => {
                warn!("Cycle {}: prices written but publish failed: {}", cycle, e);
                CycleOutcome::PublishFailed {
                    updated,
                    failures: batch.failures,
                    reason: e.to_string(),
                }
            }
        }
    }
}
