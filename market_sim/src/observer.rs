//! Structured cycle results and the collaborators that consume them.
//!
//! Every cycle the scheduler admits ends in exactly one [`CycleReport`]. Reports are
//! handed to each registered [`CycleObserver`]; the controller also folds them into the
//! counters exposed by the status query.
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;

use crate::broadcast::PublishReport;
use crate::engine::InstrumentFailure;

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Prices were written and the update was published.
    Completed {
        /// Instruments repriced and written.
        updated: usize,
        /// Instruments skipped because their update failed.
        failures: Vec<InstrumentFailure>,
        /// Fan-out counters of the publish.
        publish: PublishReport,
    },
    /// The instrument set could not be read; nothing changed.
    ReadFailed(String),
    /// The batch write failed; nothing was published.
    WriteFailed {
        /// Store error.
        reason: String,
        /// Instruments skipped before the write was attempted.
        failures: Vec<InstrumentFailure>,
    },
    /// Prices were written but the publish failed.
    PublishFailed {
        /// Instruments repriced and written.
        updated: usize,
        /// Instruments skipped because their update failed.
        failures: Vec<InstrumentFailure>,
        /// Publisher error.
        reason: String,
    },
}

/// Result of one admitted cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Sequence number, strictly increasing across restarts.
    pub cycle: u64,
    /// Schedule generation that ran the cycle.
    pub generation: u64,
    /// When the cycle passed its liveness check.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
    /// What happened.
    pub outcome: CycleOutcome,
}

impl CycleReport {
    /// Prices of this cycle were durably applied.
    pub fn is_committed(&self) -> bool {
        matches!(
            self.outcome,
            CycleOutcome::Completed { .. } | CycleOutcome::PublishFailed { .. }
        )
    }

    /// Prices were applied and published.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Completed { .. })
    }

    /// Per-instrument failures recorded by the cycle.
    pub fn instrument_failures(&self) -> &[InstrumentFailure] {
        match &self.outcome {
            CycleOutcome::Completed { failures, .. }
            | CycleOutcome::WriteFailed { failures, .. }
            | CycleOutcome::PublishFailed { failures, .. } => failures,
            CycleOutcome::ReadFailed(_) => &[],
        }
    }
}

/// Receives the report of every cycle. Called on the scheduler thread.
pub trait CycleObserver: Send + Sync {
    /// Called once per admitted cycle.
    fn on_cycle(&self, report: &CycleReport);
}

/// Forwards reports into a channel.
pub struct ChannelObserver {
    tx: Sender<CycleReport>,
}

impl ChannelObserver {
    /// Creates the observer and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<CycleReport>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl CycleObserver for ChannelObserver {
    fn on_cycle(&self, report: &CycleReport) {
        // A dropped receiver only means nobody is watching anymore.
        let _ = self.tx.send(report.clone());
    }
}

/// Running totals over all cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    /// Cycles whose prices were applied.
    pub cycles_completed: u64,
    /// Cycles that failed to read or write.
    pub cycles_failed: u64,
    /// Cycles that applied prices but failed to publish.
    pub publish_failures: u64,
    /// Instruments skipped because their own update failed.
    pub instrument_failures: u64,
    /// End of the most recent cycle.
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl CycleStats {
    /// Fold one report into the totals.
    pub fn record(&mut self, report: &CycleReport) {
        if report.is_committed() {
            self.cycles_completed += 1;
        } else {
            self.cycles_failed += 1;
        }
        if matches!(report.outcome, CycleOutcome::PublishFailed { .. }) {
            self.publish_failures += 1;
        }
        self.instrument_failures += report.instrument_failures().len() as u64;
        self.last_cycle_at = Some(report.finished_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(cycle: u64, outcome: CycleOutcome) -> CycleReport {
        let now = Utc::now();
        CycleReport {
            cycle,
            generation: 1,
            started_at: now,
            finished_at: now,
            outcome,
        }
    }

    #[test]
    fn stats_separate_committed_and_failed_cycles() {
        let failure = InstrumentFailure {
            id: 4,
            symbol: "X".into(),
            reason: "overflow".into(),
        };
        let mut stats = CycleStats::default();
        stats.record(&report(
            1,
            CycleOutcome::Completed {
                updated: 3,
                failures: vec![failure.clone()],
                publish: PublishReport::default(),
            },
        ));
        stats.record(&report(2, CycleOutcome::ReadFailed("down".into())));
        stats.record(&report(
            3,
            CycleOutcome::PublishFailed {
                updated: 3,
                failures: Vec::new(),
                reason: "gone".into(),
            },
        ));

        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.cycles_failed, 1);
        assert_eq!(stats.publish_failures, 1);
        assert_eq!(stats.instrument_failures, 1);
        assert!(stats.last_cycle_at.is_some());
    }

    #[test]
    fn channel_observer_forwards_reports() {
        let (observer, rx) = ChannelObserver::new();
        observer.on_cycle(&report(9, CycleOutcome::ReadFailed("x".into())));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.cycle, 9);
        assert!(!received.is_committed());
    }
}
