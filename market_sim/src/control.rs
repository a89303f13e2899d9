//! Control state machine guarding the price schedule.
//!
//! `SimulationController` is the only way to start, stop or restart the simulation.
//! All transitions and the per-tick admission decision go through one mutex (the
//! control slot), which makes them linearizable:
//!
//! - `start` spawns a new schedule with a fresh generation number and flips the slot to
//!   `Running`. At most one schedule is ever current.
//! - `stop` cancels the current schedule and flips the slot to `Stopped`. A tick that
//!   checks the slot afterwards sees that its generation is no longer current and ends
//!   its schedule, so no new cycle starts once `stop` has returned. A cycle admitted
//!   before that runs to completion.
//! - `restart` performs both under a single lock acquisition.
//!
//! Cycles themselves are serialized by a second mutex, the cycle gate, which is taken
//! before admission. Around a restart the new schedule's first tick therefore waits for
//! an in-flight cycle of the old schedule to finish instead of interleaving with it.
//! Lock order is always gate, then slot.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{error, info, warn};
use market_common::{Instrument, MarketError, SimulationConfig};
use rust_decimal::Decimal;
use serde::Serialize;
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::broadcast::Publisher;
use crate::cycle::CycleRunner;
use crate::engine::{PriceSampler, PriceUpdateEngine, ThreadRngSampler};
use crate::observer::{CycleObserver, CycleStats};
use crate::scheduler::{self, SchedulerHandle, Tick};
use crate::store::InstrumentStore;

/// Process-wide simulation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    /// No schedule is active.
    Stopped,
    /// A schedule is active and admits cycles.
    Running,
}

/// Result of `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StartOutcome {
    /// A new schedule was started.
    Started,
    /// A schedule was already active; nothing changed.
    AlreadyRunning,
    /// The configuration disables the simulation; nothing changed.
    Disabled,
}

/// Result of `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StopOutcome {
    /// The active schedule was cancelled.
    Stopped,
    /// Nothing was running.
    AlreadyStopped,
}

/// Failures of a control operation. The control state is left consistent.
#[derive(Error, Debug)]
pub enum ControlError {
    /// The schedule thread could not be spawned; the state stays `Stopped`.
    #[error("failed to spawn the price schedule: {0}")]
    Spawn(#[source] std::io::Error),

    /// `restart()` was asked for while the configuration disables the simulation.
    #[error("simulation is disabled by configuration")]
    Disabled,

    /// The control slot lock was poisoned by a panicking holder.
    #[error("control state lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<PoisonError<T>> for ControlError {
    fn from(err: PoisonError<T>) -> Self {
        ControlError::LockPoisoned(err.to_string())
    }
}

/// Static configuration combined with the live running state and cycle totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatus {
    /// Configured seconds between ticks.
    pub interval_seconds: f64,
    /// Configured upper change bound, percent.
    pub max_change_percent: f64,
    /// Configured lower change bound, percent.
    pub min_change_percent: f64,
    /// Configured floor price.
    pub floor_price: Decimal,
    /// Static `enabled` flag from the configuration.
    pub enabled: bool,
    /// Whether a schedule is active right now.
    pub is_running: bool,
    /// Current state.
    pub state: ControlState,
    /// Topic updates are published on.
    pub topic: String,
    /// Totals over all cycles.
    #[serde(flatten)]
    pub stats: CycleStats,
}

struct ControlSlot {
    state: ControlState,
    generation: u64,
    active: Option<SchedulerHandle>,
    retired: Vec<SchedulerHandle>,
}

struct CycleGate {
    next_cycle: u64,
    sampler: Box<dyn PriceSampler>,
}

struct Inner {
    config: SimulationConfig,
    slot: Mutex<ControlSlot>,
    gate: Mutex<CycleGate>,
    runner: CycleRunner,
}

impl Inner {
    /// Admission decision taken at the top of every tick.
    fn admits(&self, generation: u64) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.state == ControlState::Running && slot.generation == generation,
            Err(e) => {
                error!("Control state unreadable, refusing tick: {}", e);
                false
            }
        }
    }

    fn tick(&self, generation: u64) -> Tick {
        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.admits(generation) {
            return Tick::Halt;
        }
        gate.next_cycle += 1;
        let cycle = gate.next_cycle;
        self.runner.run(cycle, generation, gate.sampler.as_mut());
        Tick::Continue
    }
}

/// Builder for [`SimulationController`].
pub struct SimulationBuilder {
    config: SimulationConfig,
    store: Arc<dyn InstrumentStore>,
    publisher: Arc<dyn Publisher>,
    topic: String,
    observers: Vec<Arc<dyn CycleObserver>>,
    sampler: Box<dyn PriceSampler>,
}

impl SimulationBuilder {
    /// Topic to publish updates on.
    pub fn topic(mut self, topic: &str) -> Self {
        self.topic = String::from(topic);
        self
    }

    /// Register an observer of cycle reports.
    pub fn observer(mut self, observer: Arc<dyn CycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Replace the random source.
    pub fn sampler(mut self, sampler: Box<dyn PriceSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Validate the configuration and build a stopped controller.
    pub fn build(self) -> Result<SimulationController, MarketError> {
        self.config.validate()?;
        let runner = CycleRunner::new(
            PriceUpdateEngine::new(&self.config),
            self.store,
            self.publisher,
            &self.topic,
            self.observers,
        );
        Ok(SimulationController {
            inner: Arc::new(Inner {
                config: self.config,
                slot: Mutex::new(ControlSlot {
                    state: ControlState::Stopped,
                    generation: 0,
                    active: None,
                    retired: Vec::new(),
                }),
                gate: Mutex::new(CycleGate {
                    next_cycle: 0,
                    sampler: self.sampler,
                }),
                runner,
            }),
        })
    }
}

/// Start/stop/restart surface of the simulation. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SimulationController {
    inner: Arc<Inner>,
}

impl SimulationController {
    /// Begin building a controller over `store`, publishing through `publisher`.
    pub fn builder(
        config: SimulationConfig,
        store: Arc<dyn InstrumentStore>,
        publisher: Arc<dyn Publisher>,
    ) -> SimulationBuilder {
        SimulationBuilder {
            config,
            store,
            publisher,
            topic: String::from(market_common::net::DEFAULT_TOPIC),
            observers: Vec::new(),
            sampler: Box::new(ThreadRngSampler),
        }
    }

    /// Configuration the controller was built with.
    pub fn config(&self) -> &SimulationConfig {
        &self.inner.config
    }

    /// Start ticking unless already running or disabled.
    pub fn start(&self) -> Result<StartOutcome, ControlError> {
        let mut slot = self.inner.slot.lock()?;
        self.start_locked(&mut slot)
    }

    /// Cancel future ticks. A cycle already admitted finishes on its own.
    pub fn stop(&self) -> Result<StopOutcome, ControlError> {
        let mut slot = self.inner.slot.lock()?;
        Ok(self.stop_locked(&mut slot))
    }

    /// Stop, then start, as one transition.
    pub fn restart(&self) -> Result<(), ControlError> {
        let mut slot = self.inner.slot.lock()?;
        if !self.inner.config.enabled {
            return Err(ControlError::Disabled);
        }
        self.stop_locked(&mut slot);
        match self.start_locked(&mut slot)? {
            StartOutcome::Started => {
                info!("Simulation restarted (schedule {})", slot.generation);
                Ok(())
            }
            StartOutcome::Disabled => Err(ControlError::Disabled),
            StartOutcome::AlreadyRunning => Ok(()),
        }
    }

    /// Whether a schedule is actually active.
    ///
    /// A schedule whose thread died without being stopped is noticed here and the state
    /// is moved back to `Stopped`.
    pub fn is_running(&self) -> bool {
        match self.inner.slot.lock() {
            Ok(mut slot) => {
                self.reconcile(&mut slot);
                slot.state == ControlState::Running
            }
            Err(e) => {
                error!("Control state unreadable: {}", e);
                false
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> ControlState {
        if self.is_running() {
            ControlState::Running
        } else {
            ControlState::Stopped
        }
    }

    /// Totals over all cycles run so far.
    pub fn stats(&self) -> CycleStats {
        self.inner.runner.stats()
    }

    /// Configuration plus live state.
    pub fn status(&self) -> SimulationStatus {
        let config = &self.inner.config;
        let is_running = self.is_running();
        SimulationStatus {
            interval_seconds: config.interval_seconds,
            max_change_percent: config.max_change_percent,
            min_change_percent: config.min_change_percent,
            floor_price: config.floor_price,
            enabled: config.enabled,
            is_running,
            state: if is_running {
                ControlState::Running
            } else {
                ControlState::Stopped
            },
            topic: String::from(self.inner.runner.topic()),
            stats: self.stats(),
        }
    }

    /// Current instrument prices as held by the store.
    pub fn current_prices(&self) -> Result<Vec<Instrument>, MarketError> {
        self.inner.runner.store().list_all()
    }

    /// Stop and wait for every schedule thread this controller spawned.
    pub fn shutdown(&self) -> Result<(), ControlError> {
        let handles = {
            let mut slot = self.inner.slot.lock()?;
            self.stop_locked(&mut slot);
            std::mem::take(&mut slot.retired)
        };
        // Joined outside the slot lock: a retiring tick may still need it to decide.
        for handle in handles {
            let generation = handle.generation();
            if !handle.join() {
                warn!("Schedule {} ended with a panic", generation);
            }
        }
        info!("Simulation shut down");
        Ok(())
    }

    fn start_locked(&self, slot: &mut MutexGuard<'_, ControlSlot>) -> Result<StartOutcome, ControlError> {
        self.reconcile(slot);
        if slot.state == ControlState::Running {
            return Ok(StartOutcome::AlreadyRunning);
        }
        let config = &self.inner.config;
        if !config.enabled {
            info!("Simulation is disabled by configuration; start ignored");
            return Ok(StartOutcome::Disabled);
        }

        let generation = slot.generation + 1;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = scheduler::spawn(generation, config.interval(), move || match weak.upgrade() {
            Some(inner) => inner.tick(generation),
            None => Tick::Halt,
        })
        .map_err(|e| {
            error!("Could not start the price schedule: {}", e);
            ControlError::Spawn(e)
        })?;

        slot.generation = generation;
        slot.state = ControlState::Running;
        slot.active = Some(handle);
        info!(
            "Price simulation started - interval: {}s, range: {}% to {}%",
            config.interval_seconds, config.min_change_percent, config.max_change_percent
        );
        Ok(StartOutcome::Started)
    }

    fn stop_locked(&self, slot: &mut MutexGuard<'_, ControlSlot>) -> StopOutcome {
        self.reconcile(slot);
        if slot.state == ControlState::Stopped {
            return StopOutcome::AlreadyStopped;
        }
        slot.state = ControlState::Stopped;
        if let Some(handle) = slot.active.take() {
            if !handle.cancel() {
                warn!("Schedule {} had already exited", handle.generation());
            }
            slot.retired.push(handle);
        }
        info!("Price simulation stopped");
        StopOutcome::Stopped
    }

    /// Drop finished retired schedules and notice a dead active one.
    fn reconcile(&self, slot: &mut MutexGuard<'_, ControlSlot>) {
        slot.retired.retain(|handle| !handle.is_finished());
        let dead = slot.active.as_ref().is_some_and(SchedulerHandle::is_finished);
        if dead {
            if let Some(handle) = slot.active.take() {
                error!("Schedule {} exited while running", handle.generation());
                slot.retired.push(handle);
            }
            slot.state = ControlState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use crate::store::InMemoryInstrumentStore;
    use chrono::Utc;

    fn controller(config: SimulationConfig) -> SimulationController {
        let store = Arc::new(InMemoryInstrumentStore::with_default_listing(Utc::now()));
        SimulationController::builder(config, store, Arc::new(BroadcastHub::default()))
            .build()
            .unwrap()
    }

    fn slow() -> SimulationConfig {
        SimulationConfig {
            interval_seconds: 60.0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn starts_stopped() {
        let controller = controller(slow());
        assert!(!controller.is_running());
        assert_eq!(controller.state(), ControlState::Stopped);
    }

    #[test]
    fn start_twice_reports_already_running() {
        let controller = controller(slow());
        assert_eq!(controller.start().unwrap(), StartOutcome::Started);
        assert_eq!(controller.start().unwrap(), StartOutcome::AlreadyRunning);
        assert!(controller.is_running());
        controller.shutdown().unwrap();
    }

    #[test]
    fn stop_when_stopped_is_a_no_op() {
        let controller = controller(slow());
        assert_eq!(controller.stop().unwrap(), StopOutcome::AlreadyStopped);
    }

    #[test]
    fn disabled_config_never_runs() {
        let controller = controller(SimulationConfig {
            enabled: false,
            ..slow()
        });
        assert_eq!(controller.start().unwrap(), StartOutcome::Disabled);
        assert!(!controller.is_running());
        assert!(matches!(controller.restart(), Err(ControlError::Disabled)));
        assert!(!controller.status().is_running);
        assert!(!controller.status().enabled);
    }

    #[test]
    fn status_reflects_live_state_not_the_enabled_flag() {
        let controller = controller(slow());
        let idle = controller.status();
        assert!(idle.enabled);
        assert!(!idle.is_running);

        controller.start().unwrap();
        assert!(controller.status().is_running);

        controller.stop().unwrap();
        let stopped = controller.status();
        assert!(stopped.enabled);
        assert!(!stopped.is_running);
        controller.shutdown().unwrap();
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let store = Arc::new(InMemoryInstrumentStore::default());
        let result = SimulationController::builder(
            SimulationConfig {
                interval_seconds: -1.0,
                ..SimulationConfig::default()
            },
            store,
            Arc::new(BroadcastHub::default()),
        )
        .build();
        assert!(matches!(result, Err(MarketError::Config(_))));
    }

    #[test]
    fn status_serializes_with_camel_case_keys() {
        let controller = controller(slow());
        let json = serde_json::to_string(&controller.status()).unwrap();
        assert!(json.contains("\"isRunning\":false"));
        assert!(json.contains("\"state\":\"stopped\""));
        assert!(json.contains("\"cyclesCompleted\":0"));
    }

    #[test]
    fn poisoned_control_slot_fails_every_transition_cleanly() {
        let controller = controller(slow());
        let holder = controller.clone();
        let poisoner = std::thread::spawn(move || {
            let _slot = holder.inner.slot.lock().unwrap();
            panic!("holder of the control slot died");
        });
        assert!(poisoner.join().is_err());

        assert!(matches!(controller.start(), Err(ControlError::LockPoisoned(_))));
        assert!(matches!(controller.stop(), Err(ControlError::LockPoisoned(_))));
        assert!(matches!(controller.restart(), Err(ControlError::LockPoisoned(_))));
        assert!(matches!(controller.shutdown(), Err(ControlError::LockPoisoned(_))));
        assert!(!controller.is_running());
        assert!(!controller.status().is_running);
        assert!(!controller.inner.admits(1));
    }

    #[test]
    fn control_errors_describe_their_cause() {
        let spawn = ControlError::Spawn(std::io::Error::other("no threads left"));
        assert_eq!(
            spawn.to_string(),
            "failed to spawn the price schedule: no threads left"
        );
        assert!(std::error::Error::source(&spawn).is_some());
        assert_eq!(
            ControlError::Disabled.to_string(),
            "simulation is disabled by configuration"
        );
    }

    #[test]
    fn state_names_round_trip_through_strum() {
        assert_eq!(ControlState::Running.to_string(), "running");
        assert_eq!("stopped".parse::<ControlState>().unwrap(), ControlState::Stopped);
        assert_eq!(StartOutcome::AlreadyRunning.to_string(), "already-running");
    }
}
