//! Fixed-interval tick source.
//!
//! A schedule is one background thread. Its first tick fires immediately, later ticks
//! every `interval` measured from the first. The tick callback runs inline on that
//! thread, so ticks that come due while a cycle is still running are dropped rather
//! than queued, and no catch-up ticks are issued afterwards.
//!
//! A schedule ends when its handle is cancelled (or dropped) or when the callback
//! answers [`Tick::Halt`]. Periods below [`MIN_INTERVAL`] are raised to it; a next tick
//! beyond what `Instant` can represent never fires, and the schedule idles until
//! cancelled.
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError, bounded, select};
use log::{debug, warn};
use market_common::config::MIN_INTERVAL;

/// Callback verdict after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Keep ticking.
    Continue,
    /// End this schedule.
    Halt,
}

/// Owner's side of a running schedule.
#[derive(Debug)]
pub struct SchedulerHandle {
    generation: u64,
    cancel_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Generation number the schedule was spawned with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the schedule to stop before its next tick. Returns false if its thread
    /// was already gone.
    pub fn cancel(&self) -> bool {
        match self.cancel_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }

    /// Whether the schedule thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the schedule thread. Returns false if it panicked.
    pub fn join(self) -> bool {
        self.thread.join().is_ok()
    }
}

/// Spawn a schedule ticking every `interval`, first tick immediately.
pub fn spawn<F>(generation: u64, interval: Duration, mut on_tick: F) -> io::Result<SchedulerHandle>
where
    F: FnMut() -> Tick + Send + 'static,
{
    let (cancel_tx, cancel_rx) = bounded::<()>(1);
    let thread = thread::Builder::new()
        .name(format!("price-scheduler-{}", generation))
        .spawn(move || {
            let interval = interval.max(MIN_INTERVAL);
            debug!("Schedule {} started, interval {:?}", generation, interval);
            let mut next_tick = Some(Instant::now());
            let mut dropped: u64 = 0;
            while let Some(due) = next_tick {
                let wait = due.saturating_duration_since(Instant::now());
                select! {
                    recv(cancel_rx) -> _ => break,
                    default(wait) => {}
                }
                if on_tick() == Tick::Halt {
                    break;
                }
                next_tick = match next_after(due, interval, Instant::now()) {
                    Some((next, skipped)) => {
                        dropped += skipped;
                        Some(next)
                    }
                    None => {
                        warn!("Schedule {} has no representable next tick", generation);
                        let _ = cancel_rx.recv();
                        None
                    }
                };
            }
            if dropped > 0 {
                warn!("Schedule {} dropped {} overdue ticks", generation, dropped);
            }
            debug!("Schedule {} finished", generation);
        })?;
    Ok(SchedulerHandle {
        generation,
        cancel_tx,
        thread,
    })
}

/// First tick on the grid `due + k * interval` (k >= 1) that lies after `now`, and the
/// number of grid points skipped on the way. `None` when it overflows `Instant`.
fn next_after(due: Instant, interval: Duration, now: Instant) -> Option<(Instant, u64)> {
    let elapsed = now.saturating_duration_since(due).as_nanos();
    let skipped = u32::try_from(elapsed / interval.as_nanos().max(1)).ok()?;
    let offset = interval.checked_mul(skipped.checked_add(1)?)?;
    Some((due.checked_add(offset)?, u64::from(skipped)))
}
