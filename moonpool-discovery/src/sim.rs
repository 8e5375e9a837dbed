//! Deterministic timer for tests and simulation.
//!
//! [`ManualTimer`] only moves when told to. Timers fire in deadline order
//! (ties in scheduling order), each at its exact deadline, so a test can
//! step a lookup through every timeout and quorum window without sleeping.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::timer::{TimerHandle, TimerService, TimerTask};

/// Manually driven [`TimerService`].
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use moonpool_discovery::{ManualTimer, TimerService};
///
/// let timer = ManualTimer::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
/// timer.schedule(Duration::from_millis(10), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// timer.advance(Duration::from_millis(9));
/// assert!(!fired.load(Ordering::SeqCst));
/// timer.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    /// Keyed by (deadline, scheduling sequence).
    armed: BTreeMap<(Duration, u64), Armed>,
}

struct Armed {
    cancelled: Arc<AtomicBool>,
    task: TimerTask,
}

impl ManualTimer {
    /// Timer starting at time zero with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `by`, firing every timer that falls due.
    ///
    /// Tasks run without the timer lock held and may schedule further
    /// timers; those fire too if their deadline is within the window.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;
        while let Some(armed) = self.pop_due(target) {
            if !armed.cancelled.load(Ordering::SeqCst) {
                (armed.task)();
            }
        }
        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
    }

    /// Jump to the next live deadline and fire it.
    ///
    /// Returns the time advanced, or `None` if nothing is armed.
    pub fn fire_next(&self) -> Option<Duration> {
        let start = self.now();
        loop {
            let armed = self.pop_due(Duration::MAX)?;
            if !armed.cancelled.load(Ordering::SeqCst) {
                let elapsed = self.now().saturating_sub(start);
                (armed.task)();
                return Some(elapsed);
            }
        }
    }

    /// Number of armed timers that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .armed
            .values()
            .filter(|armed| !armed.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Remove the earliest timer due at or before `limit`, moving the clock
    /// to its deadline.
    fn pop_due(&self, limit: Duration) -> Option<Armed> {
        let mut state = self.state.lock();
        let (&(deadline, seq), _) = state.armed.iter().next()?;
        if deadline > limit {
            return None;
        }
        let armed = state.armed.remove(&(deadline, seq))?;
        if deadline > state.now {
            state.now = deadline;
        }
        Some(armed)
    }
}

impl TimerService for ManualTimer {
    fn now(&self) -> Duration {
        self.state.lock().now
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let deadline = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.armed.insert(
            (deadline, seq),
            Armed {
                cancelled: cancelled.clone(),
                task,
            },
        );
        TimerHandle::new(cancelled)
    }
}
