//! Timer service abstraction.
//!
//! The resolver never sleeps. It hands each per-attempt timeout to a
//! [`TimerService`] and keeps the returned [`TimerHandle`] so the timeout
//! can be cancelled when a reply finishes the request first.
//!
//! - [`TokioTimer`]: real time, one tokio task per scheduled timer
//! - [`ManualTimer`](crate::ManualTimer): deterministic time for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::AbortHandle;

/// Callback run once when a timer fires.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Shared timer used for per-attempt timeouts.
///
/// ## Time Semantics
///
/// `now()` is monotonic and measured from an arbitrary origin. The resolver
/// only ever subtracts two readings from the same service.
pub trait TimerService: Send + Sync {
    /// Current time.
    fn now(&self) -> Duration;

    /// Run `task` once after `delay`, unless the returned handle is
    /// cancelled first.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Cancellable handle to a scheduled timer.
///
/// Cancelling is idempotent and is a no-op once the timer has fired.
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    /// Handle backed by a shared cancellation flag.
    ///
    /// The timer implementation must check the flag before running the task.
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            abort: None,
        }
    }

    /// Also abort `task` when cancelled.
    pub fn with_abort(mut self, task: AbortHandle) -> Self {
        self.abort = Some(task);
        self
    }

    /// Prevent the timer from firing.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Real timer backed by the tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    runtime: Handle,
    start_time: tokio::time::Instant,
}

impl TokioTimer {
    /// Timer spawning its tasks on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            start_time: tokio::time::Instant::now(),
        }
    }

    /// Timer bound to the runtime of the calling context.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl TimerService for TokioTimer {
    fn now(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });
        TimerHandle::new(cancelled).with_abort(join.abort_handle())
    }
}
