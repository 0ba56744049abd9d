//! Fixed-interval polling loop.
//!
//! One loop per view: tick, run the fetch and reconcile to completion, wait
//! the interval, tick again. Ticks never overlap. A failed tick is logged and
//! retried at the next interval; it never ends the loop. Cancellation wakes
//! the wait immediately, so tearing a view down does not wait out a full
//! interval.

use crate::error::{DeskError, Result};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shortest interval a loop will wait between ticks.
pub const MIN_INTERVAL: Duration = Duration::from_millis(50);

/// Shared cancellation flag that can interrupt a sleeping loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(|poison| poison.into_inner()) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .0
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Sleep up to `timeout`. Returns true if cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut cancelled = flag.lock().unwrap_or_else(|poison| poison.into_inner());

        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            cancelled = match cvar.wait_timeout(cancelled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poison) => poison.into_inner().0,
            };
        }
        *cancelled
    }
}

pub struct PollLoop {
    interval: Duration,
    cancel: CancelToken,
}

impl PollLoop {
    /// A loop ticking every `interval`, floored at [`MIN_INTERVAL`].
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            cancel: CancelToken::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run on the current thread until cancelled. Returns the number of
    /// ticks run.
    pub fn run<F>(&self, mut tick: F) -> u64
    where
        F: FnMut() -> Result<()>,
    {
        let mut ticks = 0;
        while !self.cancel.is_cancelled() {
            ticks += 1;
            if let Err(e) = tick() {
                tracing::warn!(tick = ticks, "poll cycle failed: {}", e);
            }
            if self.cancel.wait(self.interval) {
                break;
            }
        }
        tracing::debug!(ticks, "poll loop stopped");
        ticks
    }

    /// Run on a background thread.
    pub fn spawn<F>(self, tick: F) -> Result<PollHandle>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let thread = thread::Builder::new()
            .name("claimdesk-poll".to_string())
            .spawn(move || self.run(tick))
            .map_err(|e| DeskError::UserError(format!("failed to start poll thread: {}", e)))?;
        Ok(PollHandle { cancel, thread })
    }
}

/// Handle to a loop running on its own thread.
pub struct PollHandle {
    cancel: CancelToken,
    thread: JoinHandle<u64>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to stop. Returns the number of ticks run.
    pub fn join(self) -> Result<u64> {
        self.thread
            .join()
            .map_err(|_| DeskError::UserError("poll thread panicked".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[test]
    fn test_interval_floor() {
        assert_eq!(PollLoop::new(Duration::from_millis(1)).interval(), MIN_INTERVAL);
        assert_eq!(
            PollLoop::new(Duration::from_secs(10)).interval(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_cancelled_before_start_runs_nothing() {
        let poll = PollLoop::new(MIN_INTERVAL);
        poll.cancel_token().cancel();

        let ticks = poll.run(|| panic!("tick after cancel"));
        assert_eq!(ticks, 0);
    }

    #[test]
    fn test_failed_ticks_do_not_stop_the_loop() {
        let poll = PollLoop::new(MIN_INTERVAL);
        let cancel = poll.cancel_token();
        let mut seen = 0;

        let ticks = poll.run(|| {
            seen += 1;
            if seen == 4 {
                cancel.cancel();
            }
            if seen < 3 {
                Err(DeskError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        });

        assert_eq!(ticks, 4);
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_ticks_never_overlap() {
        let poll = PollLoop::new(MIN_INTERVAL);
        let cancel = poll.cancel_token();
        let in_tick = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicU64::new(0));

        let handle = {
            let in_tick = Arc::clone(&in_tick);
            let count = Arc::clone(&count);
            poll.spawn(move || {
                assert!(!in_tick.swap(true, Ordering::SeqCst));
                thread::sleep(Duration::from_millis(5));
                in_tick.store(false, Ordering::SeqCst);
                if count.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    cancel.cancel();
                }
                Ok(())
            })
            .unwrap()
        };

        assert_eq!(handle.join().unwrap(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cancel_wakes_sleeping_loop() {
        let poll = PollLoop::new(Duration::from_secs(60));
        let handle = poll.spawn(|| Ok(())).unwrap();

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        handle.cancel();
        assert_eq!(handle.join().unwrap(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_times_out_without_cancel() {
        let token = CancelToken::new();
        assert!(!token.wait(Duration::from_millis(10)));
        token.cancel();
        assert!(token.wait(Duration::from_secs(60)));
    }
}
