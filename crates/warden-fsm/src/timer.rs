//! Cancellable countdown timer.
//!
//! A [`CountdownTimer`] counts down whole seconds on its own tokio task,
//! optionally calling a tick callback once per second, and calls its expiry
//! action exactly once when the full duration elapses.
//!
//! `stop` and expiry race through a single compare-and-set on the timer phase:
//! whichever moves the phase out of `Running` first wins. Once `stop` has
//! returned `true` the expiry action can no longer run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Per-second tick callback, given the number of whole seconds remaining.
pub type TickFn = Box<dyn FnMut(u64) + Send + 'static>;

/// Lifecycle phase of a [`CountdownTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimerPhase {
    /// Counting down.
    Running = 0,

    /// Stopped before expiry; the expiry action will never run.
    Stopped = 1,

    /// Expired; the expiry action has run or is running.
    Fired = 2,
}

impl TimerPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Stopped,
            _ => Self::Fired,
        }
    }
}

/// A countdown running on its own task.
///
/// Dropping the timer stops it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::time::Duration;
/// use warden_fsm::{CountdownTimer, TimerPhase};
///
/// #[tokio::main(flavor = "current_thread", start_paused = true)]
/// async fn main() {
///     let fired = Arc::new(AtomicBool::new(false));
///     let flag = Arc::clone(&fired);
///
///     let timer = CountdownTimer::start(Duration::from_secs(30), move || {
///         flag.store(true, Ordering::SeqCst);
///     });
///
///     tokio::time::sleep(Duration::from_secs(10)).await;
///     assert!(timer.stop());
///     assert_eq!(timer.phase(), TimerPhase::Stopped);
///
///     tokio::time::sleep(Duration::from_secs(60)).await;
///     assert!(!fired.load(Ordering::SeqCst));
/// }
/// ```
#[derive(Debug)]
pub struct CountdownTimer {
    phase: Arc<AtomicU8>,
    duration: Duration,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    /// Start a countdown on the current runtime that calls `on_expire` once
    /// `duration` has elapsed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<F>(duration: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn_on(&Handle::current(), duration, None, on_expire)
    }

    /// Start a countdown that also calls `on_tick` once per second.
    ///
    /// The tick at the very start of the countdown is skipped: the first call
    /// happens one second in, with `duration - 1` seconds remaining.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_ticks<T, F>(duration: Duration, on_tick: T, on_expire: F) -> Self
    where
        T: FnMut(u64) + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self::spawn_on(
            &Handle::current(),
            duration,
            Some(Box::new(on_tick)),
            on_expire,
        )
    }

    /// Start a countdown on `handle`.
    ///
    /// Used by callers that may run outside the runtime's worker threads (for
    /// example state actions executed by a synchronous dispatch).
    pub fn spawn_on<F>(
        handle: &Handle,
        duration: Duration,
        mut on_tick: Option<TickFn>,
        on_expire: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let phase = Arc::new(AtomicU8::new(TimerPhase::Running as u8));
        let task_phase = Arc::clone(&phase);

        let task = handle.spawn(async move {
            let whole_secs = duration.as_secs();
            let remainder = duration - Duration::from_secs(whole_secs);

            for remaining in (1..=whole_secs).rev() {
                if task_phase.load(Ordering::SeqCst) != TimerPhase::Running as u8 {
                    return;
                }
                if remaining < whole_secs {
                    if let Some(tick) = on_tick.as_mut() {
                        trace!(remaining, "Countdown tick");
                        tick(remaining);
                    }
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            if !remainder.is_zero() {
                tokio::time::sleep(remainder).await;
            }

            let fired = task_phase.compare_exchange(
                TimerPhase::Running as u8,
                TimerPhase::Fired as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            if fired.is_ok() {
                debug!(?duration, "Countdown expired");
                on_expire();
            }
        });

        debug!(?duration, "Countdown started");
        Self {
            phase,
            duration,
            task,
        }
    }

    /// Stop the countdown.
    ///
    /// Returns `true` if this call cancelled a running countdown. Stopping a
    /// timer that already fired or was already stopped is a no-op returning
    /// `false`.
    pub fn stop(&self) -> bool {
        let stopped = self
            .phase
            .compare_exchange(
                TimerPhase::Running as u8,
                TimerPhase::Stopped as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if stopped {
            self.task.abort();
            debug!(duration = ?self.duration, "Countdown stopped");
        }
        stopped
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> TimerPhase {
        TimerPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.phase() == TimerPhase::Running
    }

    /// Total countdown length.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_exactly_once_after_duration() {
        let (count, on_expire) = counter();
        let timer = CountdownTimer::start(Duration::from_secs(30), on_expire);

        tokio::time::sleep(Duration::from_millis(29_900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(timer.is_running());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(timer.phase(), TimerPhase::Fired);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_timer_never_fires() {
        let (count, on_expire) = counter();
        let timer = CountdownTimer::start(Duration::from_secs(30), on_expire);

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(timer.stop());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(timer.phase(), TimerPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (_count, on_expire) = counter();
        let timer = CountdownTimer::start(Duration::from_secs(5), on_expire);

        assert!(timer.stop());
        assert!(!timer.stop());
        assert!(!timer.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_fire_is_noop() {
        let (count, on_expire) = counter();
        let timer = CountdownTimer::start(Duration::from_secs(2), on_expire);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!timer.stop());
        assert_eq!(timer.phase(), TimerPhase::Fired);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let (count, on_expire) = counter();
        let timer = CountdownTimer::start(Duration::from_secs(5), on_expire);

        drop(timer);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_skipped() {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&ticks);
        let (count, on_expire) = counter();

        let _timer = CountdownTimer::with_ticks(
            Duration::from_secs(5),
            move |remaining| recorded.lock().unwrap().push(remaining),
            on_expire,
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(*ticks.lock().unwrap(), vec![4, 3, 2, 1]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_duration() {
        let (count, on_expire) = counter();
        let _timer = CountdownTimer::start(Duration::from_millis(250), on_expire);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_fires_immediately() {
        let (count, on_expire) = counter();
        let _timer = CountdownTimer::start(Duration::ZERO, on_expire);

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
