//! Keepalive cadence and the cancellable poll job.
//!
//! # Two clocks (for beginners)
//!
//! The client looks at its emulators often (every 5 s by default) but only
//! pings the backend's keepalive endpoints rarely (every 14 s by default).
//! Two pieces implement this:
//!
//! - [`KeepaliveSchedule`] answers "is a keepalive due now?" and moves its
//!   deadline forward when it says yes.  With a 5 s tick and a 14 s cadence
//!   the ticks at 0, 15, 30 and 45 s are the ones that fire.
//! - [`PollJob`] runs a tick function on a fixed period in a spawned task
//!   until it is cancelled or dropped.
//!
//! Ticks of one job run sequentially inside a single task, so they can never
//! overlap.  A tick that runs past the next deadline makes the scheduler
//! skip the missed deadline instead of firing a burst afterwards.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Default period of the state poll.
pub const STATE_POLL_INTERVAL: Duration = Duration::from_millis(5_000);
/// Default minimum time between two keepalives.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(14_000);

// ── Keepalive schedule ────────────────────────────────────────────────────────

/// Gates keepalives to at most one per interval.
#[derive(Debug, Clone)]
pub struct KeepaliveSchedule {
    interval: Duration,
    next: Option<Instant>,
}

impl KeepaliveSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    /// Returns `true` if a keepalive is due at `now`.
    ///
    /// The first check is always due.  A due check moves the deadline to
    /// `now + interval`.
    pub fn check(&mut self, now: Instant) -> bool {
        match self.next {
            Some(deadline) if now <= deadline => false,
            _ => {
                self.next = Some(now + self.interval);
                true
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for KeepaliveSchedule {
    fn default() -> Self {
        Self::new(KEEPALIVE_INTERVAL)
    }
}

// ── Poll job ──────────────────────────────────────────────────────────────────

/// Handle to a recurring background task.
///
/// The first tick runs one period after spawning.  Cancelling (or dropping)
/// the handle stops the loop at its next await point; a tick that is
/// already running is allowed to finish.
#[derive(Debug)]
pub struct PollJob {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PollJob {
    /// Spawns `tick` to run every `period`.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => tick().await,
                    _ = cancelled.changed() => break,
                }
            }
            debug!("poll job stopped");
        });
        Self { cancel, handle }
    }

    /// Stops the job.
    pub fn cancel(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollJob {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_first_check_is_always_due() {
        let mut schedule = KeepaliveSchedule::default();
        assert!(schedule.check(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_fires_four_times_over_ten_ticks() {
        // Arrange
        let mut schedule = KeepaliveSchedule::new(Duration::from_secs(14));
        let start = Instant::now();

        // Act – ticks at 0, 5, ..., 45 s
        let fired: Vec<u64> = (0..10)
            .map(|i| i * 5)
            .filter(|&t| schedule.check(start + Duration::from_secs(t)))
            .collect();

        // Assert
        assert_eq!(fired, vec![0, 15, 30, 45]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_at_exact_deadline_is_not_due() {
        let mut schedule = KeepaliveSchedule::new(Duration::from_secs(10));
        let start = Instant::now();

        assert!(schedule.check(start));
        assert!(!schedule.check(start + Duration::from_secs(10)));
        assert!(schedule.check(start + Duration::from_millis(10_001)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_job_ticks_every_period() {
        // Arrange
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        // Act
        let job = PollJob::spawn(Duration::from_secs(5), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(15_500)).await;

        // Assert – ticks at 5, 10 and 15 s
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        job.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_poll_job_stops_ticking() {
        // Arrange
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let job = PollJob::spawn(Duration::from_secs(5), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(5_500)).await;

        // Act
        job.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;

        // Assert
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ticks_never_overlap() {
        // Arrange – each tick takes 12 s, longer than two periods
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::new(AtomicUsize::new(0));
        let (a, b, c) = (in_flight.clone(), max_in_flight.clone(), ticks.clone());
        let _job = PollJob::spawn(Duration::from_secs(5), move || {
            let (in_flight, max_in_flight, ticks) = (a.clone(), b.clone(), c.clone());
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(12)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        });

        // Act
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Assert – one tick at a time, and far fewer than one per period
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert!(ticks.load(Ordering::SeqCst) < 11);
    }
}
