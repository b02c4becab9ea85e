//! Sleep timer: counts down once per second and fires an action at zero.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Preset durations offered to the user, in minutes.
pub const TIMER_PRESETS_MINUTES: [u32; 4] = [10, 30, 60, 180];

const TICK: Duration = Duration::from_secs(1);

/// A positive sleep-timer length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerDuration {
    minutes: u32,
}

impl TimerDuration {
    /// A user-entered duration. Zero is rejected.
    pub fn custom(minutes: u32) -> Result<Self> {
        if minutes == 0 {
            return Err(Error::InvalidTimer(
                "duration must be at least one minute".to_string(),
            ));
        }
        Ok(Self { minutes })
    }

    /// The built-in presets, shortest first.
    pub fn presets() -> Vec<TimerDuration> {
        TIMER_PRESETS_MINUTES
            .iter()
            .map(|&minutes| TimerDuration { minutes })
            .collect()
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> u32 {
        self.minutes.saturating_mul(60)
    }
}

impl fmt::Display for TimerDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.minutes)
    }
}

/// State of one countdown run. Each start gets a fresh one so a cancelled
/// task can never be revived by a later start.
struct Countdown {
    active: Arc<AtomicBool>,
    remaining: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

/// A single cancellable countdown.
pub struct SleepTimer {
    runtime: Handle,
    current: Option<Countdown>,
}

impl SleepTimer {
    /// Creates an idle timer that spawns its countdown on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            current: None,
        }
    }

    /// Starts a countdown, replacing any running one. `on_expire` runs once
    /// if the countdown reaches zero without being cancelled.
    pub fn start<F>(&mut self, duration: TimerDuration, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let active = Arc::new(AtomicBool::new(true));
        let remaining = Arc::new(AtomicU32::new(duration.seconds()));
        tracing::info!("Sleep timer set for {}", duration);

        let task = self.runtime.spawn(countdown(
            Arc::clone(&active),
            Arc::clone(&remaining),
            on_expire,
        ));

        self.current = Some(Countdown {
            active,
            remaining,
            task,
        });
    }

    /// Stops the countdown without running the expiry action.
    pub fn cancel(&mut self) {
        if let Some(countdown) = self.current.take() {
            if countdown.active.swap(false, Ordering::SeqCst) {
                tracing::info!("Sleep timer cancelled");
            }
            countdown.task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .map_or(false, |c| c.active.load(Ordering::SeqCst))
    }

    /// Seconds left, or `None` when no countdown is running.
    pub fn remaining(&self) -> Option<u32> {
        self.current
            .as_ref()
            .filter(|c| c.active.load(Ordering::SeqCst))
            .map(|c| c.remaining.load(Ordering::SeqCst))
    }
}

impl Drop for SleepTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn countdown<F>(active: Arc<AtomicBool>, remaining: Arc<AtomicU32>, on_expire: F)
where
    F: FnOnce() + Send + 'static,
{
    while active.load(Ordering::SeqCst) && remaining.load(Ordering::SeqCst) > 0 {
        tokio::time::sleep(TICK).await;
        remaining.fetch_sub(1, Ordering::SeqCst);
    }

    if active.swap(false, Ordering::SeqCst) {
        tracing::info!("Sleep timer finished");
        on_expire();
    }
}

/// Formats seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_remaining(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&fired);
        (fired, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_custom_rejects_zero() {
        assert!(matches!(TimerDuration::custom(0), Err(Error::InvalidTimer(_))));
        assert_eq!(TimerDuration::custom(45).unwrap().seconds(), 2700);
    }

    #[test]
    fn test_presets() {
        let minutes: Vec<u32> = TimerDuration::presets().iter().map(|d| d.minutes()).collect();
        assert_eq!(minutes, vec![10, 30, 60, 180]);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(599), "09:59");
        assert_eq!(format_remaining(600), "10:00");
        assert_eq!(format_remaining(10_800), "180:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_once() {
        let mut timer = SleepTimer::new(Handle::current());
        let (fired, on_expire) = counter();
        timer.start(TimerDuration::custom(10).unwrap(), on_expire);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(timer.is_active());
        assert!(timer.remaining().unwrap() <= 596);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_active());
        assert_eq!(timer.remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_never_fires() {
        let mut timer = SleepTimer::new(Handle::current());
        let (fired, on_expire) = counter();
        timer.start(TimerDuration::custom(1).unwrap(), on_expire);

        tokio::time::sleep(Duration::from_secs(30)).await;
        timer.cancel();
        assert!(!timer.is_active());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous() {
        let mut timer = SleepTimer::new(Handle::current());
        let (first, first_expire) = counter();
        let (second, second_expire) = counter();

        timer.start(TimerDuration::custom(1).unwrap(), first_expire);
        tokio::time::sleep(Duration::from_secs(10)).await;
        timer.start(TimerDuration::custom(2).unwrap(), second_expire);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
