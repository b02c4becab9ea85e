//! External collaborators signalled by the player store and sleep timer.
//!
//! Both are fire-and-forget: the caller logs failures and carries on, so a
//! missing notification never changes what is audible.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::registry::SoundId;

/// Keeps playback alive while the app is in the background.
pub trait ForegroundService: Send + Sync {
    /// Starts (or refreshes) the service with the currently playing sounds.
    fn start(&self, playing: &[SoundId]) -> Result<()>;

    /// Stops the service. Carries no payload.
    fn stop(&self) -> Result<()>;
}

/// Posts user-visible notifications.
pub trait Notifier: Send + Sync {
    /// The sleep timer ran out and playback was stopped.
    fn timer_ended(&self);
}

/// Service that does nothing, for headless embedding.
#[derive(Debug, Default)]
pub struct NoopService;

impl ForegroundService for NoopService {
    fn start(&self, _playing: &[SoundId]) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

impl Notifier for NoopService {
    fn timer_ended(&self) {}
}

/// A signal received by a [`RecordingService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSignal {
    Start(Vec<SoundId>),
    Stop,
    TimerEnded,
}

/// Records every signal it receives. Optionally fails `start` to exercise
/// the error path.
#[derive(Debug, Default, Clone)]
pub struct RecordingService {
    signals: Arc<Mutex<Vec<ServiceSignal>>>,
    fail_start: bool,
}

impl RecordingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service whose `start` always fails.
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    /// Returns all signals received so far, oldest first.
    pub fn signals(&self) -> Vec<ServiceSignal> {
        self.signals
            .lock()
            .map(|signals| signals.clone())
            .unwrap_or_default()
    }

    fn record(&self, signal: ServiceSignal) {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push(signal);
        }
    }
}

impl ForegroundService for RecordingService {
    fn start(&self, playing: &[SoundId]) -> Result<()> {
        self.record(ServiceSignal::Start(playing.to_vec()));
        if self.fail_start {
            return Err(crate::error::Error::ForegroundService(
                "not permitted to start in the foreground".to_string(),
            ));
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.record(ServiceSignal::Stop);
        Ok(())
    }
}

impl Notifier for RecordingService {
    fn timer_ended(&self) {
        self.record(ServiceSignal::TimerEnded);
    }
}
