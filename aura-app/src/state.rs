//! Application state for the shell.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aura_core::config::AppConfig;
use aura_core::engines::EngineFactory;
use aura_core::mixer::{Mixer, MixerStatus};
use aura_core::player::LifecycleEvent;
use aura_core::prefs::{PreferenceStore, Theme};
use aura_core::registry::{SoundGroup, SoundId};
use aura_core::service::{ForegroundService, Notifier};
use aura_core::strings::Language;
use aura_core::timer::{format_remaining, SleepTimer, TimerDuration};
use serde::Serialize;
use tokio::runtime::Runtime;

/// Thread-safe log buffer for capturing tracing output (shown by `log`).
pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

/// Text of the persistent status shown while sounds play.
pub const STATUS_TEXT: &str = "Playing nature sounds";

/// Stands in for the platform foreground service: keeps a persistent status
/// line while anything plays.
#[derive(Default)]
pub struct StatusLineService {
    playing: Mutex<Option<Vec<SoundId>>>,
}

impl StatusLineService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The persistent status, if the service is running.
    pub fn status_line(&self) -> Option<String> {
        let playing = self.playing.lock().ok()?;
        playing.as_ref().map(|_| STATUS_TEXT.to_string())
    }
}

impl ForegroundService for StatusLineService {
    fn start(&self, playing: &[SoundId]) -> aura_core::Result<()> {
        tracing::info!("{}: {:?}", STATUS_TEXT, playing);
        let mut current = self
            .playing
            .lock()
            .map_err(|_| aura_core::Error::StateLock)?;
        *current = Some(playing.to_vec());
        Ok(())
    }

    fn stop(&self) -> aura_core::Result<()> {
        let mut current = self
            .playing
            .lock()
            .map_err(|_| aura_core::Error::StateLock)?;
        if current.take().is_some() {
            tracing::info!("Status cleared");
        }
        Ok(())
    }
}

/// Posts notifications to the log.
#[derive(Default)]
pub struct LogNotifier {
    timer_endings: AtomicUsize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many "timer ended" notifications were posted.
    pub fn timer_endings(&self) -> usize {
        self.timer_endings.load(Ordering::SeqCst)
    }
}

impl Notifier for LogNotifier {
    fn timer_ended(&self) {
        self.timer_endings.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Timer ended. Sounds have been stopped.");
    }
}

/// One row of the `list` command.
#[derive(Debug, Clone, Serialize)]
pub struct SoundView {
    pub id: SoundId,
    pub label: String,
    pub playing: bool,
    pub volume: f32,
}

/// One section of the `groups` command.
#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub group: SoundGroup,
    pub title: String,
    pub sounds: Vec<SoundView>,
}

/// Everything the `status` command reports.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub mixer: MixerStatus,
    pub timer_remaining: Option<String>,
    pub status_line: Option<String>,
}

/// Application state: the mixer, its sleep timer and the runtime driving it.
pub struct AppState {
    mixer: Arc<Mixer>,
    timer: Mutex<SleepTimer>,
    service: Arc<StatusLineService>,
    notifier: Arc<LogNotifier>,
    log_buffer: LogBuffer,
    /// Drives the sleep timer. Dropped last.
    _runtime: Runtime,
}

impl AppState {
    /// Opens the mixer described by `config` with the default engine backend.
    pub fn new(config: AppConfig, log_buffer: LogBuffer) -> Result<Self, String> {
        let service = Arc::new(StatusLineService::new());
        let mixer = Mixer::open(config, Arc::clone(&service) as Arc<dyn ForegroundService>)
            .map_err(|e| e.to_string())?;
        Self::assemble(mixer, service, log_buffer)
    }

    /// Opens the mixer with explicit engine and preference backends.
    pub fn new_with(
        config: AppConfig,
        factory: &dyn EngineFactory,
        prefs: Arc<dyn PreferenceStore>,
        log_buffer: LogBuffer,
    ) -> Result<Self, String> {
        let service = Arc::new(StatusLineService::new());
        let mixer = Mixer::open_with(
            config,
            factory,
            prefs,
            Arc::clone(&service) as Arc<dyn ForegroundService>,
        )
        .map_err(|e| e.to_string())?;
        Self::assemble(mixer, service, log_buffer)
    }

    fn assemble(
        mixer: Mixer,
        service: Arc<StatusLineService>,
        log_buffer: LogBuffer,
    ) -> Result<Self, String> {
        let runtime =
            Runtime::new().map_err(|e| format!("Failed to create tokio runtime: {}", e))?;
        let timer = Mutex::new(SleepTimer::new(runtime.handle().clone()));
        Ok(Self {
            mixer: Arc::new(mixer),
            timer,
            service,
            notifier: Arc::new(LogNotifier::new()),
            log_buffer,
            _runtime: runtime,
        })
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn notifier(&self) -> &LogNotifier {
        &self.notifier
    }

    /// Returns the buffered log lines, oldest first.
    pub fn get_debug_log(&self) -> Vec<String> {
        let buf = self.log_buffer.lock().unwrap_or_else(|e| e.into_inner());
        buf.iter().cloned().collect()
    }

    pub fn clear_debug_log(&self) {
        let mut buf = self.log_buffer.lock().unwrap_or_else(|e| e.into_inner());
        buf.clear();
    }

    fn sound_views(&self) -> Result<Vec<SoundView>, String> {
        let status = self.mixer.store().status().map_err(|e| e.to_string())?;
        Ok(status
            .into_iter()
            .map(|channel| SoundView {
                id: channel.id,
                label: channel.label,
                playing: channel.playing,
                volume: channel.volume,
            })
            .collect())
    }

    /// Every registered sound, in id order.
    pub fn list_sounds(&self) -> Result<Vec<SoundView>, String> {
        self.sound_views()
    }

    /// Sounds grouped by name prefix, in display order.
    pub fn get_groups(&self) -> Result<Vec<GroupView>, String> {
        let views = self.sound_views()?;
        let strings = self.mixer.strings();
        Ok(self
            .mixer
            .groups()
            .into_iter()
            .map(|(group, entries)| GroupView {
                group,
                title: group.title(strings).to_string(),
                sounds: entries
                    .iter()
                    .filter_map(|entry| views.iter().find(|v| v.id == entry.id).cloned())
                    .collect(),
            })
            .collect())
    }

    pub fn toggle(&self, id: SoundId) -> Result<bool, String> {
        self.mixer.store().toggle(id).map_err(|e| e.to_string())
    }

    pub fn start(&self, id: SoundId) -> Result<bool, String> {
        self.mixer.store().start_one(id).map_err(|e| e.to_string())
    }

    pub fn pause(&self, id: SoundId) -> Result<(), String> {
        self.mixer.store().pause_one(id).map_err(|e| e.to_string())
    }

    pub fn stop(&self, id: SoundId) -> Result<(), String> {
        self.mixer.store().stop_one(id).map_err(|e| e.to_string())
    }

    pub fn stop_all(&self) -> Result<usize, String> {
        self.mixer.store().stop_all().map_err(|e| e.to_string())
    }

    pub fn resume(&self) -> Result<Vec<SoundId>, String> {
        self.mixer.store().resume().map_err(|e| e.to_string())
    }

    pub fn set_volume(&self, id: SoundId, volume: f32) -> Result<f32, String> {
        self.mixer
            .store()
            .set_volume(id, volume)
            .map_err(|e| e.to_string())
    }

    /// Starts (or restarts) the sleep timer. On expiry every sound stops and
    /// the "timer ended" notification is posted once.
    pub fn start_timer(&self, duration: TimerDuration) -> Result<(), String> {
        let mut timer = self
            .timer
            .lock()
            .map_err(|_| "Timer lock poisoned".to_string())?;
        let mixer = Arc::clone(&self.mixer);
        let notifier = Arc::clone(&self.notifier);
        timer.start(duration, move || mixer.on_timer_expired(notifier.as_ref()));
        Ok(())
    }

    pub fn cancel_timer(&self) -> Result<bool, String> {
        let mut timer = self
            .timer
            .lock()
            .map_err(|_| "Timer lock poisoned".to_string())?;
        let was_active = timer.is_active();
        timer.cancel();
        Ok(was_active)
    }

    /// Seconds left on the sleep timer, if one is running.
    pub fn timer_remaining(&self) -> Option<u32> {
        self.timer.lock().ok().and_then(|timer| timer.remaining())
    }

    /// Timer presets offered to the user, from the config.
    pub fn timer_presets(&self) -> Vec<u32> {
        self.mixer.config().timer_presets.clone()
    }

    pub fn set_play_in_background(&self, enabled: bool) -> Result<(), String> {
        self.mixer
            .store()
            .set_play_in_background(enabled)
            .map_err(|e| e.to_string())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), String> {
        self.mixer.set_theme(theme).map_err(|e| e.to_string())
    }

    pub fn set_language(&self, language: Language) -> Result<(), String> {
        self.mixer.set_language(language).map_err(|e| e.to_string())
    }

    pub fn get_status(&self) -> Result<StatusView, String> {
        Ok(StatusView {
            mixer: self.mixer.status().map_err(|e| e.to_string())?,
            timer_remaining: self.timer_remaining().map(format_remaining),
            status_line: self.service.status_line(),
        })
    }

    /// Forwards a lifecycle transition to the player store.
    pub fn lifecycle(&self, event: LifecycleEvent) -> Result<(), String> {
        if event == LifecycleEvent::Destroyed {
            self.cancel_timer()?;
        }
        self.mixer
            .store()
            .handle_event(event)
            .map_err(|e| e.to_string())
    }

    /// Saves state and releases every engine. Safe to call more than once.
    pub fn cleanup(&self) {
        if self.mixer.store().is_released() {
            return;
        }
        tracing::info!("Cleaning up...");
        if let Err(e) = self.lifecycle(LifecycleEvent::Destroyed) {
            tracing::error!("Cleanup failed: {}", e);
        }
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.cleanup();
    }
}
