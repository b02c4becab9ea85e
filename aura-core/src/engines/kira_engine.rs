//! Playback engine backed by kira.
//!
//! Each engine decodes its asset into a `StaticSoundData` and plays it through
//! the shared kira `AudioManager`. Looping uses a loop region over the whole
//! sound. Every start spawns a monitor thread that fires the completion
//! callback once the sound stops on its own; a generation counter retires
//! monitors from earlier starts.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle};
use kira::sound::PlaybackState;
use kira::Tween;

use crate::engines::audio_output::{is_audio_available, volume_to_db, with_audio_manager};
use crate::engines::{CompletionCallback, EngineFactory, PlaybackEngine};
use crate::error::{Error, Result};
use crate::registry::SoundEntry;

/// How often a monitor thread polls its handle for natural completion.
const MONITOR_INTERVAL: Duration = Duration::from_millis(250);

/// A kira playback handle for one sound.
pub struct KiraEngine {
    name: String,
    data: Option<StaticSoundData>,
    handle: Arc<Mutex<Option<StaticSoundHandle>>>,
    looping: bool,
    /// Seconds to seek to on the next start.
    start_position: Option<f64>,
    volume: f32,
    on_completion: Option<CompletionCallback>,
    /// Incremented on every reset/start to invalidate running monitor threads.
    generation: Arc<AtomicU64>,
    released: bool,
}

impl KiraEngine {
    /// Creates an unprepared engine. `name` is used for logs and thread names.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: None,
            handle: Arc::new(Mutex::new(None)),
            looping: false,
            start_position: None,
            volume: 1.0,
            on_completion: None,
            generation: Arc::new(AtomicU64::new(0)),
            released: false,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(Error::EngineOperation(format!(
                "engine for {} has been released",
                self.name
            )));
        }
        Ok(())
    }

    fn lock_handle(&self) -> Result<std::sync::MutexGuard<'_, Option<StaticSoundHandle>>> {
        self.handle
            .lock()
            .map_err(|_| Error::EngineOperation("Failed to acquire handle lock".to_string()))
    }

    fn stop_handle(&self) {
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(mut active) = handle.take() {
                active.stop(Tween::default());
            }
        }
    }

    fn spawn_completion_monitor(&self) {
        let Some(callback) = self.on_completion.clone() else {
            return;
        };
        let handle = Arc::clone(&self.handle);
        let generation = Arc::clone(&self.generation);
        let start_generation = generation.load(Ordering::SeqCst);
        let name = self.name.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("loop-monitor-{}", self.name))
            .spawn(move || {
                completion_monitor_loop(&name, start_generation, &handle, &generation, callback);
            });
        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn completion monitor for {}: {}", self.name, e);
        }
    }
}

impl PlaybackEngine for KiraEngine {
    fn reset(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.stop_handle();
        self.data = None;
        self.start_position = None;
    }

    fn prepare(&mut self, path: &Path) -> Result<()> {
        self.ensure_live()?;
        let data = StaticSoundData::from_file(path).map_err(|e| {
            Error::EngineOperation(format!("Failed to load {}: {}", path.display(), e))
        })?;
        self.data = Some(data);
        tracing::debug!("Prepared {} from {}", self.name, path.display());
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn seek_to(&mut self, position_ms: u32) -> Result<()> {
        self.ensure_live()?;
        let seconds = position_ms as f64 / 1000.0;
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| Error::EngineOperation("Failed to acquire handle lock".to_string()))?;
        match handle.as_mut() {
            Some(active) => active.seek_to(seconds),
            None if self.data.is_some() => self.start_position = Some(seconds),
            None => {
                return Err(Error::EngineOperation(format!(
                    "seek on unprepared engine {}",
                    self.name
                )))
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.ensure_live()?;

        // Always a fresh handle; any previous one is stopped below.
        let data = self.data.clone().ok_or_else(|| {
            Error::EngineOperation(format!("start on unprepared engine {}", self.name))
        })?;
        let data = if self.looping {
            data.loop_region(..)
        } else {
            data
        };
        let data = data.volume(volume_to_db(self.volume));

        let mut active = with_audio_manager(|mgr| mgr.play(data))
            .ok_or(Error::NoAudioDevice)?
            .map_err(|e| Error::EngineOperation(format!("{:?}", e)))?;
        if let Some(seconds) = self.start_position.take() {
            active.seek_to(seconds);
        }

        self.stop_handle();
        {
            let mut handle = self.lock_handle()?;
            *handle = Some(active);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.spawn_completion_monitor();

        tracing::info!(
            "Started {} at volume {:.2} (looping: {})",
            self.name,
            self.volume,
            self.looping
        );
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.ensure_live()?;
        let mut handle = self.lock_handle()?;
        if let Some(active) = handle.as_mut() {
            active.pause(Tween::default());
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        match self.handle.lock() {
            Ok(handle) => handle.as_ref().map_or(false, |active| {
                matches!(active.state(), PlaybackState::Playing | PlaybackState::Resuming)
            }),
            Err(_) => false,
        }
    }

    fn position_ms(&self) -> u32 {
        let seconds = match self.handle.lock() {
            Ok(handle) => handle
                .as_ref()
                .map(|active| active.position())
                .or(self.start_position)
                .unwrap_or(0.0),
            Err(_) => 0.0,
        };
        (seconds.max(0.0) * 1000.0) as u32
    }

    fn set_volume(&mut self, left: f32, right: f32) {
        // kira mixes per sound, not per channel
        self.volume = ((left + right) / 2.0).clamp(0.0, 1.0);
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(active) = handle.as_mut() {
                active.set_volume(volume_to_db(self.volume), Tween::default());
            }
        }
        tracing::debug!("Set volume for {} to {:.2}", self.name, self.volume);
    }

    fn set_on_completion(&mut self, callback: CompletionCallback) {
        self.on_completion = Some(callback);
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.reset();
        self.on_completion = None;
        self.released = true;
        tracing::debug!("Released engine for {}", self.name);
    }
}

impl Drop for KiraEngine {
    fn drop(&mut self) {
        self.release();
    }
}

/// Polls a handle until it stops naturally, then fires the completion callback.
/// Exits early once the engine starts again, resets, or releases.
fn completion_monitor_loop(
    name: &str,
    start_generation: u64,
    handle: &Arc<Mutex<Option<StaticSoundHandle>>>,
    generation: &Arc<AtomicU64>,
    callback: CompletionCallback,
) {
    loop {
        std::thread::sleep(MONITOR_INTERVAL);

        if generation.load(Ordering::SeqCst) != start_generation {
            return;
        }

        let stopped = match handle.lock() {
            Ok(handle) => match handle.as_ref() {
                Some(active) => matches!(active.state(), PlaybackState::Stopped),
                None => return,
            },
            Err(_) => return,
        };

        if stopped {
            tracing::debug!("Playback of {} completed", name);
            callback();
            return;
        }
    }
}

/// Creates kira engines for bundled sounds.
pub struct KiraEngineFactory;

impl KiraEngineFactory {
    /// Creates a factory, failing when no audio device is available.
    pub fn new() -> Result<Self> {
        if !is_audio_available() {
            return Err(Error::NoAudioDevice);
        }
        Ok(Self)
    }
}

impl EngineFactory for KiraEngineFactory {
    fn create(&self, entry: &SoundEntry) -> Result<Box<dyn PlaybackEngine>> {
        let mut engine = KiraEngine::new(&entry.file_name);
        engine
            .prepare(&entry.path)
            .map_err(|e| Error::EngineAcquire(entry.file_name.clone(), e.to_string()))?;
        engine.set_looping(true);
        Ok(Box::new(engine))
    }

    fn name(&self) -> &'static str {
        "kira"
    }
}
