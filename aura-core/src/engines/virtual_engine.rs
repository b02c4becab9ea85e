//! Silent playback engine.
//!
//! Keeps the full state of a real engine (prepared source, looping, position,
//! volume) without producing audio. Used when no output device exists and by
//! tests, which drive it through a [`VirtualEngineProbe`]: inspect calls,
//! move the playhead, inject failures, and fire natural completion.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::engines::{CompletionCallback, EngineFactory, PlaybackEngine};
use crate::error::{Error, Result};
use crate::registry::{SoundEntry, SoundId};

#[derive(Debug, Default)]
struct VirtualState {
    source: Option<PathBuf>,
    looping: bool,
    playing: bool,
    /// Position at the last start/pause/seek.
    base_position_ms: u32,
    started_at: Option<Instant>,
    volume: (f32, f32),
    start_count: u32,
    pause_count: u32,
    release_count: u32,
    released: bool,
    fail_prepare: bool,
    fail_start: bool,
}

impl VirtualState {
    fn position_ms(&self) -> u32 {
        let elapsed = self
            .started_at
            .map_or(0, |at| at.elapsed().as_millis().min(u32::MAX as u128) as u32);
        self.base_position_ms.saturating_add(elapsed)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(Error::EngineOperation("engine has been released".to_string()));
        }
        Ok(())
    }
}

type SharedState = Arc<Mutex<VirtualState>>;
type CallbackSlot = Arc<Mutex<Option<CompletionCallback>>>;

fn lock(state: &SharedState) -> MutexGuard<'_, VirtualState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// A playback engine that tracks state without producing audio.
pub struct VirtualEngine {
    state: SharedState,
    on_completion: CallbackSlot,
}

impl VirtualEngine {
    /// Creates an engine and the probe observing it.
    pub fn new() -> (Self, VirtualEngineProbe) {
        let state = SharedState::default();
        let on_completion = CallbackSlot::default();
        let probe = VirtualEngineProbe {
            state: Arc::clone(&state),
            on_completion: Arc::clone(&on_completion),
        };
        (
            Self {
                state,
                on_completion,
            },
            probe,
        )
    }
}

impl PlaybackEngine for VirtualEngine {
    fn reset(&mut self) {
        let mut state = lock(&self.state);
        state.source = None;
        state.playing = false;
        state.started_at = None;
        state.base_position_ms = 0;
    }

    fn prepare(&mut self, path: &Path) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_live()?;
        if state.fail_prepare {
            return Err(Error::EngineOperation(format!(
                "prepare failed for {}",
                path.display()
            )));
        }
        state.source = Some(path.to_path_buf());
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) {
        lock(&self.state).looping = looping;
    }

    fn seek_to(&mut self, position_ms: u32) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_live()?;
        if state.source.is_none() {
            return Err(Error::EngineOperation("seek on unprepared engine".to_string()));
        }
        state.base_position_ms = position_ms;
        if state.playing {
            state.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_live()?;
        if state.source.is_none() {
            return Err(Error::EngineOperation("start on unprepared engine".to_string()));
        }
        if state.fail_start {
            return Err(Error::EngineOperation("start failed".to_string()));
        }
        if !state.playing {
            state.playing = true;
            state.started_at = Some(Instant::now());
        }
        state.start_count += 1;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_live()?;
        if state.playing {
            state.base_position_ms = state.position_ms();
            state.started_at = None;
            state.playing = false;
        }
        state.pause_count += 1;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    fn position_ms(&self) -> u32 {
        lock(&self.state).position_ms()
    }

    fn set_volume(&mut self, left: f32, right: f32) {
        lock(&self.state).volume = (left.clamp(0.0, 1.0), right.clamp(0.0, 1.0));
    }

    fn set_on_completion(&mut self, callback: CompletionCallback) {
        if let Ok(mut slot) = self.on_completion.lock() {
            *slot = Some(callback);
        }
    }

    fn release(&mut self) {
        let mut state = lock(&self.state);
        state.release_count += 1;
        state.released = true;
        state.playing = false;
        state.started_at = None;
    }
}

/// Observer and remote control for a [`VirtualEngine`].
#[derive(Clone)]
pub struct VirtualEngineProbe {
    state: SharedState,
    on_completion: CallbackSlot,
}

impl VirtualEngineProbe {
    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    pub fn is_looping(&self) -> bool {
        lock(&self.state).looping
    }

    pub fn position_ms(&self) -> u32 {
        lock(&self.state).position_ms()
    }

    pub fn volume(&self) -> (f32, f32) {
        lock(&self.state).volume
    }

    pub fn source(&self) -> Option<PathBuf> {
        lock(&self.state).source.clone()
    }

    pub fn start_count(&self) -> u32 {
        lock(&self.state).start_count
    }

    pub fn pause_count(&self) -> u32 {
        lock(&self.state).pause_count
    }

    pub fn release_count(&self) -> u32 {
        lock(&self.state).release_count
    }

    /// Moves the playhead without changing the playing state.
    pub fn set_position(&self, position_ms: u32) {
        let mut state = lock(&self.state);
        state.base_position_ms = position_ms;
        if state.playing {
            state.started_at = Some(Instant::now());
        }
    }

    /// Makes subsequent `prepare` calls fail.
    pub fn fail_prepare(&self, fail: bool) {
        lock(&self.state).fail_prepare = fail;
    }

    /// Makes subsequent `start` calls fail.
    pub fn fail_start(&self, fail: bool) {
        lock(&self.state).fail_start = fail;
    }

    /// Simulates the engine reaching the end of its data: playback stops,
    /// the playhead returns to zero and the completion callback fires.
    pub fn complete(&self) {
        {
            let mut state = lock(&self.state);
            state.playing = false;
            state.started_at = None;
            state.base_position_ms = 0;
        }
        let callback = self.on_completion.lock().ok().and_then(|slot| slot.clone());
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Creates [`VirtualEngine`]s and keeps a probe for each one.
#[derive(Default)]
pub struct VirtualEngineFactory {
    probes: Mutex<HashMap<SoundId, VirtualEngineProbe>>,
    failing: HashSet<String>,
}

impl VirtualEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes acquisition fail for the sound with this file name.
    pub fn failing_acquire(mut self, file_name: &str) -> Self {
        self.failing.insert(file_name.to_string());
        self
    }

    /// Returns the probe of the engine created for `id`.
    pub fn probe(&self, id: SoundId) -> Option<VirtualEngineProbe> {
        self.probes.lock().ok()?.get(&id).cloned()
    }
}

impl EngineFactory for VirtualEngineFactory {
    fn create(&self, entry: &SoundEntry) -> Result<Box<dyn PlaybackEngine>> {
        if self.failing.contains(&entry.file_name) {
            return Err(Error::EngineAcquire(
                entry.file_name.clone(),
                "asset unavailable".to_string(),
            ));
        }

        let (mut engine, probe) = VirtualEngine::new();
        engine.prepare(&entry.path)?;
        engine.set_looping(true);
        if let Ok(mut probes) = self.probes.lock() {
            probes.insert(entry.id, probe);
        }
        Ok(Box::new(engine))
    }

    fn name(&self) -> &'static str {
        "virtual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn prepared() -> (VirtualEngine, VirtualEngineProbe) {
        let (mut engine, probe) = VirtualEngine::new();
        engine.prepare(Path::new("sounds/bird_robin.ogg")).unwrap();
        (engine, probe)
    }

    #[test]
    fn test_start_requires_prepare() {
        let (mut engine, probe) = VirtualEngine::new();
        assert!(engine.start().is_err());
        assert!(!probe.is_playing());
    }

    #[test]
    fn test_pause_keeps_position() {
        let (mut engine, probe) = prepared();
        engine.seek_to(4_000).unwrap();
        engine.start().unwrap();
        engine.pause().unwrap();

        assert!(!engine.is_playing());
        assert!(engine.position_ms() >= 4_000);
        assert_eq!(probe.pause_count(), 1);
    }

    #[test]
    fn test_reset_unbinds_source() {
        let (mut engine, probe) = prepared();
        engine.start().unwrap();
        engine.reset();

        assert!(!probe.is_playing());
        assert!(probe.source().is_none());
        assert!(engine.start().is_err());
    }

    #[test]
    fn test_complete_fires_callback() {
        let (mut engine, probe) = prepared();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        engine.set_on_completion(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        engine.start().unwrap();

        probe.complete();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!engine.is_playing());
        assert_eq!(engine.position_ms(), 0);
    }

    #[test]
    fn test_injected_start_failure() {
        let (mut engine, probe) = prepared();
        probe.fail_start(true);
        assert!(engine.start().is_err());
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_release_blocks_operations() {
        let (mut engine, probe) = prepared();
        engine.release();
        assert!(engine.start().is_err());
        assert!(engine.prepare(Path::new("x.ogg")).is_err());
        assert_eq!(probe.release_count(), 1);
    }

    #[test]
    fn test_factory_failing_acquire() {
        let factory = VirtualEngineFactory::new().failing_acquire("weather_rain");
        let entry = SoundEntry {
            id: SoundId(1),
            file_name: "weather_rain".to_string(),
            label: "Rain".to_string(),
            path: PathBuf::from("sounds/weather_rain.ogg"),
        };
        assert!(matches!(factory.create(&entry), Err(Error::EngineAcquire(_, _))));
        assert!(factory.probe(SoundId(1)).is_none());
    }
}
