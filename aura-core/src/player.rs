//! Player state store: one playback channel per bundled sound.
//!
//! The store owns every engine handle and the per-sound state (last
//! position, volume, playing flag). It is an explicit object owned by one
//! controller; platform lifecycle transitions arrive as [`LifecycleEvent`]s.
//!
//! Channels sit behind a single mutex that is shared with the engines'
//! completion callbacks. A user pause and a natural loop completion
//! therefore never interleave: whichever takes the lock first wins, and the
//! callback only restarts a channel that is still marked playing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};

use crate::engines::{EngineFactory, PlaybackEngine};
use crate::error::{Error, Result};
use crate::prefs::SoundPreferences;
use crate::registry::{SoundEntry, SoundGroup, SoundId};
use crate::service::ForegroundService;

/// What to do when an engine cannot be acquired for a bundled sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquireFailurePolicy {
    /// Log and leave that sound out of the mixer.
    #[default]
    Skip,
    /// Abort initialization.
    Fatal,
}

/// Platform lifecycle transitions delivered to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The UI went to the background.
    Backgrounded,
    /// The UI came back to the foreground.
    Foregrounded,
    /// The UI/process is being torn down.
    Destroyed,
}

/// Where the persisted snapshot comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Recompute from the channels' playing flags.
    Current,
    /// Re-persist the most recently computed snapshot.
    LastSaved,
}

/// Options for [`PlayerStore::initialize`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub acquire_failure: AcquireFailurePolicy,
    /// Initial volume of every channel.
    pub default_volume: f32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            acquire_failure: AcquireFailurePolicy::Skip,
            default_volume: 1.0,
        }
    }
}

/// Read-only view of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub id: SoundId,
    pub file_name: String,
    pub label: String,
    pub group: Option<SoundGroup>,
    pub playing: bool,
    pub volume: f32,
    pub position_ms: u32,
}

/// Mutable state of one sound. Owns its engine exclusively.
struct PlaybackState {
    entry: SoundEntry,
    engine: Box<dyn PlaybackEngine>,
    last_position: u32,
    volume: f32,
    playing: bool,
}

impl PlaybackState {
    /// Rebinds the asset and starts from the last known position.
    fn prepare_and_start(&mut self) -> Result<()> {
        self.engine.reset();
        self.engine.prepare(&self.entry.path)?;
        self.engine.set_looping(true);
        if self.last_position > 0 {
            self.engine.seek_to(self.last_position)?;
        }
        self.engine.set_volume(self.volume, self.volume);
        self.engine.start()?;
        self.playing = true;
        Ok(())
    }

    /// Starts playback, logging and swallowing engine failures.
    fn start_logged(&mut self) -> bool {
        match self.prepare_and_start() {
            Ok(()) => {
                tracing::info!("Started {} ({})", self.entry.file_name, self.entry.id);
                true
            }
            Err(e) => {
                tracing::error!("Error preparing or starting {}: {}", self.entry.file_name, e);
                self.playing = false;
                false
            }
        }
    }

    /// Pauses and remembers the position for the next start.
    fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.last_position = self.engine.position_ms();
        if let Err(e) = self.engine.pause() {
            tracing::error!("Error pausing {}: {}", self.entry.file_name, e);
        }
        self.playing = false;
        tracing::info!(
            "Paused {} at {} ms",
            self.entry.file_name,
            self.last_position
        );
    }

    /// Pauses and rewinds to the beginning.
    fn stop(&mut self) {
        if self.playing || self.engine.is_playing() {
            tracing::debug!("Pausing {}", self.entry.file_name);
            if let Err(e) = self.engine.pause() {
                tracing::error!("Error pausing {}: {}", self.entry.file_name, e);
            }
        }
        if let Err(e) = self.engine.seek_to(0) {
            tracing::debug!("Could not rewind {}: {}", self.entry.file_name, e);
        }
        self.last_position = 0;
        self.playing = false;
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus {
            id: self.entry.id,
            file_name: self.entry.file_name.clone(),
            label: self.entry.label.clone(),
            group: self.entry.group(),
            playing: self.playing,
            volume: self.volume,
            position_ms: if self.playing {
                self.engine.position_ms()
            } else {
                self.last_position
            },
        }
    }
}

type Channels = BTreeMap<SoundId, PlaybackState>;

/// State shared with engine completion callbacks.
struct Shared {
    channels: Mutex<Channels>,
    released: AtomicBool,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, Channels>> {
        if self.released.load(Ordering::SeqCst) {
            return Err(Error::Released);
        }
        self.channels.lock().map_err(|_| Error::StateLock)
    }

    /// Natural end of a loop cycle: restart from zero if still marked playing.
    fn on_completion(&self, id: SoundId) {
        let Ok(mut channels) = self.lock() else {
            return;
        };
        if let Some(state) = channels.get_mut(&id) {
            if state.playing {
                tracing::debug!("Re-looping {} after completion", state.entry.file_name);
                state.last_position = 0;
                state.start_logged();
            }
        }
    }
}

/// Holds one playback channel per registered sound.
pub struct PlayerStore {
    shared: Arc<Shared>,
    prefs: SoundPreferences,
    service: Arc<dyn ForegroundService>,
    last_saved: Mutex<BTreeSet<SoundId>>,
    play_in_background: AtomicBool,
}

impl PlayerStore {
    /// Acquires a looping engine for every entry and wires its completion callback.
    pub fn initialize(
        entries: &[SoundEntry],
        factory: &dyn EngineFactory,
        prefs: SoundPreferences,
        service: Arc<dyn ForegroundService>,
        options: StoreOptions,
    ) -> Result<Self> {
        tracing::debug!(
            "Initializing {} playback engines ({})",
            entries.len(),
            factory.name()
        );
        let shared = Arc::new(Shared {
            channels: Mutex::new(BTreeMap::new()),
            released: AtomicBool::new(false),
        });
        let volume = options.default_volume.clamp(0.0, 1.0);

        let mut channels: Channels = BTreeMap::new();
        for entry in entries {
            let mut engine = match factory.create(entry) {
                Ok(engine) => engine,
                Err(e) => match options.acquire_failure {
                    AcquireFailurePolicy::Skip => {
                        tracing::warn!("Skipping {}: {}", entry.file_name, e);
                        continue;
                    }
                    AcquireFailurePolicy::Fatal => {
                        for state in channels.values_mut() {
                            state.engine.release();
                        }
                        return Err(e);
                    }
                },
            };
            engine.set_looping(true);
            engine.set_volume(volume, volume);

            let weak: Weak<Shared> = Arc::downgrade(&shared);
            let id = entry.id;
            engine.set_on_completion(Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_completion(id);
                }
            }));

            tracing::debug!(
                "Initialized engine for id={}, file_name={}, label={}",
                entry.id,
                entry.file_name,
                entry.label
            );
            channels.insert(
                entry.id,
                PlaybackState {
                    entry: entry.clone(),
                    engine,
                    last_position: 0,
                    volume,
                    playing: false,
                },
            );
        }

        {
            let mut shared_channels = shared.channels.lock().map_err(|_| Error::StateLock)?;
            *shared_channels = channels;
        }

        let last_saved = prefs.playing_sounds();
        let play_in_background = prefs.play_in_background();

        Ok(Self {
            shared,
            prefs,
            service,
            last_saved: Mutex::new(last_saved),
            play_in_background: AtomicBool::new(play_in_background),
        })
    }

    fn channel_mut<'a>(channels: &'a mut Channels, id: SoundId) -> Result<&'a mut PlaybackState> {
        channels.get_mut(&id).ok_or(Error::UnknownSound(id.0))
    }

    /// Starts one sound. Returns whether it is playing afterwards.
    ///
    /// Engine failures are logged and leave the sound stopped. The first sound
    /// to start while nothing else plays brings up the foreground service.
    pub fn start_one(&self, id: SoundId) -> Result<bool> {
        let first_playing = {
            let mut channels = self.shared.lock()?;
            let was_silent = !channels.values().any(|c| c.playing);
            let state = Self::channel_mut(&mut channels, id)?;
            if state.playing {
                return Ok(true);
            }
            if !state.start_logged() {
                return Ok(false);
            }
            was_silent.then(|| playing_in(&channels).into_iter().collect::<Vec<_>>())
        };

        if let Some(playing) = first_playing {
            if let Err(e) = self.service.start(&playing) {
                tracing::warn!("Failed to start foreground service: {}", e);
            }
        }
        Ok(true)
    }

    /// Pauses one sound, keeping its position for the next start.
    pub fn pause_one(&self, id: SoundId) -> Result<()> {
        let mut channels = self.shared.lock()?;
        Self::channel_mut(&mut channels, id)?.pause();
        Ok(())
    }

    /// Starts a paused sound or pauses a playing one. Returns the new playing state.
    pub fn toggle(&self, id: SoundId) -> Result<bool> {
        if self.is_playing(id)? {
            self.pause_one(id)?;
            Ok(false)
        } else {
            self.start_one(id)
        }
    }

    /// Stops one sound and rewinds it.
    pub fn stop_one(&self, id: SoundId) -> Result<()> {
        let mut channels = self.shared.lock()?;
        let state = Self::channel_mut(&mut channels, id)?;
        state.stop();
        tracing::info!("Stopped {}", state.entry.file_name);
        Ok(())
    }

    /// Snapshots what is playing, stops and rewinds everything, and stops the
    /// foreground service. Returns how many sounds were playing.
    ///
    /// With nothing playing the previous snapshot is re-saved rather than
    /// overwritten with an empty set, so repeated calls are idempotent.
    pub fn stop_all(&self) -> Result<usize> {
        tracing::debug!("stop_all called");
        let mode = if self.playing_ids()?.is_empty() {
            SaveMode::LastSaved
        } else {
            SaveMode::Current
        };
        if let Err(e) = self.save_playing(mode) {
            tracing::error!("Failed to save playing sounds: {}", e);
        }

        let stopped = {
            let mut channels = self.shared.lock()?;
            let mut stopped = 0;
            for state in channels.values_mut() {
                if state.playing {
                    stopped += 1;
                }
                state.stop();
            }
            stopped
        };

        if let Err(e) = self.service.stop() {
            tracing::warn!("Failed to stop foreground service: {}", e);
        }
        tracing::info!("Stopped {} sounds", stopped);
        Ok(stopped)
    }

    /// Restarts every persisted sound. Returns the ids that are now playing.
    pub fn resume(&self) -> Result<Vec<SoundId>> {
        let saved = self.prefs.playing_sounds();
        tracing::debug!("Resuming playing sounds: {:?}", saved);

        let mut started = Vec::new();
        for id in saved {
            match self.start_one(id) {
                Ok(true) => started.push(id),
                Ok(false) => {}
                Err(Error::UnknownSound(_)) => {
                    tracing::warn!("Saved sound {} is no longer bundled, skipping", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(started)
    }

    /// Sets both channels of a sound to `volume`, clamped to 0.0..=1.0.
    /// Returns the applied value.
    pub fn set_volume(&self, id: SoundId, volume: f32) -> Result<f32> {
        if volume.is_nan() {
            return Err(Error::Other("Volume must be a number".to_string()));
        }
        let volume = volume.clamp(0.0, 1.0);
        let mut channels = self.shared.lock()?;
        let state = Self::channel_mut(&mut channels, id)?;
        state.volume = volume;
        state.engine.set_volume(volume, volume);
        tracing::debug!("Set volume for {} to {:.2}", state.entry.file_name, volume);
        Ok(volume)
    }

    /// Persists the playing snapshot and returns it.
    pub fn save_playing(&self, mode: SaveMode) -> Result<BTreeSet<SoundId>> {
        let ids = match mode {
            SaveMode::Current => self.playing_ids()?,
            SaveMode::LastSaved => self
                .last_saved
                .lock()
                .map_err(|_| Error::StateLock)?
                .clone(),
        };
        {
            let mut last_saved = self.last_saved.lock().map_err(|_| Error::StateLock)?;
            *last_saved = ids.clone();
        }
        tracing::debug!("Saving playing sounds ({:?}): {:?}", mode, ids);
        self.prefs.save_playing_sounds(&ids)?;
        Ok(ids)
    }

    /// Entry point for platform lifecycle transitions.
    pub fn handle_event(&self, event: LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::Backgrounded => {
                if !self.play_in_background() {
                    tracing::info!("Background playback disabled, stopping all sounds");
                    self.stop_all()?;
                }
                tracing::debug!("Backgrounded, saving last saved playing sounds");
                self.save_playing(SaveMode::LastSaved)?;
            }
            LifecycleEvent::Foregrounded => {
                tracing::debug!("Foregrounded");
            }
            LifecycleEvent::Destroyed => {
                tracing::info!("Destroyed, saving state and releasing engines");
                if let Err(e) = self.save_playing(SaveMode::LastSaved) {
                    tracing::error!("Failed to save playing sounds: {}", e);
                }
                self.stop_all()?;
                self.release();
            }
        }
        Ok(())
    }

    /// Releases every engine. Runs once; later calls do nothing and every
    /// playback operation fails with [`Error::Released`].
    pub fn release(&self) {
        if self.shared.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut channels = match self.shared.channels.lock() {
            Ok(channels) => channels,
            Err(poisoned) => poisoned.into_inner(),
        };
        for state in channels.values_mut() {
            state.engine.release();
            state.playing = false;
        }
        tracing::info!("Released {} playback engines", channels.len());
    }

    /// Whether the store has been released.
    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self, id: SoundId) -> Result<bool> {
        let channels = self.shared.lock()?;
        channels
            .get(&id)
            .map(|state| state.playing)
            .ok_or(Error::UnknownSound(id.0))
    }

    /// Ids of the sounds currently marked playing.
    pub fn playing_ids(&self) -> Result<BTreeSet<SoundId>> {
        let channels = self.shared.lock()?;
        Ok(playing_in(&channels))
    }

    /// Ids of every channel, in id order.
    pub fn ids(&self) -> Result<Vec<SoundId>> {
        let channels = self.shared.lock()?;
        Ok(channels.keys().copied().collect())
    }

    /// Status of every channel, in id order.
    pub fn status(&self) -> Result<Vec<ChannelStatus>> {
        let channels = self.shared.lock()?;
        Ok(channels.values().map(PlaybackState::status).collect())
    }

    /// Status of one channel.
    pub fn channel_status(&self, id: SoundId) -> Result<ChannelStatus> {
        let channels = self.shared.lock()?;
        channels
            .get(&id)
            .map(PlaybackState::status)
            .ok_or(Error::UnknownSound(id.0))
    }

    /// The snapshot most recently saved (or loaded at startup).
    pub fn last_saved(&self) -> BTreeSet<SoundId> {
        self.last_saved
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn play_in_background(&self) -> bool {
        self.play_in_background.load(Ordering::SeqCst)
    }

    /// Persists the flag, then applies it. A failed write changes nothing.
    pub fn set_play_in_background(&self, enabled: bool) -> Result<()> {
        self.prefs.set_play_in_background(enabled)?;
        self.play_in_background.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for PlayerStore {
    fn drop(&mut self) {
        self.release();
    }
}

fn playing_in(channels: &Channels) -> BTreeSet<SoundId> {
    channels
        .values()
        .filter(|state| state.playing)
        .map(|state| state.entry.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::VirtualEngineFactory;
    use crate::prefs::{MemoryPreferenceStore, PreferenceStore};
    use crate::service::{RecordingService, ServiceSignal};
    use std::path::PathBuf;

    const A: SoundId = SoundId(100);
    const B: SoundId = SoundId(101);
    const C: SoundId = SoundId(102);

    fn entry(id: SoundId, name: &str) -> SoundEntry {
        SoundEntry {
            id,
            file_name: name.to_string(),
            label: name.to_string(),
            path: PathBuf::from(format!("sounds/{}.ogg", name)),
        }
    }

    fn entries() -> Vec<SoundEntry> {
        vec![
            entry(A, "bird_robin"),
            entry(B, "water_creek"),
            entry(C, "weather_rain"),
        ]
    }

    struct Fixture {
        store: PlayerStore,
        factory: VirtualEngineFactory,
        service: RecordingService,
        prefs: SoundPreferences,
    }

    fn fixture_with(factory: VirtualEngineFactory, service: RecordingService) -> Fixture {
        let prefs = SoundPreferences::new(Arc::new(MemoryPreferenceStore::new()));
        let store = PlayerStore::initialize(
            &entries(),
            &factory,
            prefs.clone(),
            Arc::new(service.clone()),
            StoreOptions::default(),
        )
        .unwrap();
        Fixture {
            store,
            factory,
            service,
            prefs,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(VirtualEngineFactory::new(), RecordingService::new())
    }

    #[test]
    fn test_initialize_creates_looping_channel_per_entry() {
        let f = fixture();
        assert_eq!(f.store.ids().unwrap(), vec![A, B, C]);
        for id in [A, B, C] {
            let probe = f.factory.probe(id).unwrap();
            assert!(probe.is_looping());
            assert!(!probe.is_playing());
        }
    }

    #[test]
    fn test_acquire_failure_skip() {
        let f = fixture_with(
            VirtualEngineFactory::new().failing_acquire("water_creek"),
            RecordingService::new(),
        );
        assert_eq!(f.store.ids().unwrap(), vec![A, C]);
        assert!(matches!(f.store.start_one(B), Err(Error::UnknownSound(101))));
    }

    #[test]
    fn test_acquire_failure_fatal() {
        let factory = VirtualEngineFactory::new().failing_acquire("water_creek");
        let result = PlayerStore::initialize(
            &entries(),
            &factory,
            SoundPreferences::new(Arc::new(MemoryPreferenceStore::new())),
            Arc::new(RecordingService::new()),
            StoreOptions {
                acquire_failure: AcquireFailurePolicy::Fatal,
                ..StoreOptions::default()
            },
        );
        assert!(matches!(result, Err(Error::EngineAcquire(_, _))));

        // The engine built before the failure is released once; later ones are never built.
        assert_eq!(factory.probe(A).unwrap().release_count(), 1);
        assert!(factory.probe(C).is_none());
    }

    #[test]
    fn test_start_then_stop() {
        let f = fixture();
        assert!(f.store.start_one(A).unwrap());
        assert!(f.store.is_playing(A).unwrap());
        assert!(f.factory.probe(A).unwrap().is_playing());

        f.factory.probe(A).unwrap().set_position(12_000);
        f.store.stop_one(A).unwrap();

        let status = f.store.channel_status(A).unwrap();
        assert!(!status.playing);
        assert_eq!(status.position_ms, 0);
        assert!(!f.factory.probe(A).unwrap().is_playing());
    }

    #[test]
    fn test_pause_resumes_from_position() {
        let f = fixture();
        let probe = f.factory.probe(A).unwrap();
        f.store.start_one(A).unwrap();
        probe.set_position(30_000);

        f.store.pause_one(A).unwrap();
        assert!(!f.store.is_playing(A).unwrap());
        let paused_at = f.store.channel_status(A).unwrap().position_ms;
        assert!(paused_at >= 30_000);

        f.store.start_one(A).unwrap();
        assert!(probe.position_ms() >= paused_at);
    }

    #[test]
    fn test_toggle() {
        let f = fixture();
        assert!(f.store.toggle(B).unwrap());
        assert!(!f.store.toggle(B).unwrap());
        assert!(!f.factory.probe(B).unwrap().is_playing());
    }

    #[test]
    fn test_start_failure_leaves_flag_false() {
        let f = fixture();
        f.factory.probe(A).unwrap().fail_start(true);
        assert!(!f.store.start_one(A).unwrap());
        assert!(!f.store.is_playing(A).unwrap());
        assert!(f.service.signals().is_empty());
    }

    #[test]
    fn test_prepare_failure_leaves_flag_false() {
        let f = fixture();
        let probe = f.factory.probe(A).unwrap();
        probe.fail_prepare(true);

        assert!(!f.store.start_one(A).unwrap());
        assert!(!f.store.is_playing(A).unwrap());
        assert!(!probe.is_playing());
        assert_eq!(probe.start_count(), 0);
        assert!(f.service.signals().is_empty());

        probe.fail_prepare(false);
        assert!(f.store.start_one(A).unwrap());
        assert_eq!(f.service.signals(), vec![ServiceSignal::Start(vec![A])]);
    }

    #[test]
    fn test_service_started_only_on_first_sound() {
        let f = fixture();
        f.store.start_one(A).unwrap();
        f.store.start_one(B).unwrap();
        assert_eq!(f.service.signals(), vec![ServiceSignal::Start(vec![A])]);
    }

    #[test]
    fn test_service_failure_does_not_affect_playback() {
        let f = fixture_with(VirtualEngineFactory::new(), RecordingService::failing());
        assert!(f.store.start_one(A).unwrap());
        assert!(f.store.is_playing(A).unwrap());
    }

    #[test]
    fn test_stop_all_snapshots_and_resume_restarts() {
        let f = fixture();
        f.store.start_one(A).unwrap();
        f.store.start_one(B).unwrap();

        assert_eq!(f.store.stop_all().unwrap(), 2);
        assert!(!f.store.is_playing(A).unwrap());
        assert!(!f.store.is_playing(B).unwrap());
        assert_eq!(f.prefs.playing_sounds(), BTreeSet::from([A, B]));
        assert_eq!(f.service.signals().last(), Some(&ServiceSignal::Stop));

        let resumed = f.store.resume().unwrap();
        assert_eq!(resumed, vec![A, B]);
        assert_eq!(f.store.playing_ids().unwrap(), BTreeSet::from([A, B]));
        assert!(!f.store.is_playing(C).unwrap());
    }

    #[test]
    fn test_stop_all_twice_is_idempotent() {
        let f = fixture();
        f.store.start_one(A).unwrap();
        f.store.set_volume(A, 0.4).unwrap();

        f.store.stop_all().unwrap();
        let once_status = f.store.status().unwrap();
        let once_saved = f.prefs.playing_sounds();

        assert_eq!(f.store.stop_all().unwrap(), 0);
        assert_eq!(f.store.status().unwrap(), once_status);
        assert_eq!(f.prefs.playing_sounds(), once_saved);
        assert_eq!(once_saved, BTreeSet::from([A]));
    }

    #[test]
    fn test_resume_skips_unknown_ids() {
        let f = fixture();
        f.prefs
            .save_playing_sounds(&BTreeSet::from([C, SoundId(999)]))
            .unwrap();
        assert_eq!(f.store.resume().unwrap(), vec![C]);
    }

    #[test]
    fn test_set_volume_last_write_wins() {
        let f = fixture();
        let probe = f.factory.probe(A).unwrap();
        f.store.set_volume(A, 0.0).unwrap();
        f.store.set_volume(A, 1.0).unwrap();
        assert_eq!(probe.volume(), (1.0, 1.0));

        assert_eq!(f.store.set_volume(A, 1.7).unwrap(), 1.0);
        assert_eq!(f.store.set_volume(A, -0.5).unwrap(), 0.0);
        assert!(f.store.set_volume(A, f32::NAN).is_err());
    }

    #[test]
    fn test_volume_survives_restart() {
        let f = fixture();
        f.store.set_volume(B, 0.25).unwrap();
        f.store.start_one(B).unwrap();
        assert_eq!(f.factory.probe(B).unwrap().volume(), (0.25, 0.25));
    }

    #[test]
    fn test_completion_reloops_playing_channel() {
        let f = fixture();
        let probe = f.factory.probe(A).unwrap();
        f.store.start_one(A).unwrap();
        let starts = probe.start_count();

        probe.complete();

        assert!(f.store.is_playing(A).unwrap());
        assert!(probe.is_playing());
        assert_eq!(probe.start_count(), starts + 1);
    }

    #[test]
    fn test_completion_after_pause_does_not_restart() {
        let f = fixture();
        let probe = f.factory.probe(A).unwrap();
        f.store.start_one(A).unwrap();
        f.store.pause_one(A).unwrap();

        probe.complete();

        assert!(!f.store.is_playing(A).unwrap());
        assert!(!probe.is_playing());
    }

    #[test]
    fn test_backgrounded_stops_when_background_disabled() {
        let f = fixture();
        f.store.set_play_in_background(false).unwrap();
        f.store.start_one(A).unwrap();

        f.store.handle_event(LifecycleEvent::Backgrounded).unwrap();

        assert!(!f.store.is_playing(A).unwrap());
        assert_eq!(f.prefs.playing_sounds(), BTreeSet::from([A]));
        assert!(!f.prefs.play_in_background());
    }

    struct ReadOnlyPreferences;

    impl PreferenceStore for ReadOnlyPreferences {
        fn get(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }

        fn put(&self, section: &str, key: &str, _value: &str) -> Result<()> {
            Err(Error::Prefs(format!("{}.{}", section, key), "read-only".to_string()))
        }
    }

    #[test]
    fn test_background_flag_unchanged_when_write_fails() {
        let factory = VirtualEngineFactory::new();
        let store = PlayerStore::initialize(
            &entries(),
            &factory,
            SoundPreferences::new(Arc::new(ReadOnlyPreferences)),
            Arc::new(RecordingService::new()),
            StoreOptions::default(),
        )
        .unwrap();
        assert!(store.play_in_background());

        assert!(matches!(
            store.set_play_in_background(false),
            Err(Error::Prefs(_, _))
        ));
        assert!(store.play_in_background());
    }

    #[test]
    fn test_backgrounded_keeps_playing_when_enabled() {
        let f = fixture();
        f.store.start_one(A).unwrap();
        f.store.handle_event(LifecycleEvent::Backgrounded).unwrap();
        assert!(f.store.is_playing(A).unwrap());
    }

    #[test]
    fn test_destroyed_saves_and_releases_once() {
        let f = fixture();
        f.store.start_one(A).unwrap();
        f.store.start_one(C).unwrap();

        f.store.handle_event(LifecycleEvent::Destroyed).unwrap();

        assert!(f.store.is_released());
        assert_eq!(f.prefs.playing_sounds(), BTreeSet::from([A, C]));
        assert!(matches!(f.store.start_one(A), Err(Error::Released)));
        assert!(matches!(f.store.stop_all(), Err(Error::Released)));

        f.store.release();
        for id in [A, B, C] {
            assert_eq!(f.factory.probe(id).unwrap().release_count(), 1);
        }
    }

    #[test]
    fn test_drop_releases_engines() {
        let f = fixture();
        let probe = f.factory.probe(B).unwrap();
        drop(f.store);
        assert_eq!(probe.release_count(), 1);
    }
}
