//! Shared kira audio manager.
//!
//! All sounds play through a single `AudioManager` (one cpal stream), created
//! lazily on first use and kept for the process lifetime. Each sound gets its
//! own `StaticSoundHandle` with per-sound volume control via kira's mixer.

use std::sync::{Mutex, OnceLock};

use kira::{AudioManager, AudioManagerSettings, Decibels, DefaultBackend};

static AUDIO_MANAGER: OnceLock<Option<Mutex<AudioManager<DefaultBackend>>>> = OnceLock::new();

fn audio_manager() -> Option<&'static Mutex<AudioManager<DefaultBackend>>> {
    AUDIO_MANAGER
        .get_or_init(|| {
            match AudioManager::<DefaultBackend>::new(AudioManagerSettings::default()) {
                Ok(manager) => {
                    tracing::info!("Audio output initialized");
                    Some(Mutex::new(manager))
                }
                Err(e) => {
                    tracing::error!("Failed to initialize audio output: {}", e);
                    None
                }
            }
        })
        .as_ref()
}

/// Returns whether an audio output device could be opened.
pub fn is_audio_available() -> bool {
    audio_manager().is_some()
}

/// Runs `f` with exclusive access to the shared audio manager.
/// Returns `None` if no audio device is available.
pub fn with_audio_manager<R>(f: impl FnOnce(&mut AudioManager<DefaultBackend>) -> R) -> Option<R> {
    let manager = audio_manager()?;
    let mut guard = manager.lock().unwrap_or_else(|e| e.into_inner());
    Some(f(&mut guard))
}

/// Converts a linear gain (0.0..=1.0) to kira decibels.
pub fn volume_to_db(volume: f32) -> Decibels {
    let volume = volume.clamp(0.0, 1.0);
    if volume <= 0.0 {
        return Decibels::SILENCE;
    }
    Decibels((20.0 * volume.log10()).max(Decibels::SILENCE.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_to_db_bounds() {
        assert_eq!(volume_to_db(0.0), Decibels::SILENCE);
        assert_eq!(volume_to_db(-1.0), Decibels::SILENCE);
        assert_eq!(volume_to_db(1.0), Decibels(0.0));
        assert_eq!(volume_to_db(2.0), Decibels(0.0));
    }

    #[test]
    fn test_volume_to_db_half() {
        let db = volume_to_db(0.5).0;
        assert!((db - -6.0206).abs() < 0.01, "got {}", db);
    }

    #[test]
    fn test_volume_to_db_floor() {
        assert_eq!(volume_to_db(0.000_001), Decibels::SILENCE);
    }
}
