//! Persistence bridge: durable key-value preferences.
//!
//! Two logical stores share one backing file:
//! - `sound_prefs`: the set of sound ids playing at the last save point and
//!   the background-playback flag.
//! - `app_settings`: theme and language.
//!
//! Values are plain strings; string sets are stored comma-joined. There is no
//! versioning or migration.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::SoundId;
use crate::strings::Language;

pub const SOUND_PREFS_SECTION: &str = "sound_prefs";
pub const APP_SETTINGS_SECTION: &str = "app_settings";

pub const KEY_PLAYING_SOUNDS: &str = "playing_sounds";
pub const KEY_PLAY_IN_BACKGROUND: &str = "play_in_background";
pub const KEY_THEME: &str = "theme";
pub const KEY_LANGUAGE: &str = "language";

/// Backing key-value storage for preferences.
pub trait PreferenceStore: Send + Sync {
    /// Reads a raw value.
    fn get(&self, section: &str, key: &str) -> Option<String>;

    /// Writes a raw value durably.
    fn put(&self, section: &str, key: &str, value: &str) -> Result<()>;

    /// Reads a string set (comma-joined on disk).
    fn get_string_set(&self, section: &str, key: &str) -> Option<BTreeSet<String>> {
        self.get(section, key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Writes a string set.
    fn put_string_set(&self, section: &str, key: &str, values: &BTreeSet<String>) -> Result<()> {
        let joined = values.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        self.put(section, key, &joined)
    }

    /// Reads a boolean, returning `default` when absent or unparsable.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        match self.get(section, key) {
            Some(raw) => match raw.trim() {
                "true" => true,
                "false" => false,
                other => {
                    tracing::warn!("Invalid boolean for {}.{}: '{}'", section, key, other);
                    default
                }
            },
            None => default,
        }
    }

    /// Writes a boolean.
    fn put_bool(&self, section: &str, key: &str, value: bool) -> Result<()> {
        self.put(section, key, if value { "true" } else { "false" })
    }
}

/// INI-file backed preference store. Every write goes straight to disk.
pub struct IniPreferenceStore {
    path: PathBuf,
    ini: Mutex<ini::Ini>,
}

impl IniPreferenceStore {
    /// Opens (or lazily creates) the preference file at `path`.
    ///
    /// A missing file starts empty; an unreadable one is logged and replaced on
    /// the next write.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let ini = if path.exists() {
            match ini::Ini::load_from_file(&path) {
                Ok(ini) => ini,
                Err(e) => {
                    tracing::warn!("Failed to read preferences {}: {}", path.display(), e);
                    ini::Ini::new()
                }
            }
        } else {
            ini::Ini::new()
        };

        Self {
            path,
            ini: Mutex::new(ini),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for IniPreferenceStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        let ini = self.ini.lock().ok()?;
        ini.get_from(Some(section), key).map(str::to_string)
    }

    fn put(&self, section: &str, key: &str, value: &str) -> Result<()> {
        let mut ini = self.ini.lock().map_err(|_| Error::StateLock)?;
        ini.with_section(Some(section)).set(key, value);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        ini.write_to_file(&self.path)
            .map_err(|e| Error::Prefs(self.path.display().to_string(), e.to_string()))
    }
}

/// In-memory preference store.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        let values = self.values.lock().ok()?;
        values.get(&(section.to_string(), key.to_string())).cloned()
    }

    fn put(&self, section: &str, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| Error::StateLock)?;
        values.insert((section.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}

/// Playback-related preferences: the playing snapshot and background flag.
#[derive(Clone)]
pub struct SoundPreferences {
    store: Arc<dyn PreferenceStore>,
}

impl SoundPreferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Persists the set of playing sound ids.
    pub fn save_playing_sounds(&self, ids: &BTreeSet<SoundId>) -> Result<()> {
        tracing::debug!("Saving playing sounds: {:?}", ids);
        let values: BTreeSet<String> = ids.iter().map(SoundId::to_string).collect();
        self.store
            .put_string_set(SOUND_PREFS_SECTION, KEY_PLAYING_SOUNDS, &values)
    }

    /// Returns the persisted set of playing sound ids (empty when never saved).
    pub fn playing_sounds(&self) -> BTreeSet<SoundId> {
        let ids: BTreeSet<SoundId> = self
            .store
            .get_string_set(SOUND_PREFS_SECTION, KEY_PLAYING_SOUNDS)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match raw.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!("Ignoring invalid sound id in preferences: '{}'", raw);
                    None
                }
            })
            .collect();
        tracing::debug!("Retrieved playing sounds: {:?}", ids);
        ids
    }

    /// Sets whether playback continues while the app is in the background.
    pub fn set_play_in_background(&self, enabled: bool) -> Result<()> {
        self.store
            .put_bool(SOUND_PREFS_SECTION, KEY_PLAY_IN_BACKGROUND, enabled)
    }

    /// Whether playback continues in the background. Defaults to true.
    pub fn play_in_background(&self) -> bool {
        self.store
            .get_bool(SOUND_PREFS_SECTION, KEY_PLAY_IN_BACKGROUND, true)
    }
}

/// Color theme selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::System => "system",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(Theme::System),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(Error::Other(format!("Unsupported theme: {}", other))),
        }
    }
}

/// UI settings: theme and language.
#[derive(Clone)]
pub struct AppSettings {
    store: Arc<dyn PreferenceStore>,
}

impl AppSettings {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Selected theme, `System` when unset or unrecognized.
    pub fn theme(&self) -> Theme {
        self.store
            .get(APP_SETTINGS_SECTION, KEY_THEME)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.store.put(APP_SETTINGS_SECTION, KEY_THEME, theme.as_str())
    }

    /// Selected language, `System` when unset or unrecognized.
    pub fn language(&self) -> Language {
        self.store
            .get(APP_SETTINGS_SECTION, KEY_LANGUAGE)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_language(&self, language: Language) -> Result<()> {
        self.store
            .put(APP_SETTINGS_SECTION, KEY_LANGUAGE, language.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(raw: &[u32]) -> BTreeSet<SoundId> {
        raw.iter().copied().map(SoundId).collect()
    }

    #[test]
    fn test_playing_sounds_roundtrip_memory() {
        let prefs = SoundPreferences::new(Arc::new(MemoryPreferenceStore::new()));
        assert!(prefs.playing_sounds().is_empty());

        prefs.save_playing_sounds(&ids(&[3, 1, 2])).unwrap();
        assert_eq!(prefs.playing_sounds(), ids(&[1, 2, 3]));

        prefs.save_playing_sounds(&BTreeSet::new()).unwrap();
        assert!(prefs.playing_sounds().is_empty());
    }

    #[test]
    fn test_playing_sounds_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs").join("aura_prefs.ini");

        {
            let prefs = SoundPreferences::new(Arc::new(IniPreferenceStore::open(&path)));
            prefs.save_playing_sounds(&ids(&[2131623936, 2131623940])).unwrap();
            prefs.set_play_in_background(false).unwrap();
        }

        let prefs = SoundPreferences::new(Arc::new(IniPreferenceStore::open(&path)));
        assert_eq!(prefs.playing_sounds(), ids(&[2131623936, 2131623940]));
        assert!(!prefs.play_in_background());
    }

    #[test]
    fn test_play_in_background_defaults_true() {
        let prefs = SoundPreferences::new(Arc::new(MemoryPreferenceStore::new()));
        assert!(prefs.play_in_background());
    }

    #[test]
    fn test_invalid_ids_are_skipped() {
        let store = Arc::new(MemoryPreferenceStore::new());
        store
            .put(SOUND_PREFS_SECTION, KEY_PLAYING_SOUNDS, "7, bogus,,9")
            .unwrap();

        let prefs = SoundPreferences::new(store);
        assert_eq!(prefs.playing_sounds(), ids(&[7, 9]));
    }

    #[test]
    fn test_invalid_bool_uses_default() {
        let store = MemoryPreferenceStore::new();
        store
            .put(SOUND_PREFS_SECTION, KEY_PLAY_IN_BACKGROUND, "maybe")
            .unwrap();
        assert!(store.get_bool(SOUND_PREFS_SECTION, KEY_PLAY_IN_BACKGROUND, true));
    }

    #[test]
    fn test_app_settings_defaults_and_updates() {
        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let settings = AppSettings::new(Arc::clone(&store));
        assert_eq!(settings.theme(), Theme::System);
        assert_eq!(settings.language(), Language::System);

        settings.set_theme(Theme::Dark).unwrap();
        settings.set_language(Language::Ru).unwrap();
        assert_eq!(settings.theme(), Theme::Dark);
        assert_eq!(settings.language(), Language::Ru);
        assert_eq!(
            store.get(APP_SETTINGS_SECTION, KEY_THEME).as_deref(),
            Some("dark")
        );
    }

    #[test]
    fn test_sections_share_one_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("aura_prefs.ini");
        let store: Arc<dyn PreferenceStore> = Arc::new(IniPreferenceStore::open(&path));

        SoundPreferences::new(Arc::clone(&store))
            .save_playing_sounds(&ids(&[5]))
            .unwrap();
        AppSettings::new(Arc::clone(&store))
            .set_theme(Theme::Light)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[sound_prefs]"));
        assert!(content.contains("playing_sounds=5"));
        assert!(content.contains("[app_settings]"));
        assert!(content.contains("theme=light"));
    }
}
