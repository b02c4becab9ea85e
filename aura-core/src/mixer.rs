//! Wires config, preferences, strings, registry and the player store together.

use std::sync::Arc;

use serde::Serialize;

use crate::config::AppConfig;
use crate::engines::{default_factory, EngineFactory};
use crate::error::{Error, Result};
use crate::player::{ChannelStatus, PlayerStore};
use crate::prefs::{AppSettings, IniPreferenceStore, PreferenceStore, SoundPreferences, Theme};
use crate::registry::{group_entries, SoundEntry, SoundGroup, SoundRegistry};
use crate::service::{ForegroundService, Notifier};
use crate::strings::{Language, StringTable};

/// Snapshot of the whole mixer, serialized for hosts and the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct MixerStatus {
    pub play_in_background: bool,
    pub theme: Theme,
    pub language: Language,
    pub channels: Vec<ChannelStatus>,
}

/// A fully initialized mixer: bundled sounds, their player store and the
/// app-level settings.
pub struct Mixer {
    config: AppConfig,
    strings: StringTable,
    entries: Vec<SoundEntry>,
    settings: AppSettings,
    store: PlayerStore,
}

impl Mixer {
    /// Opens a mixer with the INI preference file from `config` and the
    /// default engine backend.
    pub fn open(config: AppConfig, service: Arc<dyn ForegroundService>) -> Result<Self> {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(IniPreferenceStore::open(&config.prefs_path));
        let factory = default_factory();
        Self::open_with(config, factory.as_ref(), prefs, service)
    }

    /// Opens a mixer with explicit collaborators.
    ///
    /// Resumes the persisted playing set once when `restore_on_launch` is set.
    pub fn open_with(
        config: AppConfig,
        factory: &dyn EngineFactory,
        prefs: Arc<dyn PreferenceStore>,
        service: Arc<dyn ForegroundService>,
    ) -> Result<Self> {
        let settings = AppSettings::new(Arc::clone(&prefs));
        let strings = StringTable::load(&config.strings_dir, settings.language());
        let registry = SoundRegistry::new(&config.sounds_dir, strings.clone());
        let entries = registry.load();
        tracing::info!(
            "Found {} sounds in {}",
            entries.len(),
            config.sounds_dir.display()
        );

        let store = PlayerStore::initialize(
            &entries,
            factory,
            SoundPreferences::new(prefs),
            service,
            config.store_options(),
        )?;

        if config.restore_on_launch {
            let resumed = store.resume()?;
            if !resumed.is_empty() {
                tracing::info!("Restored {} sounds from last session", resumed.len());
            }
        }

        Ok(Self {
            config,
            strings,
            entries,
            settings,
            store,
        })
    }

    pub fn store(&self) -> &PlayerStore {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Registered sounds, in id order.
    pub fn entries(&self) -> &[SoundEntry] {
        &self.entries
    }

    /// Registered sounds grouped for display.
    pub fn groups(&self) -> Vec<(SoundGroup, Vec<SoundEntry>)> {
        group_entries(&self.entries)
    }

    /// Persists the language. Labels pick it up on the next open.
    pub fn set_language(&self, language: Language) -> Result<()> {
        self.settings.set_language(language)
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.settings.set_theme(theme)
    }

    /// Expiry action of the sleep timer: stop everything, then notify once.
    pub fn on_timer_expired(&self, notifier: &dyn Notifier) {
        match self.store.stop_all() {
            Ok(stopped) => tracing::info!("Sleep timer stopped {} sounds", stopped),
            Err(e) => tracing::error!("Sleep timer could not stop playback: {}", e),
        }
        notifier.timer_ended();
    }

    pub fn status(&self) -> Result<MixerStatus> {
        Ok(MixerStatus {
            play_in_background: self.store.play_in_background(),
            theme: self.settings.theme(),
            language: self.settings.language(),
            channels: self.store.status()?,
        })
    }

    pub fn status_json(&self) -> Result<String> {
        serde_json::to_string(&self.status()?).map_err(|e| Error::Other(e.to_string()))
    }
}
