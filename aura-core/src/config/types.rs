//! Application configuration loaded from `aura.yaml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::player::{AcquireFailurePolicy, StoreOptions};
use crate::timer::TIMER_PRESETS_MINUTES;

/// Default config file name looked up next to the executable's working dir.
pub const DEFAULT_CONFIG_FILE: &str = "aura.yaml";

/// Top-level configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the bundled audio assets.
    pub sounds_dir: PathBuf,
    /// Directory holding `<language>.yaml` string tables.
    pub strings_dir: PathBuf,
    /// INI file backing the preference store.
    pub prefs_path: PathBuf,
    pub acquire_failure: AcquireFailurePolicy,
    /// Resume the persisted playing set once after startup.
    pub restore_on_launch: bool,
    /// Sleep-timer presets offered to the user, in minutes.
    pub timer_presets: Vec<u32>,
    pub default_volume: f32,
    /// Path this config was loaded from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sounds_dir: PathBuf::from("sounds"),
            strings_dir: PathBuf::from("strings"),
            prefs_path: PathBuf::from("aura_prefs.ini"),
            acquire_failure: AcquireFailurePolicy::Skip,
            restore_on_launch: true,
            timer_presets: TIMER_PRESETS_MINUTES.to_vec(),
            default_volume: 1.0,
            source_path: None,
        }
    }
}

impl AppConfig {
    /// Player store options derived from this config.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            acquire_failure: self.acquire_failure,
            default_volume: self.default_volume,
        }
    }

    /// Makes relative paths relative to `base` instead of the working directory.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.sounds_dir,
            &mut self.strings_dir,
            &mut self.prefs_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
