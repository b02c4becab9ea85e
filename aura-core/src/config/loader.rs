//! YAML configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::types::AppConfig;
use crate::config::validator::ConfigValidator;
use crate::error::{Error, Result};

/// Loads and validates [`AppConfig`] from a YAML file.
pub struct ConfigLoader {
    path: PathBuf,
    validator: ConfigValidator,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            validator: ConfigValidator::new(),
        }
    }

    /// Reads the config file. A missing file yields the defaults; a present
    /// but malformed or invalid one is an error.
    ///
    /// Relative paths inside the file are resolved against its directory.
    pub fn load(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            tracing::info!(
                "Config {} not found, using defaults",
                self.path.display()
            );
            let mut config = AppConfig::default();
            self.validator.validate(&config)?;
            self.resolve(&mut config);
            return Ok(config);
        }

        let mut config = Self::load_from_path(&self.path)?;
        self.validator.validate(&config)?;
        self.resolve(&mut config);
        tracing::debug!("Loaded config from {}", self.path.display());
        Ok(config)
    }

    fn resolve(&self, config: &mut AppConfig) {
        if let Some(base) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.resolve_relative_to(base);
        }
    }

    fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(path.display().to_string(), e.to_string()))?;

        // An empty file parses as YAML null; treat it like an empty mapping.
        let mut config: AppConfig = if content.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::ConfigParse(path.display().to_string(), e.to_string()))?
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::AcquireFailurePolicy;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("aura.yaml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::new(temp_dir.path().join("aura.yaml"))
            .load()
            .unwrap();
        assert!(config.restore_on_launch);
        assert_eq!(config.timer_presets, AppConfig::default().timer_presets);
        assert_eq!(config.source_path, None);
    }

    #[test]
    fn test_missing_file_resolves_against_its_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::new(temp_dir.path().join("aura.yaml"))
            .load()
            .unwrap();

        let defaults = AppConfig::default();
        assert_eq!(config.sounds_dir, temp_dir.path().join(&defaults.sounds_dir));
        assert_eq!(config.strings_dir, temp_dir.path().join(&defaults.strings_dir));
        assert_eq!(config.prefs_path, temp_dir.path().join(&defaults.prefs_path));
    }

    #[test]
    fn test_bare_file_name_keeps_relative_defaults() {
        let config = ConfigLoader::new("no-such-aura.yaml").load().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            temp_dir.path(),
            r#"
sounds_dir: "assets/raw"
acquire_failure: fatal
restore_on_launch: false
timer_presets: [5, 15]
default_volume: 0.8
"#,
        );

        let config = ConfigLoader::new(&path).load().unwrap();

        assert_eq!(config.sounds_dir, temp_dir.path().join("assets/raw"));
        assert_eq!(config.strings_dir, temp_dir.path().join("strings"));
        assert_eq!(config.acquire_failure, AcquireFailurePolicy::Fatal);
        assert!(!config.restore_on_launch);
        assert_eq!(config.timer_presets, vec![5, 15]);
        assert!((config.default_volume - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.source_path, Some(path));
    }

    #[test]
    fn test_absolute_paths_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(temp_dir.path(), "prefs_path: /var/lib/aura/prefs.ini\n");
        let config = ConfigLoader::new(&path).load().unwrap();
        assert_eq!(config.prefs_path, PathBuf::from("/var/lib/aura/prefs.ini"));
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(temp_dir.path(), "");
        let config = ConfigLoader::new(&path).load().unwrap();
        assert!(config.restore_on_launch);
        assert_eq!(config.timer_presets, vec![10, 30, 60, 180]);
    }

    #[test]
    fn test_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(temp_dir.path(), "acquire_failure: sometimes\n");
        assert!(matches!(
            ConfigLoader::new(&path).load(),
            Err(Error::ConfigParse(_, _))
        ));
    }

    #[test]
    fn test_validation_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(temp_dir.path(), "default_volume: 2.0\n");
        assert!(matches!(
            ConfigLoader::new(&path).load(),
            Err(Error::ConfigValidation(_, _))
        ));
    }
}
