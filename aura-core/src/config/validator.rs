//! Configuration validation.

use crate::config::types::AppConfig;
use crate::error::{Error, Result};

/// Validator for the application configuration.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validates an application configuration.
    pub fn validate(&self, config: &AppConfig) -> Result<()> {
        self.validate_volume(config.default_volume)?;
        self.validate_presets(&config.timer_presets)?;
        self.validate_path("sounds_dir", config.sounds_dir.as_os_str().is_empty())?;
        self.validate_path("prefs_path", config.prefs_path.as_os_str().is_empty())?;
        Ok(())
    }

    fn validate_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(Error::ConfigValidation(
                "default_volume".to_string(),
                format!("Volume must be between 0.0 and 1.0, got {}", volume),
            ));
        }
        Ok(())
    }

    fn validate_presets(&self, presets: &[u32]) -> Result<()> {
        if let Some(index) = presets.iter().position(|&minutes| minutes == 0) {
            return Err(Error::ConfigValidation(
                format!("timer_presets[{}]", index),
                "Timer presets must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_path(&self, field: &str, empty: bool) -> Result<()> {
        if empty {
            return Err(Error::ConfigValidation(
                field.to_string(),
                "Path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
