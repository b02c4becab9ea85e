//! Localized string tables.
//!
//! Each language lives in `<strings_dir>/<code>.yaml` as a flat map of
//! key → text. Sound labels use the key `sound_<file_name>`; group titles
//! use `group_<name>`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Language used when neither the selection nor the environment names one we ship.
pub const FALLBACK_LANGUAGE: &str = "en";

/// User-selectable language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Follow the system locale (`LC_ALL`, `LC_MESSAGES`, `LANG`).
    #[default]
    System,
    En,
    Ru,
}

impl Language {
    /// Returns the persisted form of this language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::System => "system",
            Language::En => "en",
            Language::Ru => "ru",
        }
    }

    /// Resolves to a concrete two-letter language code.
    pub fn code(&self) -> String {
        match self {
            Language::En => "en".to_string(),
            Language::Ru => "ru".to_string(),
            Language::System => system_language_code(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(Language::System),
            "en" => Ok(Language::En),
            "ru" => Ok(Language::Ru),
            other => Err(Error::Other(format!("Unsupported language: {}", other))),
        }
    }
}

fn system_language_code() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .and_then(|value| {
            let code: String = value.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
            (code.len() == 2).then(|| code.to_lowercase())
        })
        .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string())
}

/// Localized strings for one language.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    language: String,
    strings: HashMap<String, String>,
}

impl StringTable {
    /// Creates a table from an in-memory map.
    pub fn from_map(language: &str, strings: HashMap<String, String>) -> Self {
        Self {
            language: language.to_string(),
            strings,
        }
    }

    /// Loads the table for `language` from `strings_dir`.
    ///
    /// Falls back to the English table, then to an empty table, so a missing
    /// translation never prevents startup.
    pub fn load(strings_dir: &Path, language: Language) -> Self {
        let code = language.code();
        for candidate in [code.as_str(), FALLBACK_LANGUAGE] {
            let path = strings_dir.join(format!("{}.yaml", candidate));
            if !path.exists() {
                continue;
            }
            match Self::load_file(&path) {
                Ok(strings) => {
                    tracing::debug!("Loaded {} strings from {}", strings.len(), path.display());
                    return Self::from_map(candidate, strings);
                }
                Err(e) => tracing::warn!("Ignoring string table {}: {}", path.display(), e),
            }
        }

        tracing::warn!(
            "No string table for '{}' in {}, using file names as labels",
            code,
            strings_dir.display()
        );
        Self::from_map(&code, HashMap::new())
    }

    fn load_file(path: &Path) -> Result<HashMap<String, String>> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(path.display().to_string(), e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_yaml::from_str(&content)
            .map_err(|e| Error::ConfigParse(path.display().to_string(), e.to_string()))
    }

    /// Returns the language code this table was loaded for.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Looks up a string by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }

    /// Looks up a string, falling back to `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Label for a bundled sound, falling back to its file name.
    pub fn sound_label(&self, file_name: &str) -> String {
        self.get_or(&format!("sound_{}", file_name), file_name).to_string()
    }

    /// Number of strings in the table.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the table holds no strings.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_language_parse_roundtrip() {
        for lang in [Language::System, Language::En, Language::Ru] {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), lang);
        }
        assert!("de".parse::<Language>().is_err());
    }

    #[test]
    fn test_load_requested_language() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("en.yaml"), "sound_bird_robin: Robin\n").unwrap();
        fs::write(temp_dir.path().join("ru.yaml"), "sound_bird_robin: Зарянка\n").unwrap();

        let table = StringTable::load(temp_dir.path(), Language::Ru);
        assert_eq!(table.language(), "ru");
        assert_eq!(table.sound_label("bird_robin"), "Зарянка");
    }

    #[test]
    fn test_missing_language_falls_back_to_english() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("en.yaml"), "group_birds: Birds\n").unwrap();

        let table = StringTable::load(temp_dir.path(), Language::Ru);
        assert_eq!(table.language(), "en");
        assert_eq!(table.get("group_birds"), Some("Birds"));
    }

    #[test]
    fn test_missing_label_uses_file_name() {
        let table = StringTable::default();
        assert!(table.is_empty());
        assert_eq!(table.sound_label("water_creek"), "water_creek");
    }

    #[test]
    fn test_malformed_table_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("en.yaml"), "- not\n- a map\n").unwrap();

        let table = StringTable::load(temp_dir.path(), Language::En);
        assert!(table.is_empty());
    }
}
