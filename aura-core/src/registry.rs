//! Sound registry: enumerates the bundled audio assets at startup.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::strings::StringTable;

/// First id handed out to bundled sounds, in asset-name order.
pub const RAW_RESOURCE_BASE: u32 = 0x7f0e_0000;

/// File extensions recognized as bundled audio.
const AUDIO_EXTENSIONS: &[&str] = &["ogg", "mp3", "wav", "flac", "m4a"];

/// Stable integer key naming a bundled audio asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundId(pub u32);

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SoundId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(SoundId)
    }
}

/// One bundled sound. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundEntry {
    pub id: SoundId,
    /// Asset file stem, used for group classification.
    pub file_name: String,
    /// Localized display label (the file name when no translation exists).
    pub label: String,
    /// Full path of the asset on disk.
    pub path: PathBuf,
}

impl SoundEntry {
    /// Returns the group this sound belongs to, if any.
    pub fn group(&self) -> Option<SoundGroup> {
        SoundGroup::classify(&self.file_name)
    }
}

/// Sound groups shown in the mixer, classified by file-name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundGroup {
    Birds,
    Water,
    Forest,
    Weather,
    Animals,
}

impl SoundGroup {
    /// All groups in display order.
    pub const ALL: [SoundGroup; 5] = [
        SoundGroup::Birds,
        SoundGroup::Water,
        SoundGroup::Forest,
        SoundGroup::Weather,
        SoundGroup::Animals,
    ];

    /// File-name prefix that puts a sound in this group.
    pub fn prefix(&self) -> &'static str {
        match self {
            SoundGroup::Birds => "bird",
            SoundGroup::Water => "water",
            SoundGroup::Forest => "forest",
            SoundGroup::Weather => "weather",
            SoundGroup::Animals => "animal",
        }
    }

    /// String-table key of the group title.
    pub fn label_key(&self) -> &'static str {
        match self {
            SoundGroup::Birds => "group_birds",
            SoundGroup::Water => "group_water",
            SoundGroup::Forest => "group_forest",
            SoundGroup::Weather => "group_weather",
            SoundGroup::Animals => "group_animals",
        }
    }

    /// English title used when the string table has none.
    pub fn default_title(&self) -> &'static str {
        match self {
            SoundGroup::Birds => "Birds",
            SoundGroup::Water => "Water",
            SoundGroup::Forest => "Forest",
            SoundGroup::Weather => "Weather",
            SoundGroup::Animals => "Animals",
        }
    }

    /// Localized title of the group.
    pub fn title<'a>(&self, strings: &'a StringTable) -> &'a str {
        strings.get_or(self.label_key(), self.default_title())
    }

    /// Classifies a file name by prefix.
    pub fn classify(file_name: &str) -> Option<SoundGroup> {
        Self::ALL
            .into_iter()
            .find(|group| file_name.starts_with(group.prefix()))
    }
}

/// Groups entries in display order. Empty groups are kept so the UI can
/// render every section; ungrouped entries are left out.
pub fn group_entries(entries: &[SoundEntry]) -> Vec<(SoundGroup, Vec<SoundEntry>)> {
    SoundGroup::ALL
        .into_iter()
        .map(|group| {
            let members = entries
                .iter()
                .filter(|e| e.group() == Some(group))
                .cloned()
                .collect();
            (group, members)
        })
        .collect()
}

/// Enumerates bundled audio assets from a directory.
pub struct SoundRegistry {
    sounds_dir: PathBuf,
    strings: StringTable,
}

impl SoundRegistry {
    /// Creates a registry over `sounds_dir`, labelling entries from `strings`.
    pub fn new<P: AsRef<Path>>(sounds_dir: P, strings: StringTable) -> Self {
        Self {
            sounds_dir: sounds_dir.as_ref().to_path_buf(),
            strings,
        }
    }

    /// Returns the directory this registry scans.
    pub fn sounds_dir(&self) -> &Path {
        &self.sounds_dir
    }

    /// Returns the string table used for labels.
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Loads all bundled sounds, sorted by file name.
    ///
    /// Never fails: an unreadable directory yields an empty list.
    pub fn load(&self) -> Vec<SoundEntry> {
        let files = match self.discover_files() {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("No bundled sounds loaded: {}", e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(files.len());

        for (file_name, path) in files {
            if !seen.insert(file_name.clone()) {
                tracing::warn!("Skipping duplicate sound asset: {}", path.display());
                continue;
            }

            let id = SoundId(RAW_RESOURCE_BASE + entries.len() as u32);
            let label = self.strings.sound_label(&file_name);
            tracing::debug!(
                "Loaded sound: id={}, file_name={}, label={}",
                id,
                file_name,
                label
            );
            entries.push(SoundEntry {
                id,
                file_name,
                label,
                path,
            });
        }

        tracing::info!(
            "Loaded {} sounds from {}",
            entries.len(),
            self.sounds_dir.display()
        );
        entries
    }

    /// Returns (file stem, path) pairs of audio files, sorted by file name.
    fn discover_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let dir_entries = fs::read_dir(&self.sounds_dir)
            .map_err(|e| Error::ConfigLoad(self.sounds_dir.display().to_string(), e.to_string()))?;

        let mut files: Vec<(String, PathBuf)> = dir_entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_audio_file(path))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                Some((stem, path))
            })
            .collect();

        files.sort_by(|a, b| a.1.file_name().cmp(&b.1.file_name()));
        Ok(files)
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}
