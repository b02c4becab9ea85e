//! Error types for aura-core.

use thiserror::Error;

/// Main error type for the aura-core library.
#[derive(Error, Debug)]
pub enum Error {
    // Config errors
    #[error("Failed to load config '{0}': {1}")]
    ConfigLoad(String, String),

    #[error("Failed to parse config '{0}': {1}")]
    ConfigParse(String, String),

    #[error("Config validation error in '{0}': {1}")]
    ConfigValidation(String, String),

    // Engine errors
    #[error("Failed to acquire playback engine for '{0}': {1}")]
    EngineAcquire(String, String),

    #[error("Playback engine error: {0}")]
    EngineOperation(String),

    #[error("No audio device available")]
    NoAudioDevice,

    // Player store errors
    #[error("Unknown sound id: {0}")]
    UnknownSound(u32),

    #[error("Player store has been released")]
    Released,

    #[error("Failed to acquire player state lock")]
    StateLock,

    // Collaborator errors
    #[error("Foreground service error: {0}")]
    ForegroundService(String),

    #[error("Preference storage error for '{0}': {1}")]
    Prefs(String, String),

    // Timer errors
    #[error("Invalid sleep timer duration: {0}")]
    InvalidTimer(String),

    // Generic errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
