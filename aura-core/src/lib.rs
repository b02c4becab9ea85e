//! Aura Core - ambient nature-sound mixer.
//!
//! This library provides:
//! - Discovery and labelling of bundled sound assets
//! - A player state store with one looping channel per sound
//! - Persistence of the playing set and app settings
//! - A sleep timer that stops playback when it runs out
//! - Playback engines (kira, or a silent fallback)
//! - FFI layer for native hosts
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aura_core::config::ConfigLoader;
//! use aura_core::mixer::Mixer;
//! use aura_core::service::NoopService;
//!
//! let config = ConfigLoader::new("aura.yaml").load().unwrap();
//! let mixer = Mixer::open(config, Arc::new(NoopService)).unwrap();
//!
//! let first = mixer.entries()[0].id;
//! mixer.store().toggle(first).unwrap();
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod ffi;
pub mod mixer;
pub mod player;
pub mod prefs;
pub mod registry;
pub mod service;
pub mod strings;
pub mod timer;

pub use error::{Error, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::config::{AppConfig, ConfigLoader};
    pub use crate::engines::{EngineFactory, PlaybackEngine};
    pub use crate::error::{Error, Result};
    pub use crate::mixer::{Mixer, MixerStatus};
    pub use crate::player::{
        AcquireFailurePolicy, ChannelStatus, LifecycleEvent, PlayerStore, SaveMode,
    };
    pub use crate::prefs::{AppSettings, SoundPreferences, Theme};
    pub use crate::registry::{SoundEntry, SoundGroup, SoundId};
    pub use crate::service::{ForegroundService, Notifier};
    pub use crate::strings::Language;
    pub use crate::timer::{format_remaining, SleepTimer, TimerDuration};
}
