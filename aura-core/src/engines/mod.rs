//! Playback engines: the per-sound decode + output handle.
//!
//! A [`PlaybackEngine`] is owned by exactly one channel of the player store
//! and released exactly once. [`EngineFactory`] acquires one per bundled
//! sound at initialization.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::registry::SoundEntry;

pub mod audio_output;
mod kira_engine;
mod virtual_engine;

pub use kira_engine::{KiraEngine, KiraEngineFactory};
pub use virtual_engine::{VirtualEngine, VirtualEngineFactory, VirtualEngineProbe};

/// Invoked when an engine finishes playing its data naturally.
/// May be called on an engine-internal thread.
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// One playback handle bound to one audio asset.
pub trait PlaybackEngine: Send {
    /// Stops playback and unbinds the data source.
    fn reset(&mut self);

    /// Binds `path` as the data source and prepares it synchronously.
    fn prepare(&mut self, path: &Path) -> Result<()>;

    fn set_looping(&mut self, looping: bool);

    /// Repositions playback. Before `start` the position applies to the next start.
    fn seek_to(&mut self, position_ms: u32) -> Result<()>;

    /// Starts (or resumes) producing audio.
    fn start(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Whether the engine is actively producing audio.
    fn is_playing(&self) -> bool;

    /// Current playback position in milliseconds.
    fn position_ms(&self) -> u32;

    /// Sets per-channel gain, each in 0.0..=1.0.
    fn set_volume(&mut self, left: f32, right: f32);

    fn set_on_completion(&mut self, callback: CompletionCallback);

    /// Frees the underlying resources. No operation is valid afterwards.
    fn release(&mut self);
}

/// Acquires engine handles for bundled sounds.
pub trait EngineFactory: Send + Sync {
    /// Creates a looping-capable engine already prepared with the entry's asset.
    fn create(&self, entry: &SoundEntry) -> Result<Box<dyn PlaybackEngine>>;

    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Picks the kira backend when an output device exists, otherwise the
/// silent [`VirtualEngine`] so the mixer still tracks state.
pub fn default_factory() -> Box<dyn EngineFactory> {
    match KiraEngineFactory::new() {
        Ok(factory) => Box::new(factory),
        Err(e) => {
            tracing::warn!("{}; falling back to silent playback", e);
            Box::new(VirtualEngineFactory::new())
        }
    }
}
