//! C FFI layer for native hosts (Android/iOS).
//!
//! This module provides a C-compatible API over [`Mixer`]. The host owns the
//! platform side of the background service and notifications; it receives
//! those signals through the callbacks passed to `aura_mixer_new`.

use std::ffi::{CStr, CString};
use std::path::PathBuf;
use std::ptr;
use std::sync::{Arc, Mutex};

use libc::{c_char, c_void};
use tokio::runtime::Runtime;

use crate::config::{ConfigLoader, DEFAULT_CONFIG_FILE};
use crate::error::Result;
use crate::mixer::Mixer;
use crate::player::LifecycleEvent;
use crate::registry::SoundId;
use crate::service::{ForegroundService, Notifier};
use crate::timer::{SleepTimer, TimerDuration};

/// Called when the first sound starts, with the ids currently playing.
pub type ServiceStartCallback =
    Option<unsafe extern "C" fn(ids: *const u32, len: usize, user_data: *mut c_void)>;

/// Called with no payload: service stop, or sleep timer ended.
pub type HostSignalCallback = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// Host callbacks bundled with their opaque context pointer.
struct HostCallbacks {
    service_start: ServiceStartCallback,
    service_stop: HostSignalCallback,
    timer_ended: HostSignalCallback,
    user_data: usize,
}

impl HostCallbacks {
    fn user_data(&self) -> *mut c_void {
        self.user_data as *mut c_void
    }
}

impl ForegroundService for HostCallbacks {
    fn start(&self, playing: &[SoundId]) -> Result<()> {
        if let Some(callback) = self.service_start {
            let ids: Vec<u32> = playing.iter().map(|id| id.0).collect();
            unsafe { callback(ids.as_ptr(), ids.len(), self.user_data()) };
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some(callback) = self.service_stop {
            unsafe { callback(self.user_data()) };
        }
        Ok(())
    }
}

impl Notifier for HostCallbacks {
    fn timer_ended(&self) {
        if let Some(callback) = self.timer_ended {
            unsafe { callback(self.user_data()) };
        }
    }
}

/// Opaque handle for a mixer and its sleep timer.
pub struct FfiMixer {
    mixer: Arc<Mixer>,
    callbacks: Arc<HostCallbacks>,
    timer: Mutex<SleepTimer>,
    /// Drives the sleep timer. Dropped last.
    _runtime: Runtime,
}

fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Creates a mixer from the YAML config at `config_path`.
///
/// A null `config_path` uses `aura.yaml` in the working directory. Any
/// callback may be null.
///
/// # Safety
/// - `config_path` must be null or a valid null-terminated UTF-8 string
/// - `user_data` is passed back verbatim to the callbacks, possibly from
///   another thread
/// - The returned pointer must be freed with `aura_mixer_free`
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_new(
    config_path: *const c_char,
    service_start_cb: ServiceStartCallback,
    service_stop_cb: HostSignalCallback,
    timer_ended_cb: HostSignalCallback,
    user_data: *mut c_void,
) -> *mut FfiMixer {
    let config_path = if config_path.is_null() {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    } else {
        match CStr::from_ptr(config_path).to_str() {
            Ok(s) => PathBuf::from(s),
            Err(_) => return ptr::null_mut(),
        }
    };

    let config = match ConfigLoader::new(&config_path).load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return ptr::null_mut();
        }
    };

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create runtime: {}", e);
            return ptr::null_mut();
        }
    };

    let callbacks = Arc::new(HostCallbacks {
        service_start: service_start_cb,
        service_stop: service_stop_cb,
        timer_ended: timer_ended_cb,
        user_data: user_data as usize,
    });

    let mixer = match Mixer::open(config, Arc::clone(&callbacks) as Arc<dyn ForegroundService>) {
        Ok(mixer) => Arc::new(mixer),
        Err(e) => {
            tracing::error!("Failed to open mixer: {}", e);
            return ptr::null_mut();
        }
    };

    let timer = Mutex::new(SleepTimer::new(runtime.handle().clone()));
    Box::into_raw(Box::new(FfiMixer {
        mixer,
        callbacks,
        timer,
        _runtime: runtime,
    }))
}

/// Frees a mixer, releasing every playback engine.
///
/// # Safety
/// - `mixer` must be a valid pointer returned by `aura_mixer_new`
/// - `mixer` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_free(mixer: *mut FfiMixer) {
    if !mixer.is_null() {
        let mixer = Box::from_raw(mixer);
        if let Ok(mut timer) = mixer.timer.lock() {
            timer.cancel();
        }
        mixer.mixer.store().release();
        drop(mixer);
    }
}

/// Delivers a platform lifecycle transition.
/// `event`: 0 = backgrounded, 1 = foregrounded, 2 = destroyed.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_lifecycle(mixer: *const FfiMixer, event: i32) -> bool {
    if mixer.is_null() {
        return false;
    }
    let event = match event {
        0 => LifecycleEvent::Backgrounded,
        1 => LifecycleEvent::Foregrounded,
        2 => LifecycleEvent::Destroyed,
        _ => return false,
    };
    let handle = &*mixer;
    if event == LifecycleEvent::Destroyed {
        if let Ok(mut timer) = handle.timer.lock() {
            timer.cancel();
        }
    }
    handle.mixer.store().handle_event(event).is_ok()
}

// ============================================================================
// Playback
// ============================================================================

/// Toggles one sound. Returns 1 if now playing, 0 if now paused, -1 on error.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_toggle(mixer: *const FfiMixer, id: u32) -> i32 {
    if mixer.is_null() {
        return -1;
    }
    match (*mixer).mixer.store().toggle(SoundId(id)) {
        Ok(playing) => playing as i32,
        Err(e) => {
            tracing::warn!("Toggle failed: {}", e);
            -1
        }
    }
}

/// Stops every sound. Returns how many were playing, or -1 on error.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_stop_all(mixer: *const FfiMixer) -> i32 {
    if mixer.is_null() {
        return -1;
    }
    match (*mixer).mixer.store().stop_all() {
        Ok(stopped) => stopped as i32,
        Err(_) => -1,
    }
}

/// Restarts the persisted playing set. Returns how many started, or -1.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_resume(mixer: *const FfiMixer) -> i32 {
    if mixer.is_null() {
        return -1;
    }
    match (*mixer).mixer.store().resume() {
        Ok(started) => started.len() as i32,
        Err(_) => -1,
    }
}

/// Sets the volume (0.0-1.0, clamped) of one sound.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_set_volume(mixer: *const FfiMixer, id: u32, volume: f32) -> bool {
    if mixer.is_null() {
        return false;
    }
    (*mixer).mixer.store().set_volume(SoundId(id), volume).is_ok()
}

/// Enables or disables playback while the host is in the background.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_set_play_in_background(
    mixer: *const FfiMixer,
    enabled: bool,
) -> bool {
    if mixer.is_null() {
        return false;
    }
    (*mixer).mixer.store().set_play_in_background(enabled).is_ok()
}

// ============================================================================
// Sleep Timer
// ============================================================================

/// Starts (or restarts) the sleep timer. Returns false for zero minutes.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_start_timer(mixer: *const FfiMixer, minutes: u32) -> bool {
    if mixer.is_null() {
        return false;
    }
    let handle = &*mixer;
    let duration = match TimerDuration::custom(minutes) {
        Ok(duration) => duration,
        Err(_) => return false,
    };
    let Ok(mut timer) = handle.timer.lock() else {
        return false;
    };

    let target = Arc::clone(&handle.mixer);
    let notifier = Arc::clone(&handle.callbacks);
    timer.start(duration, move || target.on_timer_expired(notifier.as_ref()));
    true
}

/// Cancels the sleep timer without stopping playback.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_cancel_timer(mixer: *const FfiMixer) {
    if mixer.is_null() {
        return;
    }
    if let Ok(mut timer) = (*mixer).timer.lock() {
        timer.cancel();
    }
}

/// Seconds left on the sleep timer, or -1 when it is not running.
///
/// # Safety
/// - `mixer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_timer_remaining(mixer: *const FfiMixer) -> i64 {
    if mixer.is_null() {
        return -1;
    }
    (*mixer)
        .timer
        .lock()
        .ok()
        .and_then(|timer| timer.remaining())
        .map_or(-1, i64::from)
}

// ============================================================================
// Status
// ============================================================================

/// Returns the mixer status as JSON.
///
/// # Safety
/// - `mixer` must be a valid pointer
/// - The returned string must be freed with `aura_free_string`
#[no_mangle]
pub unsafe extern "C" fn aura_mixer_status_json(mixer: *const FfiMixer) -> *mut c_char {
    if mixer.is_null() {
        return ptr::null_mut();
    }
    match (*mixer).mixer.status_json() {
        Ok(json) => to_c_string(json),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Frees a string returned by an FFI function.
///
/// # Safety
/// - `s` must be a valid pointer returned by an aura FFI function, or null
#[no_mangle]
pub unsafe extern "C" fn aura_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Returns the library version as a string.
///
/// The returned string must be freed with `aura_free_string`.
#[no_mangle]
pub extern "C" fn aura_version() -> *mut c_char {
    to_c_string(env!("CARGO_PKG_VERSION").to_string())
}

// ============================================================================
// Tests
// ============================================================================
