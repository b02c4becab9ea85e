//! Shell commands: parsing and one handler per user action.
//!
//! Handlers return the text to print, or an error string for the user.

use std::str::FromStr;

use aura_core::player::LifecycleEvent;
use aura_core::prefs::Theme;
use aura_core::registry::SoundId;
use aura_core::strings::Language;
use aura_core::timer::{format_remaining, TimerDuration};

use crate::state::{AppState, SoundView};

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    List,
    Groups,
    Toggle(SoundId),
    Start(SoundId),
    Pause(SoundId),
    Stop(SoundId),
    StopAll,
    Resume,
    Volume(SoundId, f32),
    Timer(Option<u32>),
    CancelTimer,
    Background(bool),
    Theme(Theme),
    Language(Language),
    Status,
    Log,
    ClearLog,
    Lifecycle(LifecycleEvent),
    Quit,
}

/// Result of running one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub quit: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

pub const HELP: &str = "\
Commands:
  list                        sounds with their state
  groups                      sounds grouped by kind
  toggle|start|pause|stop <id>
  stop-all                    stop everything and remember what played
  resume                      restart what was playing
  volume <id> <0.0-1.0>
  timer [minutes|custom <minutes>]
  cancel-timer
  background on|off           keep playing while in the background
  theme system|light|dark
  language system|en|ru
  status                      JSON snapshot
  log | clear-log
  background-event | foreground-event
  quit";

fn parse_id(arg: Option<&str>) -> Result<SoundId, String> {
    let arg = arg.ok_or_else(|| "Missing sound id".to_string())?;
    SoundId::from_str(arg).map_err(|_| format!("Invalid sound id: '{}'", arg))
}

fn parse_minutes(arg: &str) -> Result<u32, String> {
    arg.parse::<u32>()
        .map_err(|_| format!("Invalid minutes: '{}'", arg))
}

fn parse_switch(arg: Option<&str>) -> Result<bool, String> {
    match arg {
        Some("on") | Some("true") | Some("yes") => Ok(true),
        Some("off") | Some("false") | Some("no") => Ok(false),
        other => Err(format!("Expected on|off, got '{}'", other.unwrap_or(""))),
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or_else(|| "Empty command".to_string())?;
        let command = match name {
            "help" | "?" => Command::Help,
            "list" | "ls" => Command::List,
            "groups" => Command::Groups,
            "toggle" => Command::Toggle(parse_id(words.next())?),
            "start" | "play" => Command::Start(parse_id(words.next())?),
            "pause" => Command::Pause(parse_id(words.next())?),
            "stop" => Command::Stop(parse_id(words.next())?),
            "stop-all" => Command::StopAll,
            "resume" => Command::Resume,
            "volume" => {
                let id = parse_id(words.next())?;
                let value = words.next().ok_or_else(|| "Missing volume".to_string())?;
                let volume = value
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid volume: '{}'", value))?;
                Command::Volume(id, volume)
            }
            "timer" => match words.next() {
                None => Command::Timer(None),
                Some("custom") => {
                    let minutes = words
                        .next()
                        .ok_or_else(|| "Missing minutes".to_string())?;
                    Command::Timer(Some(parse_minutes(minutes)?))
                }
                Some(minutes) => Command::Timer(Some(parse_minutes(minutes)?)),
            },
            "cancel-timer" => Command::CancelTimer,
            "background" => Command::Background(parse_switch(words.next())?),
            "theme" => {
                let value = words.next().unwrap_or("");
                Command::Theme(Theme::from_str(value).map_err(|e| e.to_string())?)
            }
            "language" => {
                let value = words.next().unwrap_or("");
                Command::Language(Language::from_str(value).map_err(|e| e.to_string())?)
            }
            "status" => Command::Status,
            "log" => Command::Log,
            "clear-log" => Command::ClearLog,
            "background-event" => Command::Lifecycle(LifecycleEvent::Backgrounded),
            "foreground-event" => Command::Lifecycle(LifecycleEvent::Foregrounded),
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("Unknown command: '{}'. Type 'help'.", other)),
        };
        Ok(command)
    }
}

fn sound_line(sound: &SoundView) -> String {
    format!(
        "{}  [{}]  {:<24} vol {:.2}",
        sound.id,
        if sound.playing { "x" } else { " " },
        sound.label,
        sound.volume
    )
}

/// Lists every sound.
pub fn list_sounds(state: &AppState) -> Result<String, String> {
    let sounds = state.list_sounds()?;
    if sounds.is_empty() {
        return Ok("No sounds found".to_string());
    }
    Ok(sounds.iter().map(sound_line).collect::<Vec<_>>().join("\n"))
}

/// Lists sounds under their group titles.
pub fn list_groups(state: &AppState) -> Result<String, String> {
    let mut lines = Vec::new();
    for group in state.get_groups()? {
        lines.push(format!("{}:", group.title));
        lines.extend(group.sounds.iter().map(|s| format!("  {}", sound_line(s))));
    }
    Ok(lines.join("\n"))
}

/// Toggles a sound. Reports the new state.
pub fn toggle_sound(state: &AppState, id: SoundId) -> Result<String, String> {
    let playing = state.toggle(id)?;
    Ok(format!("{} {}", id, if playing { "playing" } else { "paused" }))
}

pub fn start_sound(state: &AppState, id: SoundId) -> Result<String, String> {
    if state.start(id)? {
        Ok(format!("{} playing", id))
    } else {
        Err(format!("{} could not be started, see log", id))
    }
}

pub fn pause_sound(state: &AppState, id: SoundId) -> Result<String, String> {
    state.pause(id)?;
    Ok(format!("{} paused", id))
}

pub fn stop_sound(state: &AppState, id: SoundId) -> Result<String, String> {
    state.stop(id)?;
    Ok(format!("{} stopped", id))
}

pub fn stop_all(state: &AppState) -> Result<String, String> {
    let stopped = state.stop_all()?;
    Ok(format!("Stopped {} sounds", stopped))
}

pub fn resume_sounds(state: &AppState) -> Result<String, String> {
    let started = state.resume()?;
    Ok(format!("Resumed {} sounds", started.len()))
}

pub fn set_volume(state: &AppState, id: SoundId, volume: f32) -> Result<String, String> {
    let applied = state.set_volume(id, volume)?;
    Ok(format!("{} volume {:.2}", id, applied))
}

/// Starts the sleep timer, or lists the presets when no minutes are given.
pub fn start_timer(state: &AppState, minutes: Option<u32>) -> Result<String, String> {
    let Some(minutes) = minutes else {
        let presets: Vec<String> = state
            .timer_presets()
            .iter()
            .map(|m| m.to_string())
            .collect();
        return Ok(format!("Presets (minutes): {}", presets.join(", ")));
    };
    let duration = TimerDuration::custom(minutes).map_err(|e| e.to_string())?;
    state.start_timer(duration)?;
    Ok(format!(
        "Sleep timer: {}",
        format_remaining(duration.seconds())
    ))
}

pub fn cancel_timer(state: &AppState) -> Result<String, String> {
    if state.cancel_timer()? {
        Ok("Sleep timer cancelled".to_string())
    } else {
        Ok("No sleep timer running".to_string())
    }
}

pub fn set_background(state: &AppState, enabled: bool) -> Result<String, String> {
    state.set_play_in_background(enabled)?;
    Ok(format!(
        "Background playback {}",
        if enabled { "on" } else { "off" }
    ))
}

pub fn set_theme(state: &AppState, theme: Theme) -> Result<String, String> {
    state.set_theme(theme)?;
    Ok(format!("Theme: {}", theme))
}

pub fn set_language(state: &AppState, language: Language) -> Result<String, String> {
    state.set_language(language)?;
    Ok(format!("Language: {} (applies on next launch)", language))
}

/// Returns the status snapshot as pretty JSON.
pub fn get_status(state: &AppState) -> Result<String, String> {
    let status = state.get_status()?;
    serde_json::to_string_pretty(&status).map_err(|e| e.to_string())
}

pub fn get_debug_log(state: &AppState) -> Result<String, String> {
    Ok(state.get_debug_log().join("\n"))
}

pub fn clear_debug_log(state: &AppState) -> Result<String, String> {
    state.clear_debug_log();
    Ok("Log cleared".to_string())
}

pub fn lifecycle(state: &AppState, event: LifecycleEvent) -> Result<String, String> {
    state.lifecycle(event)?;
    Ok(format!("{:?}", event))
}

/// Runs one command against the state.
pub fn execute(state: &AppState, command: Command) -> Result<Reply, String> {
    let text = match command {
        Command::Help => Ok(HELP.to_string()),
        Command::List => list_sounds(state),
        Command::Groups => list_groups(state),
        Command::Toggle(id) => toggle_sound(state, id),
        Command::Start(id) => start_sound(state, id),
        Command::Pause(id) => pause_sound(state, id),
        Command::Stop(id) => stop_sound(state, id),
        Command::StopAll => stop_all(state),
        Command::Resume => resume_sounds(state),
        Command::Volume(id, volume) => set_volume(state, id, volume),
        Command::Timer(minutes) => start_timer(state, minutes),
        Command::CancelTimer => cancel_timer(state),
        Command::Background(enabled) => set_background(state, enabled),
        Command::Theme(theme) => set_theme(state, theme),
        Command::Language(language) => set_language(state, language),
        Command::Status => get_status(state),
        Command::Log => get_debug_log(state),
        Command::ClearLog => clear_debug_log(state),
        Command::Lifecycle(event) => lifecycle(state, event),
        Command::Quit => {
            state.cleanup();
            return Ok(Reply {
                text: "Bye".to_string(),
                quit: true,
            });
        }
    }?;
    Ok(Reply::text(text))
}

/// Parses and runs one input line.
pub fn dispatch(state: &AppState, line: &str) -> Result<Reply, String> {
    let command = Command::from_str(line)?;
    tracing::debug!("Command: {:?}", command);
    execute(state, command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sound_commands() {
        assert_eq!(
            "toggle 2131623936".parse::<Command>().unwrap(),
            Command::Toggle(SoundId(2131623936))
        );
        assert_eq!("  stop-all ".parse::<Command>().unwrap(), Command::StopAll);
        assert_eq!(
            "volume 5 0.25".parse::<Command>().unwrap(),
            Command::Volume(SoundId(5), 0.25)
        );
    }

    #[test]
    fn test_parse_timer() {
        assert_eq!("timer".parse::<Command>().unwrap(), Command::Timer(None));
        assert_eq!("timer 30".parse::<Command>().unwrap(), Command::Timer(Some(30)));
        assert_eq!(
            "timer custom 45".parse::<Command>().unwrap(),
            Command::Timer(Some(45))
        );
        assert!("timer custom".parse::<Command>().is_err());
        assert!("timer soon".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_settings() {
        assert_eq!(
            "background off".parse::<Command>().unwrap(),
            Command::Background(false)
        );
        assert_eq!("theme dark".parse::<Command>().unwrap(), Command::Theme(Theme::Dark));
        assert_eq!(
            "language ru".parse::<Command>().unwrap(),
            Command::Language(Language::Ru)
        );
        assert!("theme sepia".parse::<Command>().is_err());
        assert!("background maybe".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_lifecycle() {
        assert_eq!(
            "background-event".parse::<Command>().unwrap(),
            Command::Lifecycle(LifecycleEvent::Backgrounded)
        );
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Command>().is_err());
        assert!("toggle".parse::<Command>().is_err());
        assert!("toggle abc".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }
}
