//! Headless shell for the Aura ambient-sound mixer.

mod commands;
mod state;

pub use commands::*;
pub use state::*;

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use aura_core::config::{ConfigLoader, DEFAULT_CONFIG_FILE};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Lines kept by the in-memory log buffer.
pub const LOG_BUFFER_LINES: usize = 500;

// ============================================================================
// In-memory log buffer layer for tracing
// ============================================================================

/// A tracing layer that appends every event to a shared ring buffer, so the
/// `log` command can show recent output without scrolling the terminal.
pub struct BufferLayer {
    buffer: LogBuffer,
}

impl BufferLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S: tracing::Subscriber> Layer<S> for BufferLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);

        let line = format!(
            "[{}] {:>5} {}",
            wall_clock(),
            event.metadata().level(),
            visitor.0
        );

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push_back(line);
            while buf.len() > LOG_BUFFER_LINES {
                buf.pop_front();
            }
        }
    }
}

/// Pulls the `message` field out of an event.
struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }
}

/// UTC time of day as HH:MM:SS.
fn wall_clock() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Installs the fmt layer (stderr, `RUST_LOG`, default `info`) and the
/// buffer layer. Returns the buffer.
pub fn init_logging() -> LogBuffer {
    let log_buffer: LogBuffer = Arc::new(Mutex::new(VecDeque::new()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        );

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BufferLayer::new(Arc::clone(&log_buffer)))
        .init();

    log_buffer
}

/// Config path: first CLI argument, then `AURA_CONFIG`, then `aura.yaml`.
fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("AURA_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Reads commands from `input` until `quit` or end of input, writing replies
/// to `output`. Either way the state is cleaned up before returning.
pub fn run_session<R: BufRead, W: Write>(state: &AppState, input: R, mut output: W) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match dispatch(state, line) {
            Ok(reply) => {
                writeln!(output, "{}", reply.text)?;
                if reply.quit {
                    return Ok(());
                }
            }
            Err(e) => writeln!(output, "error: {}", e)?,
        }
        output.flush()?;
    }

    tracing::info!("End of input");
    state.cleanup();
    Ok(())
}

/// Runs the shell on stdin/stdout.
pub fn run() -> anyhow::Result<()> {
    let log_buffer = init_logging();

    let path = config_path();
    let config = ConfigLoader::new(&path)
        .load()
        .with_context(|| format!("loading {}", path.display()))?;

    let state = AppState::new(config, log_buffer)
        .map_err(anyhow::Error::msg)
        .context("opening mixer")?;
    tracing::info!("Aura ready with {} sounds", state.mixer().entries().len());

    let stdin = io::stdin();
    run_session(&state, stdin.lock(), io::stdout())?;
    Ok(())
}
