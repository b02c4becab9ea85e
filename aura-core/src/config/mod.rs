//! Configuration loading and validation.

mod loader;
mod types;
mod validator;

pub use loader::ConfigLoader;
pub use types::{AppConfig, DEFAULT_CONFIG_FILE};
pub use validator::ConfigValidator;
