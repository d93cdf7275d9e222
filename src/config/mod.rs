//! Configuration module for commstream.
//!
//! This module provides TOML-based configuration with environment variable
//! overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of
//! priority):
//!
//! 1. `COMMSTREAM_CONFIG` environment variable (explicit path)
//! 2. `./commstream.toml` (current directory)
//! 3. `~/.config/commstream/commstream.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\commstream\commstream.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any common configuration value can be overridden via environment
//! variables following the pattern `COMMSTREAM_<SECTION>_<KEY>`, e.g.
//! `COMMSTREAM_SERIAL_BAUD_RATE=9600` or `COMMSTREAM_DISPLAY_HEX=true`.

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{resolve_config_path, ConfigLoader};
pub use schema::{
    Config, DisplaySection, LogFormat, LoggingSection, ReceiveSection, SequenceSection,
    SerialSection,
};
