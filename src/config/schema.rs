//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use crate::pipeline::format::DisplayOptions;
use crate::pipeline::receive::ReceiveTuning;
use crate::port::{DataBits, FlowControl, Parity, SerialSettings, StopBits};
use crate::sequencer::{parse_terminator, SequenceConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line settings
    pub serial: SerialSection,
    /// Display/rendering flags
    pub display: DisplaySection,
    /// Receive loop tuning
    pub receive: ReceiveSection,
    /// Command sequencer settings
    pub sequence: SequenceSection,
    /// Logging configuration
    pub logging: LoggingSection,
}

/// Serial line settings section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    /// Default baud rate for new connections
    pub baud_rate: u32,
    /// Number of data bits
    pub data_bits: DataBits,
    /// Parity checking mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Flow control mode
    pub flow_control: FlowControl,
    /// Initial DTR line level
    pub dtr: bool,
    /// Initial RTS line level
    pub rts: bool,
    /// Blocking read/write timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            dtr: false,
            rts: false,
            timeout_ms: 50,
        }
    }
}

impl SerialSection {
    /// Build channel settings from this section.
    pub fn settings(&self) -> SerialSettings {
        SerialSettings {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
            dtr: self.dtr,
            rts: self.rts,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Display flags section. Changeable at runtime through [`DisplayOptions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// Render bytes as hex instead of text
    pub hex: bool,
    /// Prefix lines with reconstructed timestamps
    pub timestamps: bool,
    /// Escape control characters in text mode
    pub control_symbols: bool,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            hex: false,
            timestamps: true,
            control_symbols: false,
        }
    }
}

impl DisplaySection {
    pub fn options(&self) -> DisplayOptions {
        DisplayOptions {
            hex: self.hex,
            timestamps: self.timestamps,
            control_symbols: self.control_symbols,
        }
    }
}

/// Receive loop tuning section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveSection {
    /// Upper bound on bytes consumed per read
    pub chunk_size: usize,
    /// Poll delay while bytes are pending, in milliseconds
    pub min_poll_ms: u64,
    /// Poll delay under high observed traffic, in milliseconds
    pub fast_poll_ms: u64,
    /// Poll delay on a quiet line, in milliseconds
    pub base_poll_ms: u64,
    /// Bytes/sec above which the fast delay is used
    pub fast_threshold: f64,
    /// Inactivity window for flushing an unterminated tail, in milliseconds
    pub buffer_timeout_ms: u64,
    /// Batch size threshold in lines
    pub batch_max_lines: usize,
    /// Batch age threshold in milliseconds
    pub batch_max_delay_ms: u64,
}

impl Default for ReceiveSection {
    fn default() -> Self {
        let tuning = ReceiveTuning::default();
        Self {
            chunk_size: tuning.chunk_size,
            min_poll_ms: tuning.min_poll.as_millis() as u64,
            fast_poll_ms: tuning.fast_poll.as_millis() as u64,
            base_poll_ms: tuning.base_poll.as_millis() as u64,
            fast_threshold: tuning.fast_threshold,
            buffer_timeout_ms: tuning.buffer_timeout.as_millis() as u64,
            batch_max_lines: tuning.batch_max_lines,
            batch_max_delay_ms: tuning.batch_max_delay.as_millis() as u64,
        }
    }
}

impl ReceiveSection {
    /// Build receive loop tuning from this section.
    pub fn tuning(&self) -> ReceiveTuning {
        ReceiveTuning {
            chunk_size: self.chunk_size,
            min_poll: Duration::from_millis(self.min_poll_ms),
            fast_poll: Duration::from_millis(self.fast_poll_ms),
            base_poll: Duration::from_millis(self.base_poll_ms),
            fast_threshold: self.fast_threshold,
            buffer_timeout: Duration::from_millis(self.buffer_timeout_ms),
            batch_max_lines: self.batch_max_lines,
            batch_max_delay: Duration::from_millis(self.batch_max_delay_ms),
        }
    }
}

/// Command sequencer section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceSection {
    /// Terminator as a hex string (e.g. "0D0A"); malformed values fall
    /// back to no terminator
    pub terminator: String,
    /// Enforced spacing for commands with a zero interval, in milliseconds
    pub settle_floor_ms: u64,
}

impl Default for SequenceSection {
    fn default() -> Self {
        Self {
            terminator: "0D0A".to_string(),
            settle_floor_ms: 3000,
        }
    }
}

impl SequenceSection {
    /// Build sequencer settings from this section.
    pub fn sequence_config(&self) -> SequenceConfig {
        SequenceConfig {
            terminator: parse_terminator(&self.terminator),
            settle_floor: Duration::from_millis(self.settle_floor_ms),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level filter: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log file path (optional; stderr when unset)
    pub file: Option<PathBuf>,
    /// Log format: "pretty" or "compact"
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty multi-line format
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.receive.base_poll_ms, 20);
        assert_eq!(config.sequence.terminator, "0D0A");
        assert!(config.display.timestamps);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[receive]"));
        assert!(toml_str.contains("[sequence]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial]
            baud_rate = 9600
            parity = "even"

            [display]
            hex = true

            [sequence]
            settle_floor_ms = 500
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.parity, Parity::Even);
        assert!(config.display.hex);
        assert_eq!(config.sequence.settle_floor_ms, 500);
        // Defaults should still work
        assert_eq!(config.receive.batch_max_lines, 50);
    }

    #[test]
    fn test_sequence_config_parses_terminator() {
        let section = SequenceSection::default();
        let config = section.sequence_config();
        assert_eq!(config.terminator, Some(vec![0x0D, 0x0A]));
        assert_eq!(config.settle_floor, Duration::from_secs(3));
    }

    #[test]
    fn test_malformed_terminator_falls_back() {
        let section = SequenceSection {
            terminator: "not-hex".into(),
            settle_floor_ms: 3000,
        };
        assert_eq!(section.sequence_config().terminator, None);
    }

    #[test]
    fn test_receive_tuning_round_trip() {
        let section = ReceiveSection::default();
        let tuning = section.tuning();
        assert_eq!(tuning.min_poll, Duration::from_millis(5));
        assert_eq!(tuning.base_poll, Duration::from_millis(20));
        assert_eq!(tuning.batch_max_lines, 50);
    }
}
