//! Core traits for the serial channel abstraction.
//!
//! Defines the `SerialChannel` trait that allows both real serial ports
//! and mock implementations to be used interchangeably by the receive
//! loop and the command sequencer.

use super::error::ChannelError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Maximum number of bytes a single `read_available` call may return.
///
/// Bounding the chunk size keeps one iteration of the receive loop from
/// stalling on a device that streams continuously.
pub const MAX_CHUNK_SIZE: usize = 4096;

/// Line settings for a serial connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Baud rate (bits per second). Drives per-byte timing math downstream.
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Initial DTR line level.
    pub dtr: bool,

    /// Initial RTS line level.
    pub rts: bool,

    /// Read/write timeout for blocking operations.
    pub timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            dtr: false,
            rts: false,
            timeout: Duration::from_millis(50),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Trait for serial channel I/O operations.
///
/// Abstracts over an open serial connection so that both real hardware
/// ports and mock implementations can drive the pipeline.
///
/// # Caller contract
///
/// A channel is a single-reader, single-writer resource for the lifetime
/// of a session: one thread reads (the receive loop), one thread writes
/// (the command sequencer). The trait does not enforce this; callers
/// serialize access through [`SharedChannel`].
pub trait SerialChannel: Send + std::fmt::Debug {
    /// Read whatever bytes are currently pending, without blocking.
    ///
    /// Returns an empty chunk when nothing is pending. Never returns more
    /// than `max` bytes per call.
    fn read_available(&mut self, max: usize) -> Result<Vec<u8>, ChannelError>;

    /// Write bytes to the channel.
    ///
    /// Returns the number of bytes actually written. Writes are not atomic
    /// for large payloads; callers chunk large sends themselves.
    fn write(&mut self, data: &[u8]) -> Result<usize, ChannelError>;

    /// Number of bytes waiting in the receive buffer.
    fn bytes_pending(&mut self) -> Result<usize, ChannelError>;

    /// The configured baud rate.
    fn baud_rate(&self) -> u32;

    /// Whether the channel is still usable.
    fn is_open(&self) -> bool;

    /// Close the channel. Subsequent reads and writes fail with `Closed`.
    fn close(&mut self);

    /// Get the name/path of this channel.
    fn name(&self) -> &str;
}

/// A channel handle shared between the receive loop and the sequencer.
///
/// Both workers lock per operation; the single-reader/single-writer
/// contract of [`SerialChannel`] still applies.
pub type SharedChannel = Arc<Mutex<Box<dyn SerialChannel>>>;

/// Wrap a channel for use by both workers.
pub fn share(channel: Box<dyn SerialChannel>) -> SharedChannel {
    Arc::new(Mutex::new(channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.flow_control, FlowControl::None);
        assert!(!settings.dtr);
        assert!(!settings.rts);
    }

    #[test]
    fn test_data_bits_conversion() {
        let bits = DataBits::Eight;
        let serialport_bits: serialport::DataBits = bits.into();
        assert_eq!(serialport_bits, serialport::DataBits::Eight);
    }

    #[test]
    fn test_parity_conversion() {
        let parity = Parity::Even;
        let serialport_parity: serialport::Parity = parity.into();
        assert_eq!(serialport_parity, serialport::Parity::Even);
    }

    #[test]
    fn test_flow_control_conversion() {
        let flow = FlowControl::Hardware;
        let serialport_flow: serialport::FlowControl = flow.into();
        assert_eq!(serialport_flow, serialport::FlowControl::Hardware);
    }

    #[test]
    fn test_stop_bits_conversion() {
        let stop_bits = StopBits::Two;
        let serialport_stop_bits: serialport::StopBits = stop_bits.into();
        assert_eq!(serialport_stop_bits, serialport::StopBits::Two);
    }
}
