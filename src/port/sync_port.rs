//! System serial channel implementation.
//!
//! Wraps the `serialport` crate with our own `SerialChannel` trait for
//! dependency injection and testing.

use super::error::ChannelError;
use super::traits::{SerialChannel, SerialSettings};
use std::io::{Read, Write};

/// Serial channel backed by a real OS serial port.
pub struct SystemSerialChannel {
    /// The underlying serial port implementation. `None` once closed.
    port: Option<Box<dyn serialport::SerialPort>>,
    /// The port name/path for identification.
    name: String,
    /// Baud rate kept alongside the handle so timing math never needs to
    /// query the OS.
    baud_rate: u32,
}

impl SystemSerialChannel {
    /// Open a serial port with the given settings.
    ///
    /// # Arguments
    /// * `port_name` - The system path to the serial port (e.g., "/dev/ttyUSB0" or "COM3")
    /// * `settings` - Line settings for the port
    ///
    /// # Example
    /// ```no_run
    /// use commstream::port::{SystemSerialChannel, SerialSettings};
    ///
    /// let settings = SerialSettings::default();
    /// let channel = SystemSerialChannel::open("/dev/ttyUSB0", settings)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, settings: SerialSettings) -> Result<Self, ChannelError> {
        let mut port = serialport::new(port_name, settings.baud_rate)
            .data_bits(settings.data_bits.into())
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .flow_control(settings.flow_control.into())
            .timeout(settings.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => ChannelError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => ChannelError::config(e.to_string()),
                _ => ChannelError::Serial(e),
            })?;

        port.write_data_terminal_ready(settings.dtr)?;
        port.write_request_to_send(settings.rts)?;

        Ok(Self {
            port: Some(port),
            name: port_name.to_string(),
            baud_rate: settings.baud_rate,
        })
    }

    /// Open a serial port with default settings (115200 8N1).
    pub fn open_default(port_name: &str) -> Result<Self, ChannelError> {
        Self::open(port_name, SerialSettings::default())
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, ChannelError> {
        self.port.as_mut().ok_or(ChannelError::Closed)
    }
}

impl SerialChannel for SystemSerialChannel {
    fn read_available(&mut self, max: usize) -> Result<Vec<u8>, ChannelError> {
        let port = self.port_mut()?;
        let pending = port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; pending.min(max)];
        let n = match port.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(ChannelError::Io(e)),
        };
        buffer.truncate(n);
        Ok(buffer)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ChannelError> {
        let port = self.port_mut()?;
        let n = port.write(data).map_err(ChannelError::Io)?;
        port.flush().map_err(ChannelError::Io)?;
        Ok(n)
    }

    fn bytes_pending(&mut self) -> Result<usize, ChannelError> {
        let port = self.port_mut()?;
        Ok(port.bytes_to_read()? as usize)
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        // Dropping the boxed port releases the OS handle.
        self.port = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SystemSerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSerialChannel")
            .field("name", &self.name)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}
