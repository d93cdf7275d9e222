//! Channel-specific error types.
//!
//! Defines error types for serial channel operations, separate from
//! configuration errors to maintain clean separation of concerns.

use thiserror::Error;

/// Errors that can occur during serial channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The underlying handle is no longer valid. Terminal for the current
    /// receive session.
    #[error("Port is closed")]
    Closed,

    /// No data arrived within the configured timeout. Expected during
    /// polling, never treated as a failure.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Channel configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred during channel operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl ChannelError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Whether this error means "no data yet" rather than a real failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Whether this error means the port is gone for good.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Closed | Self::NotFound(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected
            ),
            Self::Serial(e) => matches!(e.kind(), serialport::ErrorKind::NoDevice),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChannelError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = ChannelError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

        let err = ChannelError::Closed;
        assert_eq!(err.to_string(), "Port is closed");
    }

    #[test]
    fn test_timeout_classification() {
        let err = ChannelError::timeout(std::time::Duration::from_millis(500));
        assert!(err.is_timeout());
        assert!(!err.is_disconnect());

        let io = ChannelError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no data",
        ));
        assert!(io.is_timeout());
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(ChannelError::Closed.is_disconnect());
        assert!(ChannelError::not_found("COM9").is_disconnect());

        let broken = ChannelError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        assert!(broken.is_disconnect());
        assert!(!broken.is_timeout());
    }
}
