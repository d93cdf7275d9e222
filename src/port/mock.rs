//! Mock serial channel implementation for testing.
//!
//! Provides a `MockSerialChannel` that simulates serial behavior without
//! requiring actual hardware. The mock is `Clone`: tests keep one handle
//! for feeding data and inspecting writes while a worker owns the boxed
//! channel.

use super::error::ChannelError;
use super::traits::{SerialChannel, SerialSettings};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Inner state of the mock channel, protected by a mutex for interior
/// mutability.
#[derive(Debug, Default)]
struct MockChannelState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all payloads written to the channel.
    write_log: Vec<Vec<u8>>,
    /// Number of upcoming write calls that should fail with an I/O error.
    failing_writes: u32,
    /// Whether the next read should report a hard I/O failure.
    fail_next_read: bool,
    /// Whether the channel has been closed.
    closed: bool,
}

/// Mock serial channel implementation for testing.
///
/// # Example
/// ```
/// use commstream::port::{MockSerialChannel, SerialChannel};
///
/// let mock = MockSerialChannel::new("MOCK0", 115200);
/// mock.enqueue_read(b"OK\r\n");
///
/// let mut channel = mock.clone();
/// let chunk = channel.read_available(4096).unwrap();
/// assert_eq!(chunk, b"OK\r\n");
///
/// channel.write(b"AT").unwrap();
/// assert_eq!(mock.write_log(), vec![b"AT".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialChannel {
    name: String,
    baud_rate: u32,
    state: Arc<Mutex<MockChannelState>>,
}

impl MockSerialChannel {
    /// Create a new mock channel with the given name and baud rate.
    pub fn new(name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            baud_rate,
            state: Arc::new(Mutex::new(MockChannelState::default())),
        }
    }

    /// Create a mock channel with the baud rate from `settings`.
    pub fn with_settings(name: impl Into<String>, settings: &SerialSettings) -> Self {
        Self::new(name, settings.baud_rate)
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Get a copy of all payloads written to the channel, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }

    /// Make the next `count` write calls fail with an I/O error.
    pub fn fail_writes(&self, count: u32) {
        self.state.lock().failing_writes = count;
    }

    /// Make the next read call fail with a hard I/O error.
    pub fn fail_next_read(&self) {
        self.state.lock().fail_next_read = true;
    }

    /// Simulate the device side closing the connection.
    pub fn disconnect(&self) {
        self.state.lock().closed = true;
    }

    /// Number of bytes still queued for reading.
    pub fn queued_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialChannel for MockSerialChannel {
    fn read_available(&mut self, max: usize) -> Result<Vec<u8>, ChannelError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(ChannelError::Closed);
        }
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(ChannelError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected read failure",
            )));
        }

        let take = state.read_queue.len().min(max);
        Ok(state.read_queue.drain(..take).collect())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ChannelError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(ChannelError::Closed);
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(ChannelError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected write failure",
            )));
        }

        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn bytes_pending(&mut self) -> Result<usize, ChannelError> {
        let state = self.state.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }
        Ok(state.read_queue.len())
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn is_open(&self) -> bool {
        !self.state.lock().closed
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MockSerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialChannel")
            .field("name", &self.name)
            .field("queued_bytes", &self.queued_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read() {
        let mock = MockSerialChannel::new("MOCK0", 9600);
        mock.enqueue_read(b"Hello");

        let mut channel = mock.clone();
        let chunk = channel.read_available(4096).unwrap();
        assert_eq!(chunk, b"Hello");
        assert_eq!(mock.queued_bytes(), 0);
    }

    #[test]
    fn test_bounded_read() {
        let mock = MockSerialChannel::new("MOCK0", 9600);
        mock.enqueue_read(b"Hello, World!");

        let mut channel = mock.clone();
        let chunk = channel.read_available(5).unwrap();
        assert_eq!(chunk, b"Hello");
        assert_eq!(mock.queued_bytes(), 8);
    }

    #[test]
    fn test_empty_read_is_empty_chunk() {
        let mut channel = MockSerialChannel::new("MOCK0", 9600);
        let chunk = channel.read_available(4096).unwrap();
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_write_logging() {
        let mock = MockSerialChannel::new("MOCK0", 9600);
        let mut channel = mock.clone();
        channel.write(b"Test1").unwrap();
        channel.write(b"Test2").unwrap();

        let log = mock.write_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], b"Test1");
        assert_eq!(log[1], b"Test2");
    }

    #[test]
    fn test_injected_write_failure() {
        let mock = MockSerialChannel::new("MOCK0", 9600);
        mock.fail_writes(1);

        let mut channel = mock.clone();
        assert!(channel.write(b"boom").is_err());
        channel.write(b"ok").unwrap();
        assert_eq!(mock.write_log(), vec![b"ok".to_vec()]);
    }

    #[test]
    fn test_closed_channel() {
        let mock = MockSerialChannel::new("MOCK0", 9600);
        mock.disconnect();

        let mut channel = mock.clone();
        assert!(matches!(
            channel.read_available(4096),
            Err(ChannelError::Closed)
        ));
        assert!(matches!(channel.write(b"x"), Err(ChannelError::Closed)));
        assert!(!channel.is_open());
    }

    #[test]
    fn test_bytes_pending() {
        let mock = MockSerialChannel::new("MOCK0", 9600);
        mock.enqueue_read(b"Test data");

        let mut channel = mock.clone();
        assert_eq!(channel.bytes_pending().unwrap(), 9);
    }
}
