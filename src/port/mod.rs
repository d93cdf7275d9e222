//! Channel abstraction layer for serial communication.
//!
//! Provides the `SerialChannel` trait plus a real implementation and a
//! mock, enabling dependency injection and testing.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::ChannelError;
pub use mock::MockSerialChannel;
pub use sync_port::SystemSerialChannel;
pub use traits::*;
