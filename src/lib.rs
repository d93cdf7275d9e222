//! Commstream Library
//!
//! Core of a serial terminal: the data-ingestion pipeline that turns a
//! partially-arriving UART byte stream into timestamped, batched lines,
//! and the paced command sequencer that drives outgoing command lists.
//! Presentation is someone else's job; this crate emits structured events
//! and knows nothing about what consumes them.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `port`: Channel abstraction layer for serial communication
//! - `pipeline`: Line reconstruction, formatting, batching, receive worker
//! - `sequencer`: Paced command execution with pause/resume/cancel
//! - `events`: Notifications delivered to the consumer
//!
//! # Example
//!
//! ```no_run
//! use commstream::config::ConfigLoader;
//! use commstream::pipeline::{spawn_receive, DisplayHandle};
//! use commstream::port::{share, SystemSerialChannel};
//! use commstream::events;
//!
//! let config = ConfigLoader::load()?.into_config();
//! let channel = SystemSerialChannel::open("/dev/ttyUSB0", config.serial.settings())?;
//! let channel = share(Box::new(channel));
//!
//! let display = DisplayHandle::new(config.display.options());
//! let (tx, rx) = events::channel();
//! let rx_worker = spawn_receive(channel, display, tx, config.receive.tuning());
//!
//! for event in rx {
//!     println!("{event:?}");
//! }
//! rx_worker.join();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod events;
pub mod pipeline;
pub mod port;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use events::{EventSender, FailureKind, MonitorEvent, SequenceOutcome};
pub use pipeline::{
    Batcher, DisplayHandle, DisplayOptions, FormattedLine, Formatter, LineReconstructor, RawLine,
    ReceiveHandle, ReceiveTuning,
};
pub use port::{
    share, ChannelError, DataBits, FlowControl, MockSerialChannel, Parity, SerialChannel,
    SerialSettings, SharedChannel, StopBits, SystemSerialChannel,
};
pub use sequencer::{CommandSpec, SequenceConfig, SequencerHandle, SequencerState};
