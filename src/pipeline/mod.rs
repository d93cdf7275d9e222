//! The serial data-ingestion pipeline.
//!
//! Raw bytes flow channel → line reconstruction → formatting → batching;
//! the receive worker drives the whole chain on its own thread and emits
//! batched-line events to the consumer.

pub mod batch;
pub mod format;
pub mod line;
pub mod receive;

pub use batch::Batcher;
pub use format::{DisplayHandle, DisplayOptions, FormattedLine, Formatter};
pub use line::{LineReconstructor, RawLine};
pub use receive::{spawn as spawn_receive, ReceiveHandle, ReceiveTuning};
