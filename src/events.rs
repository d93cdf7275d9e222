//! Notifications emitted by the workers.
//!
//! Both workers communicate with the consumer through one-way events on a
//! `std::sync::mpsc` channel. The consumer owns the receiver; workers hold
//! cloned [`EventSender`]s and never block on delivery.

use std::fmt;
use std::sync::mpsc;

/// Human-readable classification of a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The port handle is no longer valid; the receive session is over.
    Closed,
    /// A blocking operation saw no data in time.
    Timeout,
    /// Any other I/O failure; the loop keeps running.
    IoError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Timeout => write!(f, "timeout"),
            Self::IoError => write!(f, "io-error"),
        }
    }
}

/// How a command sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// All repeats ran, every write succeeded.
    Completed,
    /// All repeats ran, at least one write failed.
    CompletedWithErrors,
    /// The run was cancelled before finishing.
    Cancelled,
}

/// Events delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A batch of formatted lines, newline-joined.
    Data(String),
    /// The connection failed; carries the classification.
    ConnectionFailure(FailureKind),
    /// A command was written to the channel. Index is 1-based.
    CommandExecuted(usize),
    /// A command's write failed. Index is 1-based. The run continues.
    CommandFailed(usize),
    /// Emitted after each full pass through the command list.
    RepeatsRemaining(u32),
    /// The sequencer reached a terminal state.
    SequenceFinished(SequenceOutcome),
}

/// Sending half held by the workers.
///
/// Sends are best-effort: once the consumer drops the receiver, events are
/// silently discarded so a departing consumer never wedges a worker.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<MonitorEvent>,
}

impl EventSender {
    /// Emit an event. Returns whether a consumer was still listening.
    pub fn emit(&self, event: MonitorEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Create a connected sender/receiver pair.
pub fn channel() -> (EventSender, mpsc::Receiver<MonitorEvent>) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::Closed.to_string(), "closed");
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
        assert_eq!(FailureKind::IoError.to_string(), "io-error");
    }

    #[test]
    fn test_emit_and_receive() {
        let (tx, rx) = channel();
        assert!(tx.emit(MonitorEvent::CommandExecuted(1)));
        assert_eq!(rx.recv().unwrap(), MonitorEvent::CommandExecuted(1));
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(!tx.emit(MonitorEvent::Data("x".into())));
    }
}
