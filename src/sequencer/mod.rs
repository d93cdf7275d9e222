//! Paced command sequencer.
//!
//! Iterates an ordered command list against the channel, spacing writes by
//! each command's configured interval, with pause/resume/cancel from any
//! thread and a configurable repeat count. A failed write is reported and
//! skipped; the rest of the run proceeds.
//!
//! State machine: `Idle → Running → {Paused ⇄ Running} → Completed |
//! Cancelled`. Cancel always wins over pause.

use crate::events::{EventSender, MonitorEvent, SequenceOutcome};
use crate::port::SharedChannel;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default enforced spacing for commands configured with a zero interval.
///
/// Hardware needs settle time between commands; back-to-back writes are
/// never allowed, so a zero interval means "use the floor", not "no wait".
pub const DEFAULT_SETTLE_FLOOR: Duration = Duration::from_secs(3);

/// One command in a sequence. Immutable for the run's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// 1-based position in the sequence, carried in notifications.
    pub index: usize,
    /// Command text written to the channel.
    pub text: String,
    /// Pause after this command, in milliseconds. Zero selects the settle
    /// floor.
    pub interval_ms: u64,
    /// Whether the configured terminator bytes are appended to the write.
    pub append_terminator: bool,
}

/// Run-wide sequencer settings.
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    /// Terminator bytes appended to commands that request one.
    pub terminator: Option<Vec<u8>>,
    /// Spacing used for commands with a zero interval.
    pub settle_floor: Duration,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            terminator: Some(vec![0x0D, 0x0A]),
            settle_floor: DEFAULT_SETTLE_FLOOR,
        }
    }
}

/// Parse a terminator given as a hex string (e.g. `"0D0A"`, `"0D 0A"`).
///
/// A malformed string falls back to no terminator rather than aborting
/// the run; an empty string simply means no terminator.
pub fn parse_terminator(raw: &str) -> Option<Vec<u8>> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.len() % 2 != 0 {
        warn!(terminator = %raw, "malformed hex terminator, sending without terminator");
        return None;
    }
    let mut bytes = Vec::with_capacity(cleaned.len() / 2);
    for i in (0..cleaned.len()).step_by(2) {
        match u8::from_str_radix(&cleaned[i..i + 2], 16) {
            Ok(b) => bytes.push(b),
            Err(_) => {
                warn!(terminator = %raw, "malformed hex terminator, sending without terminator");
                return None;
            }
        }
    }
    Some(bytes)
}

/// Observable sequencer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
}

#[derive(Debug)]
struct RunState {
    phase: SequencerState,
    paused: bool,
    cancelled: bool,
    had_error: bool,
    remaining_repeats: u32,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<RunState>,
    cond: Condvar,
}

/// Handle for controlling a running sequence.
///
/// `pause`, `resume` and `cancel` are the only mutators of run state and
/// are safe to call from any thread.
pub struct SequencerHandle {
    shared: Arc<Shared>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SequencerHandle {
    /// Pause before the next command. The worker blocks on a condvar; no
    /// spinning.
    pub fn pause(&self) {
        let mut st = self.shared.state.lock();
        if !st.cancelled {
            st.paused = true;
        }
    }

    /// Resume a paused run.
    pub fn resume(&self) {
        let mut st = self.shared.state.lock();
        st.paused = false;
        self.shared.cond.notify_one();
    }

    /// Cancel the run. Wins over pause; the worker observes it on its next
    /// wake, so latency is bounded by one condvar cycle.
    pub fn cancel(&self) {
        let mut st = self.shared.state.lock();
        st.cancelled = true;
        self.shared.cond.notify_one();
    }

    /// Current state.
    pub fn state(&self) -> SequencerState {
        self.shared.state.lock().phase
    }

    /// Whether any command write failed so far.
    pub fn had_error(&self) -> bool {
        self.shared.state.lock().had_error
    }

    /// Repeats not yet started.
    pub fn remaining_repeats(&self) -> u32 {
        self.shared.state.lock().remaining_repeats
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| t.is_finished())
            .unwrap_or(true)
    }

    /// Wait for the run to reach a terminal state.
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SequencerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start a sequence: transition Idle → Running and begin iterating.
///
/// Writes go to `channel` (single-writer contract). Per command the worker
/// emits [`MonitorEvent::CommandExecuted`] or
/// [`MonitorEvent::CommandFailed`] with the 1-based index, then sleeps the
/// command's interval. After each full pass it decrements the repeat count
/// and emits [`MonitorEvent::RepeatsRemaining`]; a final
/// [`MonitorEvent::SequenceFinished`] carries the outcome.
pub fn spawn(
    channel: SharedChannel,
    commands: Vec<CommandSpec>,
    repeat_count: u32,
    config: SequenceConfig,
    events: EventSender,
) -> SequencerHandle {
    let shared = Arc::new(Shared {
        state: Mutex::new(RunState {
            phase: SequencerState::Idle,
            paused: false,
            cancelled: false,
            had_error: false,
            remaining_repeats: repeat_count,
        }),
        cond: Condvar::new(),
    });
    let worker_shared = Arc::clone(&shared);

    let thread = thread::Builder::new()
        .name("commstream-tx".into())
        .spawn(move || run(channel, commands, config, events, worker_shared))
        .expect("spawning sequencer worker");

    SequencerHandle {
        shared,
        thread: Some(thread),
    }
}

fn run(
    channel: SharedChannel,
    commands: Vec<CommandSpec>,
    config: SequenceConfig,
    events: EventSender,
    shared: Arc<Shared>,
) {
    shared.state.lock().phase = SequencerState::Running;
    info!(commands = commands.len(), "sequence started");

    'run: while shared.state.lock().remaining_repeats > 0 {
        for command in &commands {
            if wait_while_paused(&shared) {
                break 'run;
            }
            write_command(&channel, command, &config, &events, &shared);
            if sleep_interruptible(&shared, effective_interval(command, &config)) {
                break 'run;
            }
        }

        let remaining = {
            let mut st = shared.state.lock();
            st.remaining_repeats -= 1;
            st.remaining_repeats
        };
        events.emit(MonitorEvent::RepeatsRemaining(remaining));
    }

    let outcome = {
        let mut st = shared.state.lock();
        if st.cancelled {
            st.phase = SequencerState::Cancelled;
            SequenceOutcome::Cancelled
        } else if st.had_error {
            st.phase = SequencerState::Completed;
            SequenceOutcome::CompletedWithErrors
        } else {
            st.phase = SequencerState::Completed;
            SequenceOutcome::Completed
        }
    };
    events.emit(MonitorEvent::SequenceFinished(outcome));
    info!(?outcome, "sequence finished");
}

/// Block while paused. Returns true when cancellation was observed.
fn wait_while_paused(shared: &Shared) -> bool {
    let mut st = shared.state.lock();
    while st.paused && !st.cancelled {
        st.phase = SequencerState::Paused;
        shared.cond.wait(&mut st);
    }
    if st.cancelled {
        return true;
    }
    st.phase = SequencerState::Running;
    false
}

/// Sleep for `duration`, waking early on cancel. Returns true when
/// cancellation was observed.
fn sleep_interruptible(shared: &Shared, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    let mut st = shared.state.lock();
    loop {
        if st.cancelled {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let _ = shared.cond.wait_for(&mut st, deadline - now);
    }
}

fn effective_interval(command: &CommandSpec, config: &SequenceConfig) -> Duration {
    if command.interval_ms == 0 {
        config.settle_floor
    } else {
        Duration::from_millis(command.interval_ms)
    }
}

/// Write one command. A failure is recorded and reported but does not
/// abort the remaining commands.
fn write_command(
    channel: &SharedChannel,
    command: &CommandSpec,
    config: &SequenceConfig,
    events: &EventSender,
    shared: &Shared,
) {
    let mut payload = command.text.clone().into_bytes();
    if command.append_terminator {
        if let Some(terminator) = &config.terminator {
            payload.extend_from_slice(terminator);
        }
    }

    match channel.lock().write(&payload) {
        Ok(n) => {
            debug!(index = command.index, bytes = n, "command written");
            events.emit(MonitorEvent::CommandExecuted(command.index));
        }
        Err(e) => {
            warn!(index = command.index, error = %e, "command write failed");
            shared.state.lock().had_error = true;
            events.emit(MonitorEvent::CommandFailed(command.index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_terminator_plain() {
        assert_eq!(parse_terminator("0D0A"), Some(vec![0x0D, 0x0A]));
    }

    #[test]
    fn test_parse_terminator_spaced_lowercase() {
        assert_eq!(parse_terminator("0d 0a"), Some(vec![0x0D, 0x0A]));
    }

    #[test]
    fn test_parse_terminator_empty_is_none() {
        assert_eq!(parse_terminator(""), None);
        assert_eq!(parse_terminator("   "), None);
    }

    #[test]
    fn test_parse_terminator_malformed_falls_back() {
        assert_eq!(parse_terminator("0D0"), None);
        assert_eq!(parse_terminator("XYZW"), None);
    }

    #[test]
    fn test_effective_interval_floors_zero() {
        let config = SequenceConfig {
            terminator: None,
            settle_floor: Duration::from_millis(250),
        };
        let mut command = CommandSpec {
            index: 1,
            text: "AT".into(),
            interval_ms: 0,
            append_terminator: false,
        };
        assert_eq!(
            effective_interval(&command, &config),
            Duration::from_millis(250)
        );

        command.interval_ms = 40;
        assert_eq!(
            effective_interval(&command, &config),
            Duration::from_millis(40)
        );
    }
}
