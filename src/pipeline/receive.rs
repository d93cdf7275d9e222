//! The receive worker: polls the channel and drives the pipeline.
//!
//! Runs on a dedicated thread so the consumer is never blocked by serial
//! I/O. The polling interval adapts to observed traffic: tight when bytes
//! are pending, relaxed when the line is quiet. Pause, resume and stop are
//! cooperative through one mutex + condvar; shutdown latency is bounded by
//! the current poll delay.

use super::batch::{Batcher, DEFAULT_MAX_DELAY, DEFAULT_MAX_LINES};
use super::format::{DisplayHandle, Formatter};
use super::line::{LineReconstructor, DEFAULT_BUFFER_TIMEOUT};
use crate::events::{EventSender, FailureKind, MonitorEvent};
use crate::port::{ChannelError, SharedChannel, MAX_CHUNK_SIZE};
use chrono::Local;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tuning knobs for the poll scheduler and pipeline thresholds.
///
/// The delays trade CPU against latency; they are policy, not contract,
/// and every one of them is overridable from configuration.
#[derive(Debug, Clone)]
pub struct ReceiveTuning {
    /// Upper bound on bytes consumed per read.
    pub chunk_size: usize,
    /// Poll delay while bytes are known to be pending.
    pub min_poll: Duration,
    /// Poll delay while the recent byte rate is above `fast_threshold`.
    pub fast_poll: Duration,
    /// Poll delay on a quiet line.
    pub base_poll: Duration,
    /// Bytes/sec above which the fast delay is used.
    pub fast_threshold: f64,
    /// Inactivity window for flushing an unterminated tail.
    pub buffer_timeout: Duration,
    /// Batch size threshold.
    pub batch_max_lines: usize,
    /// Batch age threshold.
    pub batch_max_delay: Duration,
}

impl Default for ReceiveTuning {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            min_poll: Duration::from_millis(5),
            fast_poll: Duration::from_millis(10),
            base_poll: Duration::from_millis(20),
            fast_threshold: 2_000.0,
            buffer_timeout: DEFAULT_BUFFER_TIMEOUT,
            batch_max_lines: DEFAULT_MAX_LINES,
            batch_max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Exponential moving average of the observed byte rate.
#[derive(Debug)]
struct RateEstimator {
    bytes_per_sec: f64,
    last: Instant,
}

impl RateEstimator {
    fn new(now: Instant) -> Self {
        Self {
            bytes_per_sec: 0.0,
            last: now,
        }
    }

    fn record(&mut self, bytes: usize, now: Instant) {
        let dt = now.duration_since(self.last).as_secs_f64();
        if dt <= 0.0 {
            return;
        }
        let instantaneous = bytes as f64 / dt;
        self.bytes_per_sec = 0.4 * instantaneous + 0.6 * self.bytes_per_sec;
        self.last = now;
    }

    fn bytes_per_sec(&self) -> f64 {
        self.bytes_per_sec
    }
}

/// Per-connection pipeline state, exclusively owned by the worker.
struct ReceiveSession {
    reconstructor: LineReconstructor,
    formatter: Formatter,
    batcher: Batcher,
    rate: RateEstimator,
}

impl ReceiveSession {
    fn new(baud_rate: u32, display: DisplayHandle, tuning: &ReceiveTuning, now: Instant) -> Self {
        Self {
            reconstructor: LineReconstructor::new(baud_rate, tuning.buffer_timeout),
            formatter: Formatter::new(display),
            batcher: Batcher::new(tuning.batch_max_lines, tuning.batch_max_delay),
            rate: RateEstimator::new(now),
        }
    }

    fn ingest(&mut self, chunk: &[u8], now: Instant) {
        self.rate.record(chunk.len(), now);
        for line in self.reconstructor.feed(chunk, Local::now(), now) {
            self.batcher.add(self.formatter.render(&line));
        }
    }

    fn poll_stale(&mut self, now: Instant) {
        if let Some(line) = self.reconstructor.take_stale(now) {
            self.batcher.add(self.formatter.render(&line));
        }
    }

    fn next_delay(&self, pending: usize, tuning: &ReceiveTuning) -> Duration {
        if pending > 0 {
            tuning.min_poll
        } else if self.rate.bytes_per_sec() > tuning.fast_threshold {
            tuning.fast_poll
        } else {
            tuning.base_poll
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    stopped: bool,
}

#[derive(Debug, Default)]
struct ControlShared {
    state: Mutex<ControlState>,
    cond: Condvar,
}

/// Handle for controlling a running receive worker.
///
/// All methods are safe to call from any thread.
pub struct ReceiveHandle {
    shared: Arc<ControlShared>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ReceiveHandle {
    /// Suspend polling. The worker blocks (no busy spin) until resumed or
    /// stopped.
    pub fn pause(&self) {
        self.shared.state.lock().paused = true;
    }

    /// Resume a paused worker.
    pub fn resume(&self) {
        let mut st = self.shared.state.lock();
        st.paused = false;
        self.shared.cond.notify_one();
    }

    /// Request a stop. The worker exits within one poll delay.
    pub fn stop(&self) {
        let mut st = self.shared.state.lock();
        st.stopped = true;
        self.shared.cond.notify_one();
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| t.is_finished())
            .unwrap_or(true)
    }

    /// Stop the worker and wait for it to exit.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ReceiveHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the receive worker on its own thread.
///
/// The worker reads from `channel` (single-reader contract), renders with
/// the current `display` options, and emits [`MonitorEvent::Data`] batches
/// and [`MonitorEvent::ConnectionFailure`] classifications through
/// `events`. A closed port ends the worker; transient I/O errors are
/// reported and polling continues.
pub fn spawn(
    channel: SharedChannel,
    display: DisplayHandle,
    events: EventSender,
    tuning: ReceiveTuning,
) -> ReceiveHandle {
    let shared = Arc::new(ControlShared::default());
    let worker_shared = Arc::clone(&shared);

    let thread = thread::Builder::new()
        .name("commstream-rx".into())
        .spawn(move || run(channel, display, events, tuning, worker_shared))
        .expect("spawning receive worker");

    ReceiveHandle {
        shared,
        thread: Some(thread),
    }
}

fn run(
    channel: SharedChannel,
    display: DisplayHandle,
    events: EventSender,
    tuning: ReceiveTuning,
    shared: Arc<ControlShared>,
) {
    let baud_rate = channel.lock().baud_rate();
    let name = channel.lock().name().to_string();
    let mut session = ReceiveSession::new(baud_rate, display, &tuning, Instant::now());

    info!(port = %name, baud = baud_rate, "receive worker started");

    loop {
        {
            let mut st = shared.state.lock();
            if st.stopped {
                break;
            }
            while st.paused && !st.stopped {
                shared.cond.wait(&mut st);
            }
            if st.stopped {
                break;
            }
        }

        let pending = match channel.lock().bytes_pending() {
            Ok(n) => n,
            Err(e) => {
                if report_failure(&e, &events, &name) {
                    break;
                }
                0
            }
        };

        if pending > 0 {
            let chunk = channel.lock().read_available(tuning.chunk_size);
            match chunk {
                Ok(chunk) => session.ingest(&chunk, Instant::now()),
                Err(e) => {
                    if report_failure(&e, &events, &name) {
                        break;
                    }
                }
            }
        }

        let now = Instant::now();
        session.poll_stale(now);
        if let Some(batch) = session.batcher.maybe_flush(now) {
            events.emit(MonitorEvent::Data(batch));
        }

        let delay = session.next_delay(pending, &tuning);
        let mut st = shared.state.lock();
        if st.stopped {
            break;
        }
        if !st.paused {
            let _ = shared.cond.wait_for(&mut st, delay);
        }
    }

    // Drain whatever the batcher still holds so nothing is lost at exit.
    if let Some(batch) = session.batcher.flush(Instant::now()) {
        events.emit(MonitorEvent::Data(batch));
    }

    shared.state.lock().stopped = true;
    info!(port = %name, "receive worker finished");
}

/// Report an I/O failure. Returns true when the worker must terminate.
fn report_failure(error: &ChannelError, events: &EventSender, port: &str) -> bool {
    if error.is_timeout() {
        // No data yet. Not an error by definition.
        return false;
    }
    if error.is_disconnect() {
        info!(port = %port, %error, "port closed, ending receive session");
        events.emit(MonitorEvent::ConnectionFailure(FailureKind::Closed));
        return true;
    }
    warn!(port = %port, %error, "transient read failure");
    events.emit(MonitorEvent::ConnectionFailure(FailureKind::IoError));
    debug!(port = %port, "continuing after transient failure");
    false
}
