//! Byte-to-line reconstruction with per-line timestamps.
//!
//! A serial read returns an arbitrary chunk of bytes; line boundaries fall
//! wherever they fall. `LineReconstructor` keeps the unterminated tail
//! between chunks and back-computes when each line actually arrived on the
//! wire from the chunk's read timestamp and the baud rate.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use memchr::memchr_iter;
use std::time::{Duration, Instant};

/// Default inactivity window after which an unterminated tail is flushed
/// as a line. Covers devices that never terminate their last line.
pub const DEFAULT_BUFFER_TIMEOUT: Duration = Duration::from_millis(50);

/// A reconstructed line: raw content bytes (newline and trailing `\r`
/// stripped) plus the back-computed arrival time of its first byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub bytes: Vec<u8>,
    pub timestamp: DateTime<Local>,
}

/// Stateful byte-to-line assembler.
///
/// One byte on the wire is 10 bits: 1 start + 8 data + 1 stop. The parity
/// bit is deliberately ignored; at worst the error is 10% of a byte time.
/// For a chunk of N bytes read at time T, the first byte is assumed to
/// have arrived at `T - byte_time * (N - 1)` and each later byte one
/// byte_time after the previous.
#[derive(Debug)]
pub struct LineReconstructor {
    /// Unterminated tail carried between chunks. Never contains `\n`.
    partial: Vec<u8>,
    /// Monotonic and wall-clock time of the most recent non-empty chunk.
    last_arrival: Option<(Instant, DateTime<Local>)>,
    /// Wire time of one byte, in nanoseconds.
    byte_time_ns: f64,
    /// Inactivity window for the stale-tail flush.
    buffer_timeout: Duration,
}

impl LineReconstructor {
    /// Create a reconstructor for a connection running at `baud_rate`.
    pub fn new(baud_rate: u32, buffer_timeout: Duration) -> Self {
        Self {
            partial: Vec::new(),
            last_arrival: None,
            byte_time_ns: byte_time_ns(baud_rate),
            buffer_timeout,
        }
    }

    /// Feed one chunk read at wall-clock time `arrival` (monotonic `now`).
    ///
    /// Returns every line completed by this chunk, oldest first, each with
    /// its back-computed timestamp. The unterminated tail is retained. An
    /// empty chunk is a no-op and does not reset the inactivity clock.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        arrival: DateTime<Local>,
        now: Instant,
    ) -> Vec<RawLine> {
        if chunk.is_empty() {
            return Vec::new();
        }

        let first_byte_at = arrival - nanos((chunk.len() as f64 - 1.0) * self.byte_time_ns);
        let carried = self.partial.len();

        let mut combined = std::mem::take(&mut self.partial);
        combined.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0usize;
        for nl in memchr_iter(b'\n', &combined) {
            let segment = &combined[start..nl];
            start = nl + 1;
            if segment.is_empty() {
                continue;
            }

            // Bytes carried from earlier chunks arrived no later than this
            // chunk's first byte.
            let offset_in_chunk = segment_offset(start - 1 - segment.len(), carried);
            let timestamp = first_byte_at + nanos(offset_in_chunk as f64 * self.byte_time_ns);

            let content = match segment.last() {
                Some(b'\r') => &segment[..segment.len() - 1],
                _ => segment,
            };
            lines.push(RawLine {
                bytes: content.to_vec(),
                timestamp,
            });
        }

        self.partial = combined.split_off(start);
        self.last_arrival = Some((now, arrival));
        lines
    }

    /// Flush the unterminated tail if no data has arrived for longer than
    /// the buffer timeout.
    ///
    /// The flushed line is stamped with the arrival time of the chunk that
    /// produced its last byte, not the flush time.
    pub fn take_stale(&mut self, now: Instant) -> Option<RawLine> {
        if self.partial.is_empty() {
            return None;
        }
        let (last_instant, last_wall) = self.last_arrival?;
        if now.duration_since(last_instant) <= self.buffer_timeout {
            return None;
        }

        let mut bytes = std::mem::take(&mut self.partial);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Some(RawLine {
            bytes,
            timestamp: last_wall,
        })
    }

    /// Current unterminated tail, for inspection.
    pub fn partial(&self) -> &[u8] {
        &self.partial
    }
}

/// Wire time of one byte in nanoseconds at the given baud rate.
fn byte_time_ns(baud_rate: u32) -> f64 {
    debug_assert!(baud_rate > 0);
    10_000_000_000.0 / baud_rate.max(1) as f64
}

/// A segment starting inside the carried tail has offset 0 in this chunk.
fn segment_offset(start_in_combined: usize, carried: usize) -> usize {
    start_in_combined.saturating_sub(carried)
}

fn nanos(ns: f64) -> ChronoDuration {
    ChronoDuration::nanoseconds(ns.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recon(baud: u32) -> LineReconstructor {
        LineReconstructor::new(baud, DEFAULT_BUFFER_TIMEOUT)
    }

    #[test]
    fn test_single_complete_line() {
        let mut r = recon(115200);
        let lines = r.feed(b"OK\r\n", Local::now(), Instant::now());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].bytes, b"OK");
        assert!(r.partial().is_empty());
    }

    #[test]
    fn test_timestamp_back_computation() {
        let mut r = recon(115200);
        let arrival = Local::now();
        // 21 bytes: the first byte is 20 byte-times before the read.
        let lines = r.feed(b"0123456789ABCDEFGHI\r\n", arrival, Instant::now());
        assert_eq!(lines.len(), 1);

        let byte_ns: f64 = 10_000_000_000.0 / 115200.0;
        let expected = arrival - ChronoDuration::nanoseconds((20.0 * byte_ns).round() as i64);
        let delta = (lines[0].timestamp - expected).num_nanoseconds().unwrap().abs();
        assert!(delta < 1_000, "timestamp off by {delta} ns");
    }

    #[test]
    fn test_timestamps_non_decreasing_within_chunk() {
        let mut r = recon(9600);
        let lines = r.feed(b"one\ntwo\nthree\n", Local::now(), Instant::now());
        assert_eq!(lines.len(), 3);
        assert!(lines[0].timestamp <= lines[1].timestamp);
        assert!(lines[1].timestamp <= lines[2].timestamp);
    }

    #[test]
    fn test_partial_retention_across_chunks() {
        let mut r = recon(115200);
        let lines = r.feed(b"AT+X", Local::now(), Instant::now());
        assert!(lines.is_empty());
        assert_eq!(r.partial(), b"AT+X");

        let lines = r.feed(b"Y\n", Local::now(), Instant::now());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].bytes, b"AT+XY");
        assert!(r.partial().is_empty());
    }

    #[test]
    fn test_carried_line_stamped_at_chunk_start() {
        let mut r = recon(115200);
        r.feed(b"AT+X", Local::now(), Instant::now());

        let arrival = Local::now();
        let lines = r.feed(b"Y\nZZ\n", arrival, Instant::now());
        assert_eq!(lines.len(), 2);

        let byte_ns: f64 = 10_000_000_000.0 / 115200.0;
        let first_byte_at = arrival - ChronoDuration::nanoseconds((4.0 * byte_ns).round() as i64);
        // Line one began in the carried tail: clamped to the chunk start.
        assert_eq!(lines[0].timestamp, first_byte_at);
        assert!(lines[0].timestamp <= lines[1].timestamp);
    }

    #[test]
    fn test_stale_flush_after_timeout() {
        let mut r = LineReconstructor::new(115200, Duration::from_millis(5));
        let start = Instant::now();
        r.feed(b"AT+Z", Local::now(), start);

        // Within the window: nothing flushes.
        assert!(r.take_stale(start + Duration::from_millis(2)).is_none());

        let flushed = r.take_stale(start + Duration::from_millis(10)).unwrap();
        assert_eq!(flushed.bytes, b"AT+Z");
        assert!(r.partial().is_empty());
        assert!(r.take_stale(start + Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut r = LineReconstructor::new(115200, Duration::from_millis(5));
        let start = Instant::now();
        r.feed(b"AT+Z", Local::now(), start);

        // An empty chunk must not reset the inactivity clock.
        let lines = r.feed(b"", Local::now(), start + Duration::from_millis(4));
        assert!(lines.is_empty());
        assert!(r.take_stale(start + Duration::from_millis(10)).is_some());
    }

    #[test]
    fn test_pure_newlines_produce_no_empty_lines() {
        let mut r = recon(115200);
        let lines = r.feed(b"\n\n\n", Local::now(), Instant::now());
        assert!(lines.is_empty());
        assert!(r.partial().is_empty());
    }

    #[test]
    fn test_empty_segments_skipped_content_kept() {
        let mut r = recon(115200);
        let lines = r.feed(b"A\n\nB\n", Local::now(), Instant::now());
        let contents: Vec<&[u8]> = lines.iter().map(|l| l.bytes.as_slice()).collect();
        assert_eq!(contents, vec![b"A".as_slice(), b"B".as_slice()]);
    }

    #[test]
    fn test_crlf_blank_line_kept() {
        let mut r = recon(115200);
        let lines = r.feed(b"OK\r\n\r\n", Local::now(), Instant::now());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].bytes, b"OK");
        assert_eq!(lines[1].bytes, b"");
    }

    #[test]
    fn test_stale_flush_strips_trailing_cr() {
        let mut r = LineReconstructor::new(115200, Duration::from_millis(1));
        let start = Instant::now();
        r.feed(b"PROMPT>\r", Local::now(), start);
        let flushed = r.take_stale(start + Duration::from_millis(5)).unwrap();
        assert_eq!(flushed.bytes, b"PROMPT>");
    }
}
