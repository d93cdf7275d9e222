//! Line batching to bound the rate of downstream notifications.
//!
//! Under high throughput a notification per line would swamp the consumer.
//! The batcher coalesces formatted lines and flushes on a size threshold
//! or a time threshold, preserving order.

use super::format::FormattedLine;
use std::time::{Duration, Instant};

/// Default maximum lines per batch.
pub const DEFAULT_MAX_LINES: usize = 50;
/// Default maximum age of a batch before it is flushed.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(100);

/// Coalesces formatted lines into newline-joined notification payloads.
#[derive(Debug)]
pub struct Batcher {
    lines: Vec<FormattedLine>,
    last_flush: Instant,
    max_lines: usize,
    max_delay: Duration,
}

impl Batcher {
    pub fn new(max_lines: usize, max_delay: Duration) -> Self {
        Self {
            lines: Vec::with_capacity(max_lines),
            last_flush: Instant::now(),
            max_lines: max_lines.max(1),
            max_delay,
        }
    }

    /// Append one line to the pending batch.
    pub fn add(&mut self, line: FormattedLine) {
        self.lines.push(line);
    }

    /// Flush if either threshold is met. An empty batch never flushes.
    pub fn maybe_flush(&mut self, now: Instant) -> Option<String> {
        if self.lines.is_empty() {
            // The age clock restarts whenever there is nothing pending,
            // so a long quiet period does not cause an immediate flush of
            // the first line that arrives after it.
            self.last_flush = now;
            return None;
        }
        if self.lines.len() >= self.max_lines || now.duration_since(self.last_flush) > self.max_delay
        {
            return self.flush(now);
        }
        None
    }

    /// Unconditionally drain the pending batch. Used at shutdown.
    pub fn flush(&mut self, now: Instant) -> Option<String> {
        self.last_flush = now;
        if self.lines.is_empty() {
            return None;
        }
        let payload = self
            .lines
            .drain(..)
            .map(|l| l.rendered)
            .collect::<Vec<_>>()
            .join("\n");
        Some(payload)
    }

    /// Number of lines waiting to be flushed.
    pub fn pending(&self) -> usize {
        self.lines.len()
    }
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES, DEFAULT_MAX_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(text: &str) -> FormattedLine {
        FormattedLine {
            timestamp: None,
            rendered: text.to_string(),
        }
    }

    #[test]
    fn test_size_threshold_flushes_once() {
        let mut b = Batcher::new(50, Duration::from_secs(3600));
        let now = Instant::now();

        let mut flushes = Vec::new();
        for i in 0..50 {
            b.add(line(&format!("line{i}")));
            if let Some(batch) = b.maybe_flush(now) {
                flushes.push(batch);
            }
        }

        assert_eq!(flushes.len(), 1);
        let lines: Vec<&str> = flushes[0].split('\n').collect();
        assert_eq!(lines.len(), 50);
        assert_eq!(lines[0], "line0");
        assert_eq!(lines[49], "line49");
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn test_time_threshold_flushes_single_line() {
        let mut b = Batcher::new(50, Duration::from_millis(100));
        let start = Instant::now();
        b.maybe_flush(start);

        b.add(line("only"));
        assert!(b.maybe_flush(start + Duration::from_millis(50)).is_none());

        let batch = b.maybe_flush(start + Duration::from_millis(150)).unwrap();
        assert_eq!(batch, "only");
        assert!(b.maybe_flush(start + Duration::from_millis(300)).is_none());
    }

    #[test]
    fn test_empty_batch_never_flushes() {
        let mut b = Batcher::new(50, Duration::from_millis(1));
        let start = Instant::now();
        assert!(b.maybe_flush(start + Duration::from_secs(10)).is_none());
        assert!(b.flush(start + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_quiet_period_does_not_age_next_line() {
        let mut b = Batcher::new(50, Duration::from_millis(100));
        let start = Instant::now();

        // A long idle stretch with an empty batch...
        b.maybe_flush(start + Duration::from_secs(5));
        // ...must not make the first new line instantly stale.
        b.add(line("fresh"));
        assert!(b
            .maybe_flush(start + Duration::from_secs(5) + Duration::from_millis(10))
            .is_none());
    }

    #[test]
    fn test_order_preserved() {
        let mut b = Batcher::new(3, Duration::from_secs(3600));
        let now = Instant::now();
        b.add(line("a"));
        b.add(line("b"));
        b.add(line("c"));
        assert_eq!(b.maybe_flush(now).unwrap(), "a\nb\nc");
    }
}
