//! Line rendering: text or hex, optional timestamp prefix.
//!
//! Display flags live behind a shared handle so the surrounding
//! application can flip them at runtime; the receive loop re-reads them
//! for every line, so a change takes effect on the next processed chunk
//! without restarting anything.

use super::line::RawLine;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::Arc;

/// Display flags consumed by the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Render every byte as two uppercase hex digits instead of text.
    pub hex: bool,
    /// Prefix each line with its reconstructed arrival timestamp.
    pub timestamps: bool,
    /// In text mode, escape control characters instead of passing them
    /// through raw.
    pub control_symbols: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            hex: false,
            timestamps: true,
            control_symbols: false,
        }
    }
}

/// Shared, runtime-mutable display options.
#[derive(Debug, Clone, Default)]
pub struct DisplayHandle {
    inner: Arc<Mutex<DisplayOptions>>,
}

impl DisplayHandle {
    pub fn new(options: DisplayOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(options)),
        }
    }

    /// Snapshot the current options.
    pub fn get(&self) -> DisplayOptions {
        *self.inner.lock()
    }

    /// Replace the options wholesale.
    pub fn set(&self, options: DisplayOptions) {
        *self.inner.lock() = options;
    }

    /// Mutate the options in place.
    pub fn update(&self, f: impl FnOnce(&mut DisplayOptions)) {
        f(&mut self.inner.lock());
    }
}

/// A rendered line ready for batching. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLine {
    /// The reconstructed arrival time, when timestamping is enabled.
    pub timestamp: Option<DateTime<Local>>,
    /// The display text, timestamp prefix included.
    pub rendered: String,
}

/// Renders reconstructed lines according to the current display options.
#[derive(Debug, Clone)]
pub struct Formatter {
    options: DisplayHandle,
}

impl Formatter {
    pub fn new(options: DisplayHandle) -> Self {
        Self { options }
    }

    /// Render one line. Never fails: undecodable bytes fall back through
    /// GBK to Latin-1, which maps every byte.
    pub fn render(&self, line: &RawLine) -> FormattedLine {
        let opts = self.options.get();

        let body = if opts.hex {
            render_hex(&line.bytes)
        } else {
            let text = decode_text(&line.bytes);
            if opts.control_symbols {
                escape_control(&text)
            } else {
                text
            }
        };

        if opts.timestamps {
            let rendered = format!("[{}] {}", format_timestamp(line.timestamp), body);
            FormattedLine {
                timestamp: Some(line.timestamp),
                rendered,
            }
        } else {
            FormattedLine {
                timestamp: None,
                rendered: body,
            }
        }
    }
}

/// Fixed-width timestamp so line widths stay stable for display.
fn format_timestamp(ts: DateTime<Local>) -> String {
    ts.format("%Y-%m-%d_%H:%M:%S:%3f").to_string()
}

/// Two uppercase hex digits per byte, space-separated.
fn render_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Ordered decode fallback: strict UTF-8, then GBK, then Latin-1.
///
/// The Latin-1 leg widens each byte to the code point of the same value,
/// so it cannot fail; the pipeline never stalls on a decode error.
fn decode_text(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    let (decoded, _, had_errors) = encoding_rs::GBK.decode(bytes);
    if !had_errors {
        return decoded.into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Replace ASCII control characters with printable escapes.
fn escape_control(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(bytes: &[u8]) -> RawLine {
        RawLine {
            bytes: bytes.to_vec(),
            timestamp: Local::now(),
        }
    }

    fn formatter(options: DisplayOptions) -> Formatter {
        Formatter::new(DisplayHandle::new(options))
    }

    #[test]
    fn test_hex_rendering() {
        let f = formatter(DisplayOptions {
            hex: true,
            timestamps: false,
            control_symbols: false,
        });
        let line = f.render(&raw(b"OK\r\n"));
        assert_eq!(line.rendered, "4F 4B 0D 0A");
        assert!(line.timestamp.is_none());
    }

    #[test]
    fn test_plain_text() {
        let f = formatter(DisplayOptions {
            hex: false,
            timestamps: false,
            control_symbols: false,
        });
        assert_eq!(f.render(&raw(b"hello")).rendered, "hello");
    }

    #[test]
    fn test_timestamp_prefix_is_fixed_width() {
        let f = formatter(DisplayOptions {
            hex: false,
            timestamps: true,
            control_symbols: false,
        });
        let a = f.render(&raw(b"a"));
        let b = f.render(&raw(b"bb"));
        // "[YYYY-MM-DD_HH:MM:SS:mmm] " is 26 chars before the body.
        assert_eq!(a.rendered.len() - 1, b.rendered.len() - 2);
        assert!(a.rendered.starts_with('['));
        assert_eq!(&a.rendered[25..26], " ");
        assert!(a.timestamp.is_some());
    }

    #[test]
    fn test_gbk_fallback() {
        // "你好" encoded as GBK; invalid as UTF-8.
        let f = formatter(DisplayOptions {
            hex: false,
            timestamps: false,
            control_symbols: false,
        });
        let line = f.render(&raw(&[0xC4, 0xE3, 0xBA, 0xC3]));
        assert_eq!(line.rendered, "你好");
    }

    #[test]
    fn test_latin1_fallback_never_fails() {
        // 0xFF is malformed in both UTF-8 and GBK.
        let f = formatter(DisplayOptions {
            hex: false,
            timestamps: false,
            control_symbols: false,
        });
        let line = f.render(&raw(&[0xFF, 0x41, 0xFE]));
        assert_eq!(line.rendered, "\u{FF}A\u{FE}");
    }

    #[test]
    fn test_control_escaping() {
        let f = formatter(DisplayOptions {
            hex: false,
            timestamps: false,
            control_symbols: true,
        });
        let line = f.render(&raw(b"\x1B[0mOK\x07"));
        assert_eq!(line.rendered, "\\x1B[0mOK\\x07");
    }

    #[test]
    fn test_options_change_applies_to_next_line() {
        let handle = DisplayHandle::new(DisplayOptions {
            hex: false,
            timestamps: false,
            control_symbols: false,
        });
        let f = Formatter::new(handle.clone());

        assert_eq!(f.render(&raw(b"OK")).rendered, "OK");
        handle.update(|o| o.hex = true);
        assert_eq!(f.render(&raw(b"OK")).rendered, "4F 4B");
    }
}
