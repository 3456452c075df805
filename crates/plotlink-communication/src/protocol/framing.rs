//! Telemetry framing strategies
//!
//! Firmware builds differ in how they separate feedback lines, so the reader
//! feeds raw chunks into a [`FrameDecoder`] picked from configuration:
//!
//! - [`DelimiterFramedDecoder`]: lines are terminated by a sentinel (`!`) and
//!   must look like `,key=value,...\n` to be accepted.
//! - [`BufferedReadDecoder`]: lines are newline separated and only the most
//!   recent complete line of each read is considered.
//!
//! Both never emit the same line twice in a row and drop malformed lines
//! without reporting an error. When unterminated input outgrows the pending
//! limit it is discarded, and so is the rest of that line once its
//! terminator arrives.

use super::telemetry::parse_fields;
use plotlink_core::constants::MIN_FRAME_FIELDS;
use plotlink_core::TelemetryFrame;
use plotlink_settings::{FramingMode, TelemetrySettings};

/// Turns a stream of raw chunks into telemetry frames
pub trait FrameDecoder: Send {
    /// Feed a chunk of device output, returning every frame it completed
    fn feed(&mut self, chunk: &str) -> Vec<TelemetryFrame>;

    /// The most recent line accepted for decoding
    fn last_line(&self) -> Option<&str>;

    /// Forget buffered input and the dedupe cursor
    fn reset(&mut self);
}

/// Build the decoder selected by `settings`
pub fn decoder_for(settings: &TelemetrySettings) -> Box<dyn FrameDecoder> {
    match settings.framing {
        FramingMode::Delimiter => Box::new(DelimiterFramedDecoder::new(
            settings.delimiter,
            settings.max_pending_bytes,
        )),
        FramingMode::BufferedRead => Box::new(BufferedReadDecoder::new(settings.max_pending_bytes)),
    }
}

/// Tracks the last accepted line and turns accepted lines into frames
#[derive(Debug, Default)]
struct LineFilter {
    last_line: Option<String>,
}

impl LineFilter {
    fn is_repeat(&self, line: &str) -> bool {
        self.last_line.as_deref() == Some(line)
    }

    fn accept(&mut self, line: String) -> Option<TelemetryFrame> {
        let frame = parse_fields(&line);
        self.last_line = Some(line);

        if frame.len() < MIN_FRAME_FIELDS {
            tracing::trace!("Dropping telemetry line with {} field(s)", frame.len());
            return None;
        }

        Some(frame)
    }
}

/// Splits the stream on a sentinel character
#[derive(Debug)]
pub struct DelimiterFramedDecoder {
    delimiter: char,
    max_pending: usize,
    pending: String,
    resync: bool,
    filter: LineFilter,
}

impl DelimiterFramedDecoder {
    /// Create a decoder splitting on `delimiter`
    pub fn new(delimiter: char, max_pending: usize) -> Self {
        Self {
            delimiter,
            max_pending,
            pending: String::new(),
            resync: false,
            filter: LineFilter::default(),
        }
    }

    /// Validate one delimited candidate line
    fn candidate(&mut self, line: String) -> Option<TelemetryFrame> {
        if line.is_empty() || self.filter.is_repeat(&line) {
            return None;
        }

        // Exactly one newline, and it ends the line.
        let well_formed = line.starts_with(',') && line.find('\n') == Some(line.len() - 1);
        if !well_formed {
            tracing::trace!("Dropping malformed telemetry line: {:?}", line);
            return None;
        }

        self.filter.accept(line)
    }
}

impl FrameDecoder for DelimiterFramedDecoder {
    fn feed(&mut self, chunk: &str) -> Vec<TelemetryFrame> {
        self.pending.push_str(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.pending.find(self.delimiter) {
            let line: String = self.pending[..pos].to_string();
            self.pending.drain(..pos + self.delimiter.len_utf8());

            if self.resync {
                tracing::trace!("Dropping tail of discarded telemetry: {:?}", line);
                self.resync = false;
                continue;
            }

            if let Some(frame) = self.candidate(line) {
                frames.push(frame);
            }
        }

        if self.pending.len() > self.max_pending {
            tracing::warn!(
                "Discarding {} bytes of undelimited telemetry",
                self.pending.len()
            );
            self.pending.clear();
            self.resync = true;
        }

        frames
    }

    fn last_line(&self) -> Option<&str> {
        self.filter.last_line.as_deref()
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.resync = false;
        self.filter = LineFilter::default();
    }
}

/// Newline framed reads where only the latest complete line matters
///
/// After each chunk the buffer is split on `\n`; the second-to-last segment is
/// the current line and the last (possibly partial) segment is carried over.
#[derive(Debug)]
pub struct BufferedReadDecoder {
    max_pending: usize,
    buffer: String,
    resync: bool,
    filter: LineFilter,
}

impl BufferedReadDecoder {
    /// Create a buffered-read decoder
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending,
            buffer: String::new(),
            resync: false,
            filter: LineFilter::default(),
        }
    }

    /// Drop the buffer if it outgrew the limit without a newline
    fn guard_overflow(&mut self) {
        if self.buffer.len() > self.max_pending {
            tracing::warn!(
                "Discarding {} bytes of unterminated telemetry",
                self.buffer.len()
            );
            self.buffer.clear();
            self.resync = true;
        }
    }
}

impl FrameDecoder for BufferedReadDecoder {
    fn feed(&mut self, chunk: &str) -> Vec<TelemetryFrame> {
        self.buffer.push_str(chunk);

        if self.resync {
            let Some(end) = self.buffer.find('\n') else {
                self.guard_overflow();
                return Vec::new();
            };
            self.buffer.drain(..=end);
            self.resync = false;
        }

        let Some(last_newline) = self.buffer.rfind('\n') else {
            self.guard_overflow();
            return Vec::new();
        };

        let complete = &self.buffer[..last_newline];
        let current = complete
            .rsplit('\n')
            .next()
            .unwrap_or_default()
            .trim_end_matches('\r')
            .to_string();
        self.buffer.drain(..=last_newline);

        if current.is_empty() || self.filter.is_repeat(&current) {
            return Vec::new();
        }

        self.filter.accept(current).into_iter().collect()
    }

    fn last_line(&self) -> Option<&str> {
        self.filter.last_line.as_deref()
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.resync = false;
        self.filter = LineFilter::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delimited() -> DelimiterFramedDecoder {
        DelimiterFramedDecoder::new('!', 4096)
    }

    #[test]
    fn test_delimited_accepts_well_formed_line() {
        let mut decoder = delimited();
        let frames = decoder.feed(",X=10,Y=20\n!");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].x(), Some(10));
        assert_eq!(frames[0].y(), Some(20));
        assert_eq!(decoder.last_line(), Some(",X=10,Y=20\n"));
    }

    #[test]
    fn test_delimited_dedupes_repeats() {
        let mut decoder = delimited();
        let frames = decoder.feed(",X=10,Y=20\n!,X=10,Y=20\n!");
        assert_eq!(frames.len(), 1);

        // A different line in between re-arms the same content.
        let frames = decoder.feed(",X=11,Y=20\n!,X=10,Y=20\n!");
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_delimited_rejects_malformed() {
        let mut decoder = delimited();
        assert!(decoder.feed("X=10,Y=20\n!").is_empty());
        assert!(decoder.feed(",X=10,Y=20!").is_empty());
        assert!(decoder.feed(",X=10\n,Y=20\n!").is_empty());
        assert!(decoder.feed(",X=10\n!").is_empty());
        assert!(decoder.feed("!!").is_empty());
        assert_eq!(decoder.last_line(), Some(",X=10\n"));
    }

    #[test]
    fn test_delimited_holds_partial_chunks() {
        let mut decoder = delimited();
        assert!(decoder.feed(",X=1").is_empty());
        assert!(decoder.feed(",Y=2\n").is_empty());
        let frames = decoder.feed("!,X=3");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].y(), Some(2));
    }

    #[test]
    fn test_delimited_discards_runaway_input() {
        let mut decoder = DelimiterFramedDecoder::new('!', 8);
        assert!(decoder.feed(",X=1234567890").is_empty());
        // The tail of the discarded line looks valid but must not be emitted.
        assert!(decoder.feed(",Y=2,Z=3\n!").is_empty());
        assert_eq!(decoder.last_line(), None);

        let frames = decoder.feed(",Y=2,Z=3\n!");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].get("Z"), Some("3"));
    }

    #[test]
    fn test_buffered_discards_runaway_input() {
        let mut decoder = BufferedReadDecoder::new(8);
        assert!(decoder.feed("X=1234567890").is_empty());
        assert!(decoder.feed(",Y=2").is_empty());

        let frames = decoder.feed("\nX=3,Y=3\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].x(), Some(3));

        assert!(decoder.feed("X=1234567890").is_empty());
        assert!(decoder.feed(",Y=9\n").is_empty());
        assert_eq!(decoder.last_line(), Some("X=3,Y=3"));
    }

    #[test]
    fn test_buffered_uses_latest_complete_line() {
        let mut decoder = BufferedReadDecoder::new(4096);
        let frames = decoder.feed("X=1,Y=1\nX=2,Y=2\nX=3");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].x(), Some(2));

        let frames = decoder.feed(",Y=3\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].x(), Some(3));
        assert_eq!(decoder.last_line(), Some("X=3,Y=3"));
    }

    #[test]
    fn test_buffered_dedupes_repeats() {
        let mut decoder = BufferedReadDecoder::new(4096);
        assert_eq!(decoder.feed("X=1,Y=1\n").len(), 1);
        assert!(decoder.feed("X=1,Y=1\n").is_empty());
        assert!(decoder.feed("\n").is_empty());
    }

    #[test]
    fn test_reset_forgets_cursor() {
        let mut decoder = delimited();
        assert_eq!(decoder.feed(",X=1,Y=1\n!").len(), 1);
        decoder.reset();
        assert_eq!(decoder.last_line(), None);
        assert_eq!(decoder.feed(",X=1,Y=1\n!").len(), 1);
    }

    #[test]
    fn test_decoder_for_settings() {
        let mut settings = TelemetrySettings::default();
        settings.framing = FramingMode::BufferedRead;
        let mut decoder = decoder_for(&settings);
        assert_eq!(decoder.feed("X=1,Y=2\n").len(), 1);

        settings.framing = FramingMode::Delimiter;
        settings.delimiter = '#';
        let mut decoder = decoder_for(&settings);
        assert_eq!(decoder.feed(",X=1,Y=2\n#").len(), 1);
    }
}
