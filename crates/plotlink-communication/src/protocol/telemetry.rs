//! Telemetry line tokenizer
//!
//! Device feedback is a comma separated list of `key=value` tokens,
//! e.g. `,X=1200,Y=340\n`. Tokens that are not exactly one key and one value
//! are skipped; the channel is noisy and a partial frame is still useful.
//! Keys are kept verbatim, values are trimmed.

use plotlink_core::TelemetryFrame;

/// Decode the well-formed `key=value` tokens of one line
pub fn parse_fields(line: &str) -> TelemetryFrame {
    let mut frame = TelemetryFrame::new();

    for token in line.split(',') {
        let mut parts = token.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };

        if key.is_empty() || value.is_empty() {
            continue;
        }

        frame.insert(key, value.trim());
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_malformed_tokens() {
        let frame = parse_fields("X=10,=5,Y=,Z=20");
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get("X"), Some("10"));
        assert_eq!(frame.get("Z"), Some("20"));
        assert_eq!(frame.get("Y"), None);
    }

    #[test]
    fn test_value_is_trimmed() {
        let frame = parse_fields(",X=1200,Y=340\n");
        assert_eq!(frame.x(), Some(1200));
        assert_eq!(frame.get("Y"), Some("340"));
    }

    #[test]
    fn test_rejects_extra_equals() {
        let frame = parse_fields("A=1=2,B=3");
        assert_eq!(frame.get("A"), None);
        assert_eq!(frame.get("B"), Some("3"));
    }

    #[test]
    fn test_whitespace_value_kept_empty() {
        let frame = parse_fields(",X=5,Y=\n");
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get("X"), Some("5"));
        assert_eq!(frame.get("Y"), Some(""));
        assert_eq!(frame.y(), None);
    }

    #[test]
    fn test_key_is_not_trimmed() {
        let frame = parse_fields(",X=1, Y=2\n");
        assert_eq!(frame.get(" Y"), Some("2"));
        assert_eq!(frame.get("Y"), None);
    }
}
