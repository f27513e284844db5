//! Framing of the Hyprland event stream
//!
//! Every message on `.socket2.sock` has the shape `EVENT>>DATA`. The reader
//! treats the bytes returned by one successful `read` as exactly one message.
//! Stream sockets do not promise that (two events can arrive in one read, or
//! one event can be split over two); handlers rely on one read per message.

use std::fmt;

use thiserror::Error;

/// Separator between the event name and its payload
pub const DELIMITER: &str = ">>";

/// One decoded `(event_name, payload)` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub event_name: String,
    pub payload: String,
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.event_name, DELIMITER, self.payload)
    }
}

/// A message without the `>>` delimiter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed event frame: {raw:?}")]
pub struct MalformedFrame {
    pub raw: String,
}

/// Decode one message read from the event socket
///
/// The text before the first `>>` is the event name, everything after it is
/// the payload (which may itself contain `>>`). A single trailing newline,
/// which Hyprland appends to every message, is not part of the payload.
///
/// # Errors
///
/// Returns `MalformedFrame` if the delimiter is missing, including for empty
/// input.
pub fn decode(chunk: &[u8]) -> Result<RawFrame, MalformedFrame> {
    let text = String::from_utf8_lossy(chunk);
    let message = text.strip_suffix('\n').unwrap_or(&text[..]);

    match message.split_once(DELIMITER) {
        Some((event_name, payload)) => Ok(RawFrame {
            event_name: event_name.to_string(),
            payload: payload.to_string(),
        }),
        None => Err(MalformedFrame {
            raw: message.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_splits_name_and_payload() {
        let frame = decode(b"foo>>bar,baz").unwrap();
        assert_eq!(frame.event_name, "foo");
        assert_eq!(frame.payload, "bar,baz");
    }

    #[test]
    fn test_decode_missing_delimiter() {
        let err = decode(b"nodata").unwrap_err();
        assert_eq!(err.raw, "nodata");
    }

    #[test]
    fn test_decode_empty_input_is_malformed() {
        let err = decode(b"").unwrap_err();
        assert_eq!(err.raw, "");
    }

    #[test]
    fn test_decode_empty_payload() {
        let frame = decode(b"activewindowv2>>").unwrap();
        assert_eq!(frame.event_name, "activewindowv2");
        assert_eq!(frame.payload, "");
    }

    #[test]
    fn test_decode_splits_on_first_delimiter_only() {
        let frame = decode(b"activewindow>>kitty,a >> b").unwrap();
        assert_eq!(frame.event_name, "activewindow");
        assert_eq!(frame.payload, "kitty,a >> b");
    }

    #[test]
    fn test_decode_strips_one_trailing_newline() {
        let frame = decode(b"workspace>>3\n").unwrap();
        assert_eq!(frame.payload, "3");
    }

    #[test]
    fn test_decode_keeps_coalesced_messages_together() {
        // One read is one message, even when the peer sent two
        let frame = decode(b"workspace>>3\nfocusedmon>>DP-1,3\n").unwrap();
        assert_eq!(frame.event_name, "workspace");
        assert_eq!(frame.payload, "3\nfocusedmon>>DP-1,3");
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let frame = decode(b"openwindow>>\xff").unwrap();
        assert_eq!(frame.payload, "\u{fffd}");
    }

    #[test]
    fn test_display_reencodes() {
        let frame = decode(b"closewindow>>0xdeadbeef").unwrap();
        assert_eq!(frame.to_string(), "closewindow>>0xdeadbeef");
    }
}
