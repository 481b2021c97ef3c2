//! Reassembly of JSON objects split across frames.
//!
//! The device streams its settings object in as many frames as it needs, with
//! no length header. Objects are recovered by tracking brace depth: the object
//! starts at the first `{` and ends when depth returns to zero.
//!
//! Scanning works on bytes. `{` and `}` are ASCII and never occur inside a
//! multi-byte UTF-8 sequence, so a frame boundary that splits a character is
//! harmless.

use serde_json::Value;
use tracing::{debug, error};

use crate::Settings;

/// Reassembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the opening brace; other bytes are ignored.
    Idle,
    /// Inside an object at the given nesting depth.
    Accumulating { depth: usize },
}

/// Rebuilds JSON objects from arbitrarily chunked payloads.
#[derive(Debug)]
pub struct JsonReassembler {
    /// Bytes of the object being accumulated.
    buffer: Vec<u8>,
    state: State,
}

impl Default for JsonReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReassembler {
    /// Create an idle reassembler.
    pub fn new() -> Self {
        JsonReassembler {
            buffer: Vec::new(),
            state: State::Idle,
        }
    }

    /// Process one payload chunk.
    ///
    /// Returns one entry per object completed within this chunk: `Some` with
    /// the parsed object, or `None` if the completed text was not a valid JSON
    /// object. Parse failures never escape as errors.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Option<Settings>> {
        debug!(len = chunk.len(), chunk = %String::from_utf8_lossy(chunk), "settings RX chunk");

        let mut completed = Vec::new();
        for &byte in chunk {
            match self.state {
                State::Idle => {
                    if byte == b'{' {
                        self.buffer.push(byte);
                        self.state = State::Accumulating { depth: 1 };
                    }
                }
                State::Accumulating { depth } => {
                    self.buffer.push(byte);
                    let depth = match byte {
                        b'{' => depth + 1,
                        b'}' => depth - 1,
                        _ => depth,
                    };
                    if depth == 0 {
                        completed.push(self.finish());
                    } else {
                        self.state = State::Accumulating { depth };
                    }
                }
            }
        }
        completed
    }

    /// Whether an object is partially accumulated.
    pub fn in_progress(&self) -> bool {
        self.state != State::Idle
    }

    /// Drop any partial object.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::Idle;
    }

    fn finish(&mut self) -> Option<Settings> {
        let parsed = serde_json::from_slice::<Value>(&self.buffer);
        self.reset();
        match parsed {
            Ok(Value::Object(object)) => Some(object),
            Ok(other) => {
                error!("settings response is not a JSON object: {}", other);
                None
            }
            Err(e) => {
                error!("JSON decode error: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Settings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_chunk() {
        let mut reassembler = JsonReassembler::new();
        let out = reassembler.push(br#"{"a":1,"b":{"c":true}}"#);
        assert_eq!(out, vec![Some(object(json!({"a":1,"b":{"c":true}})))]);
        assert!(!reassembler.in_progress());
    }

    #[test]
    fn test_split_across_chunks() {
        let mut reassembler = JsonReassembler::new();
        assert!(reassembler.push(br#"{"app/brightness":"#).is_empty());
        assert!(reassembler.push(br#"25,"nested":{"x""#).is_empty());
        assert!(reassembler.in_progress());
        let out = reassembler.push(br#":[1,2]}}"#);
        assert_eq!(
            out,
            vec![Some(object(json!({"app/brightness":25,"nested":{"x":[1,2]}})))]
        );
    }

    #[test]
    fn test_two_objects_in_one_chunk() {
        let mut reassembler = JsonReassembler::new();
        let out = reassembler.push(br#"{"a":1}{"b":2}{"c""#);
        assert_eq!(
            out,
            vec![Some(object(json!({"a":1}))), Some(object(json!({"b":2})))]
        );
        assert!(reassembler.in_progress());
    }

    #[test]
    fn test_noise_before_object_ignored() {
        let mut reassembler = JsonReassembler::new();
        let out = reassembler.push(b"\r\nboot ok }\r\n{\"a\":1}");
        assert_eq!(out, vec![Some(object(json!({"a":1})))]);
    }

    #[test]
    fn test_parse_failure_yields_none_and_resets() {
        let mut reassembler = JsonReassembler::new();
        let out = reassembler.push(b"{not json}");
        assert_eq!(out, vec![None]);
        assert!(!reassembler.in_progress());

        let out = reassembler.push(br#"{"ok":true}"#);
        assert_eq!(out, vec![Some(object(json!({"ok":true})))]);
    }

    #[test]
    fn test_multibyte_character_split() {
        let text = "{\"name\":\"grüß\"}".as_bytes();
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut reassembler = JsonReassembler::new();
        assert!(reassembler.push(&text[..split]).is_empty());
        let out = reassembler.push(&text[split..]);
        assert_eq!(out, vec![Some(object(json!({"name":"grüß"})))]);
    }

    #[test]
    fn test_reset_discards_partial() {
        let mut reassembler = JsonReassembler::new();
        reassembler.push(b"{\"a\":");
        reassembler.reset();
        let out = reassembler.push(br#"{"b":2}"#);
        assert_eq!(out, vec![Some(object(json!({"b":2})))]);
    }
}
