//! Signaling envelope
//!
//! Inbound signaling messages are JSON objects carrying a `type` tag:
//! `{"type": "offer", "sdp": "..."}`. The relay only looks at the tag (and at
//! ICE candidate strings) for logging and stats; the payload itself is never
//! rewritten, and the original frame is what gets forwarded.

use super::SignalingError;
use serde_json::Value;
use std::fmt;

/// Signaling message classification, used for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Offer,
    Answer,
    Candidate,
    Ping,
    Pong,
    DelayReport,
    /// Any other tag, or no tag at all
    Unknown,
}

impl MessageKind {
    pub const ALL: [MessageKind; 7] = [
        MessageKind::Offer,
        MessageKind::Answer,
        MessageKind::Candidate,
        MessageKind::Ping,
        MessageKind::Pong,
        MessageKind::DelayReport,
        MessageKind::Unknown,
    ];

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "offer" => MessageKind::Offer,
            "answer" => MessageKind::Answer,
            "candidate" => MessageKind::Candidate,
            "ping" => MessageKind::Ping,
            "pong" => MessageKind::Pong,
            "delay-report" => MessageKind::DelayReport,
            _ => MessageKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Offer => "offer",
            MessageKind::Answer => "answer",
            MessageKind::Candidate => "candidate",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::DelayReport => "delay-report",
            MessageKind::Unknown => "unknown",
        }
    }

    /// Stable index into per-kind counter arrays
    pub fn index(&self) -> usize {
        match self {
            MessageKind::Offer => 0,
            MessageKind::Answer => 1,
            MessageKind::Candidate => 2,
            MessageKind::Ping => 3,
            MessageKind::Pong => 4,
            MessageKind::DelayReport => 5,
            MessageKind::Unknown => 6,
        }
    }

    /// Liveness/latency traffic, logged at trace level to keep logs readable
    pub fn is_keepalive(&self) -> bool {
        matches!(
            self,
            MessageKind::Ping | MessageKind::Pong | MessageKind::DelayReport
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a decoded JSON value by its `type` tag.
///
/// Anything that is not an object with a string `type` is `Unknown`.
pub fn classify(value: &Value) -> MessageKind {
    value
        .get("type")
        .and_then(Value::as_str)
        .map(MessageKind::from_tag)
        .unwrap_or(MessageKind::Unknown)
}

/// Decoded view of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: MessageKind,
    /// Raw ICE candidate line, when the message is a `candidate`
    pub candidate: Option<String>,
}

impl Envelope {
    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, SignalingError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SignalingError::Decode(e.to_string()))?;
        Ok(Self::from_value(&value))
    }

    /// Decode a binary frame holding UTF-8 JSON
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, SignalingError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| SignalingError::Decode(e.to_string()))?;
        Ok(Self::from_value(&value))
    }

    fn from_value(value: &Value) -> Self {
        let kind = classify(value);
        let candidate = if kind == MessageKind::Candidate {
            candidate_line(value)
        } else {
            None
        };
        Self { kind, candidate }
    }

    /// Transport and candidate type of the carried ICE candidate, lowercased
    pub fn ice_summary(&self) -> (Option<String>, Option<String>) {
        match self.candidate.as_deref() {
            Some(line) => parse_ice_candidate(line),
            None => (None, None),
        }
    }
}

/// Browsers send either `{"candidate": "candidate:..."}` or the full
/// `RTCIceCandidateInit` object `{"candidate": {"candidate": "candidate:...", ...}}`.
fn candidate_line(value: &Value) -> Option<String> {
    match value.get("candidate")? {
        Value::String(line) => Some(line.clone()),
        Value::Object(init) => init
            .get("candidate")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Extract `(transport, typ)` from an ICE candidate attribute line
pub fn parse_ice_candidate(candidate: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = candidate.split_whitespace().collect();
    if parts.len() < 8 {
        return (None, None);
    }

    let transport = parts.get(2).map(|v| v.to_ascii_lowercase());
    let mut candidate_type = None;
    if let Some(idx) = parts.iter().position(|p| *p == "typ") {
        if let Some(typ) = parts.get(idx + 1) {
            candidate_type = Some(typ.to_ascii_lowercase());
        }
    }

    (transport, candidate_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_tags() {
        let cases = [
            (r#"{"type":"offer","sdp":"v=0"}"#, MessageKind::Offer),
            (r#"{"type":"answer","sdp":"v=0"}"#, MessageKind::Answer),
            (r#"{"type":"candidate","candidate":null}"#, MessageKind::Candidate),
            (r#"{"type":"ping","timestamp":1}"#, MessageKind::Ping),
            (r#"{"type":"pong","timestamp":1}"#, MessageKind::Pong),
            (r#"{"type":"delay-report","delay":12.5}"#, MessageKind::DelayReport),
        ];
        for (text, expected) in cases {
            assert_eq!(Envelope::decode(text).unwrap().kind, expected, "{}", text);
        }
    }

    #[test]
    fn test_unrecognized_or_missing_tag_is_unknown() {
        assert_eq!(Envelope::decode(r#"{"type":"hello"}"#).unwrap().kind, MessageKind::Unknown);
        assert_eq!(Envelope::decode(r#"{"sdp":"v=0"}"#).unwrap().kind, MessageKind::Unknown);
        assert_eq!(Envelope::decode(r#"{"type":7}"#).unwrap().kind, MessageKind::Unknown);
        assert_eq!(Envelope::decode("[1,2,3]").unwrap().kind, MessageKind::Unknown);
    }

    #[test]
    fn test_malformed_text_is_decode_error() {
        assert!(matches!(
            Envelope::decode("not json"),
            Err(SignalingError::Decode(_))
        ));
        assert!(Envelope::decode_bytes(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_decode_bytes() {
        let env = Envelope::decode_bytes(br#"{"type":"answer"}"#).unwrap();
        assert_eq!(env.kind, MessageKind::Answer);
    }

    #[test]
    fn test_candidate_from_init_object() {
        let text = r#"{"type":"candidate","candidate":{"candidate":"candidate:842163049 1 udp 1677729535 203.0.113.7 46154 typ srflx raddr 0.0.0.0 rport 0","sdpMid":"0","sdpMLineIndex":0}}"#;
        let env = Envelope::decode(text).unwrap();
        assert_eq!(
            env.ice_summary(),
            (Some("udp".to_string()), Some("srflx".to_string()))
        );
    }

    #[test]
    fn test_candidate_from_plain_string() {
        let text = r#"{"type":"candidate","candidate":"candidate:1 1 TCP 2105524479 10.0.0.2 9 typ host tcptype active"}"#;
        let env = Envelope::decode(text).unwrap();
        assert_eq!(
            env.ice_summary(),
            (Some("tcp".to_string()), Some("host".to_string()))
        );
    }

    #[test]
    fn test_short_candidate_line_is_ignored() {
        assert_eq!(parse_ice_candidate("candidate:1 1 udp"), (None, None));
        let env = Envelope::decode(r#"{"type":"candidate","x":1}"#).unwrap();
        assert_eq!(env.candidate, None);
    }

    #[test]
    fn test_kind_indices_are_distinct() {
        for (i, kind) in MessageKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(MessageKind::from_tag(kind.as_str()), *kind);
        }
    }
}
