//! The JSON envelope exchanged by cooperating clients and servers
//!
//! ```json
//! {"id": 7, "type": "request", "body": {"query_name": "get-user-by-id"}}
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// Content type of encoded envelopes
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// The `type` field of an [`Envelope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// A request expecting a reply
    Request,

    /// A successful reply
    Response,

    /// A failed reply
    Error,
}

impl MessageType {
    /// The wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{id, type, body}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlates a logical call
    pub id: i64,

    /// Request, response or error
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Application payload
    #[serde(default)]
    pub body: Value,
}

impl Envelope {
    /// Creates an envelope
    pub fn new(id: i64, kind: MessageType, body: Value) -> Self {
        Self { id, kind, body }
    }

    /// Creates a request envelope
    pub fn request(id: i64, body: Value) -> Self {
        Self::new(id, MessageType::Request, body)
    }
}

/// Turns envelopes into message bodies and back
pub trait Codec: Send + Sync {
    /// Encode an envelope
    fn encode(&self, envelope: &Envelope) -> Result<Bytes, CodecError>;

    /// Decode an envelope
    fn decode(&self, payload: &[u8]) -> Result<Envelope, CodecError>;
}

/// JSON codec.
///
/// Object keys inside `body` are written in sorted order, so structurally equal
/// envelopes encode to the same bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Bytes, CodecError> {
        let buf = serde_json::to_vec(envelope)?;
        Ok(Bytes::from(buf))
    }

    fn decode(&self, payload: &[u8]) -> Result<Envelope, CodecError> {
        let envelope = serde_json::from_slice(payload)?;
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn query_request_survives_the_codec() {
        let envelope = Envelope::request(
            7,
            json!({"query_name": "get-user-by-id", "query_data": {"id": 1}}),
        );
        let encoded = JsonCodec.encode(&envelope).unwrap();
        assert_eq!(
            &encoded[..],
            br#"{"id":7,"type":"request","body":{"query_data":{"id":1},"query_name":"get-user-by-id"}}"#
        );
        assert_eq!(JsonCodec.decode(&encoded).unwrap(), envelope);
    }

    #[test]
    fn key_order_does_not_change_the_encoding() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": true, "x": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": null, "y": true}, "b": 1}"#).unwrap();

        let a = JsonCodec.encode(&Envelope::new(1, MessageType::Response, a)).unwrap();
        let b = JsonCodec.encode(&Envelope::new(1, MessageType::Response, b)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_body_decodes_as_null() {
        let envelope = JsonCodec.decode(br#"{"id": 3, "type": "error"}"#).unwrap();
        assert_eq!(envelope.kind, MessageType::Error);
        assert_eq!(envelope.body, Value::Null);
    }

    #[test]
    fn malformed_envelopes_are_rejected() {
        assert!(JsonCodec.decode(b"not json").is_err());
        assert!(JsonCodec.decode(br#"{"id": 1, "type": "notify", "body": {}}"#).is_err());
        assert!(JsonCodec.decode(br#"{"type": "request", "body": {}}"#).is_err());
    }
}
