use amqp_mux_types::Properties;
use serde_json::Value;

use crate::{
    envelope::{Envelope, MessageType},
    request::Request,
};

/// A reply to a [`Request`]
///
/// A response is successful unless its type is [`MessageType::Error`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    id: i64,
    kind: MessageType,
    body: Value,
    properties: Properties,
}

impl Response {
    /// An empty successful reply to `request`
    pub fn for_request(request: &Request) -> Self {
        Self {
            id: request.id(),
            kind: MessageType::Response,
            body: Value::Null,
            properties: Properties::default(),
        }
    }

    pub(crate) fn from_parts(envelope: Envelope, properties: Properties) -> Self {
        Self {
            id: envelope.id,
            kind: envelope.kind,
            body: envelope.body,
            properties,
        }
    }

    pub(crate) fn into_envelope(self) -> Envelope {
        Envelope::new(self.id, self.kind, self.body)
    }

    /// Whether the call succeeded
    pub fn ok(&self) -> bool {
        self.kind != MessageType::Error
    }

    /// Envelope id, equal to the id of the request
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Type of the reply
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Marks the reply as failed or successful
    pub fn set_kind(&mut self, kind: MessageType) {
        self.kind = kind;
    }

    /// Reply payload
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Replaces the reply payload
    pub fn set_body(&mut self, body: impl Into<Value>) {
        self.body = body.into();
    }

    /// Properties of the message that carried the reply
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Consume the response to get the payload
    pub fn into_body(self) -> Value {
        self.body
    }
}
