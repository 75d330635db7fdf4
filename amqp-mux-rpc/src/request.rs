use amqp_mux_types::Properties;
use serde_json::Value;

use crate::envelope::Envelope;

/// A decoded request as seen by a [`crate::Respond`] handler
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: i64,
    body: Value,
    properties: Properties,
}

impl Request {
    pub(crate) fn from_parts(envelope: Envelope, properties: Properties) -> Self {
        Self {
            id: envelope.id,
            body: envelope.body,
            properties,
        }
    }

    /// Envelope id of the request
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Request payload
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Properties of the message that carried the request
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Shorthand for the `reply_to` property
    pub fn reply_to(&self) -> Option<&str> {
        self.properties.reply_to.as_deref()
    }

    /// Shorthand for the `correlation_id` property
    pub fn correlation_id(&self) -> Option<&str> {
        self.properties.correlation_id.as_deref()
    }

    /// Consume the request to get the payload
    pub fn into_body(self) -> Value {
        self.body
    }
}
