//! Application messages and delivered messages

use bytes::Bytes;

use crate::{
    definitions::{ChannelId, DeliveryTag},
    properties::Properties,
};

/// Application payload plus its content properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Content properties
    pub properties: Properties,

    /// Message body
    pub body: Bytes,
}

impl Message {
    /// Creates a message with no properties
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            properties: Properties::default(),
            body: body.into(),
        }
    }

    /// Replaces the properties
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Get a reference to the body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get a reference to the properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Get a mutable reference to the properties
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Consume the message to get the body
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

impl From<&'static str> for Message {
    fn from(body: &'static str) -> Self {
        Self::new(body)
    }
}

impl From<String> for Message {
    fn from(body: String) -> Self {
        Self::new(body)
    }
}

impl From<Vec<u8>> for Message {
    fn from(body: Vec<u8>) -> Self {
        Self::new(body)
    }
}

impl From<Bytes> for Message {
    fn from(body: Bytes) -> Self {
        Self::new(body)
    }
}

/// A message delivered to a consumer together with its delivery metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel the delivery arrived on
    pub channel: ChannelId,

    /// Tag of the consumer the message was delivered to
    pub consumer_tag: String,

    /// Tag to acknowledge or reject this delivery with
    pub delivery_tag: DeliveryTag,

    /// Whether the message has been delivered before
    pub redelivered: bool,

    /// Exchange the message was published to
    pub exchange: String,

    /// Routing key the message was published with
    pub routing_key: String,

    /// The delivered message
    pub message: Message,
}

impl Delivery {
    /// Get a reference to the delivered message
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Consume the delivery to get the message
    pub fn into_message(self) -> Message {
        self.message
    }

    /// Shorthand for the body of the delivered message
    pub fn body(&self) -> &Bytes {
        &self.message.body
    }
}
