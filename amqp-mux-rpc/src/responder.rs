//! Serving requests from a [`Channel::consume`] loop

use amqp_mux::{Channel, Consume};
use amqp_mux_types::{definitions::DeliveryMode, Delivery, Message, Properties};
use async_trait::async_trait;
use serde_json::json;
use tracing::{instrument, trace, warn};

use crate::{
    envelope::{Codec, Envelope, JsonCodec, MessageType, CONTENT_TYPE_JSON},
    request::Request,
    response::Response,
};

/// Answers requests
///
/// Returning `false` marks the reply as an `error`. Closures of the shape
/// `FnMut(&Request, &mut Response) -> bool` implement this trait.
#[async_trait]
pub trait Respond: Send {
    /// Fill in `response` for `request`
    async fn respond(&mut self, request: &Request, response: &mut Response) -> bool;
}

#[async_trait]
impl<F> Respond for F
where
    F: FnMut(&Request, &mut Response) -> bool + Send,
{
    async fn respond(&mut self, request: &Request, response: &mut Response) -> bool {
        (self)(request, response)
    }
}

/// Adapts a [`Respond`] handler into a [`Consume`] handler
///
/// Each delivery is decoded as a request envelope, answered by the handler and
/// the reply is published on the default exchange to the request's `reply_to`
/// queue with the request's correlation id. Undecodable requests get an
/// `error` reply describing the decode failure.
#[derive(Debug)]
pub struct Responder<H, C = JsonCodec> {
    handler: H,
    codec: C,
    acknowledge: bool,
}

impl<H: Respond> Responder<H> {
    /// Creates a responder with the JSON codec
    pub fn new(handler: H) -> Self {
        Self::with_codec(handler, JsonCodec)
    }
}

impl<H, C> Responder<H, C>
where
    H: Respond,
    C: Codec,
{
    /// Creates a responder with a custom codec
    pub fn with_codec(handler: H, codec: C) -> Self {
        Self {
            handler,
            codec,
            acknowledge: false,
        }
    }

    /// Acknowledge every request once its reply is published. Required if the
    /// requests are consumed with `no_ack` unset.
    pub fn acknowledge(mut self, acknowledge: bool) -> Self {
        self.acknowledge = acknowledge;
        self
    }

    async fn reply_envelope(&mut self, message: &Message) -> Envelope {
        let envelope = match self.codec.decode(&message.body) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "failed to decode request");
                return Envelope::new(0, MessageType::Error, json!({ "error": err.to_string() }));
            }
        };

        let request = Request::from_parts(envelope, message.properties.clone());
        let mut response = Response::for_request(&request);
        if !self.handler.respond(&request, &mut response).await {
            response.set_kind(MessageType::Error);
        }
        response.into_envelope()
    }

    async fn reply(&mut self, channel: &Channel, message: &Message) {
        let Some(reply_to) = message.properties.reply_to.as_deref().filter(|r| !r.is_empty()) else {
            warn!("request has no reply_to, skipping");
            return;
        };

        let envelope = self.reply_envelope(message).await;
        let payload = match self.codec.encode(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "failed to encode reply");
                return;
            }
        };

        let mut properties = Properties::builder()
            .content_type(CONTENT_TYPE_JSON)
            .delivery_mode(DeliveryMode::Persistent)
            .message_type(envelope.kind.as_str())
            .build();
        properties.correlation_id = message.properties.correlation_id.clone();

        let reply = Message::new(payload).with_properties(properties);
        match channel.publish("", reply_to, &reply, false, false).await {
            Ok(()) => trace!(reply_to, kind = %envelope.kind, "replied"),
            Err(err) => warn!(reply_to, %err, "failed to publish reply"),
        }
    }
}

#[async_trait]
impl<H, C> Consume for Responder<H, C>
where
    H: Respond,
    C: Codec,
{
    #[instrument(skip_all, fields(channel = channel.id(), delivery_tag = delivery.delivery_tag))]
    async fn consume(&mut self, channel: &Channel, delivery: Delivery) {
        self.reply(channel, &delivery.message).await;

        if self.acknowledge {
            if let Err(err) = channel.ack(delivery.delivery_tag, false).await {
                warn!(%err, "failed to acknowledge request");
            }
        }
    }
}
