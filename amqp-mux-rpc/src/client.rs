//! Publish-and-wait over a private reply queue

use std::time::Duration;

use amqp_mux::{assembler::Assembler, Channel, Connection};
use amqp_mux_types::{
    definitions::DeliveryMode,
    methods::{BasicConsume, QueueDeclare},
    Message, Properties,
};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use crate::{
    envelope::{Codec, Envelope, JsonCodec, MessageType, CONTENT_TYPE_JSON},
    error::{CallError, ProtocolError},
    response::Response,
};

/// Longest time the connection lock is held while waiting for a reply frame
const FRAME_WAIT_SLICE: Duration = Duration::from_millis(10);

/// Generates a random id suitable as a correlation id
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Makes request/reply calls on its own channel
///
/// A client has at most one call in flight. Concurrent calls on one
/// connection use one client each.
#[derive(Debug)]
pub struct RpcClient<C = JsonCodec> {
    channel: Channel,
    codec: C,
    next_id: i64,
}

impl RpcClient<JsonCodec> {
    /// Opens a new channel on `connection` for the client
    pub async fn open(connection: &Connection) -> Result<Self, amqp_mux::Error> {
        let channel = Channel::open(connection).await?;
        Ok(Self::new(channel))
    }

    /// Creates a client on an open channel
    pub fn new(channel: Channel) -> Self {
        Self::with_codec(channel, JsonCodec)
    }
}

impl<C: Codec> RpcClient<C> {
    /// Creates a client that encodes envelopes with `codec`
    pub fn with_codec(channel: Channel, codec: C) -> Self {
        Self {
            channel,
            codec,
            next_id: 1,
        }
    }

    /// The channel the client publishes and waits on
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Closes the client's channel
    pub async fn close(self) -> Result<(), amqp_mux::Error> {
        self.channel.close().await
    }

    /// Publishes `body` as a request to `exchange` with `routing_key` and waits
    /// up to `timeout` for the reply.
    ///
    /// The reply is read from an exclusive, broker-named queue and accepted only
    /// if its correlation id matches the request. A reply of type `error` is
    /// returned as a [`Response`] whose [`ok`](Response::ok) is `false`.
    #[instrument(skip(self, body), fields(channel = self.channel.id()))]
    pub async fn publish_and_wait(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<Response, CallError> {
        let deadline = Instant::now() + timeout;

        let reply_queue = self
            .channel
            .declare_queue(
                QueueDeclare::new("").exclusive(true).auto_delete(true),
                "",
                "",
            )
            .await?;

        let id = self.next_id;
        self.next_id += 1;
        let correlation_id = generate_request_id();
        let payload = self.codec.encode(&Envelope::request(id, body))?;
        let properties = Properties::builder()
            .content_type(CONTENT_TYPE_JSON)
            .delivery_mode(DeliveryMode::Persistent)
            .reply_to(reply_queue.as_str())
            .correlation_id(correlation_id.as_str())
            .message_type(MessageType::Request.as_str())
            .build();
        let message = Message::new(payload).with_properties(properties);
        self.channel
            .publish(exchange, routing_key, &message, false, false)
            .await?;
        debug!(id, %correlation_id, %reply_queue, "request published");

        let consumer_tag = self
            .channel
            .basic_consume(&BasicConsume::new(reply_queue.as_str()))
            .await?;
        let result = self.wait_reply(&correlation_id, deadline, timeout).await;
        if let Err(err) = self.channel.cancel(&consumer_tag).await {
            warn!(%consumer_tag, %err, "failed to cancel reply consumer");
        }
        result
    }

    async fn wait_reply(
        &mut self,
        correlation_id: &str,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Response, CallError> {
        let mut assembler = Assembler::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(CallError::Timeout(timeout));
            }

            let slice = (deadline - now).min(FRAME_WAIT_SLICE);
            let frame = match self.channel.wait_frame(slice).await {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(err) => return Err(ProtocolError::FrameRead(err).into()),
            };

            let delivery = match assembler.push(frame).map_err(ProtocolError::from)? {
                Some(delivery) => delivery,
                None => continue,
            };
            if delivery.message.properties.correlation_id.as_deref() != Some(correlation_id) {
                trace!(
                    received = ?delivery.message.properties.correlation_id,
                    "discarding reply with another correlation id"
                );
                continue;
            }

            let envelope = self.codec.decode(delivery.body())?;
            return Ok(Response::from_parts(
                envelope,
                delivery.into_message().properties,
            ));
        }
    }
}
