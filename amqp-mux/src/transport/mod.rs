//! The port through which the connection layer talks to the broker
//!
//! A [`Transport`] is one authenticated session. It is only ever driven by one
//! caller at a time: [`crate::Connection`] keeps it behind its lock.
//!
//! Frame reads are scoped by channel. [`Transport::wait_frame`] hands out the
//! next frame addressed to one channel, and [`Transport::consume_message`] the
//! next complete delivery on any of a set of channels. Frames that arrive for
//! other channels stay buffered in the transport until they are asked for.

use std::time::Duration;

use amqp_mux_types::{
    definitions::{ChannelId, DeliveryTag},
    methods::{BasicConsume, ExchangeDeclare, QueueDeclare},
    Delivery, Frame, Message,
};
use async_trait::async_trait;

mod error;
pub use error::*;

pub mod memory;

/// Opens new transport sessions
#[async_trait]
pub trait Connect: Send + Sync {
    /// Opens a socket to `host:port`
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Transport>, Error>;
}

/// One session with a broker
#[async_trait]
pub trait Transport: Send {
    /// Performs the handshake and logs into `vhost`
    async fn login(
        &mut self,
        vhost: &str,
        username: &str,
        password: &str,
        frame_max: u32,
    ) -> Result<(), Error>;

    /// `channel.open`
    async fn channel_open(&mut self, channel: ChannelId) -> Result<(), Error>;

    /// `channel.close`
    async fn channel_close(&mut self, channel: ChannelId) -> Result<(), Error>;

    /// `exchange.declare`
    async fn exchange_declare(
        &mut self,
        channel: ChannelId,
        args: &ExchangeDeclare,
    ) -> Result<(), Error>;

    /// `exchange.bind`
    async fn exchange_bind(
        &mut self,
        channel: ChannelId,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error>;

    /// `exchange.unbind`
    async fn exchange_unbind(
        &mut self,
        channel: ChannelId,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error>;

    /// `queue.declare`, returning the queue name (generated by the broker if
    /// the requested name is empty)
    async fn queue_declare(
        &mut self,
        channel: ChannelId,
        args: &QueueDeclare,
    ) -> Result<String, Error>;

    /// `queue.bind`
    async fn queue_bind(
        &mut self,
        channel: ChannelId,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error>;

    /// `queue.unbind`
    async fn queue_unbind(
        &mut self,
        channel: ChannelId,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error>;

    /// `basic.publish` followed by the content header and body
    async fn basic_publish(
        &mut self,
        channel: ChannelId,
        exchange: &str,
        routing_key: &str,
        message: &Message,
        mandatory: bool,
        immediate: bool,
    ) -> Result<(), Error>;

    /// `basic.consume`, returning the consumer tag
    async fn basic_consume(
        &mut self,
        channel: ChannelId,
        args: &BasicConsume,
    ) -> Result<String, Error>;

    /// `basic.cancel`
    async fn basic_cancel(&mut self, channel: ChannelId, consumer_tag: &str) -> Result<(), Error>;

    /// `basic.qos`
    async fn basic_qos(
        &mut self,
        channel: ChannelId,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<(), Error>;

    /// `basic.ack`
    async fn basic_ack(
        &mut self,
        channel: ChannelId,
        delivery_tag: DeliveryTag,
        multiple: bool,
    ) -> Result<(), Error>;

    /// `basic.nack`
    async fn basic_nack(
        &mut self,
        channel: ChannelId,
        delivery_tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error>;

    /// Releases decode buffers that are no longer referenced
    fn release_buffers(&mut self) {}

    /// Waits up to `timeout` for the next frame on `channel`.
    ///
    /// Returns `Ok(None)` if no frame arrived in time.
    async fn wait_frame(
        &mut self,
        channel: ChannelId,
        timeout: Duration,
    ) -> Result<Option<Frame>, Error>;

    /// Waits up to `timeout` for the next complete delivery on any of `channels`.
    ///
    /// Returns `Ok(None)` if nothing was delivered in time. The dispatch loop
    /// drops this future on shutdown, so it must not lose frames when
    /// cancelled.
    async fn consume_message(
        &mut self,
        channels: &[ChannelId],
        timeout: Duration,
    ) -> Result<Option<Delivery>, Error>;

    /// `connection.close`
    async fn close(&mut self) -> Result<(), Error>;
}
