use std::{collections::HashMap, sync::Arc, time::Duration};

use amqp_mux_types::{
    definitions::{ChannelId, DeliveryTag},
    methods::{BasicConsume, ExchangeDeclare, QueueDeclare},
    Delivery, Frame, Message,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{sync::Notify, time::Instant};
use tracing::{instrument, trace};

use super::state::{SessionKey, State};
use crate::{
    assembler::Assembler,
    transport::{Error, Transport},
};

/// One session on a [`super::MemoryBroker`]
///
/// Dropping the transport closes the session.
#[derive(Debug)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
    session: SessionKey,
    notify: Arc<Notify>,
    assemblers: HashMap<ChannelId, Assembler>,
    cursor: usize,
    closed: bool,
}

impl MemoryTransport {
    pub(super) fn new(state: Arc<Mutex<State>>, session: SessionKey, notify: Arc<Notify>) -> Self {
        Self {
            state,
            session,
            notify,
            assemblers: HashMap::new(),
            cursor: 0,
            closed: false,
        }
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut State, SessionKey) -> Result<T, Error>,
    ) -> Result<T, Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let mut state = self.state.lock();
        f(&mut state, self.session)
    }

    /// Feeds buffered frames into the per-channel assemblers until one
    /// delivery completes. Channels are visited round-robin across calls.
    fn assemble_ready(&mut self, channels: &[ChannelId]) -> Result<Option<Delivery>, Error> {
        let count = channels.len();
        for offset in 0..count {
            let channel = channels[(self.cursor + offset) % count];
            loop {
                let frame = match self.with_state(|s, k| s.pop_frame(k, channel, "consume_message")) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    // Channel is not open on this session
                    Err(Error::Server { .. }) => break,
                    Err(err) => return Err(err),
                };
                let assembler = self.assemblers.entry(channel).or_default();
                match assembler.push(frame) {
                    Ok(Some(delivery)) => {
                        self.cursor = (self.cursor + offset + 1) % count;
                        return Ok(Some(delivery));
                    }
                    Ok(None) => {}
                    Err(err) => return Err(Error::library("consume_message", err.to_string())),
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    #[instrument(skip(self, password))]
    async fn login(
        &mut self,
        vhost: &str,
        username: &str,
        password: &str,
        frame_max: u32,
    ) -> Result<(), Error> {
        self.with_state(|s, k| s.login(k, vhost, username, password, frame_max))
    }

    async fn channel_open(&mut self, channel: ChannelId) -> Result<(), Error> {
        trace!(channel, "channel_open");
        self.with_state(|s, k| s.channel_open(k, channel))
    }

    async fn channel_close(&mut self, channel: ChannelId) -> Result<(), Error> {
        trace!(channel, "channel_close");
        self.assemblers.remove(&channel);
        self.with_state(|s, k| s.channel_close(k, channel))
    }

    async fn exchange_declare(
        &mut self,
        channel: ChannelId,
        args: &ExchangeDeclare,
    ) -> Result<(), Error> {
        trace!(channel, ?args, "exchange_declare");
        self.with_state(|s, k| s.exchange_declare(k, channel, args))
    }

    async fn exchange_bind(
        &mut self,
        channel: ChannelId,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        trace!(channel, destination, source, routing_key, "exchange_bind");
        self.with_state(|s, k| s.exchange_bind(k, channel, destination, source, routing_key))
    }

    async fn exchange_unbind(
        &mut self,
        channel: ChannelId,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        trace!(channel, destination, source, routing_key, "exchange_unbind");
        self.with_state(|s, k| s.exchange_unbind(k, channel, destination, source, routing_key))
    }

    async fn queue_declare(
        &mut self,
        channel: ChannelId,
        args: &QueueDeclare,
    ) -> Result<String, Error> {
        trace!(channel, ?args, "queue_declare");
        self.with_state(|s, k| s.queue_declare(k, channel, args))
    }

    async fn queue_bind(
        &mut self,
        channel: ChannelId,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        trace!(channel, queue, exchange, routing_key, "queue_bind");
        self.with_state(|s, k| s.queue_bind(k, channel, queue, exchange, routing_key))
    }

    async fn queue_unbind(
        &mut self,
        channel: ChannelId,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        trace!(channel, queue, exchange, routing_key, "queue_unbind");
        self.with_state(|s, k| s.queue_unbind(k, channel, queue, exchange, routing_key))
    }

    async fn basic_publish(
        &mut self,
        channel: ChannelId,
        exchange: &str,
        routing_key: &str,
        message: &Message,
        mandatory: bool,
        immediate: bool,
    ) -> Result<(), Error> {
        trace!(
            channel,
            exchange,
            routing_key,
            size = message.body.len(),
            mandatory,
            immediate,
            "basic_publish"
        );
        self.with_state(|s, k| s.publish(k, channel, exchange, routing_key, message))
    }

    async fn basic_consume(
        &mut self,
        channel: ChannelId,
        args: &BasicConsume,
    ) -> Result<String, Error> {
        trace!(channel, ?args, "basic_consume");
        self.with_state(|s, k| s.consume(k, channel, args))
    }

    async fn basic_cancel(&mut self, channel: ChannelId, consumer_tag: &str) -> Result<(), Error> {
        trace!(channel, consumer_tag, "basic_cancel");
        self.with_state(|s, k| s.cancel(k, channel, consumer_tag))
    }

    async fn basic_qos(
        &mut self,
        channel: ChannelId,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<(), Error> {
        trace!(channel, prefetch_size, prefetch_count, global, "basic_qos");
        self.with_state(|s, k| s.qos(k, channel, prefetch_count))
    }

    async fn basic_ack(
        &mut self,
        channel: ChannelId,
        delivery_tag: DeliveryTag,
        multiple: bool,
    ) -> Result<(), Error> {
        trace!(channel, delivery_tag, multiple, "basic_ack");
        self.with_state(|s, k| s.ack(k, channel, delivery_tag, multiple))
    }

    async fn basic_nack(
        &mut self,
        channel: ChannelId,
        delivery_tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error> {
        trace!(channel, delivery_tag, multiple, requeue, "basic_nack");
        self.with_state(|s, k| s.nack(k, channel, delivery_tag, multiple, requeue))
    }

    async fn wait_frame(
        &mut self,
        channel: ChannelId,
        timeout: Duration,
    ) -> Result<Option<Frame>, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.with_state(|s, k| s.pop_frame(k, channel, "wait_frame"))? {
                return Ok(Some(frame));
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn consume_message(
        &mut self,
        channels: &[ChannelId],
        timeout: Duration,
    ) -> Result<Option<Delivery>, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(delivery) = self.assemble_ready(channels)? {
                return Ok(Some(delivery));
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        trace!(session = self.session, "close");
        self.state.lock().close_session(self.session);
        self.closed = true;
        self.assemblers.clear();
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        if !self.closed {
            self.state.lock().close_session(self.session);
        }
    }
}
