//! Implements channels multiplexed over a [`Connection`]

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use amqp_mux_types::{
    definitions::{ChannelId, DeliveryTag},
    methods::{BasicConsume, ExchangeDeclare, QueueDeclare},
    Delivery, Frame, Message,
};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{
    connection::{Connection, Inner},
    Error,
};

mod consume;
pub use consume::*;

mod subscription;

/// A logical channel over a shared [`Connection`]
///
/// Every operation takes the connection lock for the single transport call it
/// performs. Only [`Channel::consume`] registers the channel with the
/// connection's dispatch loop, for as long as the call runs.
///
/// Dropping a channel that was not closed with [`Channel::close`] closes it in
/// the background if a tokio runtime is available.
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    connection: Weak<Inner>,

    inbound_tx: UnboundedSender<Delivery>,
    inbound_rx: Mutex<UnboundedReceiver<Delivery>>,

    /// Parent of `cancel`, cancelled when the connection shuts down
    shutdown: CancellationToken,
    cancel: CancellationToken,
    closed: bool,
}

impl Channel {
    /// Allocates a channel id on `connection` and opens the channel
    #[instrument(skip_all)]
    pub async fn open(connection: &Connection) -> Result<Self, Error> {
        let inner = &connection.inner;
        let id = inner.allocate_channel_id()?;
        inner.lock().await?.transport.channel_open(id).await?;
        debug!(channel = id, "channel opened");

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Ok(Self {
            id,
            connection: Arc::downgrade(inner),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            shutdown: inner.shutdown.clone(),
            cancel: inner.shutdown.child_token(),
            closed: false,
        })
    }

    /// Get the channel id
    pub fn id(&self) -> ChannelId {
        self.id
    }

    fn connection(&self) -> Result<Arc<Inner>, Error> {
        self.connection.upgrade().ok_or(Error::ConnectionClosed)
    }

    /// Declares a queue and returns its name, which the broker generates if
    /// `args.queue` is empty.
    ///
    /// The queue is also bound to `exchange` with `routing_key` if both are
    /// non-empty.
    #[instrument(skip_all, fields(channel = self.id, queue = %args.queue))]
    pub async fn declare_queue(
        &self,
        args: QueueDeclare,
        exchange: &str,
        routing_key: &str,
    ) -> Result<String, Error> {
        let inner = self.connection()?;
        let queue = inner
            .lock()
            .await?
            .transport
            .queue_declare(self.id, &args)
            .await?;
        trace!(%queue, "declared");

        if !exchange.is_empty() && !routing_key.is_empty() {
            inner
                .lock()
                .await?
                .transport
                .queue_bind(self.id, &queue, exchange, routing_key)
                .await?;
        }
        Ok(queue)
    }

    /// Binds `queue` to `exchange`
    #[instrument(skip(self), fields(channel = self.id))]
    pub async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared
            .transport
            .queue_bind(self.id, queue, exchange, routing_key)
            .await?;
        Ok(())
    }

    /// Removes a binding of `queue` to `exchange`
    #[instrument(skip(self), fields(channel = self.id))]
    pub async fn unbind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared
            .transport
            .queue_unbind(self.id, queue, exchange, routing_key)
            .await?;
        Ok(())
    }

    /// Declares an exchange
    #[instrument(skip_all, fields(channel = self.id, exchange = %args.exchange))]
    pub async fn declare_exchange(&self, args: ExchangeDeclare) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared.transport.exchange_declare(self.id, &args).await?;
        Ok(())
    }

    /// Routes messages arriving at `source` to `destination`
    #[instrument(skip(self), fields(channel = self.id))]
    pub async fn bind_exchange(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared
            .transport
            .exchange_bind(self.id, destination, source, routing_key)
            .await?;
        Ok(())
    }

    /// Removes a binding between two exchanges
    #[instrument(skip(self), fields(channel = self.id))]
    pub async fn unbind_exchange(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared
            .transport
            .exchange_unbind(self.id, destination, source, routing_key)
            .await?;
        Ok(())
    }

    /// Publishes a message. This does not wait for any acknowledgement from the
    /// broker.
    #[instrument(skip(self, message), fields(channel = self.id, size = message.body.len()))]
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &Message,
        mandatory: bool,
        immediate: bool,
    ) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared
            .transport
            .basic_publish(self.id, exchange, routing_key, message, mandatory, immediate)
            .await?;
        Ok(())
    }

    /// Starts a consumer without registering the channel with the dispatch
    /// loop, returning the consumer tag.
    ///
    /// Deliveries can then only be read with [`Channel::wait_frame`].
    #[instrument(skip_all, fields(channel = self.id, queue = %args.queue))]
    pub async fn basic_consume(&self, args: &BasicConsume) -> Result<String, Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        let consumer_tag = shared.transport.basic_consume(self.id, args).await?;
        Ok(consumer_tag)
    }

    /// Cancels a consumer
    #[instrument(skip(self), fields(channel = self.id))]
    pub async fn cancel(&self, consumer_tag: &str) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared.transport.basic_cancel(self.id, consumer_tag).await?;
        Ok(())
    }

    /// Starts a consumer on `args.queue` and feeds every delivery to `handler`
    /// until the channel's [`consumer_cancellation`](Channel::consumer_cancellation)
    /// token is cancelled or the connection shuts down.
    ///
    /// Returns `Ok(())` after cancellation, and [`Error::ConnectionClosed`] if
    /// the connection was closed or dropped. The consumer is cancelled on the
    /// broker before returning `Ok(())`.
    #[instrument(skip_all, fields(channel = self.id, queue = %args.queue))]
    pub async fn consume<H>(&self, args: BasicConsume, mut handler: H) -> Result<(), Error>
    where
        H: Consume,
    {
        let inner = self.connection()?;
        let consumer_tag = inner
            .lock()
            .await?
            .transport
            .basic_consume(self.id, &args)
            .await?;
        debug!(%consumer_tag, "consuming");

        inner
            .register_channel(self.id, self.inbound_tx.clone())
            .await?;
        let result = subscription::run(self, &mut handler).await;
        inner.unregister_channel(self.id).await;

        if result.is_ok() {
            if let Err(err) = self.cancel(&consumer_tag).await {
                warn!(%consumer_tag, %err, "failed to cancel consumer");
            }
        }
        result
    }

    /// The token that stops [`Channel::consume`].
    ///
    /// Once cancelled, this and every later `consume` on the channel returns
    /// immediately. The token is also cancelled when the connection shuts down.
    pub fn consumer_cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// `basic.qos`
    #[instrument(skip(self), fields(channel = self.id))]
    pub async fn qos(
        &self,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared
            .transport
            .basic_qos(self.id, prefetch_size, prefetch_count, global)
            .await?;
        Ok(())
    }

    /// Acknowledges a delivery, or every delivery up to `delivery_tag` if
    /// `multiple` is set
    #[instrument(skip(self), fields(channel = self.id))]
    pub async fn ack(&self, delivery_tag: DeliveryTag, multiple: bool) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared
            .transport
            .basic_ack(self.id, delivery_tag, multiple)
            .await?;
        Ok(())
    }

    /// Rejects a delivery, or every delivery up to `delivery_tag` if
    /// `multiple` is set
    #[instrument(skip(self), fields(channel = self.id))]
    pub async fn nack(
        &self,
        delivery_tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        shared
            .transport
            .basic_nack(self.id, delivery_tag, multiple, requeue)
            .await?;
        Ok(())
    }

    /// Waits up to `timeout` for the next frame addressed to this channel.
    ///
    /// Holds the connection lock for the whole wait.
    pub async fn wait_frame(&self, timeout: Duration) -> Result<Option<Frame>, Error> {
        let inner = self.connection()?;
        let mut shared = inner.lock().await?;
        let frame = shared.transport.wait_frame(self.id, timeout).await?;
        Ok(frame)
    }

    /// Closes the channel on the broker
    #[instrument(skip_all, fields(channel = self.id))]
    pub async fn close(mut self) -> Result<(), Error> {
        self.closed = true;
        self.cancel.cancel();

        let Some(inner) = self.connection.upgrade() else {
            return Ok(());
        };
        inner.unregister_channel(self.id).await;
        let result = match inner.lock().await {
            Ok(mut shared) => {
                shared.transport.channel_close(self.id).await?;
                debug!("channel closed");
                Ok(())
            }
            Err(Error::ConnectionClosed) => Ok(()),
            Err(err) => Err(err),
        };
        result
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.cancel.cancel();

        let Some(inner) = self.connection.upgrade() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let id = self.id;
        handle.spawn(async move {
            inner.unregister_channel(id).await;
            let locked = inner.lock().await;
            if let Ok(mut shared) = locked {
                if let Err(err) = shared.transport.channel_close(id).await {
                    warn!(channel = id, %err, "failed to close dropped channel");
                }
            }
        });
    }
}
