//! A facade bundling setup, publish, call, subscribe and serve over one connection

use std::time::Duration;

use amqp_mux::{connection::Builder, observe, Channel, Connect, Connection};
use amqp_mux_types::{
    definitions::ExchangeType,
    methods::{BasicConsume, ExchangeDeclare, QueueDeclare},
    Delivery, Message, Properties,
};
use bytes::Bytes;
use serde_json::Value;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    client::RpcClient,
    error::{CallError, OpenError},
    responder::{Respond, Responder},
    response::Response,
};

/// Exchange part of a [`Configuration`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Exchange name. The default exchange if empty
    pub name: String,

    /// Exchange type used when declaring
    pub kind: ExchangeType,

    /// Declare passively
    pub passive: bool,

    /// Declare as durable
    pub durable: bool,

    /// Declare as auto-delete
    pub auto_delete: bool,

    /// Declare as internal
    pub internal: bool,

    /// Whether [`MessageBroker::setup`] declares the exchange
    pub declare: bool,
}

/// Queue part of a [`Configuration`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue name. Generated by the broker if empty and declared
    pub name: String,

    /// Declare passively
    pub passive: bool,

    /// Declare as durable
    pub durable: bool,

    /// Declare as auto-delete
    pub auto_delete: bool,

    /// Declare as exclusive
    pub exclusive: bool,

    /// Whether [`MessageBroker::setup`] declares the queue
    pub declare: bool,

    /// Whether [`MessageBroker::setup`] binds the queue to the exchange with
    /// the routing key
    pub bind: bool,
}

/// Where and how [`MessageBroker`] operations publish and consume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    /// Exchange to publish to and bind to
    pub exchange: ExchangeConfig,

    /// Queue to consume from
    pub queue: QueueConfig,

    /// Routing key to publish and bind with
    pub routing_key: String,

    /// Properties of published messages
    pub properties: Properties,
}

impl Configuration {
    /// Publish to an existing exchange with `routing_key`
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange: ExchangeConfig {
                name: exchange.into(),
                ..Default::default()
            },
            routing_key: routing_key.into(),
            ..Default::default()
        }
    }

    /// Consume from a fresh exclusive queue bound to the exchange with the
    /// routing key
    pub fn with_private_queue(mut self) -> Self {
        self.queue = QueueConfig {
            exclusive: true,
            auto_delete: true,
            declare: true,
            bind: true,
            ..Default::default()
        };
        self
    }
}

#[derive(Debug)]
struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Messaging patterns over a single connection
///
/// Publishing and calls share two channels opened with the broker. Every
/// subscription gets its own channel and background task, all of which are
/// stopped by [`MessageBroker::close`].
#[derive(Debug)]
pub struct MessageBroker {
    connection: Connection,
    publisher: Channel,
    client: Mutex<RpcClient>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl MessageBroker {
    /// Opens a connection from an `amqp://[user[:pass]@]host[:port]/[vhost]` url
    pub async fn open<C>(
        url: impl TryInto<Url, Error = url::ParseError>,
        connector: &C,
    ) -> Result<Self, OpenError>
    where
        C: Connect + ?Sized,
    {
        let builder = Builder::new()
            .url(url)
            .map_err(amqp_mux::connection::OpenError::from)?;
        Self::with_builder(builder, connector).await
    }

    /// Opens a connection with `builder`
    pub async fn with_builder<C>(builder: Builder, connector: &C) -> Result<Self, OpenError>
    where
        C: Connect + ?Sized,
    {
        let connection = builder.open(connector).await?;
        let broker = Self::from_connection(connection).await?;
        Ok(broker)
    }

    /// Takes over an open connection
    pub async fn from_connection(connection: Connection) -> Result<Self, amqp_mux::Error> {
        let publisher = Channel::open(&connection).await?;
        let client = RpcClient::open(&connection).await?;
        Ok(Self {
            connection,
            publisher,
            client: Mutex::new(client),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Declares and binds what `config` asks for on `channel`, returning the
    /// exchange and queue names
    pub async fn setup(
        channel: &Channel,
        config: &Configuration,
    ) -> Result<(String, String), amqp_mux::Error> {
        let exchange = Self::setup_exchange(channel, &config.exchange).await?;

        let mut queue = config.queue.name.clone();
        if config.queue.declare {
            let args = QueueDeclare::new(queue)
                .passive(config.queue.passive)
                .durable(config.queue.durable)
                .auto_delete(config.queue.auto_delete)
                .exclusive(config.queue.exclusive);
            queue = channel.declare_queue(args, "", "").await?;
        }
        if config.queue.bind {
            channel
                .bind_queue(&queue, &exchange, &config.routing_key)
                .await?;
        }
        Ok((exchange, queue))
    }

    async fn setup_exchange(
        channel: &Channel,
        exchange: &ExchangeConfig,
    ) -> Result<String, amqp_mux::Error> {
        if exchange.declare {
            let args = ExchangeDeclare::new(exchange.name.as_str(), exchange.kind)
                .passive(exchange.passive)
                .durable(exchange.durable)
                .auto_delete(exchange.auto_delete)
                .internal(exchange.internal);
            channel.declare_exchange(args).await?;
        }
        Ok(exchange.name.clone())
    }

    /// Publishes `body` with the configured properties without waiting for a
    /// reply. Only the exchange part of `config` is set up.
    #[instrument(skip_all, fields(exchange = %config.exchange.name, routing_key = %config.routing_key))]
    pub async fn publish(
        &self,
        config: &Configuration,
        body: impl Into<Bytes>,
    ) -> Result<(), amqp_mux::Error> {
        let exchange = Self::setup_exchange(&self.publisher, &config.exchange).await?;
        let message = Message::new(body).with_properties(config.properties.clone());
        self.publisher
            .publish(&exchange, &config.routing_key, &message, false, false)
            .await
    }

    /// Sends `body` as a request and waits up to `timeout` for the reply. Only
    /// the exchange part of `config` is set up.
    ///
    /// Calls on one broker are made one at a time.
    #[instrument(skip_all, fields(exchange = %config.exchange.name, routing_key = %config.routing_key))]
    pub async fn call(
        &self,
        config: &Configuration,
        body: Value,
        timeout: Duration,
    ) -> Result<Response, CallError> {
        let mut client = self.client.lock().await;
        let exchange = Self::setup_exchange(client.channel(), &config.exchange).await?;
        client
            .publish_and_wait(&exchange, &config.routing_key, body, timeout)
            .await
    }

    /// Calls `callback` with every message delivered to the configured queue
    /// until [`MessageBroker::close`]
    pub async fn subscribe<F>(
        &self,
        config: &Configuration,
        mut callback: F,
    ) -> Result<(), amqp_mux::Error>
    where
        F: FnMut(&Message) + Send + 'static,
    {
        let handler = observe(move |_: &Channel, delivery: Delivery| callback(delivery.message()));
        self.spawn_consumer(config, handler).await
    }

    /// Answers every request delivered to the configured queue with `handler`
    /// until [`MessageBroker::close`]
    pub async fn serve<H>(&self, config: &Configuration, handler: H) -> Result<(), amqp_mux::Error>
    where
        H: Respond + 'static,
    {
        self.spawn_consumer(config, Responder::new(handler)).await
    }

    async fn spawn_consumer<H>(
        &self,
        config: &Configuration,
        handler: H,
    ) -> Result<(), amqp_mux::Error>
    where
        H: amqp_mux::Consume + 'static,
    {
        let channel = Channel::open(&self.connection).await?;
        let (_, queue) = Self::setup(&channel, config).await?;
        let cancel = channel.consumer_cancellation();

        let handle = tokio::spawn(async move {
            let id = channel.id();
            match channel.consume(BasicConsume::new(queue.as_str()), handler).await {
                Ok(()) => debug!(channel = id, %queue, "subscription stopped"),
                Err(err) => debug!(channel = id, %queue, %err, "subscription ended"),
            }
            if let Err(err) = channel.close().await {
                warn!(channel = id, %err, "failed to close subscription channel");
            }
        });

        self.subscriptions
            .lock()
            .await
            .push(Subscription { cancel, handle });
        Ok(())
    }

    /// Stops every subscription and closes the connection
    #[instrument(skip_all)]
    pub async fn close(self) -> Result<(), amqp_mux::Error> {
        let subscriptions = self.subscriptions.into_inner();
        for subscription in &subscriptions {
            subscription.cancel.cancel();
        }
        for subscription in subscriptions {
            if let Err(err) = subscription.handle.await {
                warn!(?err, "subscription task did not exit cleanly");
            }
        }

        if let Err(err) = self.client.into_inner().close().await {
            warn!(%err, "failed to close rpc channel");
        }
        if let Err(err) = self.publisher.close().await {
            warn!(%err, "failed to close publisher channel");
        }
        self.connection.close().await
    }
}
