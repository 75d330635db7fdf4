//! Arguments of the methods that take more than a couple of flags

use crate::definitions::ExchangeType;

/// Arguments of `exchange.declare`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeDeclare {
    /// Exchange name
    pub exchange: String,

    /// Exchange type
    pub kind: ExchangeType,

    /// Only check that the exchange exists
    pub passive: bool,

    /// Survive broker restarts
    pub durable: bool,

    /// Delete once no queue or exchange is bound to it
    pub auto_delete: bool,

    /// Not directly publishable by clients
    pub internal: bool,
}

impl ExchangeDeclare {
    /// Declare a non-durable exchange of the given type
    pub fn new(exchange: impl Into<String>, kind: ExchangeType) -> Self {
        Self {
            exchange: exchange.into(),
            kind,
            ..Default::default()
        }
    }

    /// Set `passive`
    pub fn passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    /// Set `durable`
    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Set `auto_delete`
    pub fn auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    /// Set `internal`
    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }
}

/// Arguments of `queue.declare`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDeclare {
    /// Queue name. An empty name asks the broker to generate one
    pub queue: String,

    /// Only check that the queue exists
    pub passive: bool,

    /// Survive broker restarts
    pub durable: bool,

    /// Only usable by the declaring connection, deleted when it closes
    pub exclusive: bool,

    /// Delete once the last consumer is cancelled
    pub auto_delete: bool,
}

impl QueueDeclare {
    /// Declare a non-durable, non-exclusive queue
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ..Default::default()
        }
    }

    /// Set `passive`
    pub fn passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    /// Set `durable`
    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Set `exclusive`
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Set `auto_delete`
    pub fn auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }
}

/// Arguments of `basic.consume`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicConsume {
    /// Queue to consume from
    pub queue: String,

    /// Consumer tag. An empty tag asks the broker to generate one
    pub consumer_tag: String,

    /// Do not deliver messages published on this connection
    pub no_local: bool,

    /// Deliveries are considered acknowledged once sent
    pub no_ack: bool,

    /// Request exclusive access to the queue
    pub exclusive: bool,
}

impl BasicConsume {
    /// Consume with a broker generated tag and automatic acknowledgement
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            consumer_tag: String::new(),
            no_local: false,
            no_ack: true,
            exclusive: false,
        }
    }

    /// Set the consumer tag
    pub fn consumer_tag(mut self, consumer_tag: impl Into<String>) -> Self {
        self.consumer_tag = consumer_tag.into();
        self
    }

    /// Set `no_local`
    pub fn no_local(mut self, no_local: bool) -> Self {
        self.no_local = no_local;
        self
    }

    /// Set `no_ack`
    pub fn no_ack(mut self, no_ack: bool) -> Self {
        self.no_ack = no_ack;
        self
    }

    /// Set `exclusive`
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }
}
