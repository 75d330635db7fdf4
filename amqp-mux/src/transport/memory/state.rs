use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use amqp_mux_types::{
    definitions::{reply_code, ChannelId, DeliveryTag, ExchangeType, MIN_FRAME_MAX},
    frame::content_frames,
    methods::{BasicConsume, ExchangeDeclare, QueueDeclare},
    Deliver, Frame, FrameBody, Message, Method,
};
use slab::Slab;
use tokio::sync::Notify;
use tracing::{debug, trace};
use uuid::Uuid;

use super::topic;
use crate::transport::Error;

pub(crate) type SessionKey = usize;

const PREDECLARED: [(&str, ExchangeType); 4] = [
    ("", ExchangeType::Direct),
    ("amq.direct", ExchangeType::Direct),
    ("amq.fanout", ExchangeType::Fanout),
    ("amq.topic", ExchangeType::Topic),
];

#[derive(Debug)]
pub(crate) struct State {
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, Queue>,
    sessions: Slab<Session>,
    pub(crate) credentials: Option<(String, String)>,
    pub(crate) vhosts: Vec<String>,
}

#[derive(Debug)]
struct Exchange {
    kind: ExchangeType,
    durable: bool,
    auto_delete: bool,
    internal: bool,
    bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    Queue(String),
    Exchange(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    destination: Destination,
    routing_key: String,
}

#[derive(Debug)]
struct Queue {
    owner: Option<SessionKey>,
    durable: bool,
    auto_delete: bool,
    messages: VecDeque<Stored>,
    consumers: Vec<Consumer>,
    cursor: usize,
}

#[derive(Debug, Clone)]
struct Consumer {
    session: SessionKey,
    channel: ChannelId,
    tag: String,
    no_ack: bool,
    exclusive: bool,
}

#[derive(Debug, Clone)]
struct Stored {
    exchange: String,
    routing_key: String,
    message: Message,
    redelivered: bool,
}

#[derive(Debug)]
struct Unacked {
    queue: String,
    stored: Stored,
}

#[derive(Debug)]
struct Session {
    notify: Arc<Notify>,
    frame_max: u32,
    logged_in: bool,
    channels: HashMap<ChannelId, ChannelState>,
}

#[derive(Debug, Default)]
struct ChannelState {
    next_delivery_tag: DeliveryTag,
    unacked: BTreeMap<DeliveryTag, Unacked>,
    prefetch_count: u16,
    inbound: VecDeque<Frame>,
}

fn not_found(context: &'static str, what: String) -> Error {
    Error::server(context, reply_code::NOT_FOUND, format!("NOT_FOUND - {}", what))
}

fn precondition_failed(context: &'static str, what: String) -> Error {
    Error::server(
        context,
        reply_code::PRECONDITION_FAILED,
        format!("PRECONDITION_FAILED - {}", what),
    )
}

fn access_refused(context: &'static str, what: String) -> Error {
    Error::server(
        context,
        reply_code::ACCESS_REFUSED,
        format!("ACCESS_REFUSED - {}", what),
    )
}

impl State {
    pub(crate) fn new() -> Self {
        let exchanges = PREDECLARED
            .iter()
            .map(|(name, kind)| {
                let exchange = Exchange {
                    kind: *kind,
                    durable: true,
                    auto_delete: false,
                    internal: false,
                    bindings: Vec::new(),
                };
                (name.to_string(), exchange)
            })
            .collect();

        Self {
            exchanges,
            queues: HashMap::new(),
            sessions: Slab::new(),
            credentials: None,
            vhosts: Vec::new(),
        }
    }

    pub(crate) fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn queue_exists(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    pub(crate) fn message_count(&self, queue: &str) -> Option<usize> {
        self.queues.get(queue).map(|q| q.messages.len())
    }

    pub(crate) fn consumer_count(&self, queue: &str) -> Option<usize> {
        self.queues.get(queue).map(|q| q.consumers.len())
    }

    /* -------------------------------- sessions -------------------------------- */

    pub(crate) fn open_session(&mut self) -> (SessionKey, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        let key = self.sessions.insert(Session {
            notify: notify.clone(),
            frame_max: 0,
            logged_in: false,
            channels: HashMap::new(),
        });
        debug!(session = key, "session opened");
        (key, notify)
    }

    pub(crate) fn login(
        &mut self,
        key: SessionKey,
        vhost: &str,
        username: &str,
        password: &str,
        frame_max: u32,
    ) -> Result<(), Error> {
        if let Some((expected_user, expected_pass)) = &self.credentials {
            if expected_user != username || expected_pass != password {
                return Err(access_refused(
                    "login",
                    format!("Login was refused using authentication mechanism PLAIN for user '{}'", username),
                ));
            }
        }
        if !self.vhosts.is_empty() && !self.vhosts.iter().any(|v| v == vhost) {
            return Err(Error::server(
                "login",
                reply_code::NOT_ALLOWED,
                format!("NOT_ALLOWED - vhost {} not found", vhost),
            ));
        }

        let session = self.sessions.get_mut(key).ok_or(Error::Closed)?;
        session.frame_max = match frame_max {
            0 => u32::MAX,
            n => n.max(MIN_FRAME_MAX),
        };
        session.logged_in = true;
        Ok(())
    }

    pub(crate) fn close_session(&mut self, key: SessionKey) {
        let channels: Vec<ChannelId> = match self.sessions.get(key) {
            Some(session) => session.channels.keys().copied().collect(),
            None => return,
        };
        for channel in channels {
            self.close_channel(key, channel);
        }

        let owned: Vec<String> = self
            .queues
            .iter()
            .filter(|(_, q)| q.owner == Some(key))
            .map(|(name, _)| name.clone())
            .collect();
        for name in owned {
            self.delete_queue(&name);
        }

        self.sessions.remove(key);
        debug!(session = key, "session closed");
    }

    /* -------------------------------- channels -------------------------------- */

    fn check_channel(
        &self,
        key: SessionKey,
        channel: ChannelId,
        context: &'static str,
    ) -> Result<(), Error> {
        self.channel(key, channel, context).map(|_| ())
    }

    fn channel(
        &self,
        key: SessionKey,
        channel: ChannelId,
        context: &'static str,
    ) -> Result<&ChannelState, Error> {
        let session = self.sessions.get(key).ok_or(Error::Closed)?;
        session
            .channels
            .get(&channel)
            .ok_or_else(|| channel_error(context, channel))
    }

    fn channel_mut(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        context: &'static str,
    ) -> Result<&mut ChannelState, Error> {
        let session = self.sessions.get_mut(key).ok_or(Error::Closed)?;
        session
            .channels
            .get_mut(&channel)
            .ok_or_else(|| channel_error(context, channel))
    }

    pub(crate) fn channel_open(&mut self, key: SessionKey, channel: ChannelId) -> Result<(), Error> {
        let session = self.sessions.get_mut(key).ok_or(Error::Closed)?;
        if !session.logged_in {
            return Err(Error::library("channel_open", "session is not logged in"));
        }
        if channel == 0 || session.channels.contains_key(&channel) {
            return Err(Error::server(
                "channel_open",
                reply_code::CHANNEL_ERROR,
                format!("CHANNEL_ERROR - channel {} is already open", channel),
            ));
        }
        session.channels.insert(channel, ChannelState::default());
        Ok(())
    }

    pub(crate) fn channel_close(&mut self, key: SessionKey, channel: ChannelId) -> Result<(), Error> {
        self.check_channel(key, channel, "channel_close")?;
        self.close_channel(key, channel);
        Ok(())
    }

    fn close_channel(&mut self, key: SessionKey, channel: ChannelId) {
        let removed = self
            .sessions
            .get_mut(key)
            .and_then(|session| session.channels.remove(&channel));
        let Some(state) = removed else { return };

        self.drop_consumers(|c| c.session == key && c.channel == channel);
        self.requeue(state.unacked.into_values().collect());
        self.dispatch_all();
    }

    /// Next frame buffered for `channel`
    pub(crate) fn pop_frame(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        context: &'static str,
    ) -> Result<Option<Frame>, Error> {
        Ok(self.channel_mut(key, channel, context)?.inbound.pop_front())
    }

    /* -------------------------------- exchanges ------------------------------- */

    pub(crate) fn exchange_declare(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        args: &ExchangeDeclare,
    ) -> Result<(), Error> {
        const CONTEXT: &str = "exchange_declare";
        self.check_channel(key, channel, CONTEXT)?;

        match self.exchanges.get(&args.exchange) {
            Some(existing) => {
                if args.passive {
                    return Ok(());
                }
                if existing.kind != args.kind || existing.durable != args.durable {
                    return Err(precondition_failed(
                        CONTEXT,
                        format!(
                            "inequivalent arg 'type' for exchange '{}': received '{}' but current is '{}'",
                            args.exchange, args.kind, existing.kind
                        ),
                    ));
                }
                Ok(())
            }
            None if args.passive => {
                Err(not_found(CONTEXT, format!("no exchange '{}'", args.exchange)))
            }
            None => {
                if args.exchange.is_empty() || args.exchange.starts_with("amq.") {
                    return Err(access_refused(
                        CONTEXT,
                        format!("exchange name '{}' contains reserved prefix 'amq.*'", args.exchange),
                    ));
                }
                trace!(exchange = %args.exchange, kind = %args.kind, "declared exchange");
                self.exchanges.insert(
                    args.exchange.clone(),
                    Exchange {
                        kind: args.kind,
                        durable: args.durable,
                        auto_delete: args.auto_delete,
                        internal: args.internal,
                        bindings: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    pub(crate) fn exchange_bind(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        const CONTEXT: &str = "exchange_bind";
        self.check_channel(key, channel, CONTEXT)?;
        if !self.exchanges.contains_key(destination) {
            return Err(not_found(CONTEXT, format!("no exchange '{}'", destination)));
        }
        let binding = Binding {
            destination: Destination::Exchange(destination.to_string()),
            routing_key: routing_key.to_string(),
        };
        self.add_binding(CONTEXT, source, binding)
    }

    pub(crate) fn exchange_unbind(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        const CONTEXT: &str = "exchange_unbind";
        self.check_channel(key, channel, CONTEXT)?;
        let binding = Binding {
            destination: Destination::Exchange(destination.to_string()),
            routing_key: routing_key.to_string(),
        };
        self.remove_binding(CONTEXT, source, &binding)
    }

    fn add_binding(
        &mut self,
        context: &'static str,
        exchange: &str,
        binding: Binding,
    ) -> Result<(), Error> {
        if exchange.is_empty() {
            return Err(access_refused(
                context,
                "operation not permitted on the default exchange".to_string(),
            ));
        }
        let source = self
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| not_found(context, format!("no exchange '{}'", exchange)))?;
        if !source.bindings.contains(&binding) {
            source.bindings.push(binding);
        }
        Ok(())
    }

    fn remove_binding(
        &mut self,
        context: &'static str,
        exchange: &str,
        binding: &Binding,
    ) -> Result<(), Error> {
        if exchange.is_empty() {
            return Err(access_refused(
                context,
                "operation not permitted on the default exchange".to_string(),
            ));
        }
        let source = self
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| not_found(context, format!("no exchange '{}'", exchange)))?;
        let before = source.bindings.len();
        source.bindings.retain(|b| b != binding);
        if source.auto_delete && before > 0 && source.bindings.is_empty() {
            debug!(exchange, "deleting auto-delete exchange");
            self.exchanges.remove(exchange);
        }
        Ok(())
    }

    /* --------------------------------- queues --------------------------------- */

    pub(crate) fn queue_declare(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        args: &QueueDeclare,
    ) -> Result<String, Error> {
        const CONTEXT: &str = "queue_declare";
        self.check_channel(key, channel, CONTEXT)?;

        let name = if args.queue.is_empty() {
            format!("amq.gen-{}", Uuid::new_v4().simple())
        } else {
            args.queue.clone()
        };

        match self.queues.get(&name) {
            Some(existing) => {
                if let Some(owner) = existing.owner {
                    if owner != key {
                        return Err(resource_locked(CONTEXT, &name));
                    }
                }
                if !args.passive && existing.durable != args.durable {
                    return Err(precondition_failed(
                        CONTEXT,
                        format!("inequivalent arg 'durable' for queue '{}'", name),
                    ));
                }
            }
            None if args.passive => {
                return Err(not_found(CONTEXT, format!("no queue '{}'", name)));
            }
            None => {
                trace!(queue = %name, "declared queue");
                self.queues.insert(
                    name.clone(),
                    Queue {
                        owner: args.exclusive.then_some(key),
                        durable: args.durable,
                        auto_delete: args.auto_delete,
                        messages: VecDeque::new(),
                        consumers: Vec::new(),
                        cursor: 0,
                    },
                );
            }
        }
        Ok(name)
    }

    pub(crate) fn queue_bind(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        const CONTEXT: &str = "queue_bind";
        self.check_channel(key, channel, CONTEXT)?;
        self.check_queue_access(CONTEXT, key, queue)?;
        let binding = Binding {
            destination: Destination::Queue(queue.to_string()),
            routing_key: routing_key.to_string(),
        };
        self.add_binding(CONTEXT, exchange, binding)
    }

    pub(crate) fn queue_unbind(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        const CONTEXT: &str = "queue_unbind";
        self.check_channel(key, channel, CONTEXT)?;
        self.check_queue_access(CONTEXT, key, queue)?;
        let binding = Binding {
            destination: Destination::Queue(queue.to_string()),
            routing_key: routing_key.to_string(),
        };
        self.remove_binding(CONTEXT, exchange, &binding)
    }

    fn check_queue_access(
        &self,
        context: &'static str,
        key: SessionKey,
        queue: &str,
    ) -> Result<(), Error> {
        let q = self
            .queues
            .get(queue)
            .ok_or_else(|| not_found(context, format!("no queue '{}'", queue)))?;
        match q.owner {
            Some(owner) if owner != key => Err(resource_locked(context, queue)),
            _ => Ok(()),
        }
    }

    fn delete_queue(&mut self, name: &str) {
        if self.queues.remove(name).is_none() {
            return;
        }
        debug!(queue = name, "deleted queue");
        let destination = Destination::Queue(name.to_string());
        for exchange in self.exchanges.values_mut() {
            exchange.bindings.retain(|b| b.destination != destination);
        }
    }

    /* --------------------------------- routing -------------------------------- */

    pub(crate) fn publish(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        exchange: &str,
        routing_key: &str,
        message: &Message,
    ) -> Result<(), Error> {
        const CONTEXT: &str = "basic_publish";
        self.check_channel(key, channel, CONTEXT)?;
        let target = self
            .exchanges
            .get(exchange)
            .ok_or_else(|| not_found(CONTEXT, format!("no exchange '{}'", exchange)))?;
        if target.internal {
            return Err(access_refused(
                CONTEXT,
                format!("cannot publish to internal exchange '{}'", exchange),
            ));
        }

        let queues = self.route(exchange, routing_key);
        if queues.is_empty() {
            trace!(exchange, routing_key, "message is unroutable, dropping");
        }
        for name in queues {
            if let Some(queue) = self.queues.get_mut(&name) {
                queue.messages.push_back(Stored {
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    message: message.clone(),
                    redelivered: false,
                });
            }
            self.dispatch(&name);
        }
        Ok(())
    }

    fn route(&self, exchange: &str, routing_key: &str) -> BTreeSet<String> {
        let mut queues = BTreeSet::new();
        let mut visited = HashSet::new();
        self.route_into(exchange, routing_key, &mut visited, &mut queues);
        queues
    }

    fn route_into<'a>(
        &'a self,
        exchange: &'a str,
        routing_key: &str,
        visited: &mut HashSet<&'a str>,
        queues: &mut BTreeSet<String>,
    ) {
        if !visited.insert(exchange) {
            return;
        }
        if exchange.is_empty() {
            if self.queues.contains_key(routing_key) {
                queues.insert(routing_key.to_string());
            }
            return;
        }

        let Some(source) = self.exchanges.get(exchange) else {
            return;
        };
        for binding in &source.bindings {
            let matched = match source.kind {
                ExchangeType::Direct => binding.routing_key == routing_key,
                ExchangeType::Topic => topic::matches(&binding.routing_key, routing_key),
                // Bindings carry no header arguments, which matches every message
                ExchangeType::Fanout | ExchangeType::Headers => true,
            };
            if !matched {
                continue;
            }
            match &binding.destination {
                Destination::Queue(queue) => {
                    if self.queues.contains_key(queue) {
                        queues.insert(queue.clone());
                    }
                }
                Destination::Exchange(next) => self.route_into(next, routing_key, visited, queues),
            }
        }
    }

    /* -------------------------------- consumers ------------------------------- */

    pub(crate) fn consume(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        args: &BasicConsume,
    ) -> Result<String, Error> {
        const CONTEXT: &str = "basic_consume";
        self.check_channel(key, channel, CONTEXT)?;
        self.check_queue_access(CONTEXT, key, &args.queue)?;

        let tag = if args.consumer_tag.is_empty() {
            format!("amq.ctag-{}", Uuid::new_v4().simple())
        } else {
            args.consumer_tag.clone()
        };
        let duplicate = self.queues.values().any(|q| {
            q.consumers
                .iter()
                .any(|c| c.session == key && c.channel == channel && c.tag == tag)
        });
        if duplicate {
            return Err(Error::server(
                CONTEXT,
                reply_code::NOT_ALLOWED,
                format!("NOT_ALLOWED - attempt to reuse consumer tag '{}'", tag),
            ));
        }

        let queue = self
            .queues
            .get_mut(&args.queue)
            .ok_or_else(|| not_found(CONTEXT, format!("no queue '{}'", args.queue)))?;
        if (args.exclusive && !queue.consumers.is_empty())
            || queue.consumers.iter().any(|c| c.exclusive)
        {
            return Err(access_refused(
                CONTEXT,
                format!("queue '{}' in exclusive use", args.queue),
            ));
        }
        queue.consumers.push(Consumer {
            session: key,
            channel,
            tag: tag.clone(),
            no_ack: args.no_ack,
            exclusive: args.exclusive,
        });

        let consume_ok = Frame::new(
            channel,
            FrameBody::Method(Method::ConsumeOk {
                consumer_tag: tag.clone(),
            }),
        );
        self.push_frames(key, channel, [consume_ok]);
        self.dispatch(&args.queue);
        Ok(tag)
    }

    pub(crate) fn cancel(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        consumer_tag: &str,
    ) -> Result<(), Error> {
        self.check_channel(key, channel, "basic_cancel")?;
        self.drop_consumers(|c| c.session == key && c.channel == channel && c.tag == consumer_tag);
        Ok(())
    }

    fn drop_consumers(&mut self, predicate: impl Fn(&Consumer) -> bool) {
        let mut emptied = Vec::new();
        for (name, queue) in self.queues.iter_mut() {
            let before = queue.consumers.len();
            queue.consumers.retain(|c| !predicate(c));
            if queue.consumers.len() != before {
                queue.cursor = 0;
                if queue.auto_delete && queue.consumers.is_empty() {
                    emptied.push(name.clone());
                }
            }
        }
        for name in emptied {
            self.delete_queue(&name);
        }
    }

    pub(crate) fn qos(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        prefetch_count: u16,
    ) -> Result<(), Error> {
        self.channel_mut(key, channel, "basic_qos")?.prefetch_count = prefetch_count;
        self.dispatch_all();
        Ok(())
    }

    pub(crate) fn ack(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        delivery_tag: DeliveryTag,
        multiple: bool,
    ) -> Result<(), Error> {
        const CONTEXT: &str = "basic_ack";
        let state = self.channel_mut(key, channel, CONTEXT)?;
        take_unacked(state, delivery_tag, multiple).ok_or_else(|| unknown_tag(CONTEXT, delivery_tag))?;
        self.dispatch_all();
        Ok(())
    }

    pub(crate) fn nack(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        delivery_tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error> {
        const CONTEXT: &str = "basic_nack";
        let state = self.channel_mut(key, channel, CONTEXT)?;
        let rejected = take_unacked(state, delivery_tag, multiple)
            .ok_or_else(|| unknown_tag(CONTEXT, delivery_tag))?;
        if requeue {
            self.requeue(rejected);
        }
        self.dispatch_all();
        Ok(())
    }

    fn requeue(&mut self, mut unacked: Vec<Unacked>) {
        // Oldest delivery ends up at the head of the queue
        while let Some(Unacked { queue, mut stored }) = unacked.pop() {
            if let Some(queue) = self.queues.get_mut(&queue) {
                stored.redelivered = true;
                queue.messages.push_front(stored);
            }
        }
    }

    /* -------------------------------- delivery -------------------------------- */

    fn push_frames(
        &mut self,
        key: SessionKey,
        channel: ChannelId,
        frames: impl IntoIterator<Item = Frame>,
    ) {
        if let Some(session) = self.sessions.get_mut(key) {
            if let Some(state) = session.channels.get_mut(&channel) {
                state.inbound.extend(frames);
                session.notify.notify_one();
            }
        }
    }

    pub(crate) fn inject(&mut self, queue: &str, frames: Vec<Frame>) -> bool {
        let Some(consumer) = self.queues.get(queue).and_then(|q| q.consumers.first()) else {
            return false;
        };
        let (key, channel) = (consumer.session, consumer.channel);
        let frames = frames.into_iter().map(|frame| Frame::new(channel, frame.body));
        self.push_frames(key, channel, frames);
        true
    }

    fn dispatch_all(&mut self) {
        let names: Vec<String> = self
            .queues
            .iter()
            .filter(|(_, q)| !q.messages.is_empty() && !q.consumers.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        for name in names {
            self.dispatch(&name);
        }
    }

    /// Hands ready messages of `name` to its consumers in round-robin order
    fn dispatch(&mut self, name: &str) {
        let State {
            queues, sessions, ..
        } = self;
        let Some(queue) = queues.get_mut(name) else {
            return;
        };

        while !queue.messages.is_empty() && !queue.consumers.is_empty() {
            let count = queue.consumers.len();
            let ready = (0..count).map(|offset| (queue.cursor + offset) % count).find(|&i| {
                let consumer = &queue.consumers[i];
                sessions
                    .get(consumer.session)
                    .and_then(|s| s.channels.get(&consumer.channel))
                    .map(|ch| {
                        consumer.no_ack
                            || ch.prefetch_count == 0
                            || ch.unacked.len() < ch.prefetch_count as usize
                    })
                    .unwrap_or(false)
            });
            let Some(index) = ready else { break };
            queue.cursor = (index + 1) % count;

            let consumer = queue.consumers[index].clone();
            let Some(session) = sessions.get_mut(consumer.session) else {
                break;
            };
            let frame_max = session.frame_max;
            let Some(state) = session.channels.get_mut(&consumer.channel) else {
                break;
            };
            let Some(stored) = queue.messages.pop_front() else {
                break;
            };

            state.next_delivery_tag += 1;
            let delivery_tag = state.next_delivery_tag;
            let deliver = Deliver {
                consumer_tag: consumer.tag.clone(),
                delivery_tag,
                redelivered: stored.redelivered,
                exchange: stored.exchange.clone(),
                routing_key: stored.routing_key.clone(),
            };
            state.inbound.extend(content_frames(
                consumer.channel,
                deliver,
                stored.message.clone(),
                frame_max,
            ));
            if !consumer.no_ack {
                state.unacked.insert(
                    delivery_tag,
                    Unacked {
                        queue: name.to_string(),
                        stored,
                    },
                );
            }
            session.notify.notify_one();
        }
    }
}

fn take_unacked(
    state: &mut ChannelState,
    delivery_tag: DeliveryTag,
    multiple: bool,
) -> Option<Vec<Unacked>> {
    if !multiple {
        return state.unacked.remove(&delivery_tag).map(|u| vec![u]);
    }

    let kept = match delivery_tag {
        0 => BTreeMap::new(),
        tag => state.unacked.split_off(&tag.saturating_add(1)),
    };
    let taken = std::mem::replace(&mut state.unacked, kept);
    if taken.is_empty() && delivery_tag != 0 {
        None
    } else {
        Some(taken.into_values().collect())
    }
}

fn channel_error(context: &'static str, channel: ChannelId) -> Error {
    Error::server(
        context,
        reply_code::CHANNEL_ERROR,
        format!("CHANNEL_ERROR - channel {} is not open", channel),
    )
}

fn resource_locked(context: &'static str, queue: &str) -> Error {
    Error::server(
        context,
        reply_code::RESOURCE_LOCKED,
        format!(
            "RESOURCE_LOCKED - cannot obtain exclusive access to locked queue '{}'",
            queue
        ),
    )
}

fn unknown_tag(context: &'static str, delivery_tag: DeliveryTag) -> Error {
    precondition_failed(context, format!("unknown delivery tag {}", delivery_tag))
}
