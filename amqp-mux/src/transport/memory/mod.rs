//! An in-process broker
//!
//! [`MemoryBroker`] implements enough of the AMQP 0-9-1 model (exchanges,
//! bindings, queues, consumers, acknowledgements) to run the connection layer
//! without a server. Each [`Connect::connect`] opens a new session on the
//! shared broker state.
//!
//! ```rust
//! use amqp_mux::transport::memory::MemoryBroker;
//!
//! let broker = MemoryBroker::new()
//!     .with_credentials("user", "secret")
//!     .with_vhost("/");
//! assert_eq!(broker.session_count(), 0);
//! ```

use std::sync::Arc;

use amqp_mux_types::Frame;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use super::{Connect, Error, Transport};

mod state;
mod topic;
mod transport;

use state::State;
pub use transport::MemoryTransport;

/// A cloneable handle to an in-process broker
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Creates a broker with the pre-declared `amq.direct`, `amq.fanout` and
    /// `amq.topic` exchanges, accepting any login
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new())),
        }
    }

    /// Only accept logins with these credentials
    pub fn with_credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.state.lock().credentials = Some((username.into(), password.into()));
        self
    }

    /// Adds `vhost` to the list of vhosts that can be logged into.
    ///
    /// If the list is empty every vhost is accepted.
    pub fn with_vhost(self, vhost: impl Into<String>) -> Self {
        self.state.lock().vhosts.push(vhost.into());
        self
    }

    /// Pushes an arbitrary frame sequence to the first consumer of `queue`,
    /// rewriting the channel of each frame to the consumer's.
    ///
    /// Returns `false` if the queue does not exist or has no consumer.
    pub fn inject_frames(&self, queue: &str, frames: impl IntoIterator<Item = Frame>) -> bool {
        self.state.lock().inject(queue, frames.into_iter().collect())
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.state.lock().session_count()
    }

    /// Whether a queue with this name exists
    pub fn queue_exists(&self, queue: &str) -> bool {
        self.state.lock().queue_exists(queue)
    }

    /// Number of messages ready for delivery in `queue`
    pub fn message_count(&self, queue: &str) -> Option<usize> {
        self.state.lock().message_count(queue)
    }

    /// Number of consumers on `queue`
    pub fn consumer_count(&self, queue: &str) -> Option<usize> {
        self.state.lock().consumer_count(queue)
    }
}

#[async_trait]
impl Connect for MemoryBroker {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Transport>, Error> {
        trace!(host, port, "connect");
        let (session, notify) = self.state.lock().open_session();
        Ok(Box::new(MemoryTransport::new(
            self.state.clone(),
            session,
            notify,
        )))
    }
}
