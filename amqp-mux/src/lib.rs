#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Channel multiplexing over a single AMQP 0-9-1 connection.
//!
//! A [`Connection`] owns one transport session and serializes every transport
//! call behind one lock. A background task pumps complete deliveries from the
//! transport into the inbound queue of whichever [`Channel`] they belong to, and
//! [`Channel::consume`] drains that queue into a [`Consume`] handler.
//!
//! The protocol itself (framing, handshake, authentication) sits behind the
//! [`Transport`] trait. [`transport::memory`] provides an in-process broker that
//! implements it.
//!
//! # Quick start
//!
//! ```rust
//! use amqp_mux::{observe, transport::memory::MemoryBroker, Channel, Connection};
//! use amqp_mux_types::{methods::QueueDeclare, Message};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = MemoryBroker::new();
//! let connection = Connection::builder().open(&broker).await?;
//!
//! let channel = Channel::open(&connection).await?;
//! let queue = channel
//!     .declare_queue(QueueDeclare::new("").exclusive(true), "amq.direct", "greetings")
//!     .await?;
//! channel
//!     .publish("amq.direct", "greetings", &Message::from("hello"), false, false)
//!     .await?;
//! # let _ = queue;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod channel;
pub mod connection;
pub mod transport;

mod error;
pub use error::Error;

pub use amqp_mux_types as types;
pub use channel::{observe, Channel, Consume, Observe};
pub use connection::{Builder, Connection};
pub use transport::{Connect, Transport};
