#![deny(missing_docs, missing_debug_implementations)]

//! Data types exchanged between the amqp-mux connection layer and a transport
//!
//! The types mirror the AMQP 0-9-1 basic class: message properties, delivered
//! messages, and the method/header/body frames a delivery is split into.

pub mod definitions;
pub mod frame;
pub mod message;
pub mod methods;
pub mod properties;

pub use frame::{ContentHeader, Deliver, Frame, FrameBody, FrameType, Method};
pub use message::{Delivery, Message};
pub use properties::Properties;
