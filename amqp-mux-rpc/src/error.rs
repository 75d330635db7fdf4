use std::time::Duration;

use amqp_mux::{assembler::AssemblyError, connection};

/// The payload is not a valid envelope
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON (de)serialization failed
    #[error("Invalid JSON envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// The reply did not follow the method, header, body sequence
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frames arrived out of order
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Reading the next frame failed
    #[error("Failed to read frame: {0}")]
    FrameRead(#[source] amqp_mux::Error),
}

/// Errors associated with [`crate::RpcClient::publish_and_wait`]
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Declaring the reply queue, publishing or consuming failed
    #[error(transparent)]
    Transport(#[from] amqp_mux::Error),

    /// The reply frames were malformed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No reply arrived in time
    #[error("No reply within {0:?}")]
    Timeout(Duration),

    /// The request could not be encoded or the reply decoded
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors associated with [`crate::MessageBroker::open`]
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// Connecting or logging in failed
    #[error(transparent)]
    Connection(#[from] connection::OpenError),

    /// Opening the publisher or rpc channel failed
    #[error(transparent)]
    Channel(#[from] amqp_mux::Error),
}
