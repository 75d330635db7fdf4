//! Implements errors associated with opening a connection

use crate::transport;

/// Invalid connection parameters, raised before any transport call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Host is empty
    #[error("Host must not be empty")]
    EmptyHost,

    /// Vhost is empty
    #[error("Vhost must not be empty")]
    EmptyVhost,

    /// Port is zero
    #[error("Port must not be zero")]
    InvalidPort,

    /// Frame max is below the protocol minimum
    #[error("Frame max {0} is smaller than the minimum of 4096")]
    FrameMaxTooSmall(u32),

    /// Channel max is zero
    #[error("Channel max must not be zero")]
    InvalidChannelMax,

    /// The url could not be parsed
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The url scheme is not `amqp`
    #[error("Invalid scheme {0:?}, expecting \"amqp\"")]
    InvalidScheme(String),

    /// The url has no host
    #[error("Url has no host")]
    MissingHost,
}

/// Errors associated with [`crate::Connection::open`]
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// Invalid connection parameters
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Opening the socket or logging in failed
    #[error(transparent)]
    Transport(#[from] transport::Error),
}
