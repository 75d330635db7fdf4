use crate::transport;

/// Errors associated with [`crate::Channel`] operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport reported a failure
    #[error(transparent)]
    Transport(#[from] transport::Error),

    /// The owning connection has been closed or dropped
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Every channel id up to the channel max has been handed out
    #[error("Reached connection channel max {0}")]
    ChannelMaxReached(u16),
}
