use std::io;

use amqp_mux_types::definitions::reply_code;

/// Errors reported by a [`super::Transport`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The client library rejected the call
    #[error("{context}: {description}")]
    Library {
        /// The operation that failed
        context: &'static str,
        /// Library provided description
        description: String,
    },

    /// The broker closed the channel or connection with an error
    #[error("{context}: server error {reply_code}, message: {reply_text}")]
    Server {
        /// The operation that failed
        context: &'static str,
        /// Reply code sent by the broker
        reply_code: u16,
        /// Reply text sent by the broker
        reply_text: String,
    },

    /// The session has already been closed
    #[error("Transport is closed")]
    Closed,
}

impl Error {
    pub(crate) fn server(
        context: &'static str,
        reply_code: u16,
        reply_text: impl Into<String>,
    ) -> Self {
        Self::Server {
            context,
            reply_code,
            reply_text: reply_text.into(),
        }
    }

    pub(crate) fn library(context: &'static str, description: impl Into<String>) -> Self {
        Self::Library {
            context,
            description: description.into(),
        }
    }

    /// Reply code, if the broker reported the error
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            Error::Server { reply_code, .. } => Some(*reply_code),
            _ => None,
        }
    }

    /// Whether the broker reported that the entity does not exist
    pub fn is_not_found(&self) -> bool {
        self.reply_code() == Some(reply_code::NOT_FOUND)
    }
}
