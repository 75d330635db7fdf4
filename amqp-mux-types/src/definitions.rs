//! Definitions shared across the basic class

use std::{convert::TryFrom, fmt, str::FromStr};

/// Channel number. Channel 0 is reserved for the connection itself
pub type ChannelId = u16;

/// Per-channel monotonic delivery identifier used for ack/nack
pub type DeliveryTag = u64;

/// Default max frame size requested during login
pub const DEFAULT_FRAME_MAX: u32 = 131_072;

/// The smallest frame max a peer is allowed to negotiate
pub const MIN_FRAME_MAX: u32 = 4096;

/// Bytes taken by the frame header (type, channel, size) and the frame end octet
pub const FRAME_OVERHEAD: u32 = 8;

/// Default broker port
pub const DEFAULT_PORT: u16 = 5672;

/// Default virtual host
pub const DEFAULT_VHOST: &str = "/";

/// Class id of the basic class, carried by content headers
pub const BASIC_CLASS_ID: u16 = 60;

/// Reply codes used by brokers when closing a channel or the connection
pub mod reply_code {
    /// Normal close
    pub const REPLY_SUCCESS: u16 = 200;
    /// Mandatory message could not be routed
    pub const NO_ROUTE: u16 = 312;
    /// Authentication or permission failure
    pub const ACCESS_REFUSED: u16 = 403;
    /// The entity does not exist
    pub const NOT_FOUND: u16 = 404;
    /// The entity is exclusive to another connection
    pub const RESOURCE_LOCKED: u16 = 405;
    /// Arguments are inconsistent with the existing entity or state
    pub const PRECONDITION_FAILED: u16 = 406;
    /// Unexpected frame on the wire
    pub const UNEXPECTED_FRAME: u16 = 505;
    /// Invalid channel usage
    pub const CHANNEL_ERROR: u16 = 504;
    /// The operation is not allowed
    pub const NOT_ALLOWED: u16 = 530;
}

/// Delivery mode property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeliveryMode {
    /// Message may be lost on broker restart
    Transient = 1,

    /// Message is written to disk by a durable queue
    Persistent = 2,
}

/// Error converting a raw octet into [`DeliveryMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid delivery mode {0}")]
pub struct InvalidDeliveryMode(pub u8);

impl TryFrom<u8> for DeliveryMode {
    type Error = InvalidDeliveryMode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Transient),
            2 => Ok(Self::Persistent),
            _ => Err(InvalidDeliveryMode(value)),
        }
    }
}

impl From<DeliveryMode> for u8 {
    fn from(mode: DeliveryMode) -> Self {
        mode as u8
    }
}

/// Exchange type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExchangeType {
    /// Routes on exact routing key match
    #[default]
    Direct,

    /// Routes to every bound queue
    Fanout,

    /// Routes on dot-separated pattern match (`*` one word, `#` zero or more)
    Topic,

    /// Routes on header values
    Headers,
}

impl ExchangeType {
    /// The wire name of the exchange type
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeType::Direct => "direct",
            ExchangeType::Fanout => "fanout",
            ExchangeType::Topic => "topic",
            ExchangeType::Headers => "headers",
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an [`ExchangeType`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown exchange type {0:?}")]
pub struct UnknownExchangeType(pub String);

impl FromStr for ExchangeType {
    type Err = UnknownExchangeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "fanout" => Ok(Self::Fanout),
            "topic" => Ok(Self::Topic),
            "headers" => Ok(Self::Headers),
            _ => Err(UnknownExchangeType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_mode_from_raw() {
        assert_eq!(DeliveryMode::try_from(2), Ok(DeliveryMode::Persistent));
        assert_eq!(DeliveryMode::try_from(3), Err(InvalidDeliveryMode(3)));
        assert_eq!(u8::from(DeliveryMode::Transient), 1);
    }

    #[test]
    fn exchange_type_names() {
        for kind in [
            ExchangeType::Direct,
            ExchangeType::Fanout,
            ExchangeType::Topic,
            ExchangeType::Headers,
        ] {
            assert_eq!(kind.as_str().parse::<ExchangeType>(), Ok(kind));
        }
        assert!("x-consistent-hash".parse::<ExchangeType>().is_err());
    }
}
