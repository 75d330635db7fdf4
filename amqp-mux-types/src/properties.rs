//! Basic class content properties

use crate::definitions::DeliveryMode;

/// Properties carried in the content header of a message.
///
/// Every field is independently present or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    /// MIME content type
    pub content_type: Option<String>,

    /// MIME content encoding
    pub content_encoding: Option<String>,

    /// Transient or persistent
    pub delivery_mode: Option<DeliveryMode>,

    /// Message priority, 0 to 9
    pub priority: Option<u8>,

    /// Application correlation identifier
    pub correlation_id: Option<String>,

    /// Address to reply to
    pub reply_to: Option<String>,

    /// Message expiration specification
    pub expiration: Option<String>,

    /// Application message identifier
    pub message_id: Option<String>,

    /// Message timestamp, seconds since the epoch
    pub timestamp: Option<u64>,

    /// Message type name
    pub message_type: Option<String>,

    /// Creating user id
    pub user_id: Option<String>,

    /// Creating application id
    pub app_id: Option<String>,

    /// Deprecated cluster id
    pub cluster_id: Option<String>,
}

impl Properties {
    /// Creates properties with every field absent
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`Builder`] for [`Properties`]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Returns `true` if no property is present
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Builder for [`Properties`]
#[derive(Debug, Default)]
pub struct Builder {
    inner: Properties,
}

impl Builder {
    /// Creates a builder with every field absent
    pub fn new() -> Self {
        Self {
            inner: Properties::new(),
        }
    }

    /// Sets the content type
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.inner.content_type = Some(content_type.into());
        self
    }

    /// Sets the content encoding
    pub fn content_encoding(mut self, content_encoding: impl Into<String>) -> Self {
        self.inner.content_encoding = Some(content_encoding.into());
        self
    }

    /// Sets the delivery mode
    pub fn delivery_mode(mut self, delivery_mode: DeliveryMode) -> Self {
        self.inner.delivery_mode = Some(delivery_mode);
        self
    }

    /// Sets the priority
    pub fn priority(mut self, priority: u8) -> Self {
        self.inner.priority = Some(priority);
        self
    }

    /// Sets the correlation id
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.inner.correlation_id = Some(correlation_id.into());
        self
    }

    /// Sets the reply-to address
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.inner.reply_to = Some(reply_to.into());
        self
    }

    /// Sets the expiration
    pub fn expiration(mut self, expiration: impl Into<String>) -> Self {
        self.inner.expiration = Some(expiration.into());
        self
    }

    /// Sets the message id
    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        self.inner.message_id = Some(message_id.into());
        self
    }

    /// Sets the timestamp
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.inner.timestamp = Some(timestamp);
        self
    }

    /// Sets the message type
    pub fn message_type(mut self, message_type: impl Into<String>) -> Self {
        self.inner.message_type = Some(message_type.into());
        self
    }

    /// Sets the user id
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.inner.user_id = Some(user_id.into());
        self
    }

    /// Sets the app id
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.inner.app_id = Some(app_id.into());
        self
    }

    /// Sets the cluster id
    pub fn cluster_id(mut self, cluster_id: impl Into<String>) -> Self {
        self.inner.cluster_id = Some(cluster_id.into());
        self
    }

    /// Builds the [`Properties`]
    pub fn build(self) -> Properties {
        self.inner
    }
}
