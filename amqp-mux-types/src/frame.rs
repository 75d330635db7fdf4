//! Protocol frames as handed out by a transport

use bytes::Bytes;

use crate::{
    definitions::{ChannelId, DeliveryTag, BASIC_CLASS_ID, FRAME_OVERHEAD},
    message::Message,
    properties::Properties,
};

/// Frame type octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Method frame
    Method = 1,

    /// Content header frame
    Header = 2,

    /// Content body frame
    Body = 3,

    /// Heartbeat frame
    Heartbeat = 8,
}

/// A protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Channel the frame belongs to
    pub channel: ChannelId,

    /// Frame body
    pub body: FrameBody,
}

impl Frame {
    /// Creates a new frame
    pub fn new(channel: impl Into<ChannelId>, body: FrameBody) -> Self {
        Self {
            channel: channel.into(),
            body,
        }
    }

    /// Creates a heartbeat frame, which always travels on channel 0
    pub fn heartbeat() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Heartbeat,
        }
    }

    /// Get the channel of the frame
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Get the body of the frame
    pub fn body(&self) -> &FrameBody {
        &self.body
    }

    /// Consume the frame to get the frame body
    pub fn into_body(self) -> FrameBody {
        self.body
    }

    /// Type of the frame
    pub fn frame_type(&self) -> FrameType {
        self.body.frame_type()
    }
}

/// Body of a [`Frame`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// A method
    Method(Method),

    /// Header announcing the size and properties of the content that follows
    Header(ContentHeader),

    /// A fragment of content
    Body(Bytes),

    /// Heartbeat
    Heartbeat,
}

impl FrameBody {
    /// Type of the frame body
    pub fn frame_type(&self) -> FrameType {
        match self {
            FrameBody::Method(_) => FrameType::Method,
            FrameBody::Header(_) => FrameType::Header,
            FrameBody::Body(_) => FrameType::Body,
            FrameBody::Heartbeat => FrameType::Heartbeat,
        }
    }
}

/// Methods a consumer may observe on its channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// `basic.deliver`, followed by a content header and body frames
    Deliver(Deliver),

    /// `basic.consume-ok`
    ConsumeOk {
        /// Tag of the new consumer
        consumer_tag: String,
    },

    /// `basic.cancel` sent by the broker
    Cancel {
        /// Tag of the cancelled consumer
        consumer_tag: String,
    },

    /// Any other method, identified by class and method id
    Other {
        /// Class id
        class_id: u16,
        /// Method id
        method_id: u16,
    },
}

/// `basic.deliver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliver {
    /// Consumer tag
    pub consumer_tag: String,

    /// Delivery tag
    pub delivery_tag: DeliveryTag,

    /// Redelivered flag
    pub redelivered: bool,

    /// Source exchange
    pub exchange: String,

    /// Routing key the message was published with
    pub routing_key: String,
}

/// Content header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeader {
    /// Content class, always the basic class here
    pub class_id: u16,

    /// Total size of the body frames that follow
    pub body_size: u64,

    /// Content properties
    pub properties: Properties,
}

impl ContentHeader {
    /// Creates a basic class content header
    pub fn new(body_size: u64, properties: Properties) -> Self {
        Self {
            class_id: BASIC_CLASS_ID,
            body_size,
            properties,
        }
    }
}

/// Splits a delivered message into `basic.deliver`, a content header, and as many
/// body frames as needed to keep every frame within `frame_max`.
///
/// An empty body produces no body frame.
pub fn content_frames(
    channel: ChannelId,
    deliver: Deliver,
    message: Message,
    frame_max: u32,
) -> Vec<Frame> {
    let Message { properties, mut body } = message;
    let max_fragment = frame_max.saturating_sub(FRAME_OVERHEAD).max(1) as usize;

    let mut frames = Vec::with_capacity(2 + body.len() / max_fragment + 1);
    frames.push(Frame::new(channel, FrameBody::Method(Method::Deliver(deliver))));
    frames.push(Frame::new(
        channel,
        FrameBody::Header(ContentHeader::new(body.len() as u64, properties)),
    ));
    while !body.is_empty() {
        let at = max_fragment.min(body.len());
        let fragment = body.split_to(at);
        frames.push(Frame::new(channel, FrameBody::Body(fragment)));
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliver() -> Deliver {
        Deliver {
            consumer_tag: "ctag".into(),
            delivery_tag: 1,
            redelivered: false,
            exchange: "amq.direct".into(),
            routing_key: "test".into(),
        }
    }

    #[test]
    fn content_is_split_by_frame_max() {
        let body = vec![7u8; 10_000];
        let frames = content_frames(3, deliver(), Message::new(body), 4096);

        assert_eq!(frames[0].frame_type(), FrameType::Method);
        match frames[1].body() {
            FrameBody::Header(header) => assert_eq!(header.body_size, 10_000),
            other => panic!("expected header, found {:?}", other),
        }

        let fragments: Vec<usize> = frames[2..]
            .iter()
            .map(|frame| match frame.body() {
                FrameBody::Body(fragment) => fragment.len(),
                other => panic!("expected body, found {:?}", other),
            })
            .collect();
        assert_eq!(fragments, vec![4088, 4088, 1824]);
        assert!(frames.iter().all(|frame| frame.channel() == 3));
    }

    #[test]
    fn empty_body_has_no_body_frame() {
        let frames = content_frames(1, deliver(), Message::default(), 4096);
        assert_eq!(frames.len(), 2);
    }
}
