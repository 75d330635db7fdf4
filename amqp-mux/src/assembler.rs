//! Reassembly of `basic.deliver` + content header + body frames

use amqp_mux_types::{Deliver, Delivery, Frame, FrameBody, FrameType, Message, Method, Properties};
use bytes::BytesMut;
use tracing::trace;

/// Protocol violations found while reassembling a delivery
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    /// A delivery was not followed by its content header
    #[error("Expected content header, found {0:?} frame")]
    ExpectedHeader(FrameType),

    /// A content header was not followed by enough body frames
    #[error("Expected content body, found {0:?} frame")]
    ExpectedBody(FrameType),

    /// The body frames carried more bytes than the header announced
    #[error("Received {received} body bytes but the header announced {expected}")]
    BodyOverflow {
        /// Size announced by the content header
        expected: u64,
        /// Number of bytes received so far
        received: u64,
    },
}

#[derive(Debug)]
enum State {
    AwaitingMethod,
    AwaitingHeader(Deliver),
    AwaitingBody {
        deliver: Deliver,
        properties: Properties,
        target: u64,
        buf: BytesMut,
    },
}

/// Upper bound on the body buffer allocated up front from a content header
const MAX_PREALLOCATED_BODY: u64 = 64 * 1024;

/// Turns a sequence of frames on one channel into [`Delivery`]s
#[derive(Debug)]
pub struct Assembler {
    state: State,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// Creates an assembler waiting for a delivery
    pub fn new() -> Self {
        Self {
            state: State::AwaitingMethod,
        }
    }

    /// Whether the assembler is between deliveries
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::AwaitingMethod)
    }

    /// Feeds one frame.
    ///
    /// Returns the delivery once its last body frame has been pushed. On error the
    /// partial delivery is dropped and the assembler waits for the next method.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Delivery>, AssemblyError> {
        let channel = frame.channel;
        let state = std::mem::replace(&mut self.state, State::AwaitingMethod);

        match (state, frame.body) {
            (state, FrameBody::Heartbeat) => {
                self.state = state;
                Ok(None)
            }
            (State::AwaitingMethod, FrameBody::Method(Method::Deliver(deliver))) => {
                self.state = State::AwaitingHeader(deliver);
                Ok(None)
            }
            (State::AwaitingMethod, body) => {
                trace!(channel, frame_type = ?body.frame_type(), "discarding frame");
                Ok(None)
            }
            (State::AwaitingHeader(deliver), FrameBody::Header(header)) => {
                if header.body_size == 0 {
                    return Ok(Some(complete(channel, deliver, header.properties, BytesMut::new())));
                }
                self.state = State::AwaitingBody {
                    deliver,
                    properties: header.properties,
                    target: header.body_size,
                    buf: BytesMut::with_capacity(header.body_size.min(MAX_PREALLOCATED_BODY) as usize),
                };
                Ok(None)
            }
            (State::AwaitingHeader(_), body) => {
                Err(AssemblyError::ExpectedHeader(body.frame_type()))
            }
            (
                State::AwaitingBody {
                    deliver,
                    properties,
                    target,
                    mut buf,
                },
                FrameBody::Body(fragment),
            ) => {
                let received = (buf.len() + fragment.len()) as u64;
                if received > target {
                    return Err(AssemblyError::BodyOverflow {
                        expected: target,
                        received,
                    });
                }
                buf.extend_from_slice(&fragment);
                if received == target {
                    Ok(Some(complete(channel, deliver, properties, buf)))
                } else {
                    self.state = State::AwaitingBody {
                        deliver,
                        properties,
                        target,
                        buf,
                    };
                    Ok(None)
                }
            }
            (State::AwaitingBody { .. }, body) => Err(AssemblyError::ExpectedBody(body.frame_type())),
        }
    }
}

fn complete(channel: u16, deliver: Deliver, properties: Properties, buf: BytesMut) -> Delivery {
    let Deliver {
        consumer_tag,
        delivery_tag,
        redelivered,
        exchange,
        routing_key,
    } = deliver;
    Delivery {
        channel,
        consumer_tag,
        delivery_tag,
        redelivered,
        exchange,
        routing_key,
        message: Message::new(buf.freeze()).with_properties(properties),
    }
}

#[cfg(test)]
mod tests {
    use amqp_mux_types::{frame::content_frames, ContentHeader};
    use bytes::Bytes;

    use super::*;

    fn deliver(tag: u64) -> Deliver {
        Deliver {
            consumer_tag: "ctag".into(),
            delivery_tag: tag,
            redelivered: false,
            exchange: "".into(),
            routing_key: "rpc".into(),
        }
    }

    fn method(tag: u64) -> Frame {
        Frame::new(1u16, FrameBody::Method(Method::Deliver(deliver(tag))))
    }

    fn header(size: u64) -> Frame {
        Frame::new(1u16, FrameBody::Header(ContentHeader::new(size, Properties::default())))
    }

    fn body(bytes: &'static [u8]) -> Frame {
        Frame::new(1u16, FrameBody::Body(Bytes::from_static(bytes)))
    }

    #[test]
    fn assembles_fragmented_body() {
        let message = Message::new(vec![1u8; 9000])
            .with_properties(Properties::builder().correlation_id("abc").build());
        let mut frames = content_frames(1, deliver(7), message.clone(), 4096).into_iter();

        let mut assembler = Assembler::new();
        let mut delivered = None;
        for frame in frames.by_ref() {
            if let Some(delivery) = assembler.push(frame).unwrap() {
                delivered = Some(delivery);
            }
        }

        let delivery = delivered.unwrap();
        assert_eq!(delivery.delivery_tag, 7);
        assert_eq!(delivery.message, message);
        assert!(assembler.is_idle());
    }

    #[test]
    fn zero_sized_body_completes_at_header() {
        let mut assembler = Assembler::new();
        assert!(assembler.push(method(1)).unwrap().is_none());
        let delivery = assembler.push(header(0)).unwrap().unwrap();
        assert!(delivery.body().is_empty());
    }

    #[test]
    fn discards_frames_outside_a_delivery() {
        let mut assembler = Assembler::new();
        let consume_ok = Frame::new(
            1u16,
            FrameBody::Method(Method::ConsumeOk {
                consumer_tag: "ctag".into(),
            }),
        );
        assert!(assembler.push(consume_ok).unwrap().is_none());
        assert!(assembler.push(body(b"stray")).unwrap().is_none());
        assert!(assembler.is_idle());
    }

    #[test]
    fn method_instead_of_header_is_an_error() {
        let mut assembler = Assembler::new();
        assembler.push(method(1)).unwrap();
        let err = assembler.push(method(2)).unwrap_err();
        assert_eq!(err, AssemblyError::ExpectedHeader(FrameType::Method));
        assert!(assembler.is_idle());
    }

    #[test]
    fn header_instead_of_body_is_an_error() {
        let mut assembler = Assembler::new();
        assembler.push(method(1)).unwrap();
        assembler.push(header(10)).unwrap();
        assembler.push(body(b"hello")).unwrap();
        let err = assembler.push(header(10)).unwrap_err();
        assert_eq!(err, AssemblyError::ExpectedBody(FrameType::Header));
    }

    #[test]
    fn body_larger_than_announced() {
        let mut assembler = Assembler::new();
        assembler.push(method(1)).unwrap();
        assembler.push(header(3)).unwrap();
        let err = assembler.push(body(b"hello")).unwrap_err();
        assert_eq!(
            err,
            AssemblyError::BodyOverflow {
                expected: 3,
                received: 5
            }
        );
    }

    #[test]
    fn heartbeats_are_ignored_mid_delivery() {
        let mut assembler = Assembler::new();
        assembler.push(method(1)).unwrap();
        assert!(assembler.push(Frame::heartbeat()).unwrap().is_none());
        assembler.push(header(5)).unwrap();
        assert!(assembler.push(Frame::heartbeat()).unwrap().is_none());
        let delivery = assembler.push(body(b"hello")).unwrap().unwrap();
        assert_eq!(&delivery.body()[..], b"hello");
    }

    #[test]
    fn oversized_header_does_not_preallocate_its_body() {
        let mut assembler = Assembler::new();
        assembler.push(method(1)).unwrap();
        assert!(assembler.push(header(u64::MAX)).unwrap().is_none());
        assert!(assembler.push(body(b"hello")).unwrap().is_none());

        match &assembler.state {
            State::AwaitingBody { buf, target, .. } => {
                assert_eq!(*target, u64::MAX);
                assert_eq!(&buf[..], b"hello");
                assert!(buf.capacity() < 1 << 20);
            }
            other => panic!("unexpected state {:?}", other),
        }

        let err = assembler.push(method(2)).unwrap_err();
        assert_eq!(err, AssemblyError::ExpectedBody(FrameType::Method));
        assert!(assembler.is_idle());
    }
}
