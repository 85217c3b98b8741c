use std::{cell::RefCell, rc::Rc};

use ntex_bytes::{Buf, BytesMut};
use ntex_codec::{Decoder, Encoder};

mod error;

pub use self::error::EncoderError;

use crate::consts;
use crate::frame::{self, Frame, FrameError, Head, Kind, StreamId, HEADER_LEN};
use crate::hpack::{HeaderDecoder, OpaqueDecoder};

const LENGTH_RESERVED_MASK: u16 = 0xc000;

/// Frame codec.
///
/// Stateful in one respect: after a HEADERS or PUSH_PROMISE without
/// END_HEADERS (or a CONTINUATION without it) only a CONTINUATION on the
/// same stream may follow. Header-block fragments are handed to the
/// configured [`HeaderDecoder`].
#[derive(Clone, Debug)]
pub struct Codec(Rc<RefCell<CodecInner>>);

struct CodecInner {
    decoder: Box<dyn HeaderDecoder>,
    // Stream of the open header block, when END_HEADERS is pending
    expect_continuation: Option<StreamId>,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(Box::<OpaqueDecoder>::default())
    }
}

impl Codec {
    /// Create a codec delegating header blocks to the given decoder.
    pub fn new(decoder: Box<dyn HeaderDecoder>) -> Self {
        Codec(Rc::new(RefCell::new(CodecInner {
            decoder,
            expect_continuation: None,
        })))
    }
}

impl Decoder for Codec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        // Prefix phase: the fixed 8 bytes are validated before waiting for
        // the payload, so a bogus length cannot stall the connection.
        let length = ((src[0] as u16) << 8) | src[1] as u16;
        if length & LENGTH_RESERVED_MASK != 0 {
            proto_err!(conn: "reserved length bits are non-zero");
            return Err(FrameError::ReservedLengthBits);
        }

        let kind = Kind::new(src[2]).ok_or_else(|| {
            proto_err!(conn: "invalid frame type {:#x}", src[2]);
            FrameError::InvalidType(src[2])
        })?;

        let flag = src[3];
        let invalid = flag & !kind.valid_flags();
        if invalid != 0 {
            proto_err!(conn: "invalid flags {invalid:#x} for {kind:?} frame");
            return Err(FrameError::InvalidFlags(invalid, kind));
        }

        let (stream_id, reserved) = StreamId::parse(&src[4..8]);
        if reserved {
            proto_err!(conn: "reserved stream ID bit is non-zero");
            return Err(FrameError::ReservedStreamIdBit);
        }

        if src.len() < HEADER_LEN + length as usize {
            return Ok(None);
        }

        let mut inner = self.0.borrow_mut();

        // Payload phase: every read below is bounded to the declared length.
        let mut payload = src.split_to(HEADER_LEN + length as usize).freeze();
        payload.advance(HEADER_LEN);

        let head = Head::new(kind, flag, stream_id);
        log::trace!("decoding {kind:?} frame; payload len {length}");

        if let Some(id) = inner.expect_continuation {
            if kind != Kind::Continuation {
                proto_err!(conn: "expected CONTINUATION, got {:?}", kind);
                return Err(FrameError::ExpectedContinuation(kind));
            }
            if stream_id != id {
                proto_err!(conn: "CONTINUATION stream ID does not match open header block");
                return Err(FrameError::ContinuationStreamId);
            }
        } else if kind == Kind::Continuation {
            proto_err!(conn: "received unexpected CONTINUATION frame");
            return Err(FrameError::UnexpectedContinuation);
        }

        let frame: Frame = match kind {
            Kind::Data => frame::Data::load(head, &mut payload)?.into(),
            Kind::Headers => {
                frame::Headers::load(head, &mut payload, &mut *inner.decoder)?.into()
            }
            Kind::Priority => frame::Priority::load(head, &mut payload)?.into(),
            Kind::Reset => frame::Reset::load(head, &mut payload)?.into(),
            Kind::Settings => frame::Settings::load(head, &mut payload)?.into(),
            Kind::PushPromise => {
                frame::PushPromise::load(head, &mut payload, &mut *inner.decoder)?.into()
            }
            Kind::Ping => frame::Ping::load(head, &mut payload)?.into(),
            Kind::GoAway => frame::GoAway::load(head, &mut payload)?.into(),
            Kind::WindowUpdate => frame::WindowUpdate::load(head, &mut payload)?.into(),
            Kind::Continuation => {
                frame::Continuation::load(head, &mut payload, &mut *inner.decoder)?.into()
            }
        };

        if !payload.is_empty() {
            proto_err!(conn: "{} bytes of extra frame payload", payload.len());
            return Err(FrameError::ExtraPayload(payload.len()));
        }

        inner.expect_continuation = match &frame {
            Frame::Headers(f) if !f.is_end_headers() => Some(f.stream_id()),
            Frame::PushPromise(f) if !f.is_end_headers() => Some(f.stream_id()),
            Frame::Continuation(f) if !f.is_end_headers() => Some(f.stream_id()),
            _ => None,
        };

        Ok(Some(frame))
    }
}

impl Encoder for Codec {
    type Item = Frame;
    type Error = EncoderError;

    fn encode(&self, item: Frame, dst: &mut BytesMut) -> Result<(), EncoderError> {
        match item {
            Frame::Data(v) => {
                if v.payload().len() + v.padding() > consts::MAX_FRAME_PAYLOAD {
                    return Err(EncoderError::MaxSizeExceeded);
                }
                v.encode(dst);
            }
            Frame::Headers(v) => v.encode(dst),
            Frame::Priority(v) => v.encode(dst),
            Frame::Reset(v) => v.encode(dst),
            Frame::Settings(v) => v.encode(dst),
            Frame::PushPromise(v) => v.encode(dst),
            Frame::Ping(v) => v.encode(dst),
            Frame::GoAway(v) => v.encode(dst),
            Frame::WindowUpdate(v) => v.encode(dst),
            Frame::Continuation(v) => v.encode(dst),
        }
        Ok(())
    }
}

impl std::fmt::Debug for CodecInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecInner")
            .field("expect_continuation", &self.expect_continuation)
            .finish()
    }
}
