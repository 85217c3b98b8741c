use std::fmt;

use ntex_bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::frame::{flags, util, Frame, FrameError, Head, Kind, StreamId};
use crate::hpack::{self, HeaderDecoder, HeaderField};

/// Push promise frame
///
/// Reserves the promised stream and carries the header-block fragment of
/// the promised request.
#[derive(Clone, Eq, PartialEq)]
pub struct PushPromise {
    stream_id: StreamId,
    promised_id: StreamId,
    padding: usize,
    fragment: Bytes,
    fields: Vec<HeaderField>,
    end_headers: bool,
}

impl PushPromise {
    pub fn new(stream_id: StreamId, promised_id: StreamId, fragment: Bytes) -> Self {
        assert!(!promised_id.is_zero());

        PushPromise {
            stream_id,
            promised_id,
            fragment,
            padding: 0,
            fields: Vec::new(),
            end_headers: false,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// The stream reserved by this promise.
    pub fn promised_id(&self) -> StreamId {
        self.promised_id
    }

    pub fn is_end_headers(&self) -> bool {
        self.end_headers
    }

    pub fn set_end_headers(&mut self) {
        self.end_headers = true;
    }

    pub fn fragment(&self) -> &Bytes {
        &self.fragment
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    pub(crate) fn load(
        head: Head,
        src: &mut Bytes,
        decoder: &mut dyn HeaderDecoder,
    ) -> Result<Self, FrameError> {
        let padding = util::parse_padding(head.flag(), src)?;

        let (promised_id, reserved) = {
            util::ensure(src, 4)?;
            let (id, reserved) = StreamId::parse(&src[..4]);
            src.advance(4);
            (id, reserved)
        };
        if reserved {
            return Err(FrameError::ReservedStreamIdBit);
        }
        if promised_id.is_zero() {
            return Err(FrameError::ZeroPromisedId);
        }

        let fragment = util::read_remainder(src, padding)?;

        let end_headers = head.is_set(flags::END_HEADERS);
        let fields = hpack::decode_block(decoder, &fragment, end_headers)?;

        Ok(PushPromise {
            padding,
            promised_id,
            fragment,
            fields,
            end_headers,
            stream_id: head.stream_id(),
        })
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        let mut flag = util::padding_flags(self.padding);
        if self.end_headers {
            flag |= flags::END_HEADERS;
        }

        let len = util::padded_len(self.fragment.len() + 4, self.padding);
        Head::new(Kind::PushPromise, flag, self.stream_id).encode(len, dst);
        util::encode_padding_length(self.padding, dst);
        dst.put_u32(self.promised_id.into());
        dst.extend_from_slice(&self.fragment);
        util::put_padding(dst, self.padding);
    }
}

impl From<PushPromise> for Frame {
    fn from(src: PushPromise) -> Self {
        Frame::PushPromise(src)
    }
}

impl fmt::Debug for PushPromise {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("PushPromise")
            .field("stream_id", &self.stream_id)
            .field("promised_id", &self.promised_id)
            .field("fragment_len", &self.fragment.len())
            .field("end_headers", &self.end_headers)
            .finish()
    }
}
