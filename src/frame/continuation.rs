use std::fmt;

use ntex_bytes::{Bytes, BytesMut};

use crate::frame::{flags, util, Frame, FrameError, Head, Kind, StreamId};
use crate::hpack::{self, HeaderDecoder, HeaderField};

/// Continuation frame
///
/// Carries a further header-block fragment for the stream whose HEADERS or
/// PUSH_PROMISE did not set END_HEADERS. Adjacency is enforced by the
/// codec, not here.
#[derive(Clone, Eq, PartialEq)]
pub struct Continuation {
    stream_id: StreamId,
    padding: usize,
    fragment: Bytes,
    fields: Vec<HeaderField>,
    end_headers: bool,
}

impl Continuation {
    pub fn new(stream_id: StreamId, fragment: Bytes) -> Self {
        Continuation {
            stream_id,
            fragment,
            padding: 0,
            fields: Vec::new(),
            end_headers: false,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
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
        let fragment = util::read_remainder(src, padding)?;

        let end_headers = head.is_set(flags::END_HEADERS);
        let fields = hpack::decode_block(decoder, &fragment, end_headers)?;

        Ok(Continuation {
            padding,
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

        let len = util::padded_len(self.fragment.len(), self.padding);
        Head::new(Kind::Continuation, flag, self.stream_id).encode(len, dst);
        util::encode_padding_length(self.padding, dst);
        dst.extend_from_slice(&self.fragment);
        util::put_padding(dst, self.padding);
    }
}

impl From<Continuation> for Frame {
    fn from(src: Continuation) -> Self {
        Frame::Continuation(src)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Continuation")
            .field("stream_id", &self.stream_id)
            .field("fragment_len", &self.fragment.len())
            .field("end_headers", &self.end_headers)
            .finish()
    }
}
