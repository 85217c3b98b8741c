use std::fmt;

use ntex_bytes::{Bytes, BytesMut};

use crate::frame::{flags, util, Frame, FrameError, Head, Kind, PriorityUpdate, StreamId};
use crate::hpack::{self, HeaderDecoder, HeaderField};

/// Headers frame
///
/// Opens (or finishes) a stream with a header-block fragment. The fragment
/// itself is opaque to the framing layer; decoded fields are produced by
/// the connection's header decoder.
#[derive(Clone, Eq, PartialEq)]
pub struct Headers {
    stream_id: StreamId,
    padding: usize,
    priority: Option<PriorityUpdate>,
    fragment: Bytes,
    fields: Vec<HeaderField>,
    flags: HeadersFlag,
}

#[derive(Default, Copy, Clone, Eq, PartialEq)]
struct HeadersFlag(u8);

const ALL: u8 = flags::END_STREAM | flags::END_SEGMENT | flags::END_HEADERS;

impl Headers {
    /// Creates a new HEADERS frame around a pre-encoded header-block
    /// fragment.
    pub fn new(stream_id: StreamId, fragment: Bytes) -> Self {
        Headers {
            stream_id,
            fragment,
            padding: 0,
            priority: None,
            fields: Vec::new(),
            flags: HeadersFlag::default(),
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags.0 & flags::END_STREAM != 0
    }

    pub fn set_end_stream(&mut self) {
        self.flags.0 |= flags::END_STREAM;
    }

    pub fn is_end_headers(&self) -> bool {
        self.flags.0 & flags::END_HEADERS != 0
    }

    pub fn set_end_headers(&mut self) {
        self.flags.0 |= flags::END_HEADERS;
    }

    pub fn priority(&self) -> Option<&PriorityUpdate> {
        self.priority.as_ref()
    }

    /// The raw header-block fragment, without padding.
    pub fn fragment(&self) -> &Bytes {
        &self.fragment
    }

    /// Header fields decoded from the fragment.
    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<HeaderField> {
        self.fields
    }

    pub(crate) fn load(
        head: Head,
        src: &mut Bytes,
        decoder: &mut dyn HeaderDecoder,
    ) -> Result<Self, FrameError> {
        let padding = util::parse_padding(head.flag(), src)?;
        let priority = PriorityUpdate::parse(head.flag(), src)?;
        let fragment = util::read_remainder(src, padding)?;

        let end_headers = head.is_set(flags::END_HEADERS);
        let fields = hpack::decode_block(decoder, &fragment, end_headers)?;

        Ok(Headers {
            padding,
            priority,
            fragment,
            fields,
            stream_id: head.stream_id(),
            flags: HeadersFlag(head.flag() & ALL),
        })
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        let mut flag = self.flags.0 | util::padding_flags(self.padding);
        let mut len = util::padded_len(self.fragment.len(), self.padding);
        if let Some(ref p) = self.priority {
            flag |= p.flags();
            len += p.encoded_len();
        }

        Head::new(Kind::Headers, flag, self.stream_id).encode(len, dst);
        util::encode_padding_length(self.padding, dst);
        if let Some(ref p) = self.priority {
            p.encode(dst);
        }
        dst.extend_from_slice(&self.fragment);
        util::put_padding(dst, self.padding);
    }
}

impl From<Headers> for Frame {
    fn from(src: Headers) -> Self {
        Frame::Headers(src)
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = fmt.debug_struct("Headers");
        f.field("stream_id", &self.stream_id);
        f.field("fragment_len", &self.fragment.len());
        if !self.fields.is_empty() {
            f.field("fields", &self.fields);
        }
        if let Some(ref p) = self.priority {
            f.field("priority", p);
        }
        f.field("flags", &self.flags);
        f.finish()
    }
}

impl fmt::Debug for HeadersFlag {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        util::debug_flags(fmt, self.0)
            .flag_if(self.0 & flags::END_STREAM != 0, "END_STREAM")
            .flag_if(self.0 & flags::END_SEGMENT != 0, "END_SEGMENT")
            .flag_if(self.0 & flags::END_HEADERS != 0, "END_HEADERS")
            .finish()
    }
}
