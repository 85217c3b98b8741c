use ntex_bytes::{Bytes, BytesMut};

use crate::frame::{flags, util, Frame, FrameError, Head, Kind, StreamId};

/// Data frame
///
/// Data frames convey arbitrary, variable-length sequences of octets
/// associated with a stream.
#[derive(Clone, Eq, PartialEq)]
pub struct Data {
    stream_id: StreamId,
    data: Bytes,
    padding: usize,
    flags: DataFlags,
}

#[derive(Default, Copy, Clone, Eq, PartialEq)]
struct DataFlags(u8);

const ALL: u8 = flags::END_STREAM | flags::END_SEGMENT;

impl Data {
    /// Creates a new DATA frame.
    pub fn new(stream_id: StreamId, payload: Bytes) -> Self {
        assert!(!stream_id.is_zero());

        Data {
            stream_id,
            data: payload,
            padding: 0,
            flags: DataFlags::default(),
        }
    }

    /// Returns the stream identifier that this frame is associated with.
    ///
    /// This cannot be a zero stream identifier.
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Gets the value of the `END_STREAM` flag for this frame.
    ///
    /// If true, this frame is the last that the endpoint will send for the
    /// identified stream.
    pub fn is_end_stream(&self) -> bool {
        self.flags.is_end_stream()
    }

    /// Sets the value for the `END_STREAM` flag on this frame.
    pub fn set_end_stream(&mut self) {
        self.flags.set_end_stream();
    }

    /// Number of padding octets stripped from (or appended to) the payload.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Returns a reference to this frame's payload.
    ///
    /// This does **not** include any padding that might have been
    /// originally included.
    pub fn payload(&self) -> &Bytes {
        &self.data
    }

    /// Consumes `self` and returns the frame's payload.
    pub fn into_payload(self) -> Bytes {
        self.data
    }

    /// Octets this frame occupies in a flow-control window: payload plus
    /// padding.
    pub(crate) fn flow_len(&self) -> usize {
        self.data.len() + self.padding
    }

    /// Splits off everything past `at` data octets into a new frame.
    ///
    /// `self` keeps the prefix and sheds `END_STREAM`; the returned
    /// remainder inherits the original flags and padding.
    pub(crate) fn split_off(&mut self, at: usize) -> Data {
        debug_assert!(at < self.data.len());
        let rest = Data {
            stream_id: self.stream_id,
            data: self.data.split_off(at),
            padding: self.padding,
            flags: self.flags,
        };
        self.padding = 0;
        self.flags.clear_end_stream();
        rest
    }

    pub(crate) fn load(head: Head, src: &mut Bytes) -> Result<Self, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId(Kind::Data));
        }

        let padding = util::parse_padding(head.flag(), src)?;
        let data = util::read_remainder(src, padding)?;

        Ok(Data {
            data,
            padding,
            stream_id: head.stream_id(),
            flags: DataFlags::load(head.flag()),
        })
    }

    /// Encode the data frame into the `dst` buffer.
    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        let flag = self.flags.0 | util::padding_flags(self.padding);
        let head = Head::new(Kind::Data, flag, self.stream_id);

        head.encode(util::padded_len(self.data.len(), self.padding), dst);
        util::encode_padding_length(self.padding, dst);
        dst.extend_from_slice(&self.data);
        util::put_padding(dst, self.padding);
    }
}

impl From<Data> for Frame {
    fn from(src: Data) -> Self {
        Frame::Data(src)
    }
}

impl std::fmt::Debug for Data {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = fmt.debug_struct("Data");
        f.field("stream_id", &self.stream_id);
        f.field("data_len", &self.data.len());
        if self.padding > 0 {
            f.field("padding", &self.padding);
        }
        if !self.flags.is_empty() {
            f.field("flags", &self.flags);
        }
        // `data` bytes purposefully excluded
        f.finish()
    }
}

// ===== impl DataFlags =====

impl DataFlags {
    fn load(bits: u8) -> DataFlags {
        DataFlags(bits & ALL)
    }

    fn is_empty(&self) -> bool {
        self.0 == 0
    }

    fn is_end_stream(&self) -> bool {
        self.0 & flags::END_STREAM != 0
    }

    fn set_end_stream(&mut self) {
        self.0 |= flags::END_STREAM
    }

    fn clear_end_stream(&mut self) {
        self.0 &= !flags::END_STREAM
    }
}

impl std::fmt::Debug for DataFlags {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        util::debug_flags(fmt, self.0)
            .flag_if(self.is_end_stream(), "END_STREAM")
            .flag_if(self.0 & flags::END_SEGMENT != 0, "END_SEGMENT")
            .finish()
    }
}
