use ntex_bytes::{BufMut, Bytes, BytesMut};

use crate::frame::{util, Frame, FrameError, Head, Kind, Reason, StreamId};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Reset {
    stream_id: StreamId,
    error_code: Reason,
}

impl Reset {
    pub fn new(stream_id: StreamId, error: Reason) -> Reset {
        Reset {
            stream_id,
            error_code: error,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn reason(&self) -> Reason {
        self.error_code
    }

    pub(crate) fn load(head: Head, src: &mut Bytes) -> Result<Reset, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId(Kind::Reset));
        }

        let error_code = util::read_u32(src)?;

        Ok(Reset {
            stream_id: head.stream_id(),
            error_code: error_code.into(),
        })
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        log::trace!(
            "encoding RST_STREAM; id={:?} code={:?}",
            self.stream_id,
            self.error_code
        );
        let head = Head::new(Kind::Reset, 0, self.stream_id);
        head.encode(4, dst);
        dst.put_u32(self.error_code.into());
    }
}

impl From<Reset> for Frame {
    fn from(src: Reset) -> Self {
        Frame::Reset(src)
    }
}
