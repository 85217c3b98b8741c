use ntex_bytes::{BufMut, Bytes, BytesMut};

use crate::frame::{self, util, FrameError, Head, Kind, StreamId};

const SIZE_DELTA_MASK: u32 = 1 << 31;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WindowUpdate {
    stream_id: StreamId,
    size_delta: u32,
}

impl WindowUpdate {
    pub fn new(stream_id: StreamId, size_delta: u32) -> WindowUpdate {
        WindowUpdate {
            stream_id,
            size_delta,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn size_delta(&self) -> u32 {
        self.size_delta
    }

    pub(crate) fn load(head: Head, src: &mut Bytes) -> Result<WindowUpdate, FrameError> {
        let size_delta = util::read_u32(src)?;
        if size_delta & SIZE_DELTA_MASK != 0 {
            return Err(FrameError::ReservedSizeDeltaBit);
        }

        Ok(WindowUpdate {
            stream_id: head.stream_id(),
            size_delta,
        })
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        log::trace!(
            "encoding WINDOW_UPDATE; id={:?}, delta={}",
            self.stream_id,
            self.size_delta
        );
        let head = Head::new(Kind::WindowUpdate, 0, self.stream_id);
        head.encode(4, dst);
        dst.put_u32(self.size_delta);
    }
}

impl From<WindowUpdate> for frame::Frame {
    fn from(src: WindowUpdate) -> Self {
        frame::Frame::WindowUpdate(src)
    }
}
