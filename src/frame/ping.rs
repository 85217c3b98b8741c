use ntex_bytes::{Buf, Bytes, BytesMut};

use crate::frame::{flags, util, Frame, FrameError, Head, Kind, StreamId};

pub(super) type Payload = [u8; 8];

/// Ping frame
///
/// Unlike most control frames the draft wire format does not pin PING to
/// the connection stream, so the carrier stream ID is preserved.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ping {
    stream_id: StreamId,
    ack: bool,
    payload: Payload,
}

impl Ping {
    pub fn new(payload: Payload) -> Ping {
        Ping {
            stream_id: StreamId::CON,
            ack: false,
            payload,
        }
    }

    /// A PING response carrying the request's opaque payload.
    pub fn pong(payload: Payload) -> Ping {
        Ping {
            stream_id: StreamId::CON,
            ack: true,
            payload,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub(crate) fn load(head: Head, src: &mut Bytes) -> Result<Ping, FrameError> {
        util::ensure(src, 8)?;
        let mut payload = [0; 8];
        payload.copy_from_slice(&src[..8]);
        src.advance(8);

        Ok(Ping {
            payload,
            stream_id: head.stream_id(),
            ack: head.is_set(flags::ACK),
        })
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        log::trace!("encoding PING; ack={}", self.ack);

        let flag = if self.ack { flags::ACK } else { 0 };
        let head = Head::new(Kind::Ping, flag, self.stream_id);

        head.encode(8, dst);
        dst.extend_from_slice(&self.payload);
    }
}

impl From<Ping> for Frame {
    fn from(src: Ping) -> Frame {
        Frame::Ping(src)
    }
}
