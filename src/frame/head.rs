use ntex_bytes::BufMut;

use super::{flags, StreamId};

/// The 8-byte prefix common to all frames: 14-bit length, type, flags and
/// stream ID. The two top length bits and the top stream-ID bit are
/// reserved on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Head {
    kind: Kind,
    flag: u8,
    stream_id: StreamId,
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Data = 0,
    Headers = 1,
    Priority = 2,
    Reset = 3,
    Settings = 4,
    PushPromise = 5,
    Ping = 6,
    GoAway = 7,
    WindowUpdate = 8,
    Continuation = 9,
}

// ===== impl Head =====

impl Head {
    pub fn new(kind: Kind, flag: u8, stream_id: StreamId) -> Head {
        Head {
            kind,
            flag,
            stream_id,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn is_set(&self, flag: u8) -> bool {
        self.flag & flag != 0
    }

    pub fn encode<T: BufMut>(&self, payload_len: usize, dst: &mut T) {
        debug_assert!(payload_len <= crate::consts::MAX_FRAME_PAYLOAD);
        dst.put_u16(payload_len as u16);
        dst.put_u8(self.kind as u8);
        dst.put_u8(self.flag);
        dst.put_u32(self.stream_id.into());
    }
}

// ===== impl Kind =====

impl Kind {
    pub fn new(byte: u8) -> Option<Kind> {
        match byte {
            0 => Some(Kind::Data),
            1 => Some(Kind::Headers),
            2 => Some(Kind::Priority),
            3 => Some(Kind::Reset),
            4 => Some(Kind::Settings),
            5 => Some(Kind::PushPromise),
            6 => Some(Kind::Ping),
            7 => Some(Kind::GoAway),
            8 => Some(Kind::WindowUpdate),
            9 => Some(Kind::Continuation),
            _ => None,
        }
    }

    /// The set of flag bits a frame of this type may carry.
    pub fn valid_flags(&self) -> u8 {
        use flags::*;

        match self {
            Kind::Data => END_STREAM | END_SEGMENT | PAD_LOW | PAD_HIGH,
            Kind::Headers => {
                END_STREAM
                    | END_SEGMENT
                    | END_HEADERS
                    | PAD_LOW
                    | PAD_HIGH
                    | PRIORITY_GROUP
                    | PRIORITY_DEPENDENCY
            }
            Kind::Priority => PRIORITY_GROUP | PRIORITY_DEPENDENCY,
            Kind::Reset => 0,
            Kind::Settings => ACK,
            Kind::PushPromise => END_HEADERS | PAD_LOW | PAD_HIGH,
            Kind::Ping => ACK,
            Kind::GoAway => 0,
            Kind::WindowUpdate => 0,
            Kind::Continuation => END_HEADERS | PAD_LOW | PAD_HIGH,
        }
    }
}
