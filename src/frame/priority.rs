use ntex_bytes::{BufMut, Bytes, BytesMut};

use crate::frame::{flags, util, Frame, FrameError, Head, Kind, StreamId};

/// Priority frame
///
/// Carries either a priority-group assignment or a stream dependency;
/// the two are mutually exclusive on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Priority {
    stream_id: StreamId,
    update: PriorityUpdate,
}

/// The priority metadata optionally attached to HEADERS and always
/// attached to PRIORITY frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PriorityUpdate {
    Group { group: u32, weight: u8 },
    Dependency { dependency: StreamId, exclusive: bool },
}

const GROUP_RESERVED_MASK: u32 = 1 << 31;

impl PriorityUpdate {
    /// Parse the metadata indicated by the PRIORITY_GROUP /
    /// PRIORITY_DEPENDENCY flags. Both at once is invalid.
    pub(super) fn parse(flag: u8, src: &mut Bytes) -> Result<Option<PriorityUpdate>, FrameError> {
        let group = flag & flags::PRIORITY_GROUP != 0;
        let dependency = flag & flags::PRIORITY_DEPENDENCY != 0;

        match (group, dependency) {
            (true, true) => Err(FrameError::BothPriorityFlags),
            (true, false) => {
                let group = util::read_u32(src)?;
                if group & GROUP_RESERVED_MASK != 0 {
                    return Err(FrameError::ReservedPriorityGroupBit);
                }
                let weight = util::read_u8(src)?;
                Ok(Some(PriorityUpdate::Group { group, weight }))
            }
            (false, true) => {
                let word = util::read_u32(src)?;
                Ok(Some(PriorityUpdate::Dependency {
                    dependency: (word & !GROUP_RESERVED_MASK).into(),
                    exclusive: word & GROUP_RESERVED_MASK != 0,
                }))
            }
            (false, false) => Ok(None),
        }
    }

    pub(super) fn flags(&self) -> u8 {
        match self {
            PriorityUpdate::Group { .. } => flags::PRIORITY_GROUP,
            PriorityUpdate::Dependency { .. } => flags::PRIORITY_DEPENDENCY,
        }
    }

    pub(super) fn encoded_len(&self) -> usize {
        match self {
            PriorityUpdate::Group { .. } => 5,
            PriorityUpdate::Dependency { .. } => 4,
        }
    }

    pub(super) fn encode(&self, dst: &mut BytesMut) {
        match *self {
            PriorityUpdate::Group { group, weight } => {
                dst.put_u32(group);
                dst.put_u8(weight);
            }
            PriorityUpdate::Dependency {
                dependency,
                exclusive,
            } => {
                let mut word: u32 = dependency.into();
                if exclusive {
                    word |= GROUP_RESERVED_MASK;
                }
                dst.put_u32(word);
            }
        }
    }
}

impl Priority {
    pub fn new(stream_id: StreamId, update: PriorityUpdate) -> Self {
        Priority { stream_id, update }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn update(&self) -> &PriorityUpdate {
        &self.update
    }

    pub(crate) fn load(head: Head, src: &mut Bytes) -> Result<Self, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId(Kind::Priority));
        }

        let update =
            PriorityUpdate::parse(head.flag(), src)?.ok_or(FrameError::MissingPriorityFlags)?;

        Ok(Priority {
            stream_id: head.stream_id(),
            update,
        })
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        let head = Head::new(Kind::Priority, self.update.flags(), self.stream_id);
        head.encode(self.update.encoded_len(), dst);
        self.update.encode(dst);
    }
}

impl From<Priority> for Frame {
    fn from(src: Priority) -> Self {
        Frame::Priority(src)
    }
}
