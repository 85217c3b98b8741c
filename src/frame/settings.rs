use std::fmt;

use ntex_bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::frame::{flags, Frame, FrameError, Head, Kind, StreamId};

const HEADER_TABLE_SIZE: u8 = 1;
const ENABLE_PUSH: u8 = 2;
const MAX_CONCURRENT_STREAMS: u8 = 3;
const INITIAL_WINDOW_SIZE: u8 = 4;

/// Settings frame
///
/// Draft wire layout: a sequence of 5-octet entries, `{id: u8, value: u32}`.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct Settings {
    ack: bool,
    header_table_size: Option<u32>,
    enable_push: Option<bool>,
    max_concurrent_streams: Option<u32>,
    initial_window_size: Option<u32>,
}

impl Settings {
    pub fn new() -> Settings {
        Settings::default()
    }

    /// An acknowledgement of the peer's SETTINGS frame.
    pub fn ack() -> Settings {
        Settings {
            ack: true,
            ..Settings::default()
        }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn header_table_size(&self) -> Option<u32> {
        self.header_table_size
    }

    pub fn set_header_table_size(&mut self, size: Option<u32>) {
        self.header_table_size = size;
    }

    pub fn is_push_enabled(&self) -> Option<bool> {
        self.enable_push
    }

    pub fn set_enable_push(&mut self, enable: bool) {
        self.enable_push = Some(enable);
    }

    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    pub fn set_max_concurrent_streams(&mut self, max: Option<u32>) {
        self.max_concurrent_streams = max;
    }

    pub fn initial_window_size(&self) -> Option<u32> {
        self.initial_window_size
    }

    pub fn set_initial_window_size(&mut self, size: Option<u32>) {
        self.initial_window_size = size;
    }

    pub(crate) fn load(head: Head, src: &mut Bytes) -> Result<Settings, FrameError> {
        if !head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId(Kind::Settings));
        }

        if head.is_set(flags::ACK) {
            return if src.is_empty() {
                Ok(Settings::ack())
            } else {
                Err(FrameError::SettingsAckWithPayload)
            };
        }

        if src.len() % 5 != 0 {
            return Err(FrameError::SettingsPayloadSize);
        }

        let mut settings = Settings::new();
        while !src.is_empty() {
            let id = src.get_u8();
            let value = src.get_u32();
            match id {
                HEADER_TABLE_SIZE => settings.header_table_size = Some(value),
                ENABLE_PUSH => match value {
                    0 => settings.enable_push = Some(false),
                    1 => settings.enable_push = Some(true),
                    _ => return Err(FrameError::InvalidEnablePush),
                },
                MAX_CONCURRENT_STREAMS => settings.max_concurrent_streams = Some(value),
                INITIAL_WINDOW_SIZE => settings.initial_window_size = Some(value),
                other => return Err(FrameError::InvalidSettingId(other)),
            }
        }
        Ok(settings)
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        let head = Head::new(
            Kind::Settings,
            if self.ack { flags::ACK } else { 0 },
            StreamId::CON,
        );
        let payload_len = self.entries() * 5;

        log::trace!("encoding SETTINGS; len={payload_len}");
        head.encode(payload_len, dst);

        self.for_each(|id, value| {
            dst.put_u8(id);
            dst.put_u32(value);
        });
    }

    fn entries(&self) -> usize {
        if self.ack {
            return 0;
        }
        let mut count = 0;
        self.for_each(|_, _| count += 1);
        count
    }

    fn for_each<F: FnMut(u8, u32)>(&self, mut f: F) {
        if self.ack {
            return;
        }
        if let Some(v) = self.header_table_size {
            f(HEADER_TABLE_SIZE, v);
        }
        if let Some(v) = self.enable_push {
            f(ENABLE_PUSH, v as u32);
        }
        if let Some(v) = self.max_concurrent_streams {
            f(MAX_CONCURRENT_STREAMS, v);
        }
        if let Some(v) = self.initial_window_size {
            f(INITIAL_WINDOW_SIZE, v);
        }
    }
}

impl From<Settings> for Frame {
    fn from(src: Settings) -> Self {
        Frame::Settings(src)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = fmt.debug_struct("Settings");
        if self.ack {
            return f.field("ack", &true).finish();
        }
        self.for_each(|id, value| {
            let name = match id {
                HEADER_TABLE_SIZE => "header_table_size",
                ENABLE_PUSH => "enable_push",
                MAX_CONCURRENT_STREAMS => "max_concurrent_streams",
                INITIAL_WINDOW_SIZE => "initial_window_size",
                _ => "unknown",
            };
            f.field(name, &value);
        });
        f.finish()
    }
}
