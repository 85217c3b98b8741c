use std::fmt;

use ntex_bytes::{Buf, Bytes, BytesMut};

use super::{flags, FrameError};

/// Reads `n` bytes worth of payload availability, failing with a frame-size
/// error when the bounded region is exhausted early.
pub(super) fn ensure(src: &Bytes, n: usize) -> Result<(), FrameError> {
    if src.len() < n {
        Err(FrameError::PrematureEnd)
    } else {
        Ok(())
    }
}

pub(super) fn read_u8(src: &mut Bytes) -> Result<u8, FrameError> {
    ensure(src, 1)?;
    Ok(src.get_u8())
}

pub(super) fn read_u32(src: &mut Bytes) -> Result<u32, FrameError> {
    ensure(src, 4)?;
    Ok(src.get_u32())
}

/// Parse the optional 8/16-bit padding-length prefix indicated by the
/// PAD_LOW / PAD_HIGH flags. The computed length may not exceed what is
/// left of the bounded payload region.
pub(super) fn parse_padding(flag: u8, src: &mut Bytes) -> Result<usize, FrameError> {
    if flag & flags::PAD_HIGH != 0 && flag & flags::PAD_LOW == 0 {
        return Err(FrameError::PadHighWithoutPadLow);
    }

    let mut padding = 0usize;
    if flag & flags::PAD_HIGH != 0 {
        padding += (read_u8(src)? as usize) << 8;
    }
    if flag & flags::PAD_LOW != 0 {
        padding += read_u8(src)? as usize;
    }

    if padding > src.len() {
        return Err(FrameError::TooMuchPadding(padding, src.len()));
    }
    Ok(padding)
}

/// Split off everything up to the trailing padding, then discard the
/// padding itself.
pub(super) fn read_remainder(src: &mut Bytes, padding: usize) -> Result<Bytes, FrameError> {
    if padding > src.len() {
        return Err(FrameError::TooMuchPadding(padding, src.len()));
    }
    let data = src.split_to(src.len() - padding);
    src.advance(padding);
    Ok(data)
}

/// Flags implied by a padding length on the encode side.
pub(super) fn padding_flags(padding: usize) -> u8 {
    if padding > 0xff {
        flags::PAD_LOW | flags::PAD_HIGH
    } else if padding > 0 {
        flags::PAD_LOW
    } else {
        0
    }
}

/// Total payload length once padding and its length prefix are added.
pub(super) fn padded_len(data_len: usize, padding: usize) -> usize {
    let prefix = if padding > 0xff {
        2
    } else if padding > 0 {
        1
    } else {
        0
    };
    data_len + prefix + padding
}

pub(super) fn encode_padding_length(padding: usize, dst: &mut BytesMut) {
    debug_assert!(padding <= 0xffff);
    if padding > 0xff {
        dst.extend_from_slice(&[(padding >> 8) as u8, padding as u8]);
    } else if padding > 0 {
        dst.extend_from_slice(&[padding as u8]);
    }
}

pub(super) fn put_padding(dst: &mut BytesMut, mut padding: usize) {
    static ZEROS: [u8; 256] = [0; 256];

    while padding > 0 {
        let n = padding.min(ZEROS.len());
        dst.extend_from_slice(&ZEROS[..n]);
        padding -= n;
    }
}

pub(super) fn debug_flags<'a, 'f: 'a>(
    fmt: &'a mut fmt::Formatter<'f>,
    bits: u8,
) -> DebugFlags<'a, 'f> {
    let result = write!(fmt, "({bits:#x}");
    DebugFlags {
        fmt,
        result,
        started: false,
    }
}

pub(super) struct DebugFlags<'a, 'f> {
    fmt: &'a mut fmt::Formatter<'f>,
    result: fmt::Result,
    started: bool,
}

impl<'a, 'f: 'a> DebugFlags<'a, 'f> {
    pub(super) fn flag_if(&mut self, enabled: bool, name: &str) -> &mut Self {
        if enabled {
            self.result = self.result.and_then(|()| {
                let sep = if self.started { " | " } else { ": " };
                write!(self.fmt, "{sep}{name}")
            });
            self.started = true;
        }
        self
    }

    pub(super) fn finish(&mut self) -> fmt::Result {
        self.result.and_then(|()| write!(self.fmt, ")"))
    }
}
