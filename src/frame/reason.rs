use std::fmt;

/// A protocol error code, carried by RST_STREAM and GOAWAY frames.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Reason(u32);

impl Reason {
    pub const NO_ERROR: Reason = Reason(0x00);
    pub const PROTOCOL_ERROR: Reason = Reason(0x01);
    pub const INTERNAL_ERROR: Reason = Reason(0x02);
    pub const FLOW_CONTROL_ERROR: Reason = Reason(0x03);
    pub const SETTINGS_TIMEOUT: Reason = Reason(0x04);
    pub const STREAM_CLOSED: Reason = Reason(0x05);
    pub const FRAME_SIZE_ERROR: Reason = Reason(0x06);
    pub const REFUSED_STREAM: Reason = Reason(0x07);
    pub const CANCEL: Reason = Reason(0x08);
    pub const COMPRESSION_ERROR: Reason = Reason(0x09);
    pub const CONNECT_ERROR: Reason = Reason(0x10);
    pub const ENHANCE_YOUR_CALM: Reason = Reason(0x11);
    pub const INADEQUATE_SECURITY: Reason = Reason(0x12);

    /// Get a string description of the error code.
    pub fn description(&self) -> &str {
        match self.0 {
            0x00 => "not a result of an error",
            0x01 => "unspecific protocol error detected",
            0x02 => "unexpected internal error encountered",
            0x03 => "flow-control protocol violated",
            0x04 => "settings ACK not received in timely manner",
            0x05 => "received frame when stream half-closed",
            0x06 => "frame with invalid size",
            0x07 => "refused stream before processing any application logic",
            0x08 => "stream no longer needed",
            0x09 => "unable to maintain the header compression context",
            0x10 => "unable to establish a connection for a CONNECT request",
            0x11 => "peer exhibiting a behavior causing excessive load",
            0x12 => "transport properties do not meet minimum requirements",
            _ => "unknown error code",
        }
    }
}

impl From<u32> for Reason {
    fn from(src: u32) -> Reason {
        Reason(src)
    }
}

impl From<Reason> for u32 {
    fn from(src: Reason) -> u32 {
        src.0
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            0x00 => "NO_ERROR",
            0x01 => "PROTOCOL_ERROR",
            0x02 => "INTERNAL_ERROR",
            0x03 => "FLOW_CONTROL_ERROR",
            0x04 => "SETTINGS_TIMEOUT",
            0x05 => "STREAM_CLOSED",
            0x06 => "FRAME_SIZE_ERROR",
            0x07 => "REFUSED_STREAM",
            0x08 => "CANCEL",
            0x09 => "COMPRESSION_ERROR",
            0x10 => "CONNECT_ERROR",
            0x11 => "ENHANCE_YOUR_CALM",
            0x12 => "INADEQUATE_SECURITY",
            other => return f.debug_tuple("Reason").field(&format_args!("{other:#x}")).finish(),
        };
        f.write_str(name)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
