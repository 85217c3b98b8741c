use std::{error::Error, fmt};

/// Errors caused by sending a message
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EncoderError {
    /// Frame payload does not fit the 14-bit length field
    MaxSizeExceeded,
}

impl fmt::Display for EncoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderError::MaxSizeExceeded => f.write_str("frame payload size limit exceeded"),
        }
    }
}

impl Error for EncoderError {}
