//! Interface seam to an external HPACK implementation.
//!
//! The framing layer never interprets header-block octets itself; it hands
//! bounded fragments to a [`HeaderDecoder`] and forwards whatever fields
//! come back. Compression state (tables, Huffman) lives entirely behind
//! the trait.

use ntex_bytes::{Buf, ByteString, Bytes};

use crate::frame::FrameError;

/// A single decoded header field.
///
/// `values` holds all values for the name, NUL-separated. `never_delta`
/// marks fields that must not enter a compression table.
#[derive(Clone, Eq, PartialEq)]
pub struct HeaderField {
    pub name: ByteString,
    pub values: ByteString,
    pub never_delta: bool,
}

impl HeaderField {
    pub fn new(name: ByteString, values: ByteString) -> Self {
        HeaderField {
            name,
            values,
            never_delta: false,
        }
    }

    /// Iterate the NUL-separated values.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.split('\0')
    }
}

impl std::fmt::Debug for HeaderField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.name, &*self.values)?;
        if self.never_delta {
            write!(f, " (never delta)")?;
        }
        Ok(())
    }
}

/// Decodes header-block fragments into header fields.
///
/// `decode_fragment` receives a reader bounded to exactly the fragment
/// region of one frame and must consume it fully. `header_block_complete`
/// is called when a block's END_HEADERS flag is seen and may flush fields
/// buffered across CONTINUATION frames.
pub trait HeaderDecoder {
    fn decode_fragment(&mut self, fragment: &mut Bytes) -> Result<Vec<HeaderField>, FrameError>;

    fn header_block_complete(&mut self) -> Result<Vec<HeaderField>, FrameError>;
}

/// A decoder that treats header blocks as opaque: fragments are consumed
/// and no fields are produced. Useful when only the framing layer is
/// exercised.
#[derive(Debug, Default)]
pub struct OpaqueDecoder;

impl HeaderDecoder for OpaqueDecoder {
    fn decode_fragment(&mut self, fragment: &mut Bytes) -> Result<Vec<HeaderField>, FrameError> {
        fragment.advance(fragment.len());
        Ok(Vec::new())
    }

    fn header_block_complete(&mut self) -> Result<Vec<HeaderField>, FrameError> {
        Ok(Vec::new())
    }
}

/// Run the delegate over one fragment, enforcing full consumption of the
/// bounded region; on END_HEADERS the block-complete fields are appended.
pub(crate) fn decode_block(
    decoder: &mut dyn HeaderDecoder,
    fragment: &Bytes,
    end_headers: bool,
) -> Result<Vec<HeaderField>, FrameError> {
    let mut region = fragment.clone();
    let mut fields = decoder.decode_fragment(&mut region)?;
    if !region.is_empty() {
        return Err(FrameError::HeaderDecoderLeftover(region.len()));
    }
    if end_headers {
        fields.extend(decoder.header_block_complete()?);
    }
    Ok(fields)
}
