use crate::frame::WindowSize;

// Constants
pub const MAX_WINDOW_SIZE: WindowSize = (1 << 31) - 1;
pub const DEFAULT_INITIAL_WINDOW_SIZE: WindowSize = 65_535;
pub const DEFAULT_CONNECTION_WINDOW_SIZE: WindowSize = 65_535;

/// Largest payload expressible in the 14-bit length field.
pub const MAX_FRAME_PAYLOAD: usize = 0x3fff;
