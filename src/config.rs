use crate::consts;
use crate::frame::{Settings, WindowSize};

/// Connection configuration.
#[derive(Debug, Copy, Clone)]
pub struct Config {
    /// Initial window size for received stream data
    pub(crate) window_sz: WindowSize,
    /// Window size for received connection data
    pub(crate) connection_window_sz: WindowSize,
    /// Largest DATA payload handed to the sink in one frame
    pub(crate) max_frame_payload: usize,
    /// Whether the peer may reserve streams with PUSH_PROMISE
    pub(crate) enable_push: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Config {
            window_sz: consts::DEFAULT_INITIAL_WINDOW_SIZE,
            connection_window_sz: consts::DEFAULT_CONNECTION_WINDOW_SIZE,
            max_frame_payload: consts::MAX_FRAME_PAYLOAD,
            enable_push: true,
        }
    }

    /// Indicates the initial window size (in octets) for stream-level
    /// flow control for received data.
    ///
    /// The default value is 65,535.
    pub fn initial_window_size(mut self, size: WindowSize) -> Self {
        assert!(size <= consts::MAX_WINDOW_SIZE);
        self.window_sz = size;
        self
    }

    /// Indicates the initial window size (in octets) for connection-level
    /// flow control for received data.
    ///
    /// The default value is 65,535.
    pub fn initial_connection_window_size(mut self, size: WindowSize) -> Self {
        assert!(size <= consts::MAX_WINDOW_SIZE);
        self.connection_window_sz = size;
        self
    }

    /// Largest DATA payload prepared for the sink in one frame. Larger
    /// submissions are split. Values are capped at the wire limit of
    /// 16,383 octets, which is also the default.
    pub fn max_frame_payload(mut self, max: usize) -> Self {
        self.max_frame_payload = max.min(consts::MAX_FRAME_PAYLOAD);
        self
    }

    /// Permit (or forbid) the peer to reserve streams with PUSH_PROMISE.
    ///
    /// Enabled by default.
    pub fn enable_push(mut self, enable: bool) -> Self {
        self.enable_push = enable;
        self
    }

    /// The SETTINGS frame advertising this configuration.
    pub(crate) fn to_settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.set_initial_window_size(Some(self.window_sz));
        settings.set_enable_push(self.enable_push);
        settings
    }
}
