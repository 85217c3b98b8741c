use std::{error, fmt};

use crate::frame::{FrameError, Reason};

/// Severity of a protocol fault, deciding how the connection reacts:
/// RST_STREAM for stream-level faults, GOAWAY for connection-level ones,
/// and a log line for recoverable conditions.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorLevel {
    Connection,
    Stream,
    Recoverable,
}

/// A protocol operation error: error code, severity and a description.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OperationError {
    code: Reason,
    level: ErrorLevel,
    message: String,
}

impl OperationError {
    pub fn new(code: Reason, level: ErrorLevel, message: impl Into<String>) -> Self {
        OperationError {
            code,
            level,
            message: message.into(),
        }
    }

    /// Connection-level PROTOCOL_ERROR.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(Reason::PROTOCOL_ERROR, ErrorLevel::Connection, message)
    }

    /// Connection-level INTERNAL_ERROR.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Reason::INTERNAL_ERROR, ErrorLevel::Connection, message)
    }

    /// Connection-level FLOW_CONTROL_ERROR.
    pub fn flow(message: impl Into<String>) -> Self {
        Self::new(Reason::FLOW_CONTROL_ERROR, ErrorLevel::Connection, message)
    }

    pub fn stream(code: Reason, message: impl Into<String>) -> Self {
        Self::new(code, ErrorLevel::Stream, message)
    }

    pub fn recoverable(code: Reason, message: impl Into<String>) -> Self {
        Self::new(code, ErrorLevel::Recoverable, message)
    }

    pub fn code(&self) -> Reason {
        self.code
    }

    pub fn level(&self) -> ErrorLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_recoverable(&self) -> bool {
        self.level == ErrorLevel::Recoverable
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorLevel::Connection => "connection",
            ErrorLevel::Stream => "stream",
            ErrorLevel::Recoverable => "recoverable",
        })
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({}-level): {}", self.code, self.level, self.message)
    }
}

impl error::Error for OperationError {}

impl From<FrameError> for OperationError {
    fn from(src: FrameError) -> Self {
        OperationError::new(src.reason(), ErrorLevel::Connection, src.to_string())
    }
}
