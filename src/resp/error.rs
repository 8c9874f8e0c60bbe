//! RESP protocol error types.

use std::fmt;
use std::io;

/// Result type for RESP operations.
pub type RespResult<T> = Result<T, RespError>;

/// RESP protocol errors.
#[derive(Debug)]
pub enum RespError {
    /// I/O error
    Io(io::Error),

    /// Protocol error (unknown type byte, malformed length, etc.)
    Protocol(String),

    /// Frame exceeds the configured limit
    MessageTooLarge { size: usize, max: usize },

    /// Peer closed the stream
    ConnectionClosed,
}

impl fmt::Display for RespError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespError::Io(e) => write!(f, "I/O error: {}", e),
            RespError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            RespError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max: {})", size, max)
            }
            RespError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for RespError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RespError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RespError {
    fn from(err: io::Error) -> Self {
        RespError::Io(err)
    }
}
