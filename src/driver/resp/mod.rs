//! RESP driver for the routing core.
//!
//! A minimal connection to a Redis-protocol server: enough to open, PING,
//! SELECT and run raw commands. Typed command helpers are left to callers.
//!
//! ```text
//! ShardedDriver
//!   └── RespConnector (Connector)
//!         └── RespClient (Connection: timeouts + broken flag)
//!               └── RespConnection (TCP + framing)
//!                     └── RespCodec (from the resp module)
//! ```

pub mod client;
pub mod connection;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{RespClient, RespConnector, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT};
pub use connection::{RespConnection, RespConnectionState};

// Re-export protocol types for convenience
pub use crate::resp::{RespCommand, RespError, RespValue};

/// Default server port
pub const DEFAULT_PORT: u16 = 6379;

