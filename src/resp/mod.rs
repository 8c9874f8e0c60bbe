//! # RESP Protocol Implementation
//!
//! Low-level framing for the Redis serialization protocol (RESP2), used by
//! the bundled [`crate::driver::resp`] connection.
//!
//! ## Submodules
//!
//! - [`value`] - Reply values and command builder
//! - [`codec`] - Tokio codec for async I/O
//! - [`error`] - Protocol error types
//!
//! ## Note
//!
//! The routing core never looks at RESP. Most users should go through
//! [`crate::driver`] and treat connections as opaque.

pub mod codec;
pub mod error;
pub mod value;

pub use codec::{RespCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use error::{RespError, RespResult};
pub use value::{RespCommand, RespValue};
