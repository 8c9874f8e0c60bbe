//! RESP codec for tokio_util.
//!
//! Requests are always encoded as arrays of bulk strings. Replies are decoded
//! incrementally: nothing is consumed from the buffer until a complete value
//! is available.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::{RespError, RespResult};
use super::value::{RespCommand, RespValue};

/// Default maximum reply size (512MB, the server's own bulk limit)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting accepted from a server
const MAX_DEPTH: usize = 32;

const CRLF: &[u8] = b"\r\n";

/// RESP codec.
#[derive(Debug)]
pub struct RespCodec {
    /// Maximum reply size
    max_message_size: usize,
}

impl RespCodec {
    /// Create a codec with default settings.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Create a codec with custom max reply size.
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    fn parse(&self, buf: &[u8], pos: usize, depth: usize) -> RespResult<Option<(RespValue, usize)>> {
        if depth > MAX_DEPTH {
            return Err(RespError::Protocol(format!("Array nesting deeper than {}", MAX_DEPTH)));
        }
        if pos >= buf.len() {
            return Ok(None);
        }

        let (line, next) = match read_line(buf, pos + 1) {
            Some(found) => found,
            None => return Ok(None),
        };

        match buf[pos] {
            b'+' => Ok(Some((
                RespValue::SimpleString(String::from_utf8_lossy(line).into_owned()),
                next,
            ))),
            b'-' => Ok(Some((
                RespValue::Error(String::from_utf8_lossy(line).into_owned()),
                next,
            ))),
            b':' => Ok(Some((RespValue::Integer(parse_int(line)?), next))),
            b'$' => {
                let len = parse_int(line)?;
                if len < 0 {
                    return Ok(Some((RespValue::Null, next)));
                }
                let len = len as usize;
                if len > self.max_message_size {
                    return Err(RespError::MessageTooLarge {
                        size: len,
                        max: self.max_message_size,
                    });
                }
                let end = next + len;
                if buf.len() < end + CRLF.len() {
                    return Ok(None);
                }
                if &buf[end..end + CRLF.len()] != CRLF {
                    return Err(RespError::Protocol("Bulk string not terminated by CRLF".into()));
                }
                Ok(Some((
                    RespValue::BulkString(Bytes::copy_from_slice(&buf[next..end])),
                    end + CRLF.len(),
                )))
            }
            b'*' => {
                let count = parse_int(line)?;
                if count < 0 {
                    return Ok(Some((RespValue::Null, next)));
                }
                let mut items = Vec::with_capacity((count as usize).min(1024));
                let mut cursor = next;
                for _ in 0..count {
                    match self.parse(buf, cursor, depth + 1)? {
                        Some((item, after)) => {
                            items.push(item);
                            cursor = after;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((RespValue::Array(items), cursor)))
            }
            other => Err(RespError::Protocol(format!(
                "Unknown reply type byte: 0x{:02X}",
                other
            ))),
        }
    }
}

impl Default for RespCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn read_line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    if start > buf.len() {
        return None;
    }
    buf[start..]
        .windows(CRLF.len())
        .position(|w| w == CRLF)
        .map(|offset| (&buf[start..start + offset], start + offset + CRLF.len()))
}

fn parse_int(line: &[u8]) -> RespResult<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            RespError::Protocol(format!(
                "Invalid integer: {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

impl Decoder for RespCodec {
    type Item = RespValue;
    type Error = RespError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.parse(&src[..], 0, 0)? {
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            None => {
                if src.len() > self.max_message_size {
                    return Err(RespError::MessageTooLarge {
                        size: src.len(),
                        max: self.max_message_size,
                    });
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<RespCommand> for RespCodec {
    type Error = RespError;

    fn encode(&mut self, item: RespCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let args = item.args();
        dst.put_u8(b'*');
        dst.put_slice(args.len().to_string().as_bytes());
        dst.put_slice(CRLF);

        for arg in args {
            dst.put_u8(b'$');
            dst.put_slice(arg.len().to_string().as_bytes());
            dst.put_slice(CRLF);
            dst.put_slice(arg);
            dst.put_slice(CRLF);
        }

        Ok(())
    }
}
