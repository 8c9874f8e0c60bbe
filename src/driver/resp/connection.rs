//! RESP connection for client-side use.
//!
//! Handles the TCP stream and request/reply framing.

use std::fmt;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};

use crate::resp::{RespCodec, RespCommand, RespError, RespResult, RespValue};

/// RESP connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespConnectionState {
    /// TCP connected, ready for commands
    Ready,
    /// An I/O or framing error left the stream unusable
    Failed,
    /// Closed locally or by the server
    Closed,
}

/// Client-side RESP connection.
///
/// One request is in flight at a time; replies are read in order.
pub struct RespConnection {
    /// TCP stream
    stream: TcpStream,
    /// Codec (encodes commands, decodes replies)
    codec: RespCodec,
    /// Read buffer
    read_buffer: BytesMut,
    /// Write buffer
    write_buffer: BytesMut,
    /// Connection state
    state: RespConnectionState,
    /// Server address
    address: String,
}

impl RespConnection {
    /// Connect to a server.
    pub async fn connect(address: &str) -> RespResult<Self> {
        let stream = TcpStream::connect(address).await?;

        // Lower latency for small request/reply exchanges
        stream.set_nodelay(true).ok();

        Ok(Self {
            stream,
            codec: RespCodec::new(),
            read_buffer: BytesMut::with_capacity(8192),
            write_buffer: BytesMut::with_capacity(1024),
            state: RespConnectionState::Ready,
            address: address.to_string(),
        })
    }

    /// Send a command.
    pub async fn send(&mut self, command: RespCommand) -> RespResult<()> {
        self.ensure_ready()?;

        self.write_buffer.clear();
        self.codec.encode(command, &mut self.write_buffer)?;

        if let Err(e) = self.stream.write_all(&self.write_buffer).await {
            return Err(self.fail(e.into()));
        }
        if let Err(e) = self.stream.flush().await {
            return Err(self.fail(e.into()));
        }

        Ok(())
    }

    /// Receive one reply.
    ///
    /// Server error replies (`-ERR ...`) are returned as [`RespValue::Error`],
    /// not as `Err`; the stream stays usable.
    pub async fn recv(&mut self) -> RespResult<RespValue> {
        self.ensure_ready()?;

        loop {
            match self.codec.decode(&mut self.read_buffer) {
                Ok(Some(reply)) => return Ok(reply),
                Ok(None) => {}
                Err(e) => return Err(self.fail(e)),
            }

            let n = match self.stream.read_buf(&mut self.read_buffer).await {
                Ok(n) => n,
                Err(e) => return Err(self.fail(e.into())),
            };

            if n == 0 {
                self.state = RespConnectionState::Closed;
                return Err(RespError::ConnectionClosed);
            }
        }
    }

    /// Send a command and receive its reply.
    pub async fn request(&mut self, command: RespCommand) -> RespResult<RespValue> {
        self.send(command).await?;
        self.recv().await
    }

    /// Mark the stream unusable, e.g. after a reply was abandoned mid-read.
    pub fn mark_failed(&mut self) {
        if self.state == RespConnectionState::Ready {
            self.state = RespConnectionState::Failed;
        }
    }

    /// Close the connection, sending QUIT if the stream is still healthy.
    ///
    /// The QUIT reply is not awaited.
    pub async fn close(&mut self) -> RespResult<()> {
        if self.state == RespConnectionState::Ready {
            let _ = self.send(RespCommand::new("QUIT")).await;
        }

        self.state = RespConnectionState::Closed;
        self.stream.shutdown().await?;

        Ok(())
    }

    /// Get the connection state.
    pub fn state(&self) -> RespConnectionState {
        self.state
    }

    /// Get the server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Check if the connection can carry commands.
    pub fn is_ready(&self) -> bool {
        self.state == RespConnectionState::Ready
    }

    fn ensure_ready(&self) -> RespResult<()> {
        match self.state {
            RespConnectionState::Ready => Ok(()),
            RespConnectionState::Closed => Err(RespError::ConnectionClosed),
            RespConnectionState::Failed => Err(RespError::Protocol(
                "Connection is in failed state".to_string(),
            )),
        }
    }

    fn fail(&mut self, err: RespError) -> RespError {
        self.state = RespConnectionState::Failed;
        err
    }
}

impl fmt::Debug for RespConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RespConnection")
            .field("address", &self.address)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::resp::testing::serve;

    #[tokio::test]
    async fn test_request_reply() {
        let addr = serve(vec![b"+PONG\r\n", b"$3\r\nbar\r\n"]).await;
        let mut conn = RespConnection::connect(&addr).await.unwrap();
        assert!(conn.is_ready());
        assert_eq!(conn.address(), addr);

        let reply = conn.request(RespCommand::new("PING")).await.unwrap();
        assert_eq!(reply.as_str(), Some("PONG"));

        let reply = conn.request(RespCommand::new("GET").arg("foo")).await.unwrap();
        assert_eq!(reply.as_bytes().map(|b| b.to_vec()), Some(b"bar".to_vec()));
    }

    #[tokio::test]
    async fn test_server_error_keeps_connection_ready() {
        let addr = serve(vec![b"-ERR unknown command\r\n"]).await;
        let mut conn = RespConnection::connect(&addr).await.unwrap();

        let reply = conn.request(RespCommand::new("NOPE")).await.unwrap();
        assert!(reply.is_error());
        assert!(conn.is_ready());
    }

    #[tokio::test]
    async fn test_closed_by_server() {
        let addr = serve(vec![]).await;
        let mut conn = RespConnection::connect(&addr).await.unwrap();

        let result = conn.request(RespCommand::new("PING")).await;
        assert!(result.is_err());
        assert!(!conn.is_ready());
        assert!(conn.send(RespCommand::new("PING")).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_connection() {
        let addr = serve(vec![b"?garbage\r\n"]).await;
        let mut conn = RespConnection::connect(&addr).await.unwrap();

        let result = conn.request(RespCommand::new("PING")).await;
        assert!(matches!(result, Err(RespError::Protocol(_))));
        assert_eq!(conn.state(), RespConnectionState::Failed);
    }

    #[test]
    fn test_connection_state() {
        assert_ne!(RespConnectionState::Ready, RespConnectionState::Failed);
    }
}
