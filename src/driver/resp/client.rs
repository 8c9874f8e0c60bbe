//! RESP client used as the driver connection.
//!
//! Wraps [`RespConnection`] with an endpoint, a response timeout and the
//! broken flag the pool reads on release.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::resp::{RespCommand, RespValue};

use super::super::connection::{Connection, Connector};
use super::super::driver::Endpoint;
use super::super::error::{ShardError, ShardResult};
use super::connection::RespConnection;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default response timeout
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// RESP client.
///
/// A server error reply is returned as [`ShardError::Server`] and leaves the
/// client usable. I/O failures, malformed replies and response timeouts mark
/// it broken.
pub struct RespClient {
    connection: RespConnection,
    endpoint: Endpoint,
    response_timeout: Option<Duration>,
    broken: bool,
}

impl RespClient {
    /// Connect to an endpoint.
    pub async fn connect(
        endpoint: &Endpoint,
        connect_timeout: Duration,
        response_timeout: Option<Duration>,
    ) -> ShardResult<Self> {
        let address = endpoint.to_socket_addr();

        let connection = tokio::time::timeout(connect_timeout, RespConnection::connect(&address))
            .await
            .map_err(|_| {
                ShardError::timeout(format!(
                    "Connect to {} timed out after {:?}",
                    endpoint, connect_timeout
                ))
            })?
            .map_err(|e| ShardError::connection(format!("Failed to connect to {}: {}", endpoint, e)))?;

        Ok(Self {
            connection,
            endpoint: endpoint.clone(),
            response_timeout,
            broken: false,
        })
    }

    /// Run a command with the default response timeout.
    pub async fn command(&mut self, command: RespCommand) -> ShardResult<RespValue> {
        self.command_with_timeout(command, self.response_timeout).await
    }

    /// Run a command with an explicit response timeout.
    ///
    /// `None` waits indefinitely, for blocking commands such as `BLPOP 0`.
    pub async fn command_with_timeout(
        &mut self,
        command: RespCommand,
        timeout: Option<Duration>,
    ) -> ShardResult<RespValue> {
        if self.broken {
            return Err(ShardError::connection(format!(
                "Connection to {} is broken",
                self.endpoint
            )));
        }

        let name = String::from_utf8_lossy(command.name()).into_owned();
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.connection.request(command)).await {
                Ok(result) => result,
                Err(_) => {
                    // reply may still arrive; the stream is out of sync
                    self.broken = true;
                    self.connection.mark_failed();
                    return Err(ShardError::timeout(format!(
                        "{} on {} got no reply within {:?}",
                        name, self.endpoint, limit
                    )));
                }
            },
            None => self.connection.request(command).await,
        };

        match result {
            Ok(RespValue::Error(message)) => Err(ShardError::server(message)),
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.broken = true;
                Err(e.into())
            }
        }
    }

    /// Select a logical database.
    pub async fn select(&mut self, database: u32) -> ShardResult<()> {
        let reply = self
            .command(RespCommand::new("SELECT").arg_int(i64::from(database)))
            .await?;
        match reply.as_str() {
            Some("OK") => Ok(()),
            _ => Err(ShardError::protocol(format!(
                "Unexpected SELECT reply: {:?}",
                reply
            ))),
        }
    }

    /// Default response timeout
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }
}

#[async_trait]
impl Connection for RespClient {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn ping(&mut self) -> ShardResult<String> {
        let reply = self.command(RespCommand::new("PING")).await?;
        reply
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ShardError::protocol(format!("Unexpected PING reply: {:?}", reply)))
    }

    fn is_broken(&self) -> bool {
        self.broken
    }

    async fn disconnect(&mut self) -> ShardResult<()> {
        self.connection.close().await.map_err(Into::into)
    }
}

impl fmt::Debug for RespClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RespClient")
            .field("endpoint", &self.endpoint)
            .field("broken", &self.broken)
            .finish()
    }
}

// ============================================================================
// RespConnector
// ============================================================================

/// Opens [`RespClient`] connections.
///
/// Selects the endpoint's database after connecting when one other than 0
/// is configured.
#[derive(Debug, Clone)]
pub struct RespConnector {
    connect_timeout: Duration,
    response_timeout: Option<Duration>,
}

impl RespConnector {
    /// Create a connector with default timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default response timeout (`None` waits indefinitely).
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for RespConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
        }
    }
}

#[async_trait]
impl Connector for RespConnector {
    type Connection = RespClient;

    async fn open(&self, endpoint: &Endpoint) -> ShardResult<RespClient> {
        let mut client =
            RespClient::connect(endpoint, self.connect_timeout, self.response_timeout).await?;

        if let Some(database) = endpoint.database.filter(|db| *db != 0) {
            if let Err(e) = client.select(database).await {
                let _ = client.disconnect().await;
                return Err(e);
            }
        }

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::resp::testing::{serve, serve_silent};

    async fn client_for(addr: &str) -> RespClient {
        let endpoint = Endpoint::from_uri(addr).unwrap();
        RespConnector::new().open(&endpoint).await.unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let addr = serve(vec![b"+PONG\r\n"]).await;
        let mut client = client_for(&addr).await;

        assert_eq!(client.ping().await.unwrap(), "PONG");
        assert!(!client.is_broken());
        assert_eq!(client.endpoint().to_socket_addr(), addr);
    }

    #[tokio::test]
    async fn test_server_error_is_not_broken() {
        let addr = serve(vec![b"-WRONGTYPE Operation against a key\r\n", b":1\r\n"]).await;
        let mut client = client_for(&addr).await;

        let err = client
            .command(RespCommand::new("INCR").arg("k"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShardError::Server(_)));
        assert!(!client.is_broken());

        let reply = client.command(RespCommand::new("EXISTS").arg("k")).await.unwrap();
        assert_eq!(reply.as_i64(), Some(1));
    }

    #[tokio::test]
    async fn test_response_timeout_marks_broken() {
        let addr = serve_silent().await;
        let mut client = client_for(&addr).await;

        let err = client
            .command_with_timeout(RespCommand::new("BLPOP").arg("q").arg_int(0), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, ShardError::Timeout(_)));
        assert!(client.is_broken());

        // broken clients refuse further commands
        assert!(matches!(
            client.command(RespCommand::new("PING")).await,
            Err(ShardError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_connection_marks_broken() {
        let addr = serve(vec![]).await;
        let mut client = client_for(&addr).await;

        assert!(client.ping().await.is_err());
        assert!(client.is_broken());
    }

    #[tokio::test]
    async fn test_connector_selects_database() {
        let addr = serve(vec![b"+OK\r\n", b"+PONG\r\n"]).await;
        let endpoint = Endpoint::from_uri(&format!("redis://{}/3", addr)).unwrap();

        let mut client = RespConnector::new().open(&endpoint).await.unwrap();
        assert_eq!(client.ping().await.unwrap(), "PONG");
    }

    #[tokio::test]
    async fn test_connector_select_failure() {
        let addr = serve(vec![b"-ERR DB index is out of range\r\n"]).await;
        let endpoint = Endpoint::from_uri(&format!("redis://{}/99", addr)).unwrap();

        let err = RespConnector::new().open(&endpoint).await.unwrap_err();
        assert!(matches!(err, ShardError::Server(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Endpoint::new(addr.ip().to_string(), addr.port());
        let err = RespConnector::new()
            .with_connect_timeout(Duration::from_millis(500))
            .open(&endpoint)
            .await
            .unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[test]
    fn test_connector_defaults() {
        let connector = RespConnector::default().with_response_timeout(None);
        assert_eq!(connector.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert!(connector.response_timeout.is_none());
    }
}
