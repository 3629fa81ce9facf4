use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::address::{Address, TCP};
use crate::protocol::error::{MicronetError, Result};
use crate::protocol::{Request, RpcArgs, RpcResult};
use crate::transport::codec::{read_frame, write_frame, JsonCodec};
use crate::transport::{Connection, Connector};

/// Default timeout for establishing a TCP connection (5 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport configuration.
///
/// # Default Configuration
///
/// - `connect_timeout`: 5 seconds
/// - `call_timeout`: none; a call waits for as long as the peer takes
///
/// # Example
///
/// ```rust
/// use micronet_common::TcpConfig;
/// use std::time::Duration;
///
/// let config = TcpConfig::default().with_call_timeout(Duration::from_secs(2));
/// assert_eq!(config.call_timeout, Some(Duration::from_secs(2)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Upper bound for each connect attempt
    pub connect_timeout: Duration,
    /// Upper bound for one request/response exchange, if any
    pub call_timeout: Option<Duration>,
}

impl TcpConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            call_timeout: None,
        }
    }
}

/// Dials [`TcpConnection`]s.
///
/// The address's `host:port` is resolved (it may resolve to several socket
/// addresses, e.g. `localhost`) and each candidate is tried in turn until one
/// accepts.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    config: TcpConfig,
}

impl TcpConnector {
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn dial(&self, address: &Address) -> Result<Arc<dyn Connection>> {
        address.validate()?;
        if address.protocol() != TCP {
            return Err(MicronetError::InvalidAddress(format!(
                "unsupported protocol '{}' in {}",
                address.protocol(),
                address
            )));
        }

        let endpoint = address.endpoint();
        let socket_addrs = tokio::net::lookup_host(endpoint.clone())
            .await
            .map_err(|e| MicronetError::Transport(format!("Invalid address '{}': {}", endpoint, e)))?;

        // Try each resolved address until one succeeds
        let mut last_err = None;
        for socket_addr in socket_addrs {
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(socket_addr)).await {
                Ok(Ok(stream)) => {
                    let _ = stream.set_nodelay(true);
                    tracing::debug!(peer = %socket_addr, "TCP connection established");
                    return Ok(Arc::new(TcpConnection::new(
                        endpoint.clone(),
                        stream,
                        self.config.call_timeout,
                    )));
                }
                Ok(Err(e)) => last_err = Some(e.to_string()),
                Err(_) => {
                    last_err = Some(format!(
                        "timed out after {}ms",
                        self.config.connect_timeout.as_millis()
                    ))
                }
            }
        }

        Err(MicronetError::Transport(format!(
            "Failed to connect to {}: {}",
            endpoint,
            last_err.unwrap_or_else(|| "no address resolved".to_string())
        )))
    }
}

/// One TCP link carrying length-prefixed JSON frames.
///
/// Requests on the same connection are serialized: the stream is held for the
/// whole request/response exchange. A failed or timed-out exchange leaves the
/// stream in an unknown state, so it is dropped and every later call fails
/// with [`MicronetError::Transport`] until the owner dials again.
pub struct TcpConnection {
    peer: String,
    stream: Mutex<Option<TcpStream>>,
    call_timeout: Option<Duration>,
}

impl TcpConnection {
    pub fn new(peer: impl Into<String>, stream: TcpStream, call_timeout: Option<Duration>) -> Self {
        Self {
            peer: peer.into(),
            stream: Mutex::new(Some(stream)),
            call_timeout,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    async fn exchange(stream: &mut TcpStream, request: &Request) -> Result<RpcResult> {
        let encoded = JsonCodec::encode_request(request)?;
        write_frame(stream, &encoded)
            .await
            .map_err(|e| map_io_error(e, "writing request"))?;

        let data = read_frame(stream)
            .await?
            .ok_or_else(|| MicronetError::Transport("Connection lost: peer closed the stream".to_string()))?;
        let response = JsonCodec::decode_response(&data)?;

        if response.id != request.id {
            return Err(MicronetError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        response.into_result()
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn call(&self, method: &str, args: RpcArgs) -> Result<RpcResult> {
        let request = Request::new(method, args);
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| MicronetError::Transport(format!("connection to {} is shut down", self.peer)))?;

        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, Self::exchange(stream, &request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(MicronetError::Timeout(limit.as_millis() as u64)),
            },
            None => Self::exchange(stream, &request).await,
        };

        if let Err(e) = &outcome {
            if e.is_connection_failure() || matches!(e, MicronetError::InvalidResponse(_)) {
                tracing::debug!(peer = %self.peer, error = %e, "Dropping broken TCP stream");
                *guard = None;
            }
        }

        outcome
    }

    async fn close(&self) -> Result<()> {
        let stream = self.stream.lock().await.take();
        match stream {
            Some(mut stream) => {
                // The peer may already be gone; the stream is released either way
                let _ = stream.shutdown().await;
                Ok(())
            }
            None => Err(MicronetError::Transport(format!(
                "connection to {} is already shut down",
                self.peer
            ))),
        }
    }
}

/// Map IO errors to appropriate MicronetError variants
fn map_io_error(err: std::io::Error, context: &str) -> MicronetError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            MicronetError::Transport(format!("{}: timed out", context))
        }
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected => {
            MicronetError::Transport(format!("{}: Connection lost", context))
        }
        _ => MicronetError::Transport(format!("{}: {}", context, err)),
    }
}
