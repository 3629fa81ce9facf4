use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::protocol::error::{MicronetError, Result};
use crate::protocol::{Request, Response};
use crate::transport::codec::{read_frame, write_frame, JsonCodec};

/// Async TCP server speaking the micronet frame format.
///
/// Accepts connections until the shutdown signal flips to `true`, spawning one
/// task per connection. Each connection processes requests one after another
/// (keep-alive) until the peer closes it or shutdown is signalled.
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Creates a new TCP server bound to the specified address.
    ///
    /// # Arguments
    /// * `bind_addr` - The address to bind to (e.g., "127.0.0.1:1234")
    pub async fn bind(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| MicronetError::Server(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        Ok(Self { listener })
    }

    /// Gets the actual bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| MicronetError::Server(format!("Failed to get local addr: {}", e)))
    }

    /// Runs the accept loop until `shutdown` becomes `true`.
    ///
    /// Accept errors are logged and the loop keeps going. Open connections
    /// observe the same signal and are closed when it fires.
    pub async fn run_until<F, Fut>(self, handler: F, mut shutdown: watch::Receiver<bool>) -> Result<()>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        let handler = Arc::new(handler);

        loop {
            if *shutdown.borrow_and_update() {
                return Ok(());
            }

            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "Error accepting connection");
                            continue;
                        }
                    };

                    tracing::debug!(peer = %peer_addr, "Connection established");

                    let handler = handler.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handler, shutdown).await {
                            tracing::error!(peer = %peer_addr, error = %e, "Connection error");
                        }
                    });
                }
                changed = shutdown.changed() => {
                    // A dropped sender means nobody can stop us any more; treat it as stop
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Handle a single TCP connection
///
/// Processes multiple requests until the connection is closed or shutdown is
/// signalled.
async fn handle_connection<F, Fut>(
    mut stream: TcpStream,
    handler: Arc<F>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    loop {
        if *shutdown.borrow_and_update() {
            return Ok(());
        }

        let frame = tokio::select! {
            frame = read_frame(&mut stream) => frame?,
            _ = shutdown.changed() => return Ok(()),
        };

        let Some(buf) = frame else {
            tracing::debug!("Connection closed by peer");
            return Ok(());
        };

        let request = match JsonCodec::decode_request(&buf) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode request");
                send_response(&mut stream, &Response::error(0, e.to_string())).await?;
                continue;
            }
        };

        let request_id = request.id;
        let response = tokio::select! {
            outcome = handler(request) => match outcome {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::debug!(error = %e, "Handler error");
                    Response::error(request_id, e.to_string())
                }
            },
            _ = shutdown.changed() => return Ok(()),
        };

        send_response(&mut stream, &response).await?;
    }
}

async fn send_response(stream: &mut TcpStream, response: &Response) -> Result<()> {
    let encoded = JsonCodec::encode_response(response)?;
    write_frame(stream, &encoded)
        .await
        .map_err(|e| MicronetError::Transport(format!("Failed to send response: {}", e)))
}
