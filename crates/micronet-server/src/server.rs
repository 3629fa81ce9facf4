use micronet_common::transport::TcpServer;
use micronet_common::{Address, MicronetError, Request, Response, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::handler::Handler;
use crate::ping::PingHandler;

/// Lifecycle of a [`Server`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, not started yet
    Idle,
    /// Accepting connections on the bound socket address
    Listening(SocketAddr),
    /// Could not bind, or the address is unusable
    Failed(String),
    Stopped,
}

struct ServerInner {
    address: Address,
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
    state: watch::Sender<ServerState>,
}

/// TCP server dispatching `Handler.Method` calls to registered handlers.
///
/// Clones share the same handlers and lifecycle, so one clone can run
/// [`start`](Server::start) on a background task while another registers
/// handlers, waits for readiness, or stops it.
///
/// A server runs once: after [`stop`](Server::stop) it cannot be started again.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// Creates a server for `address` with [`PingHandler`] registered.
    pub fn new(address: Address) -> Self {
        let ping: Arc<dyn Handler> = Arc::new(PingHandler);
        let mut handlers = HashMap::new();
        handlers.insert(ping.name().to_string(), ping);

        let (shutdown, _) = watch::channel(false);
        let (state, _) = watch::channel(ServerState::Idle);

        Self {
            inner: Arc::new(ServerInner {
                address,
                handlers: RwLock::new(handlers),
                started: AtomicBool::new(false),
                shutdown,
                state,
            }),
        }
    }

    pub fn address(&self) -> &Address {
        &self.inner.address
    }

    pub fn state(&self) -> ServerState {
        self.inner.state.borrow().clone()
    }

    /// Names of the registered handlers, sorted.
    pub async fn handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.handlers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registers `handler` under its name.
    ///
    /// Handlers can be added while the server is running.
    ///
    /// # Errors
    ///
    /// [`MicronetError::HandlerAlreadyRegistered`] if the name is taken.
    pub async fn register(&self, handler: Arc<dyn Handler>) -> Result<()> {
        let name = handler.name().to_string();
        let mut handlers = self.inner.handlers.write().await;
        if handlers.contains_key(&name) {
            return Err(MicronetError::HandlerAlreadyRegistered(name));
        }

        tracing::debug!(address = %self.inner.address, handler = %name, "Handler registered");
        handlers.insert(name, handler);
        Ok(())
    }

    /// Binds the server's address and serves connections until [`stop`](Server::stop).
    ///
    /// # Errors
    ///
    /// - [`MicronetError::InvalidAddress`] if the address is incomplete
    /// - [`MicronetError::Server`] if the server was already started or stopped,
    ///   or the address cannot be bound
    pub async fn start(&self) -> Result<()> {
        if let Err(e) = self.inner.address.validate() {
            self.inner.state.send_replace(ServerState::Failed(e.to_string()));
            return Err(e);
        }

        if self.inner.started.swap(true, Ordering::SeqCst) || *self.inner.shutdown.borrow() {
            return Err(MicronetError::Server(format!(
                "server {} cannot be started from state {:?}",
                self.inner.address,
                self.state()
            )));
        }

        let endpoint = self.inner.address.endpoint();
        let listener = match TcpServer::bind(&endpoint).await {
            Ok(listener) => listener,
            Err(e) => {
                self.inner.state.send_replace(ServerState::Failed(e.to_string()));
                return Err(e);
            }
        };
        let local_addr = listener.local_addr()?;

        self.inner.state.send_replace(ServerState::Listening(local_addr));
        tracing::info!(address = %self.inner.address, "Server listening on {}", local_addr);

        let inner = self.inner.clone();
        let outcome = listener
            .run_until(
                move |request: Request| {
                    let inner = inner.clone();
                    async move { inner.dispatch(request).await }
                },
                self.inner.shutdown.subscribe(),
            )
            .await;

        self.inner.state.send_replace(ServerState::Stopped);
        tracing::info!(address = %self.inner.address, "Server stopped");
        outcome
    }

    /// Signals the accept loop and every open connection to finish.
    ///
    /// Stopping a server that never started keeps it from starting.
    pub fn stop(&self) {
        tracing::debug!(address = %self.inner.address, "Stopping server");
        self.inner.shutdown.send_replace(true);
        self.inner.state.send_if_modified(|state| {
            if *state == ServerState::Idle {
                *state = ServerState::Stopped;
                true
            } else {
                false
            }
        });
    }

    /// Waits until the server is accepting connections and returns the bound
    /// socket address (useful when the configured port is `0`).
    ///
    /// # Errors
    ///
    /// [`MicronetError::Server`] if the server failed to bind or was stopped
    /// before it started listening.
    pub async fn wait_listening(&self) -> Result<SocketAddr> {
        let mut state = self.inner.state.subscribe();
        loop {
            let current = state.borrow_and_update().clone();
            match current {
                ServerState::Idle => {}
                ServerState::Listening(addr) => return Ok(addr),
                ServerState::Failed(reason) => return Err(MicronetError::Server(reason)),
                ServerState::Stopped => {
                    return Err(MicronetError::Server(format!(
                        "server {} stopped before listening",
                        self.inner.address
                    )))
                }
            }

            state
                .changed()
                .await
                .map_err(|_| MicronetError::Server("server dropped".to_string()))?;
        }
    }
}

impl ServerInner {
    async fn dispatch(&self, request: Request) -> Result<Response> {
        let (handler_name, method) = request.split_method()?;
        tracing::debug!(method = %request.method, id = request.id, "Dispatching request");

        let handler = self
            .handlers
            .read()
            .await
            .get(handler_name)
            .cloned()
            .ok_or_else(|| MicronetError::MethodNotFound(format!("unknown handler '{}'", handler_name)))?;

        let result = handler.handle(method, request.args.clone()).await?;
        Ok(Response::success(request.id, result))
    }
}
