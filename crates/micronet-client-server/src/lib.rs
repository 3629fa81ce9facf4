//! micronet Client-Server
//!
//! A [`ClientServer`] is a node that is both a [`ResilientClient`] to one
//! remote address and a [`Server`] for inbound calls on its own address. It is
//! the building block of bidirectional peers such as the observer's
//! subscriber.

use micronet_client::{AsyncCall, CallDone, ReconnectPolicy, ResilientClient};
use micronet_common::{Address, Result, RpcArgs, RpcResult};
use micronet_server::{Handler, Server};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A server on `self_address` plus a resilient client to `remote_address`.
///
/// Client operations go to the client, server operations to the server.
/// Construction does not dial: call [`dial`](ClientServer::dial) once the
/// remote side is up.
#[derive(Clone)]
pub struct ClientServer {
    server: Server,
    client: ResilientClient,
}

impl ClientServer {
    pub fn new(self_address: Address, remote_address: Address) -> Self {
        Self::from_parts(Server::new(self_address), ResilientClient::new(remote_address))
    }

    /// Assembles a node from an existing server and client.
    pub fn from_parts(server: Server, client: ResilientClient) -> Self {
        Self { server, client }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn self_address(&self) -> &Address {
        self.server.address()
    }

    pub fn remote_address(&self) -> &Address {
        self.client.address()
    }

    pub async fn dial(&self) -> Result<()> {
        self.client.dial().await
    }

    pub async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.client.call(method, request).await
    }

    pub async fn call_value(&self, method: &str, args: RpcArgs) -> Result<RpcResult> {
        self.client.call_value(method, args).await
    }

    pub fn async_call<Req, Resp>(
        &self,
        method: impl Into<String>,
        request: &Req,
        done: Option<mpsc::Sender<CallDone>>,
    ) -> AsyncCall<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
    {
        self.client.async_call(method, request, done)
    }

    pub async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }

    pub fn set_reconnection_policy(&self, policy: ReconnectPolicy) {
        self.client.set_reconnection_policy(policy);
    }

    pub async fn register(&self, handler: Arc<dyn Handler>) -> Result<()> {
        self.server.register(handler).await
    }

    /// Serves inbound calls until stopped. See [`Server::start`].
    pub async fn start(&self) -> Result<()> {
        self.server.start().await
    }

    pub async fn wait_listening(&self) -> Result<SocketAddr> {
        self.server.wait_listening().await
    }

    /// Stops the server and closes the client.
    ///
    /// Both steps always run; the result is the client's close outcome.
    pub async fn stop(&self) -> Result<()> {
        self.server.stop();
        let closed = self.client.close().await;
        if let Err(e) = &closed {
            tracing::debug!(remote = %self.client.address(), error = %e, "Closing client failed");
        }
        closed
    }

    /// Same as [`stop`](ClientServer::stop).
    pub async fn close(&self) -> Result<()> {
        self.stop().await
    }
}
