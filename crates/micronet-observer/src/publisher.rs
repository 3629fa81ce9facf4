use async_trait::async_trait;
use micronet_client::{ReconnectPolicy, ResilientClient};
use micronet_common::{Address, MicronetError, Result, RpcArgs, RpcResult, TcpConfig};
use micronet_server::{decode, encode, Handler, Server};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::messages::{SubscribeRequest, SubscribeResponse, PUBLISHER_HANDLER, UPDATE_METHOD};

/// How a publisher talks to its subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Reconnection policy of every subscriber client
    pub subscriber_policy: ReconnectPolicy,
    pub tcp: TcpConfig,
}

impl PublisherConfig {
    pub fn with_subscriber_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.subscriber_policy = policy;
        self
    }

    pub fn with_tcp(mut self, tcp: TcpConfig) -> Self {
        self.tcp = tcp;
        self
    }
}

/// Subscribers of a publisher, each with the client used to push updates.
///
/// Served remotely as `PublisherHandler.Subscribe` and
/// `PublisherHandler.Unsubscribe`.
pub struct PublisherRegistry {
    config: PublisherConfig,
    subscribers: Mutex<HashMap<Address, ResilientClient>>,
}

impl PublisherRegistry {
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            config,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Registers `request.subscriber` and dials it.
    ///
    /// Subscribing an address that is already registered succeeds without
    /// doing anything.
    ///
    /// # Errors
    ///
    /// The dial error, if the subscriber cannot be reached. Nothing is
    /// registered in that case.
    pub async fn subscribe(&self, request: SubscribeRequest) -> Result<SubscribeResponse> {
        let address = request.subscriber;
        if self.contains(&address).await {
            debug!(subscriber = %address, "Already subscribed");
            return Ok(SubscribeResponse::accepted());
        }

        let client = ResilientClient::with_tcp_config(address.clone(), self.config.tcp.clone())
            .with_policy(self.config.subscriber_policy);
        if let Err(e) = client.dial().await {
            warn!(subscriber = %address, error = %e, "Could not reach new subscriber");
            return Err(e);
        }

        let mut subscribers = self.subscribers.lock().await;
        if subscribers.contains_key(&address) {
            // Lost a race with a concurrent subscribe for the same address
            drop(subscribers);
            let _ = client.close().await;
            return Ok(SubscribeResponse::accepted());
        }
        subscribers.insert(address.clone(), client);

        info!(subscriber = %address, count = subscribers.len(), "Subscribed");
        Ok(SubscribeResponse::accepted())
    }

    /// Removes `request.subscriber` and closes its client.
    ///
    /// Always accepted, whether or not the address was registered.
    pub async fn unsubscribe(&self, request: SubscribeRequest) -> Result<SubscribeResponse> {
        let removed = self.subscribers.lock().await.remove(&request.subscriber);

        match removed {
            Some(client) => {
                if let Err(e) = client.close().await {
                    debug!(subscriber = %request.subscriber, error = %e, "Closing subscriber client failed");
                }
                info!(subscriber = %request.subscriber, "Unsubscribed");
            }
            None => debug!(subscriber = %request.subscriber, "Unsubscribe for unknown subscriber"),
        }

        Ok(SubscribeResponse::accepted())
    }

    /// Sends `payload` to every current subscriber, one after another.
    ///
    /// A subscriber that cannot be updated is logged and skipped. Returns the
    /// number of subscribers that acknowledged the update.
    ///
    /// # Errors
    ///
    /// Only if `payload` cannot be serialized; delivery failures never
    /// surface here.
    pub async fn publish<T: Serialize + ?Sized>(&self, payload: &T) -> Result<usize> {
        let payload = serde_json::to_value(payload)?;
        let snapshot: Vec<(Address, ResilientClient)> = self
            .subscribers
            .lock()
            .await
            .iter()
            .map(|(address, client)| (address.clone(), client.clone()))
            .collect();

        let mut delivered = 0;
        for (address, client) in snapshot {
            match client.call_value(UPDATE_METHOD, payload.clone()).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!(subscriber = %address, error = %e, "Update failed"),
            }
        }

        debug!(delivered, "Published");
        Ok(delivered)
    }

    /// Forgets every subscriber and closes their clients. Returns how many
    /// there were.
    pub async fn clear(&self) -> usize {
        let drained: Vec<(Address, ResilientClient)> = self.subscribers.lock().await.drain().collect();

        for (address, client) in &drained {
            if let Err(e) = client.close().await {
                debug!(subscriber = %address, error = %e, "Closing subscriber client failed");
            }
        }

        drained.len()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Registered subscriber addresses, sorted.
    pub async fn subscribers(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.subscribers.lock().await.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub async fn contains(&self, address: &Address) -> bool {
        self.subscribers.lock().await.contains_key(address)
    }
}

#[async_trait]
impl Handler for PublisherRegistry {
    fn name(&self) -> &str {
        PUBLISHER_HANDLER
    }

    async fn handle(&self, method: &str, args: RpcArgs) -> Result<RpcResult> {
        match method {
            "Subscribe" => encode(&self.subscribe(decode(method, args)?).await?),
            "Unsubscribe" => encode(&self.unsubscribe(decode(method, args)?).await?),
            other => Err(MicronetError::MethodNotFound(format!("{}.{}", PUBLISHER_HANDLER, other))),
        }
    }
}

/// A server with a [`PublisherRegistry`] registered.
#[derive(Clone)]
pub struct Publisher {
    server: Server,
    registry: Arc<PublisherRegistry>,
}

impl Publisher {
    pub async fn new(address: Address) -> Result<Self> {
        Self::with_config(address, PublisherConfig::default()).await
    }

    pub async fn with_config(address: Address, config: PublisherConfig) -> Result<Self> {
        let server = Server::new(address);
        let registry = Arc::new(PublisherRegistry::new(config));
        server.register(registry.clone()).await?;

        Ok(Self { server, registry })
    }

    pub fn address(&self) -> &Address {
        self.server.address()
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn registry(&self) -> &Arc<PublisherRegistry> {
        &self.registry
    }

    /// Serves subscription requests until stopped. See [`Server::start`].
    pub async fn start(&self) -> Result<()> {
        self.server.start().await
    }

    pub async fn wait_listening(&self) -> Result<SocketAddr> {
        self.server.wait_listening().await
    }

    /// See [`PublisherRegistry::publish`].
    pub async fn publish<T: Serialize + ?Sized>(&self, payload: &T) -> Result<usize> {
        self.registry.publish(payload).await
    }

    /// Stops the server and drops every subscriber.
    pub async fn stop(&self) {
        self.server.stop();
        let dropped = self.registry.clear().await;
        info!(address = %self.server.address(), subscribers = dropped, "Publisher stopped");
    }
}
