use async_trait::async_trait;
use micronet_client::ReconnectPolicy;
use micronet_client_server::ClientServer;
use micronet_common::{Address, MicronetError, Result, RpcArgs, RpcResult, SubscriptionAction};
use micronet_server::{Handler, ServerState};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::channel::DeliveryChannel;
use crate::messages::{
    SubscribeRequest, SubscribeResponse, SUBSCRIBER_HANDLER, SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD,
};

/// Serves `SubscriberHandler.Update` by handing the payload to the local
/// [`DeliveryChannel`].
pub struct SubscriberHandler {
    channel: DeliveryChannel,
}

impl SubscriberHandler {
    pub fn new(channel: DeliveryChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Handler for SubscriberHandler {
    fn name(&self) -> &str {
        SUBSCRIBER_HANDLER
    }

    async fn handle(&self, method: &str, args: RpcArgs) -> Result<RpcResult> {
        match method {
            "Update" => {
                self.channel.deliver(args).await?;
                Ok(Value::Null)
            }
            other => Err(MicronetError::MethodNotFound(format!("{}.{}", SUBSCRIBER_HANDLER, other))),
        }
    }
}

/// A node that receives a publisher's updates.
///
/// The subscriber serves `SubscriberHandler.Update` on its own address and
/// talks to its publisher through a resilient client. Updates are read from
/// [`channel`](Subscriber::channel).
///
/// # Example
///
/// ```no_run
/// use micronet_common::Address;
/// use micronet_observer::Subscriber;
///
/// # #[tokio::main]
/// # async fn main() -> micronet_common::Result<()> {
/// let publisher = Address::tcp("127.0.0.1", "1234").with_name("Publisher");
/// let subscriber = Subscriber::new(Address::tcp("127.0.0.1", "4321"), publisher.clone()).await?;
///
/// let node = subscriber.clone();
/// tokio::spawn(async move { node.start().await });
/// subscriber.wait_listening().await?;
///
/// subscriber.dial().await?;
/// subscriber.subscribe(&publisher).await?;
///
/// while let Some(payload) = subscriber.channel().recv().await {
///     println!("{}", payload);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Subscriber {
    node: ClientServer,
    channel: DeliveryChannel,
}

impl Subscriber {
    /// Creates a subscriber serving on `self_address` whose client targets
    /// `publisher_address`. Nothing is dialed or bound yet.
    pub async fn new(self_address: Address, publisher_address: Address) -> Result<Self> {
        let node = ClientServer::new(self_address, publisher_address);
        let channel = DeliveryChannel::new();
        node.register(Arc::new(SubscriberHandler::new(channel.clone())))
            .await?;

        Ok(Self { node, channel })
    }

    pub fn node(&self) -> &ClientServer {
        &self.node
    }

    pub fn channel(&self) -> DeliveryChannel {
        self.channel.clone()
    }

    /// The address publishers are asked to deliver to.
    ///
    /// When the configured port is `0` and the server is listening, the
    /// bound port is used instead.
    pub fn advertised_address(&self) -> Address {
        let configured = self.node.self_address();
        match self.node.server().state() {
            ServerState::Listening(bound) if configured.port() == "0" => Address::new(
                configured.name(),
                configured.protocol(),
                configured.host(),
                bound.port().to_string(),
            ),
            _ => configured.clone(),
        }
    }

    /// Asks the publisher to deliver updates to this subscriber.
    ///
    /// The request goes to the address the subscriber was created with;
    /// `publisher` names it in the request and in errors.
    ///
    /// # Errors
    ///
    /// The call error unchanged, or [`MicronetError::SubscriptionRejected`]
    /// if the publisher answered `ok = false`.
    pub async fn subscribe(&self, publisher: &Address) -> Result<()> {
        self.request(SubscriptionAction::Subscribe, publisher).await
    }

    /// Asks the publisher to stop delivering updates to this subscriber.
    pub async fn unsubscribe(&self, publisher: &Address) -> Result<()> {
        self.request(SubscriptionAction::Unsubscribe, publisher).await
    }

    async fn request(&self, action: SubscriptionAction, publisher: &Address) -> Result<()> {
        let subscriber = self.advertised_address();
        let request = SubscribeRequest {
            subscriber: subscriber.clone(),
            publisher: publisher.clone(),
        };
        let method = match action {
            SubscriptionAction::Subscribe => SUBSCRIBE_METHOD,
            SubscriptionAction::Unsubscribe => UNSUBSCRIBE_METHOD,
        };

        let response: SubscribeResponse = self.node.call(method, &request).await?;
        if !response.ok {
            return Err(MicronetError::SubscriptionRejected {
                action,
                publisher: publisher.clone(),
                subscriber,
            });
        }

        tracing::info!(%publisher, %subscriber, "{} accepted", action);
        Ok(())
    }

    pub async fn dial(&self) -> Result<()> {
        self.node.dial().await
    }

    pub async fn ping(&self) -> Result<()> {
        self.node.ping().await
    }

    pub fn set_reconnection_policy(&self, policy: ReconnectPolicy) {
        self.node.set_reconnection_policy(policy);
    }

    /// Serves inbound updates until closed.
    pub async fn start(&self) -> Result<()> {
        self.node.start().await
    }

    pub async fn wait_listening(&self) -> Result<SocketAddr> {
        self.node.wait_listening().await
    }

    /// Closes the delivery channel, then stops the node.
    ///
    /// Updates arriving afterwards are refused with
    /// [`MicronetError::SubscriberClosed`].
    pub async fn close(&self) -> Result<()> {
        if self.channel.close() {
            tracing::debug!(address = %self.node.self_address(), "Delivery channel closed");
        }
        self.node.close().await
    }

    /// Same as [`close`](Subscriber::close).
    pub async fn stop(&self) -> Result<()> {
        self.close().await
    }
}
