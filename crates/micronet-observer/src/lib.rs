//! micronet Observer
//!
//! Publish/subscribe on top of micronet RPC.
//!
//! - A [`Publisher`] runs a server with the [`PublisherRegistry`] handler.
//!   Subscribers register through `PublisherHandler.Subscribe`; the publisher
//!   then keeps a [`ResilientClient`](micronet_client::ResilientClient) to each
//!   of them and fans every published payload out with one
//!   `SubscriberHandler.Update` call per subscriber.
//! - A [`Subscriber`] is a [`ClientServer`](micronet_client_server::ClientServer)
//!   whose `SubscriberHandler` passes updates to a [`DeliveryChannel`].
//!
//! # Example
//!
//! ```no_run
//! use micronet_common::Address;
//! use micronet_observer::{Publisher, Subscriber};
//!
//! # #[tokio::main]
//! # async fn main() -> micronet_common::Result<()> {
//! let pub_addr = Address::tcp("localhost", "1234").with_name("Publisher");
//! let sub_addr = Address::tcp("localhost", "4321").with_name("Subscriber");
//!
//! let publisher = Publisher::new(pub_addr.clone()).await?;
//! let running = publisher.clone();
//! tokio::spawn(async move { running.start().await });
//! publisher.wait_listening().await?;
//!
//! let subscriber = Subscriber::new(sub_addr, pub_addr.clone()).await?;
//! let running = subscriber.clone();
//! tokio::spawn(async move { running.start().await });
//! subscriber.wait_listening().await?;
//!
//! subscriber.dial().await?;
//! subscriber.subscribe(&pub_addr).await?;
//!
//! let channel = subscriber.channel();
//! tokio::spawn(async move { publisher.publish("message").await });
//! assert_eq!(channel.recv().await, Some(serde_json::json!("message")));
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod messages;
pub mod publisher;
pub mod subscriber;

pub use channel::DeliveryChannel;
pub use messages::{SubscribeRequest, SubscribeResponse};
pub use publisher::{Publisher, PublisherConfig, PublisherRegistry};
pub use subscriber::{Subscriber, SubscriberHandler};
