//! micronet Transport Layer
//!
//! This module defines the transport seam the resilient client is written
//! against, and the bundled TCP implementation of it.
//!
//! # Architecture
//!
//! - **[`Connector`]**: dials an [`Address`] and yields a [`Connection`]
//! - **[`Connection`]**: one live link to a peer; `call` blocks the calling
//!   task until the reply arrives, `close` releases it
//! - **[`TcpConnector`]** / **[`TcpConnection`]**: length-prefixed JSON over TCP
//! - **[`TcpServer`]**: accept loop serving the same frames, used by `micronet-server`
//!
//! A connection reports a lost peer as an ordinary
//! [`MicronetError::Transport`](crate::MicronetError::Transport) value; there is
//! no other failure channel.
//!
//! # Example
//!
//! ```no_run
//! use micronet_common::{Address, Connector, TcpConnector};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> micronet_common::Result<()> {
//! let connector = TcpConnector::default();
//! let connection = connector.dial(&Address::tcp("127.0.0.1", "1234")).await?;
//!
//! let pong = connection.call("PingHandler.Ping", json!({"data": "PING"})).await?;
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod tcp;
pub mod tcp_server;


use async_trait::async_trait;
use std::sync::Arc;

use crate::address::Address;
use crate::protocol::error::Result;
use crate::protocol::{RpcArgs, RpcResult};

pub use codec::{read_frame, write_frame, JsonCodec, MAX_MESSAGE_SIZE};
pub use tcp::{TcpConfig, TcpConnection, TcpConnector};
pub use tcp_server::TcpServer;

/// A live link to one remote peer.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Sends `method` with `args` and waits for the peer's reply.
    async fn call(&self, method: &str, args: RpcArgs) -> Result<RpcResult>;

    /// Releases the link. Closing twice is an error.
    async fn close(&self) -> Result<()>;
}

/// Establishes [`Connection`]s.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, address: &Address) -> Result<Arc<dyn Connection>>;
}
