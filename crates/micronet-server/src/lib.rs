//! micronet Server
//!
//! This crate provides the inbound side of micronet: a [`Server`] that accepts
//! TCP connections on its own [`Address`](micronet_common::Address) and
//! dispatches each `Handler.Method` request to a registered [`Handler`].
//!
//! Every server registers the built-in [`PingHandler`] on construction.
//!
//! # Example
//!
//! ```no_run
//! use micronet_common::Address;
//! use micronet_server::Server;
//!
//! # #[tokio::main]
//! # async fn main() -> micronet_common::Result<()> {
//! let server = Server::new(Address::tcp("127.0.0.1", "1234"));
//!
//! let background = server.clone();
//! tokio::spawn(async move { background.start().await });
//!
//! let bound = server.wait_listening().await?;
//! println!("listening on {}", bound);
//!
//! server.stop();
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod ping;
pub mod server;

pub use handler::{decode, encode, Handler};
pub use ping::PingHandler;
pub use server::{Server, ServerState};
