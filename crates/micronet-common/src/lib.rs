//! micronet Common Types and Transport
//!
//! This crate provides the addressing, protocol definitions and TCP transport
//! shared by every micronet component.
//!
//! # Overview
//!
//! micronet is a small RPC toolkit with two capabilities layered on top of a
//! plain request/response transport: resilient calling (reconnect and retry
//! once when a connection is lost) and a publish/subscribe overlay. This crate
//! contains the pieces every other crate depends on:
//!
//! - **Addressing**: [`Address`], the structural key identifying an endpoint
//! - **Protocol Layer**: Request/Response frames, built-in ping types, errors
//! - **Transport Layer**: the [`Connector`]/[`Connection`] seam and its TCP implementation
//!
//! # Wire Protocol
//!
//! - **Transport**: TCP, one request in flight per connection
//! - **Serialization**: JSON
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 100 MB
//!
//! # Method Names
//!
//! Methods are addressed as `HandlerType.MethodName`, for example
//! `PingHandler.Ping` or `PublisherHandler.Subscribe`.
//!
//! # Example
//!
//! ```no_run
//! use micronet_common::{Address, Request, Response};
//! use serde_json::json;
//!
//! let address = Address::tcp("127.0.0.1", "1234").with_name("publisher");
//! assert_eq!(address.endpoint(), "127.0.0.1:1234");
//!
//! let request = Request::new("PingHandler.Ping", json!({"data": "PING"}));
//! let response = Response::success(request.id, json!({"data": "PONG"}));
//! assert!(response.success);
//! ```

pub mod address;
pub mod protocol;
pub mod transport;

pub use address::Address;
pub use protocol::*;
pub use transport::{Connection, Connector, TcpConfig, TcpConnector};
