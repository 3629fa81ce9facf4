//! micronet Client
//!
//! [`ResilientClient`] wraps a transport connection with bounded
//! reconnect-and-retry: when a call fails because the connection is gone, the
//! client re-dials according to its [`ReconnectPolicy`] and re-issues the call
//! exactly once.

pub mod async_call;
pub mod client;
pub mod policy;

#[cfg(test)]
mod mock;

pub use async_call::{AsyncCall, CallDone};
pub use client::ResilientClient;
pub use policy::ReconnectPolicy;
