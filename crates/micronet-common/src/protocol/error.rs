use std::fmt;

use thiserror::Error;

use crate::address::Address;

/// Which subscription request a publisher turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

impl fmt::Display for SubscriptionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionAction::Subscribe => f.write_str("subscribe"),
            SubscriptionAction::Unsubscribe => f.write_str("unsubscribe"),
        }
    }
}

/// Every failure a micronet operation can report.
///
/// The enum is `Clone` so that one outcome can resolve both an
/// [`AsyncCall`](https://docs.rs/micronet-client) future and its completion
/// signal. Foreign errors are therefore flattened to strings on conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MicronetError {
    #[error("No connection to {0}")]
    NoConnection(Address),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Every reconnection attempt failed; `cause` is the last failure seen
    #[error("Reconnection timeout to {} ({cause})", .address.endpoint())]
    ReconnectTimeout { address: Address, cause: String },

    #[error("Publisher {publisher} could not {action} {subscriber}")]
    SubscriptionRejected {
        action: SubscriptionAction,
        publisher: Address,
        subscriber: Address,
    },

    #[error("Liveness mismatch: expected {expected:?}, got {actual:?}")]
    LivenessMismatch { expected: String, actual: String },

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Handler already registered: {0}")]
    HandlerAlreadyRegistered(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subscriber is closed")]
    SubscriberClosed,

    #[error("Server error: {0}")]
    Server(String),
}

impl MicronetError {
    /// Whether the failure means the connection itself is unusable.
    ///
    /// Only these failures trigger a reconnect-and-retry. Errors reported by a
    /// healthy peer (`Remote`, `MethodNotFound`, ...) or produced locally
    /// before anything was sent are returned to the caller untouched.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, MicronetError::Transport(_) | MicronetError::Timeout(_))
    }
}

impl From<serde_json::Error> for MicronetError {
    fn from(err: serde_json::Error) -> Self {
        MicronetError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MicronetError {
    fn from(err: std::io::Error) -> Self {
        MicronetError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MicronetError>;
