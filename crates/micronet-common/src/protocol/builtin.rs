//! Built-in liveness procedure.
//!
//! Every server registers `PingHandler.Ping`, which answers [`PONG`] to a
//! [`PING`] request. Clients use it to check that a peer is alive and
//! speaking the same protocol.

use serde::{Deserialize, Serialize};

pub const PING: &str = "PING";
pub const PONG: &str = "PONG";

/// Handler name of the built-in liveness handler.
pub const PING_HANDLER: &str = "PingHandler";

/// Fully qualified liveness method.
pub const PING_METHOD: &str = "PingHandler.Ping";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ping {
    pub data: String,
}

impl Ping {
    pub fn new() -> Self {
        Self {
            data: PING.to_string(),
        }
    }
}

impl Default for Ping {
    fn default() -> Self {
        Self::new()
    }
}

/// Reply to [`Ping`]; `data` is [`PONG`] only when the request carried [`PING`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pong {
    pub data: String,
}

impl Pong {
    /// Answers a ping the way the built-in handler does.
    pub fn reply_to(ping: &Ping) -> Self {
        if ping.data == PING {
            Self {
                data: PONG.to_string(),
            }
        } else {
            Self::default()
        }
    }

    pub fn is_pong(&self) -> bool {
        self.data == PONG
    }
}
