//! Request and response shapes of the subscription protocol.

use micronet_common::Address;
use serde::{Deserialize, Serialize};

pub const PUBLISHER_HANDLER: &str = "PublisherHandler";
pub const SUBSCRIBER_HANDLER: &str = "SubscriberHandler";

pub const SUBSCRIBE_METHOD: &str = "PublisherHandler.Subscribe";
pub const UNSUBSCRIBE_METHOD: &str = "PublisherHandler.Unsubscribe";
pub const UPDATE_METHOD: &str = "SubscriberHandler.Update";

/// Sent to a publisher to (un)register `subscriber`.
///
/// `subscriber` must be the address the subscriber's own server listens on:
/// the publisher dials it to push updates. `publisher` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub subscriber: Address,
    #[serde(default)]
    pub publisher: Address,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeResponse {
    #[serde(default)]
    pub ok: bool,
}

impl SubscribeResponse {
    pub fn accepted() -> Self {
        Self { ok: true }
    }
}
