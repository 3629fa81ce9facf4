use micronet_common::{MicronetError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

/// A payload waiting for a consumer, with the signal its sender waits on.
struct Delivery {
    payload: Value,
    taken: oneshot::Sender<()>,
}

struct Shared {
    sender: mpsc::Sender<Delivery>,
    receiver: Mutex<mpsc::Receiver<Delivery>>,
    closed: watch::Sender<bool>,
}

/// Local end of a subscriber's update stream.
///
/// Delivery is a rendezvous: [`deliver`](DeliveryChannel::deliver) returns
/// only once a consumer has taken the payload through
/// [`recv`](DeliveryChannel::recv), so the publisher's update call to this
/// subscriber lasts as long as the consumer takes to pick it up.
///
/// Handles are cheap to clone and share one stream. Once closed the channel
/// stays closed: `recv` yields `None` and deliveries, including those already
/// waiting, fail with [`MicronetError::SubscriberClosed`].
#[derive(Clone)]
pub struct DeliveryChannel {
    shared: Arc<Shared>,
}

impl DeliveryChannel {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel(1);
        let (closed, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                sender,
                receiver: Mutex::new(receiver),
                closed,
            }),
        }
    }

    /// Waits for the next payload.
    ///
    /// Returns `None` once the channel is closed.
    pub async fn recv(&self) -> Option<Value> {
        let closed = self.shared.closed.subscribe();
        if *closed.borrow() {
            return None;
        }

        tokio::select! {
            biased;
            _ = wait_closed(closed) => None,
            payload = self.take() => payload,
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.borrow()
    }

    /// Hands `payload` to a consumer and waits until it is taken.
    ///
    /// # Errors
    ///
    /// [`MicronetError::SubscriberClosed`] if the channel is closed before
    /// or while waiting.
    pub(crate) async fn deliver(&self, payload: Value) -> Result<()> {
        let closed = self.shared.closed.subscribe();
        if *closed.borrow() {
            return Err(MicronetError::SubscriberClosed);
        }

        let (taken, on_taken) = oneshot::channel();
        let handoff = async {
            self.shared
                .sender
                .send(Delivery { payload, taken })
                .await
                .map_err(|_| MicronetError::SubscriberClosed)?;
            on_taken.await.map_err(|_| MicronetError::SubscriberClosed)
        };

        tokio::select! {
            biased;
            _ = wait_closed(closed) => Err(MicronetError::SubscriberClosed),
            outcome = handoff => outcome,
        }
    }

    /// Closes the channel. Returns `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        !self.shared.closed.send_replace(true)
    }

    async fn take(&self) -> Option<Value> {
        let mut receiver = self.shared.receiver.lock().await;
        loop {
            let delivery = receiver.recv().await?;
            // A sender that gave up no longer counts the payload as delivered
            if delivery.taken.send(()).is_ok() {
                return Some(delivery.payload);
            }
        }
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}
