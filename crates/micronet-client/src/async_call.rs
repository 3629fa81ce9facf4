use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use micronet_common::{MicronetError, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Completion notice delivered to the optional `done` channel of
/// [`ResilientClient::async_call`](crate::ResilientClient::async_call).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDone {
    pub method: String,
    pub error: Option<MicronetError>,
}

impl CallDone {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Delivers the notice without waiting.
    ///
    /// A full channel would otherwise stall the resolving task, so the notice
    /// is dropped and logged instead.
    pub(crate) fn signal(done: &mpsc::Sender<CallDone>, notice: CallDone) {
        match done.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(notice)) => {
                tracing::warn!(method = %notice.method, "Completion channel full, dropping notice");
            }
            Err(TrySendError::Closed(notice)) => {
                tracing::debug!(method = %notice.method, "Completion channel closed");
            }
        }
    }
}

/// Handle to a call running in the background.
///
/// Resolves exactly once, with the outcome of the first attempt or, after a
/// reconnection, of the single retry.
#[must_use = "an AsyncCall does nothing to the outcome unless awaited"]
pub struct AsyncCall<T> {
    method: String,
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> AsyncCall<T> {
    pub(crate) fn new(method: String, receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self { method, receiver }
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl<T> Future for AsyncCall<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(MicronetError::Transport(format!(
                "call task for {} ended without an outcome",
                this.method
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_with_sent_outcome() {
        let (tx, rx) = oneshot::channel();
        let call = AsyncCall::new("A.b".to_string(), rx);
        tx.send(Ok(7)).unwrap();
        assert_eq!(call.await, Ok(7));
    }

    #[tokio::test]
    async fn test_dropped_task_resolves_with_error() {
        let (tx, rx) = oneshot::channel::<Result<()>>();
        let call = AsyncCall::new("A.b".to_string(), rx);
        drop(tx);
        assert!(matches!(call.await, Err(MicronetError::Transport(msg)) if msg.contains("A.b")));
    }

    #[tokio::test]
    async fn test_signal_never_blocks_on_full_channel() {
        let (done, mut notices) = mpsc::channel(1);
        let notice = CallDone {
            method: "A.b".to_string(),
            error: None,
        };
        CallDone::signal(&done, notice.clone());
        CallDone::signal(&done, notice.clone());

        assert_eq!(notices.recv().await, Some(notice));
        assert!(notices.try_recv().is_err());
    }
}
