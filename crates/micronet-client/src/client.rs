use micronet_common::{
    Address, Connection, Connector, MicronetError, Ping, Pong, Result, RpcArgs, RpcResult, TcpConfig,
    TcpConnector, PING_METHOD, PONG,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::async_call::{AsyncCall, CallDone};
use crate::policy::ReconnectPolicy;

/// The live connection together with the dial that produced it.
///
/// The generation lets a caller whose call failed tell whether someone else
/// already replaced the connection it was using.
struct Slot {
    generation: u64,
    connection: Arc<dyn Connection>,
}

/// A reconnection loop that ran out of attempts.
struct FailedReconnect {
    /// Generation of the connection whose loss started the loop
    generation: u64,
    error: MicronetError,
}

struct ClientInner {
    address: Address,
    connector: Arc<dyn Connector>,
    slot: RwLock<Option<Slot>>,
    next_generation: AtomicU64,
    /// Serializes reconnection loops and remembers the last exhausted one
    reconnect_lock: Mutex<Option<FailedReconnect>>,
    reconnecting: AtomicBool,
    /// Set by `close`, cleared by an explicit `dial`; a reconnection loop
    /// never brings a closed client back
    closed: AtomicBool,
    policy: watch::Sender<ReconnectPolicy>,
}

/// RPC client with bounded reconnect-and-retry.
///
/// The client owns one connection to `address`. When a call fails with a
/// connection-level error ([`MicronetError::is_connection_failure`]), the
/// client re-dials following its [`ReconnectPolicy`] and re-issues the call
/// exactly once. Any other failure (and the outcome of the retry) is returned
/// to the caller as-is.
///
/// Cloning is cheap and every clone shares the same connection, policy and
/// reconnection state.
///
/// # Reconnection
///
/// Reconnections are serialized. A caller that waited behind an in-flight
/// reconnection shares its outcome: it uses the new connection without
/// dialing again, or fails with the same error if the loop gave up. Every
/// attempt that fails is followed by a pause of `retry_interval`, except the
/// last. When all `retry_limit` attempts fail the dead connection is
/// discarded and the call ends with [`MicronetError::ReconnectTimeout`];
/// later calls report [`MicronetError::NoConnection`] until the next
/// [`dial`](ResilientClient::dial).
///
/// # Example
///
/// ```rust,no_run
/// use micronet_client::{ReconnectPolicy, ResilientClient};
/// use micronet_common::Address;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> micronet_common::Result<()> {
/// let client = ResilientClient::connect(Address::tcp("127.0.0.1", "1234")).await?
///     .with_policy(ReconnectPolicy::new(5, Duration::from_millis(500)));
///
/// client.ping().await?;
/// let reply: String = client.call("EchoHandler.Echo", "hello").await?;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResilientClient {
    inner: Arc<ClientInner>,
}

impl ResilientClient {
    /// Creates an undialed client using the TCP transport.
    pub fn new(address: Address) -> Self {
        Self::with_connector(address, Arc::new(TcpConnector::default()))
    }

    /// Creates an undialed client using the TCP transport with `config`.
    pub fn with_tcp_config(address: Address, config: TcpConfig) -> Self {
        Self::with_connector(address, Arc::new(TcpConnector::new(config)))
    }

    /// Creates an undialed client on top of any transport.
    pub fn with_connector(address: Address, connector: Arc<dyn Connector>) -> Self {
        let (policy, _) = watch::channel(ReconnectPolicy::default());
        Self {
            inner: Arc::new(ClientInner {
                address,
                connector,
                slot: RwLock::new(None),
                next_generation: AtomicU64::new(0),
                reconnect_lock: Mutex::new(None),
                reconnecting: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                policy,
            }),
        }
    }

    /// Creates a TCP client and dials it.
    ///
    /// # Errors
    ///
    /// Returns the dial error; no client is returned in that case.
    pub async fn connect(address: Address) -> Result<Self> {
        let client = Self::new(address);
        client.dial().await?;
        Ok(client)
    }

    /// Replaces the reconnection policy, builder style.
    pub fn with_policy(self, policy: ReconnectPolicy) -> Self {
        self.set_reconnection_policy(policy);
        self
    }

    pub fn address(&self) -> &Address {
        &self.inner.address
    }

    /// Sets the policy used by the next reconnection.
    ///
    /// A reconnection loop already running keeps the policy it started with.
    pub fn set_reconnection_policy(&self, policy: ReconnectPolicy) {
        self.inner.policy.send_replace(policy);
    }

    pub fn reconnection_policy(&self) -> ReconnectPolicy {
        *self.inner.policy.borrow()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.slot.read().await.is_some()
    }

    /// Whether a reconnection loop is running right now.
    pub fn is_reconnecting(&self) -> bool {
        self.inner.reconnecting.load(Ordering::SeqCst)
    }

    /// Establishes the connection, replacing (and closing) any previous one.
    ///
    /// Dialing re-opens a client that was closed.
    pub async fn dial(&self) -> Result<()> {
        self.establish(true).await
    }

    async fn establish(&self, reopen: bool) -> Result<()> {
        self.inner.address.validate()?;
        let connection = self.inner.connector.dial(&self.inner.address).await?;

        let previous = {
            let mut slot = self.inner.slot.write().await;
            if !reopen && self.inner.closed.load(Ordering::SeqCst) {
                drop(slot);
                let _ = connection.close().await;
                return Err(self.no_connection());
            }
            self.inner.closed.store(false, Ordering::SeqCst);

            let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
            slot.replace(Slot {
                generation,
                connection,
            })
        };

        if let Some(previous) = previous {
            if let Err(e) = previous.connection.close().await {
                debug!(address = %self.inner.address, error = %e, "Closing replaced connection failed");
            }
        }

        debug!(address = %self.inner.address, "Dialed");
        Ok(())
    }

    /// Sends a request and waits for the reply.
    ///
    /// # Errors
    ///
    /// - [`MicronetError::NoConnection`] if the client was never dialed or was closed
    /// - [`MicronetError::ReconnectTimeout`] if the connection was lost and could not be re-established
    /// - [`MicronetError::Serialization`] if the request or reply does not (de)serialize
    /// - any error of the retried call, or any non-connection error of the first call
    pub async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let args = serde_json::to_value(request)?;
        let result = self.call_value(method, args).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Untyped form of [`call`](Self::call).
    pub async fn call_value(&self, method: &str, args: RpcArgs) -> Result<RpcResult> {
        let (generation, connection) = self.current().await.ok_or_else(|| self.no_connection())?;

        match connection.call(method, args.clone()).await {
            Err(e) if e.is_connection_failure() => {
                warn!(address = %self.inner.address, method, error = %e, "Call failed, reconnecting");
                self.reconnect(generation, &e).await?;

                let (_, connection) = self.current().await.ok_or_else(|| self.no_connection())?;
                connection.call(method, args).await
            }
            outcome => outcome,
        }
    }

    /// Starts a call in the background and returns a handle to its outcome.
    ///
    /// The call follows the same reconnect-and-retry rules as
    /// [`call`](Self::call). When `done` is given it receives one [`CallDone`]
    /// once the outcome is known. `done` is a bounded channel, so it always
    /// has room for at least one notice; delivery never waits, and a notice
    /// that does not fit is dropped with a warning.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn async_call<Req, Resp>(
        &self,
        method: impl Into<String>,
        request: &Req,
        done: Option<mpsc::Sender<CallDone>>,
    ) -> AsyncCall<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
    {
        let method = method.into();
        let args = serde_json::to_value(request);
        let (tx, rx) = oneshot::channel();
        let client = self.clone();
        let task_method = method.clone();

        tokio::spawn(async move {
            let outcome: Result<Resp> = match args {
                Ok(args) => match client.call_value(&task_method, args).await {
                    Ok(value) => serde_json::from_value(value).map_err(MicronetError::from),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e.into()),
            };

            if let Some(done) = done {
                CallDone::signal(
                    &done,
                    CallDone {
                        method: task_method,
                        error: outcome.as_ref().err().cloned(),
                    },
                );
            }

            // The caller may have dropped the handle; the outcome is then unobserved
            let _ = tx.send(outcome);
        });

        AsyncCall::new(method, rx)
    }

    /// Checks that the peer is alive and answers the liveness handler.
    ///
    /// # Errors
    ///
    /// Any call error, or [`MicronetError::LivenessMismatch`] if the peer
    /// answered something other than `PONG`.
    pub async fn ping(&self) -> Result<()> {
        let pong: Pong = self.call(PING_METHOD, &Ping::new()).await?;
        if !pong.is_pong() {
            return Err(MicronetError::LivenessMismatch {
                expected: PONG.to_string(),
                actual: pong.data,
            });
        }

        info!(address = %self.inner.address, "PING responded with {}", pong.data);
        Ok(())
    }

    /// Closes the connection.
    ///
    /// A reconnection running concurrently stops before its next attempt.
    ///
    /// # Errors
    ///
    /// [`MicronetError::NoConnection`] if there is no connection to close, or
    /// the transport's close error.
    pub async fn close(&self) -> Result<()> {
        let slot = {
            let mut slot = self.inner.slot.write().await;
            self.inner.closed.store(true, Ordering::SeqCst);
            slot.take()
        };

        match slot {
            Some(slot) => {
                debug!(address = %self.inner.address, "Closing connection");
                slot.connection.close().await
            }
            None => Err(self.no_connection()),
        }
    }

    async fn current(&self) -> Option<(u64, Arc<dyn Connection>)> {
        self.inner
            .slot
            .read()
            .await
            .as_ref()
            .map(|slot| (slot.generation, slot.connection.clone()))
    }

    fn no_connection(&self) -> MicronetError {
        MicronetError::NoConnection(self.inner.address.clone())
    }

    /// Re-dials after the connection of `failed_generation` broke with `cause`.
    async fn reconnect(&self, failed_generation: u64, cause: &MicronetError) -> Result<()> {
        let mut last_failure = self.inner.reconnect_lock.lock().await;

        if let Some((generation, _)) = self.current().await {
            if generation != failed_generation {
                debug!(address = %self.inner.address, "Connection already re-established by a concurrent caller");
                return Ok(());
            }
        }
        if let Some(failure) = &*last_failure {
            if failure.generation == failed_generation {
                debug!(address = %self.inner.address, "Concurrent reconnection already gave up");
                return Err(failure.error.clone());
            }
        }

        let _flag = ReconnectingFlag::raise(&self.inner.reconnecting);
        let policy = self.reconnection_policy();
        let address = &self.inner.address;
        let mut last_error = cause.to_string();

        for attempt in 1..=policy.retry_limit {
            if self.inner.closed.load(Ordering::SeqCst) {
                info!(%address, "Client closed, abandoning reconnection");
                return Err(self.no_connection());
            }

            info!(%address, "Reconnection attempt {}/{}", attempt, policy.retry_limit);
            match self.establish(false).await {
                Ok(()) => {
                    info!(%address, attempt, "Reconnection succeeded");
                    return Ok(());
                }
                Err(e @ MicronetError::NoConnection(_)) => return Err(e),
                Err(e) => {
                    warn!(%address, attempt, error = %e, "Reconnection attempt failed");
                    last_error = e.to_string();
                }
            }

            if attempt < policy.retry_limit {
                tokio::time::sleep(policy.retry_interval).await;
            }
        }

        warn!(%address, attempts = policy.retry_limit, "Reconnection attempts exhausted");
        let error = MicronetError::ReconnectTimeout {
            address: address.clone(),
            cause: last_error,
        };
        *last_failure = Some(FailedReconnect {
            generation: failed_generation,
            error: error.clone(),
        });
        self.discard(failed_generation).await;
        Err(error)
    }

    /// Drops the connection of `generation` if it is still the current one.
    async fn discard(&self, generation: u64) {
        let stale = {
            let mut slot = self.inner.slot.write().await;
            if slot.as_ref().is_some_and(|current| current.generation == generation) {
                slot.take()
            } else {
                None
            }
        };

        if let Some(stale) = stale {
            if let Err(e) = stale.connection.close().await {
                debug!(address = %self.inner.address, error = %e, "Closing dead connection failed");
            }
        }
    }
}

/// Holds the reconnecting flag up until dropped, on every exit path.
struct ReconnectingFlag<'a>(&'a AtomicBool);

impl<'a> ReconnectingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ReconnectingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
