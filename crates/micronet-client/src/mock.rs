//! Scripted transport used by the client's unit tests.

use async_trait::async_trait;
use micronet_common::{
    Address, Connection, Connector, MicronetError, Ping, Pong, Result, RpcArgs, RpcResult, PING_METHOD,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    reachable: AtomicBool,
    born_broken: AtomicBool,
    dial_script: Mutex<VecDeque<bool>>,
    dial_delay: Mutex<Duration>,
    dials: AtomicUsize,
    calls: AtomicUsize,
    pong: Mutex<Option<String>>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

/// Connector whose dial outcomes are scripted by the test.
///
/// Scripted outcomes are consumed first; once the script is empty every dial
/// follows [`MockConnector::set_reachable`].
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn reachable() -> Self {
        let connector = Self::default();
        connector.set_reachable(true);
        connector
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn script_dials(&self, outcomes: &[bool]) {
        self.state.dial_script.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn set_dial_delay(&self, delay: Duration) {
        *self.state.dial_delay.lock().unwrap() = delay;
    }

    /// Makes `PingHandler.Ping` answer `data` instead of the real reply.
    pub fn set_pong(&self, data: &str) {
        *self.state.pong.lock().unwrap() = Some(data.to_string());
    }

    /// Breaks every connection dialed so far, as if the peer went away.
    pub fn drop_connections(&self) {
        for connection in self.state.connections.lock().unwrap().iter() {
            connection.broken.store(true, Ordering::SeqCst);
        }
    }

    /// Makes connections dialed from now on fail their calls.
    pub fn set_fresh_connections_broken(&self, broken: bool) {
        self.state.born_broken.store(broken, Ordering::SeqCst);
    }

    pub fn dials(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn closed_connections(&self) -> usize {
        self.state
            .connections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.closed.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn dial(&self, address: &Address) -> Result<Arc<dyn Connection>> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.dial_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.state.dial_script.lock().unwrap().pop_front();
        let succeeds = scripted.unwrap_or_else(|| self.state.reachable.load(Ordering::SeqCst));
        if !succeeds {
            return Err(MicronetError::Transport(format!("connection refused by {}", address)));
        }

        let connection = Arc::new(MockConnection {
            state: self.state.clone(),
            broken: AtomicBool::new(self.state.born_broken.load(Ordering::SeqCst)),
            closed: AtomicBool::new(false),
        });
        self.state.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}

pub struct MockConnection {
    state: Arc<MockState>,
    broken: AtomicBool,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MockConnection {
    /// `PingHandler.Ping` answers like the built-in handler, `Mock.Fail`
    /// returns a remote error and anything else echoes its arguments.
    async fn call(&self, method: &str, args: RpcArgs) -> Result<RpcResult> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);

        if self.closed.load(Ordering::SeqCst) || self.broken.load(Ordering::SeqCst) {
            return Err(MicronetError::Transport("Connection lost".to_string()));
        }

        match method {
            PING_METHOD => {
                let pong = match self.state.pong.lock().unwrap().clone() {
                    Some(data) => Pong { data },
                    None => Pong::reply_to(&serde_json::from_value::<Ping>(args)?),
                };
                Ok(serde_json::to_value(pong)?)
            }
            "Mock.Fail" => Err(MicronetError::Remote("intentional".to_string())),
            _ => Ok(json!({ "method": method, "args": args })),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(MicronetError::Transport("already closed".to_string()));
        }
        Ok(())
    }
}
