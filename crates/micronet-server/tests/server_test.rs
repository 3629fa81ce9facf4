//! Server integration tests over loopback TCP, driven by the resilient client.

use async_trait::async_trait;
use micronet_client::ResilientClient;
use micronet_common::{Address, MicronetError, Result, RpcArgs, RpcResult};
use micronet_server::{decode, encode, Handler, Server};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct AddArgs {
    a: i64,
    b: i64,
}

#[derive(Default)]
struct MathHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl Handler for MathHandler {
    fn name(&self) -> &str {
        "MathHandler"
    }

    async fn handle(&self, method: &str, args: RpcArgs) -> Result<RpcResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method {
            "Add" => {
                let args: AddArgs = decode(method, args)?;
                encode(&(args.a + args.b))
            }
            "Slow" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Value::Null)
            }
            other => Err(MicronetError::MethodNotFound(format!("MathHandler.{}", other))),
        }
    }
}

async fn start_server() -> (Server, Address) {
    let server = Server::new(Address::tcp("127.0.0.1", "0").with_name("math"));
    let background = server.clone();
    tokio::spawn(async move { background.start().await });

    let bound = server.wait_listening().await.unwrap();
    (server, Address::tcp("127.0.0.1", bound.port().to_string()))
}

#[tokio::test]
async fn test_ping_over_tcp() {
    let (server, address) = start_server().await;
    let client = ResilientClient::connect(address).await.unwrap();

    client.ping().await.unwrap();

    client.close().await.unwrap();
    server.stop();
}

#[tokio::test]
async fn test_registered_handler_is_reachable() {
    let (server, address) = start_server().await;
    let math = Arc::new(MathHandler::default());
    server.register(math.clone()).await.unwrap();

    let client = ResilientClient::connect(address).await.unwrap();
    let sum: i64 = client.call("MathHandler.Add", &json!({"a": 2, "b": 40})).await.unwrap();

    assert_eq!(sum, 42);
    assert_eq!(math.calls.load(Ordering::SeqCst), 1);
    server.stop();
}

#[tokio::test]
async fn test_errors_come_back_as_remote() {
    let (server, address) = start_server().await;
    server.register(Arc::new(MathHandler::default())).await.unwrap();
    let client = ResilientClient::connect(address).await.unwrap();

    let err = client.call::<_, Value>("Unknown.Add", &json!({})).await.unwrap_err();
    assert!(matches!(err, MicronetError::Remote(msg) if msg.contains("Unknown")));

    let err = client.call::<_, Value>("MathHandler.Mul", &json!({})).await.unwrap_err();
    assert!(matches!(err, MicronetError::Remote(msg) if msg.contains("MathHandler.Mul")));

    let err = client.call::<_, i64>("MathHandler.Add", &json!({"a": "x"})).await.unwrap_err();
    assert!(matches!(err, MicronetError::Remote(msg) if msg.contains("bad arguments")));

    // The connection survived all of it
    client.ping().await.unwrap();
    server.stop();
}

#[tokio::test]
async fn test_concurrent_connections() {
    let (server, address) = start_server().await;
    server.register(Arc::new(MathHandler::default())).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..8i64 {
        let address = address.clone();
        tasks.push(tokio::spawn(async move {
            let client = ResilientClient::connect(address).await.unwrap();
            client.call::<_, i64>("MathHandler.Add", &json!({"a": i, "b": i})).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap().unwrap(), 2 * i as i64);
    }
    server.stop();
}

#[tokio::test]
async fn test_stop_interrupts_in_flight_calls() {
    let (server, address) = start_server().await;
    server.register(Arc::new(MathHandler::default())).await.unwrap();

    let client = ResilientClient::connect(address).await.unwrap();
    client.set_reconnection_policy(micronet_client::ReconnectPolicy::disabled());

    let background = client.clone();
    let call = tokio::spawn(async move { background.call::<_, Value>("MathHandler.Slow", &json!(null)).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.stop();

    let outcome = tokio::time::timeout(Duration::from_secs(5), call).await.unwrap().unwrap();
    assert!(matches!(outcome, Err(MicronetError::ReconnectTimeout { .. })));
}
