use async_trait::async_trait;
use micronet_common::{MicronetError, Ping, Pong, Result, RpcArgs, RpcResult, PING_HANDLER};

use crate::handler::{decode, encode, Handler};

/// Built-in liveness handler serving `PingHandler.Ping`.
///
/// Answers `PONG` to `PING` and an empty pong to anything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    fn name(&self) -> &str {
        PING_HANDLER
    }

    async fn handle(&self, method: &str, args: RpcArgs) -> Result<RpcResult> {
        match method {
            "Ping" => {
                let ping: Ping = decode(method, args)?;
                tracing::debug!(data = %ping.data, "Ping received");
                encode(&Pong::reply_to(&ping))
            }
            other => Err(MicronetError::MethodNotFound(format!("{}.{}", PING_HANDLER, other))),
        }
    }
}
