use async_trait::async_trait;
use micronet_common::{MicronetError, Result, RpcArgs, RpcResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A named group of remotely callable methods.
///
/// A request for `Name.Method` is routed to the handler whose
/// [`name`](Handler::name) is `Name`, with `method` set to `Method`.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Name under which the handler is registered, e.g. `PingHandler`.
    fn name(&self) -> &str;

    /// Serves one call.
    ///
    /// Errors are sent back to the caller as an error response.
    async fn handle(&self, method: &str, args: RpcArgs) -> Result<RpcResult>;
}

/// Deserializes the arguments of `method`.
///
/// # Errors
///
/// [`MicronetError::InvalidRequest`] naming the method when `args` do not
/// have the expected shape.
pub fn decode<T: DeserializeOwned>(method: &str, args: RpcArgs) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| MicronetError::InvalidRequest(format!("bad arguments for {}: {}", method, e)))
}

/// Serializes a reply.
pub fn encode<T: Serialize>(reply: &T) -> Result<RpcResult> {
    Ok(serde_json::to_value(reply)?)
}
