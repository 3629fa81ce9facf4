//! micronet Response Types

use serde::{Deserialize, Serialize};

use super::error::{MicronetError, Result};
use super::RequestId;

/// RPC method result (JSON value)
pub type RpcResult = serde_json::Value;

/// The reply frame to a [`Request`](super::Request).
///
/// # Fields
///
/// - `id`: the request ID this response answers
/// - `result`: the handler's return value (present on success)
/// - `error`: the handler's error message (present on failure)
/// - `success`: whether the handler succeeded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub id: RequestId,
    pub result: Option<RpcResult>,
    pub error: Option<String>,
    pub success: bool,
}

impl Response {
    /// Creates a successful response.
    ///
    /// ```
    /// use micronet_common::Response;
    /// use serde_json::json;
    ///
    /// let response = Response::success(7, json!({"ok": true}));
    /// assert!(response.success);
    /// ```
    pub fn success(id: RequestId, result: RpcResult) -> Self {
        Response {
            id,
            result: Some(result),
            error: None,
            success: true,
        }
    }

    /// Creates an error response.
    pub fn error(id: RequestId, error: impl Into<String>) -> Self {
        Response {
            id,
            result: None,
            error: Some(error.into()),
            success: false,
        }
    }

    /// Turns the frame into the caller-facing outcome.
    ///
    /// An error frame becomes [`MicronetError::Remote`]: the peer answered,
    /// so the connection is healthy. A success frame without a result is a
    /// handler that returned `null`.
    pub fn into_result(self) -> Result<RpcResult> {
        if self.success {
            Ok(self.result.unwrap_or(RpcResult::Null))
        } else {
            Err(MicronetError::Remote(
                self.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}
