use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{MicronetError, Result};

pub type RequestId = u64;
pub type MethodName = String;
pub type RpcArgs = serde_json::Value;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A single call frame: `method` is `HandlerType.MethodName`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub method: MethodName,
    pub args: RpcArgs,
}

impl Request {
    pub fn new(method: impl Into<String>, args: RpcArgs) -> Self {
        Request {
            id: REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            method: method.into(),
            args,
        }
    }

    /// Splits the method into its handler and method parts.
    ///
    /// # Errors
    ///
    /// Returns [`MicronetError::MethodNotFound`] when the name is not of the
    /// form `Handler.Method` with both parts non-empty.
    ///
    /// # Example
    ///
    /// ```
    /// use micronet_common::Request;
    /// use serde_json::json;
    ///
    /// let request = Request::new("PublisherHandler.Subscribe", json!({}));
    /// assert_eq!(request.split_method().unwrap(), ("PublisherHandler", "Subscribe"));
    /// ```
    pub fn split_method(&self) -> Result<(&str, &str)> {
        match self.method.split_once('.') {
            Some((handler, method)) if !handler.is_empty() && !method.is_empty() => {
                Ok((handler, method))
            }
            _ => Err(MicronetError::MethodNotFound(format!(
                "'{}' is not of the form Handler.Method",
                self.method
            ))),
        }
    }
}
