pub mod builtin;
pub mod error;
pub mod requests;
pub mod responses;


pub use builtin::{Ping, Pong, PING, PING_HANDLER, PING_METHOD, PONG};
pub use error::{MicronetError, Result, SubscriptionAction};
pub use requests::{MethodName, Request, RequestId, RpcArgs};
pub use responses::{Response, RpcResult};
