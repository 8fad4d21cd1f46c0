//! ABCP Client - HTTP client for the remote order platform
//!
//! 提供两个只读接口：按手机号查找用户、按用户 ID 拉取订单列表。

pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::AbcpClient;
pub use types::UserProfile;

// Re-export shared types for convenience
pub use shared::order::{LineItem, OrderRecord};
