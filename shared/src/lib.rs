//! Shared types for the order-watch workspace
//!
//! 订单记录、聊天标识和厂商 JSON 的宽松反序列化工具，
//! 由 `abcp-client` 与 `order-watch` 共同使用。

pub mod ids;
pub mod order;
pub mod serde_helpers;
pub mod util;

// Re-exports
pub use ids::{AccountId, ChatId, MessageRef};
pub use order::{CLOSED_STATUS_KEYWORDS, LineItem, OrderRecord};
pub use serde::{Deserialize, Serialize};
