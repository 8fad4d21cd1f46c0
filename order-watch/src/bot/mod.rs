//! 聊天机器人入口
//!
//! - [`runtime`] - getUpdates 长轮询循环
//! - [`handlers`] - 命令、联系人与回调处理
//! - [`phone`] - 手机号规范化

pub mod handlers;
pub mod phone;
pub mod runtime;

pub use handlers::{BotHandlers, Incoming, classify_update};
pub use phone::normalize_phone;
pub use runtime::BotRuntime;
