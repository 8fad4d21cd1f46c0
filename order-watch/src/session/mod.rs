//! 交互会话
//!
//! # 模块结构
//!
//! - [`Session`] - 单个聊天的浏览状态（订单列表、令牌、过滤、活动消息）
//! - [`TokenAllocator`] - 订单号 ↔ 短令牌
//! - [`SessionCache`] - 按聊天保存会话并按需同步

pub mod cache;
pub mod model;
pub mod tokens;

pub use cache::{SessionCache, SessionError, SessionHandle, SyncView};
pub use model::{FilterMode, Metrics, Rendered, Session, View};
pub use tokens::TokenAllocator;
