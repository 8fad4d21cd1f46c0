//! Order Watch - 订单状态通知机器人
//!
//! # 架构概述
//!
//! - **巡检** (`watch`): 定时拉取已绑定账户的订单，检测状态变化并通知
//! - **交互** (`session` / `navigation`): 每个聊天的订单浏览界面
//! - **存储** (`store` / `cache`): redb 快照与账户绑定、JSON 指纹缓存
//! - **外部接口** (`source` / `channel`): 订单平台与聊天平台
//!
//! # 模块结构
//!
//! ```text
//! order-watch/src/
//! ├── core/          # 配置、状态、后台任务
//! ├── bot/           # 更新循环与命令处理
//! ├── watch/         # 变更检测与通知分发
//! ├── session/       # 会话缓存与令牌
//! ├── navigation/    # 控件载荷与导航状态机
//! ├── render.rs      # 文本与控件渲染
//! ├── store/         # redb 存储
//! ├── cache/         # 指纹缓存
//! ├── source/        # 订单来源
//! ├── channel/       # 聊天通道
//! └── utils/         # 日志
//! ```

pub mod bot;
pub mod cache;
pub mod channel;
pub mod core;
pub mod navigation;
pub mod render;
pub mod session;
pub mod source;
pub mod store;
pub mod utils;
pub mod watch;

#[cfg(test)]
mod testing;

// Re-export 公共类型
pub use core::{BackgroundTasks, Config, ServerState, TaskKind};
pub use store::RedbStore;
pub use watch::{ChangeDetector, NotificationDispatcher, WatchPass};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};
