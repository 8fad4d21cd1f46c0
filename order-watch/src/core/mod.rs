//! 核心模块 - 配置、状态和后台任务
//!
//! # 模块结构
//!
//! - [`Config`] - 服务配置
//! - [`ServerState`] - 服务状态 (所有组件的共享引用)
//! - [`BackgroundTasks`] - 后台任务注册与关闭
//! - [`PeriodicRunner`] - 定时任务执行器

pub mod config;
pub mod periodic;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use periodic::{PeriodicJob, PeriodicRunner};
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
