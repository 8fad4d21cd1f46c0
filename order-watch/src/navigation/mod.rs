//! 交互导航
//!
//! - [`ControlPayload`] - 控件载荷 `verb:arg` 编解码
//! - [`Navigator`] - 概览/详情状态机

pub mod machine;
pub mod payload;

pub use machine::{NavOutcome, Navigator};
pub use payload::{ControlPayload, MAX_PAYLOAD_LEN, PayloadError};
