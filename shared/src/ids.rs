//! 聊天侧标识
//!
//! 账户 ID 来自远端订单平台，聊天 ID / 消息 ID 来自聊天通道。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 远端平台的账户 ID (ABCP userId)
pub type AccountId = String;

/// Chat id (numeric).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 已发送消息的引用（通道内的 message id）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
