//! 聊天通道
//!
//! 核心只依赖 [`ChatChannel`]：发送、编辑、删除消息。
//! 机器人交互另需 [`BotChannel`]：联系人按钮、回复键盘与回调应答。
//! 控件 ([`Control`]) 携带短小的不透明载荷，由导航状态机解释。

pub mod telegram;

use async_trait::async_trait;
use shared::{ChatId, MessageRef};
use thiserror::Error;

pub use telegram::TelegramChannel;

/// One interactive button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub label: String,
    /// 回传载荷，`verb:arg`
    pub payload: String,
}

impl Control {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Rows of controls attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Control>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, row: Vec<Control>) -> Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 所有控件（按行展开）
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.rows.iter().flatten()
    }
}

/// Result of an in-place edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    /// 目标消息已不存在
    NotFound,
    /// 内容与当前显示完全一致，通道拒绝了空编辑
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Chat transport errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send(
        &self,
        chat: ChatId,
        text: &str,
        controls: Option<&Keyboard>,
    ) -> ChannelResult<MessageRef>;

    async fn edit(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
        controls: Option<&Keyboard>,
    ) -> ChannelResult<EditOutcome>;

    async fn delete(&self, chat: ChatId, message: MessageRef) -> ChannelResult<DeleteOutcome>;
}

/// Bot-only calls used by the update handlers
#[async_trait]
pub trait BotChannel: ChatChannel {
    /// 发送带"分享手机号"按钮的消息
    async fn send_contact_request(
        &self,
        chat: ChatId,
        text: &str,
        button_label: &str,
    ) -> ChannelResult<MessageRef>;

    /// 发送消息并移除回复键盘
    async fn send_removing_reply_keyboard(
        &self,
        chat: ChatId,
        text: &str,
    ) -> ChannelResult<MessageRef>;

    /// 应答回调，`text` 显示为短提示
    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>)
    -> ChannelResult<()>;
}
