//! Telegram Bot API 通道
//!
//! 所有方法统一走 [`TelegramChannel::call`]：POST JSON，解析 `{ok, result}` 外层。
//! Bot API 在业务错误时返回 4xx 且仍带 JSON 外层，因此不以 HTTP 状态判断成败。

mod types;

pub use types::{CallbackQuery, Chat, Contact, Message, Update, User};

use super::{
    BotChannel, ChannelError, ChannelResult, ChatChannel, DeleteOutcome, EditOutcome, Keyboard,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shared::{ChatId, MessageRef};
use std::time::Duration;
use types::ApiEnvelope;

/// 普通请求超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// 长轮询在服务端超时之外额外等待的时间
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

/// Bot API client
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    client: Client,
    /// `{api_url}/bot{token}`
    base_url: String,
}

impl TelegramChannel {
    pub fn new(api_url: &str, token: &str) -> ChannelResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> ChannelResult<T> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope: ApiEnvelope<T> = serde_json::from_str(&text).map_err(|e| {
            ChannelError::InvalidResponse(format!("{method}: HTTP {status}: {e}"))
        })?;

        if !envelope.ok {
            return Err(ChannelError::Api {
                code: envelope.error_code.unwrap_or(status.as_u16() as i64),
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope
            .result
            .ok_or_else(|| ChannelError::InvalidResponse(format!("{method}: missing result")))
    }

    async fn send_with_markup(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<Value>,
    ) -> ChannelResult<MessageRef> {
        let mut body = json!({
            "chat_id": chat.0,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(markup) = markup {
            body["reply_markup"] = markup;
        }
        let message: Message = self.call("sendMessage", &body, REQUEST_TIMEOUT).await?;
        Ok(MessageRef(message.message_id))
    }

    /// 长轮询拉取更新
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> ChannelResult<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let timeout = Duration::from_secs(timeout_secs) + LONG_POLL_GRACE;
        self.call("getUpdates", &body, timeout).await
    }
}

/// Inline keyboard JSON for a set of controls
pub fn inline_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|c| json!({ "text": c.label, "callback_data": c.payload }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// 编辑失败中可恢复的两类
pub fn classify_edit_error(description: &str) -> Option<EditOutcome> {
    let lower = description.to_lowercase();
    if lower.contains("message is not modified") {
        Some(EditOutcome::Unchanged)
    } else if lower.contains("message to edit not found")
        || lower.contains("message_id_invalid")
        || lower.contains("message can't be edited")
    {
        Some(EditOutcome::NotFound)
    } else {
        None
    }
}

pub fn is_delete_not_found(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.contains("message to delete not found")
        || lower.contains("message_id_invalid")
        || lower.contains("message can't be deleted")
}

#[async_trait]
impl ChatChannel for TelegramChannel {
    async fn send(
        &self,
        chat: ChatId,
        text: &str,
        controls: Option<&Keyboard>,
    ) -> ChannelResult<MessageRef> {
        self.send_with_markup(chat, text, controls.map(inline_markup))
            .await
    }

    async fn edit(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
        controls: Option<&Keyboard>,
    ) -> ChannelResult<EditOutcome> {
        let mut body = json!({
            "chat_id": chat.0,
            "message_id": message.0,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(keyboard) = controls {
            body["reply_markup"] = inline_markup(keyboard);
        }

        // 成功时 result 为 Message（或内联消息时为 true）
        match self
            .call::<Value>("editMessageText", &body, REQUEST_TIMEOUT)
            .await
        {
            Ok(_) => Ok(EditOutcome::Edited),
            Err(ChannelError::Api { code, description }) => {
                match classify_edit_error(&description) {
                    Some(outcome) => {
                        tracing::debug!(chat_id = %chat, message_ref = %message, ?outcome, "Edit classified");
                        Ok(outcome)
                    }
                    None => Err(ChannelError::Api { code, description }),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, chat: ChatId, message: MessageRef) -> ChannelResult<DeleteOutcome> {
        let body = json!({ "chat_id": chat.0, "message_id": message.0 });
        match self
            .call::<bool>("deleteMessage", &body, REQUEST_TIMEOUT)
            .await
        {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(ChannelError::Api { description, .. }) if is_delete_not_found(&description) => {
                Ok(DeleteOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BotChannel for TelegramChannel {
    async fn send_contact_request(
        &self,
        chat: ChatId,
        text: &str,
        button_label: &str,
    ) -> ChannelResult<MessageRef> {
        let markup = json!({
            "keyboard": [[{ "text": button_label, "request_contact": true }]],
            "resize_keyboard": true,
            "one_time_keyboard": true,
        });
        self.send_with_markup(chat, text, Some(markup)).await
    }

    async fn send_removing_reply_keyboard(
        &self,
        chat: ChatId,
        text: &str,
    ) -> ChannelResult<MessageRef> {
        self.send_with_markup(chat, text, Some(json!({ "remove_keyboard": true })))
            .await
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> ChannelResult<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = Value::String(text.to_string());
        }
        let _: bool = self
            .call("answerCallbackQuery", &body, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Control;

    #[test]
    fn test_classify_edit_error() {
        assert_eq!(
            classify_edit_error(
                "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
            ),
            Some(EditOutcome::Unchanged)
        );
        assert_eq!(
            classify_edit_error("Bad Request: message to edit not found"),
            Some(EditOutcome::NotFound)
        );
        assert_eq!(
            classify_edit_error("Bad Request: MESSAGE_ID_INVALID"),
            Some(EditOutcome::NotFound)
        );
        assert_eq!(classify_edit_error("Too Many Requests: retry after 5"), None);
    }

    #[test]
    fn test_delete_not_found() {
        assert!(is_delete_not_found("Bad Request: message to delete not found"));
        assert!(!is_delete_not_found("Forbidden: bot was blocked by the user"));
    }

    #[test]
    fn test_inline_markup_layout() {
        let keyboard = Keyboard::new()
            .row(vec![Control::new("№100", "o:1")])
            .row(vec![Control::new("Все", "f:all"), Control::new("Активные", "f:active")]);
        let markup = inline_markup(&keyboard);
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "o:1");
        assert_eq!(rows[1][1]["text"], "Активные");
    }

    #[test]
    fn test_envelope_error_shape() {
        let raw = r#"{"ok":false,"error_code":400,"description":"Bad Request: message to edit not found"}"#;
        let envelope: ApiEnvelope<Value> = serde_json::from_str(raw).unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.error_code, Some(400));
        assert!(envelope.result.is_none());
    }

    #[test]
    fn test_update_parsing() {
        let raw = r#"{
            "update_id": 10,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 5, "first_name": "Анна"},
                "message": {"message_id": 77, "chat": {"id": 5}},
                "data": "o:a"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("o:a"));
        assert_eq!(query.message.unwrap().message_id, 77);
    }
}
