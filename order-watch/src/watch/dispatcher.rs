//! 通知分发
//!
//! 有旧消息时原地编辑；旧消息已不存在或属于别的聊天则发送新消息。
//! 送达（编辑、未变化或新发送）后写回快照和缓存；其它失败只记录，不排队重试。

use super::detector::NotificationAction;
use crate::cache::FingerprintCache;
use crate::channel::{ChatChannel, EditOutcome};
use crate::store::{AccountDirectory, PostedMessage, SnapshotStore};
use shared::{ChatId, MessageRef};
use std::collections::HashSet;
use std::sync::Arc;

/// 一批通知的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub edited: usize,
    pub unchanged: usize,
    pub sent: usize,
    /// 编辑目标不存在后重新发送
    pub resent: usize,
    pub failed: usize,
    /// 账户没有绑定聊天
    pub unrouted: usize,
    pub duplicates: usize,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.edited + self.unchanged + self.sent + self.resent
    }
}

pub struct NotificationDispatcher {
    channel: Arc<dyn ChatChannel>,
    store: Arc<dyn SnapshotStore>,
    accounts: Arc<dyn AccountDirectory>,
    cache: Arc<FingerprintCache>,
}

impl NotificationDispatcher {
    pub fn new(
        channel: Arc<dyn ChatChannel>,
        store: Arc<dyn SnapshotStore>,
        accounts: Arc<dyn AccountDirectory>,
        cache: Arc<FingerprintCache>,
    ) -> Self {
        Self {
            channel,
            store,
            accounts,
            cache,
        }
    }

    /// Deliver a batch; each order is delivered at most once
    pub async fn dispatch(&self, actions: Vec<NotificationAction>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut seen = HashSet::new();

        for action in actions {
            if !seen.insert(action.order_id.clone()) {
                report.duplicates += 1;
                continue;
            }

            let chat = match self.accounts.chat_for_account(&action.account_id) {
                Ok(Some(chat)) => chat,
                Ok(None) => {
                    report.unrouted += 1;
                    tracing::warn!(account_id = %action.account_id, order_id = %action.order_id, "No chat bound to account, notification dropped");
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(account_id = %action.account_id, error = %e, "Chat lookup failed");
                    continue;
                }
            };

            let Some(message) = self.deliver(chat, &action, &mut report).await else {
                report.failed += 1;
                continue;
            };

            if let Err(e) = self.store.upsert(
                &action.order_id,
                &action.account_id,
                &action.fingerprint,
                Some(message),
            ) {
                // 下一轮可能重复通知
                tracing::error!(order_id = %action.order_id, error = %e, "Failed to persist snapshot after delivery");
                continue;
            }
            self.cache.put(&action.order_id, &action.fingerprint);
        }

        if report != DispatchReport::default() {
            tracing::info!(
                delivered = report.delivered(),
                resent = report.resent,
                failed = report.failed,
                unrouted = report.unrouted,
                "Notifications dispatched"
            );
        }
        report
    }

    async fn deliver(
        &self,
        chat: ChatId,
        action: &NotificationAction,
        report: &mut DispatchReport,
    ) -> Option<PostedMessage> {
        match action.prior_message_ref {
            Some(prior) if prior.chat_id != chat => {
                // 消息 id 按聊天编号，不能拿到别的聊天里编辑
                tracing::debug!(
                    chat_id = %chat,
                    prior_chat_id = %prior.chat_id,
                    order_id = %action.order_id,
                    "Notification routed to another chat, sending a new message"
                );
            }
            Some(prior) => {
                return self.edit_or_resend(chat, prior.message_ref, action, report).await;
            }
            None => {}
        }

        let sent = self.send(chat, action).await?;
        report.sent += 1;
        Some(PostedMessage::new(chat, sent))
    }

    async fn edit_or_resend(
        &self,
        chat: ChatId,
        prior: MessageRef,
        action: &NotificationAction,
        report: &mut DispatchReport,
    ) -> Option<PostedMessage> {
        match self
            .channel
            .edit(chat, prior, &action.rendered_text, None)
            .await
        {
            Ok(EditOutcome::Edited) => {
                report.edited += 1;
                Some(PostedMessage::new(chat, prior))
            }
            Ok(EditOutcome::Unchanged) => {
                report.unchanged += 1;
                Some(PostedMessage::new(chat, prior))
            }
            Ok(EditOutcome::NotFound) => {
                tracing::debug!(chat_id = %chat, order_id = %action.order_id, message_ref = %prior, "Notification message gone, resending");
                let sent = self.send(chat, action).await?;
                report.resent += 1;
                Some(PostedMessage::new(chat, sent))
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat, order_id = %action.order_id, error = %e, "Notification edit failed");
                None
            }
        }
    }

    async fn send(&self, chat: ChatId, action: &NotificationAction) -> Option<MessageRef> {
        match self.channel.send(chat, &action.rendered_text, None).await {
            Ok(message) => {
                tracing::info!(chat_id = %chat, order_id = %action.order_id, message_ref = %message, "Notification sent");
                Some(message)
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat, order_id = %action.order_id, error = %e, "Notification send failed");
                None
            }
        }
    }
}
