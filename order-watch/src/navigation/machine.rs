//! 导航状态机
//!
//! 状态：`Overview(filter)` / `Detail(order)`，挂在会话上。
//! 每个控件载荷在持有会话锁的情况下处理，渲染结果写到活动消息上。
//!
//! 与已显示内容完全相同的渲染不会再调用通道；通道报告"未修改"也视为成功。

use super::payload::ControlPayload;
use crate::channel::{ChatChannel, DeleteOutcome, EditOutcome};
use crate::render::{self, OfficeAliases};
use crate::session::{FilterMode, Session, SessionCache, SessionError, View};
use crate::store::AccountDirectory;
use shared::{AccountId, ChatId, MessageRef};
use std::sync::Arc;

pub const NOTICE_NOT_FOUND: &str = "⚠️ Заказ не найден. Список обновлён.";
pub const ACK_NOT_FOUND: &str = "Заказ не найден";
pub const ACK_REFRESHED: &str = "Список обновлён";
pub const ACK_CLOSED: &str = "Заказ закрыт или удалён";

/// 处理一个控件后的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavOutcome {
    /// 回调应答的提示文字
    pub ack: Option<String>,
    /// 是否调用了通道写操作
    pub written: bool,
}

impl NavOutcome {
    fn silent(written: bool) -> Self {
        Self { ack: None, written }
    }

    fn with_ack(ack: impl Into<String>, written: bool) -> Self {
        Self {
            ack: Some(ack.into()),
            written,
        }
    }
}

pub struct Navigator {
    sessions: Arc<SessionCache>,
    channel: Arc<dyn ChatChannel>,
    accounts: Arc<dyn AccountDirectory>,
    aliases: Arc<OfficeAliases>,
}

impl Navigator {
    pub fn new(
        sessions: Arc<SessionCache>,
        channel: Arc<dyn ChatChannel>,
        accounts: Arc<dyn AccountDirectory>,
        aliases: Arc<OfficeAliases>,
    ) -> Self {
        Self {
            sessions,
            channel,
            accounts,
            aliases,
        }
    }

    fn account_for(&self, chat: ChatId) -> Result<AccountId, SessionError> {
        self.accounts
            .account_for_chat(chat)?
            .ok_or(SessionError::NotAuthorized)
    }

    /// Force a resync and post a fresh overview message
    ///
    /// 旧的活动消息会被删除（已不存在也可以）。
    pub async fn open(&self, chat: ChatId) -> Result<(), SessionError> {
        let account = self.account_for(chat)?;
        let handle = self.sessions.handle(chat);
        let mut guard = handle.lock().await;
        let slot: &mut Option<Session> = &mut guard;
        self.sessions.sync(slot, &account, true).await?;
        let session = slot.as_mut().ok_or(SessionError::NotAuthorized)?;

        if let Some(previous) = session.active_message_ref.take() {
            session.tracked_message_refs.remove(&previous);
            self.delete_quietly(chat, previous).await;
        }
        session.view = View::Overview;
        session.displayed = None;

        let rendered = render::overview(session, None);
        let message = self
            .channel
            .send(chat, &rendered.text, Some(&rendered.keyboard))
            .await?;
        session.set_active_message(message);
        session.displayed = Some(rendered);

        tracing::info!(chat_id = %chat, account_id = %account, message_ref = %message, "Overview opened");
        Ok(())
    }

    /// Interpret one control payload
    ///
    /// `origin` 为按钮所在的消息；与会话记录不同时以它为新的活动消息。
    pub async fn handle(
        &self,
        chat: ChatId,
        origin: Option<MessageRef>,
        payload: &ControlPayload,
    ) -> Result<NavOutcome, SessionError> {
        let handle = self.sessions.handle(chat);
        let mut guard = handle.lock().await;
        let slot: &mut Option<Session> = &mut guard;

        // 冷会话（例如进程重启后）先强制同步一次
        let (account, synced) = match slot.as_ref() {
            Some(session) => (session.account_id.clone(), false),
            None => {
                let account = self.account_for(chat)?;
                self.sessions.sync(slot, &account, true).await?;
                (account, true)
            }
        };

        if let Some(origin) = origin
            && let Some(session) = slot.as_mut()
            && session.active_message_ref != Some(origin)
        {
            session.set_active_message(origin);
        }

        tracing::debug!(chat_id = %chat, payload = %payload, "Handling control");

        match payload {
            ControlPayload::Select(token) => {
                self.select(chat, slot, &account, token, synced).await
            }
            ControlPayload::Back => {
                let session = slot.as_mut().ok_or(SessionError::NotAuthorized)?;
                session.view = View::Overview;
                let written = self.render(chat, session, None).await?;
                Ok(NavOutcome::silent(written))
            }
            ControlPayload::Refresh => {
                if !synced {
                    self.sessions.sync(slot, &account, true).await?;
                }
                let session = slot.as_mut().ok_or(SessionError::NotAuthorized)?;
                session.view = View::Overview;
                let written = self.render(chat, session, None).await?;
                Ok(NavOutcome::with_ack(ACK_REFRESHED, written))
            }
            ControlPayload::Filter(mode) => {
                let session = slot.as_mut().ok_or(SessionError::NotAuthorized)?;
                self.change_filter(chat, session, *mode).await
            }
            ControlPayload::RefreshOrder(token) => {
                self.refresh_order(chat, slot, &account, token, synced)
                    .await
            }
        }
    }

    async fn select(
        &self,
        chat: ChatId,
        slot: &mut Option<Session>,
        account: &str,
        token: &str,
        synced: bool,
    ) -> Result<NavOutcome, SessionError> {
        let resolve = |slot: &Option<Session>| {
            slot.as_ref()
                .and_then(|s| s.resolve_token(token))
                .map(|o| o.id().to_string())
        };

        let mut resolved = resolve(&*slot);
        if resolved.is_none() && !synced {
            // 令牌失效：只重新同步一次
            tracing::debug!(chat_id = %chat, token = %token, "Token miss, forcing resync");
            self.sessions.sync(slot, account, true).await?;
            resolved = resolve(&*slot);
        }

        let session = slot.as_mut().ok_or(SessionError::NotAuthorized)?;
        match resolved {
            Some(number) => {
                session.view = View::Detail(number);
                let written = self.render(chat, session, None).await?;
                Ok(NavOutcome::silent(written))
            }
            None => {
                session.view = View::Overview;
                let written = self.render(chat, session, Some(NOTICE_NOT_FOUND)).await?;
                Ok(NavOutcome::with_ack(ACK_NOT_FOUND, written))
            }
        }
    }

    async fn change_filter(
        &self,
        chat: ChatId,
        session: &mut Session,
        mode: FilterMode,
    ) -> Result<NavOutcome, SessionError> {
        if session.view == View::Overview && session.active_filter == mode {
            return Ok(NavOutcome::silent(false));
        }
        session.active_filter = mode;
        session.view = View::Overview;
        let written = self.render(chat, session, None).await?;
        Ok(NavOutcome::silent(written))
    }

    async fn refresh_order(
        &self,
        chat: ChatId,
        slot: &mut Option<Session>,
        account: &str,
        token: &str,
        synced: bool,
    ) -> Result<NavOutcome, SessionError> {
        let number = slot
            .as_ref()
            .and_then(|s| s.tokens.number_for(token))
            .map(str::to_string);

        if !synced {
            self.sessions.sync(slot, account, true).await?;
        }
        let session = slot.as_mut().ok_or(SessionError::NotAuthorized)?;

        match number.filter(|n| session.order(n).is_some()) {
            Some(number) => {
                session.view = View::Detail(number);
                let written = self.render(chat, session, None).await?;
                Ok(NavOutcome::silent(written))
            }
            None => {
                session.view = View::Overview;
                let notice = format!("ℹ️ {ACK_CLOSED}.");
                let written = self.render(chat, session, Some(&notice)).await?;
                Ok(NavOutcome::with_ack(ACK_CLOSED, written))
            }
        }
    }

    /// Render the current view onto the active message
    ///
    /// 返回是否调用了通道。
    async fn render(
        &self,
        chat: ChatId,
        session: &mut Session,
        notice: Option<&str>,
    ) -> Result<bool, SessionError> {
        let detail = match &session.view {
            View::Detail(number) => session
                .order(number)
                .map(|order| render::detail(session, order, &self.aliases, notice)),
            View::Overview => None,
        };
        let rendered = match detail {
            Some(rendered) => rendered,
            None => {
                session.view = View::Overview;
                render::overview(session, notice)
            }
        };

        if let Some(active) = session.active_message_ref {
            if session.displayed.as_ref() == Some(&rendered) {
                tracing::debug!(chat_id = %chat, message_ref = %active, "Render unchanged, skipping edit");
                return Ok(false);
            }

            match self
                .channel
                .edit(chat, active, &rendered.text, Some(&rendered.keyboard))
                .await?
            {
                EditOutcome::Edited | EditOutcome::Unchanged => {
                    session.displayed = Some(rendered);
                    return Ok(true);
                }
                EditOutcome::NotFound => {
                    tracing::debug!(chat_id = %chat, message_ref = %active, "Active message gone, sending a new one");
                    session.tracked_message_refs.remove(&active);
                    session.active_message_ref = None;
                }
            }
        }

        let message = self
            .channel
            .send(chat, &rendered.text, Some(&rendered.keyboard))
            .await?;
        session.set_active_message(message);
        session.displayed = Some(rendered);
        Ok(true)
    }

    /// Remember an auxiliary message (e.g. the authorization greeting)
    pub async fn note_menu_message(&self, chat: ChatId, message: MessageRef) {
        let handle = self.sessions.handle(chat);
        let mut guard = handle.lock().await;
        if let Some(session) = guard.as_mut() {
            session.menu_message_ref = Some(message);
            session.track(message);
        }
    }

    /// Drop the session and delete every message it tracked
    ///
    /// 返回实际删除的消息数。
    pub async fn reset(&self, chat: ChatId) -> usize {
        let Some(session) = self.sessions.discard(chat).await else {
            return 0;
        };
        let mut removed = 0;
        for message in session.tracked_message_refs {
            if self.delete_quietly(chat, message).await {
                removed += 1;
            }
        }
        tracing::info!(chat_id = %chat, removed, "Session reset");
        removed
    }

    async fn delete_quietly(&self, chat: ChatId, message: MessageRef) -> bool {
        match self.channel.delete(chat, message).await {
            Ok(DeleteOutcome::Deleted) => true,
            Ok(DeleteOutcome::NotFound) => false,
            Err(e) => {
                tracing::warn!(chat_id = %chat, message_ref = %message, error = %e, "Failed to delete message");
                false
            }
        }
    }
}
