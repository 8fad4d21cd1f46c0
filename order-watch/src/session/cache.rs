//! 会话缓存
//!
//! 每个聊天一个 [`SessionHandle`]；同一聊天的交互请求通过句柄上的异步互斥锁串行处理。

use super::model::{Rendered, Session};
use crate::channel::ChannelError;
use crate::render;
use crate::source::{OrderSource, SourceError};
use crate::store::StorageError;
use crate::watch::ChangeDetector;
use dashmap::DashMap;
use shared::{ChatId, OrderRecord};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Shared handle to one chat's session slot
pub type SessionHandle = Arc<Mutex<Option<Session>>>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Order source error: {0}")]
    Source(#[from] SourceError),

    /// 聊天尚未绑定账户
    #[error("Chat is not authorized")]
    NotAuthorized,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Result of [`SessionCache::sync`]
#[derive(Debug, Clone)]
pub struct SyncView {
    pub orders: Vec<OrderRecord>,
    pub filtered: Vec<OrderRecord>,
    pub overview: Rendered,
    /// 本次是否重新拉取
    pub fetched: bool,
}

pub struct SessionCache {
    source: Arc<dyn OrderSource>,
    detector: Arc<ChangeDetector>,
    sessions: DashMap<ChatId, SessionHandle>,
}

impl SessionCache {
    pub fn new(source: Arc<dyn OrderSource>, detector: Arc<ChangeDetector>) -> Self {
        Self {
            source,
            detector,
            sessions: DashMap::new(),
        }
    }

    /// 获取（必要时创建）聊天的会话句柄
    pub fn handle(&self, chat: ChatId) -> SessionHandle {
        self.sessions.entry(chat).or_default().clone()
    }

    /// 丢弃会话，返回旧会话供调用方清理消息
    pub async fn discard(&self, chat: ChatId) -> Option<Session> {
        let handle = self.sessions.get(&chat).map(|h| h.clone())?;
        let taken = handle.lock().await.take();
        taken
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ensure the slot holds a session for `account_id`
    ///
    /// `force` 或会话不存在（或属于其它账户）时重新拉取并整体替换；
    /// 拉取失败时旧会话保持不变。拉取到的状态视为用户已看到。
    pub async fn sync(
        &self,
        slot: &mut Option<Session>,
        account_id: &str,
        force: bool,
    ) -> Result<SyncView, SessionError> {
        let stale = slot.as_ref().is_none_or(|s| s.account_id != account_id);
        let fetched = force || stale;

        if fetched {
            let orders = self.source.fetch(account_id).await?;
            self.detector.acknowledge(account_id, &orders);
            let previous = slot.take();
            let session = Session::build(account_id, orders, previous);
            tracing::debug!(
                account_id = %account_id,
                generation = session.generation,
                orders = session.orders.len(),
                "Session synced"
            );
            *slot = Some(session);
        }

        let session = slot.as_ref().ok_or(SessionError::NotAuthorized)?;
        Ok(SyncView {
            orders: session.orders.clone(),
            filtered: session.filtered().into_iter().cloned().collect(),
            overview: render::overview(session, None),
            fetched,
        })
    }
}
