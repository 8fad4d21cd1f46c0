//! 持久化快照存储
//!
//! # 模块结构
//!
//! - [`SnapshotStore`] - 订单快照：最后一次通知的指纹与消息引用
//! - [`AccountDirectory`] - 聊天与远端账户的绑定关系
//! - [`RedbStore`] - 两者的 redb 实现

pub mod redb_store;

use serde::{Deserialize, Serialize};
use shared::{AccountId, ChatId, MessageRef};
use thiserror::Error;

pub use redb_store::RedbStore;

/// A message posted in a chat
///
/// 消息 id 只在所属聊天内有效，必须连同聊天一起保存。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostedMessage {
    pub chat_id: ChatId,
    pub message_ref: MessageRef,
}

impl PostedMessage {
    pub fn new(chat_id: ChatId, message_ref: MessageRef) -> Self {
        Self {
            chat_id,
            message_ref,
        }
    }
}

/// Last accepted state of one order, as communicated to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub account_id: AccountId,
    pub fingerprint: String,
    /// 最近一次通知所在的消息；被显式清除后为 None
    pub message_ref: Option<PostedMessage>,
    /// 毫秒时间戳
    pub updated_at: i64,
}

/// Chat ↔ account binding created by phone authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBinding {
    pub chat_id: ChatId,
    pub phone: String,
    pub account_id: AccountId,
    pub bound_at: i64,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable snapshot store keyed by order id
///
/// 写入为按键 upsert，后写覆盖，不加锁。
pub trait SnapshotStore: Send + Sync {
    fn get_snapshot(&self, order_id: &str) -> StorageResult<Option<OrderSnapshot>>;

    fn get_fingerprint(&self, order_id: &str) -> StorageResult<Option<String>> {
        Ok(self.get_snapshot(order_id)?.map(|s| s.fingerprint))
    }

    fn get_message_ref(&self, order_id: &str) -> StorageResult<Option<PostedMessage>> {
        Ok(self.get_snapshot(order_id)?.and_then(|s| s.message_ref))
    }

    /// `message_ref` 为 None 时保留已有引用
    fn upsert(
        &self,
        order_id: &str,
        account_id: &str,
        fingerprint: &str,
        message_ref: Option<PostedMessage>,
    ) -> StorageResult<()>;

    fn list_snapshots(&self, account_id: &str) -> StorageResult<Vec<OrderSnapshot>>;

    fn clear_message_ref(&self, order_id: &str) -> StorageResult<()>;
}

/// Chat ↔ account directory
pub trait AccountDirectory: Send + Sync {
    /// 绑定聊天到账户，返回该聊天之前的绑定
    ///
    /// 账户此前已绑定过任何聊天（包括本聊天）时，该账户所有快照的消息引用
    /// 在同一事务中清除：旧通知不再被编辑，下一次变化发送新消息。
    fn bind(&self, chat: ChatId, phone: &str, account_id: &str)
    -> StorageResult<Option<AccountBinding>>;

    fn account_for_chat(&self, chat: ChatId) -> StorageResult<Option<AccountId>>;

    /// 多个聊天绑定同一账户时取最近绑定的那个
    fn chat_for_account(&self, account_id: &str) -> StorageResult<Option<ChatId>>;

    /// 去重后的全部已绑定账户
    fn list_accounts(&self) -> StorageResult<Vec<AccountId>>;
}
