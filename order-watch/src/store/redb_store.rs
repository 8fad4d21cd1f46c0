//! redb-based snapshot storage
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `snapshots` | `order_id` | `OrderSnapshot` | 最后一次通知的指纹与消息引用 |
//! | `accounts` | `chat_id` | `AccountBinding` | 聊天与账户的绑定 |
//!
//! # Durability
//!
//! redb 默认 `Durability::Immediate`：`commit()` 返回即持久化。

use super::{
    AccountBinding, AccountDirectory, OrderSnapshot, PostedMessage, SnapshotStore, StorageResult,
};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::util::now_millis;
use shared::{AccountId, ChatId};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Table for storing snapshots: key = order_id, value = JSON-serialized OrderSnapshot
const SNAPSHOTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Table for chat bindings: key = chat_id, value = JSON-serialized AccountBinding
const ACCOUNTS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("accounts");

/// Snapshot / account storage backed by redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Create all tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SNAPSHOTS_TABLE)?;
            let _ = write_txn.open_table(ACCOUNTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Snapshot Operations ==========

    /// 快照总数
    pub fn snapshot_count(&self) -> StorageResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SNAPSHOTS_TABLE)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn read_bindings(&self) -> StorageResult<Vec<AccountBinding>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;
        let mut bindings = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let binding: AccountBinding = serde_json::from_slice(value.value())?;
            bindings.push(binding);
        }
        Ok(bindings)
    }
}

impl SnapshotStore for RedbStore {
    fn get_snapshot(&self, order_id: &str) -> StorageResult<Option<OrderSnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SNAPSHOTS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => {
                let snapshot: OrderSnapshot = serde_json::from_slice(value.value())?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn upsert(
        &self,
        order_id: &str,
        account_id: &str,
        fingerprint: &str,
        message_ref: Option<PostedMessage>,
    ) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SNAPSHOTS_TABLE)?;
            let existing_ref = match table.get(order_id)? {
                Some(value) => {
                    let existing: OrderSnapshot = serde_json::from_slice(value.value())?;
                    existing.message_ref
                }
                None => None,
            };

            let snapshot = OrderSnapshot {
                order_id: order_id.to_string(),
                account_id: account_id.to_string(),
                fingerprint: fingerprint.to_string(),
                message_ref: message_ref.or(existing_ref),
                updated_at: now_millis(),
            };
            let bytes = serde_json::to_vec(&snapshot)?;
            table.insert(order_id, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn list_snapshots(&self, account_id: &str) -> StorageResult<Vec<OrderSnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SNAPSHOTS_TABLE)?;

        let mut snapshots = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let snapshot: OrderSnapshot = serde_json::from_slice(value.value())?;
            if snapshot.account_id == account_id {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    fn clear_message_ref(&self, order_id: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SNAPSHOTS_TABLE)?;
            let current = match table.get(order_id)? {
                Some(value) => Some(serde_json::from_slice::<OrderSnapshot>(value.value())?),
                None => None,
            };
            if let Some(mut snapshot) = current
                && snapshot.message_ref.is_some()
            {
                snapshot.message_ref = None;
                snapshot.updated_at = now_millis();
                let bytes = serde_json::to_vec(&snapshot)?;
                table.insert(order_id, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }
}

impl AccountDirectory for RedbStore {
    fn bind(
        &self,
        chat: ChatId,
        phone: &str,
        account_id: &str,
    ) -> StorageResult<Option<AccountBinding>> {
        let txn = self.db.begin_write()?;
        let (previous, account_was_bound) = {
            let mut table = txn.open_table(ACCOUNTS_TABLE)?;
            let mut previous = None;
            let mut account_was_bound = false;
            for entry in table.iter()? {
                let (key, value) = entry?;
                let binding: AccountBinding = serde_json::from_slice(value.value())?;
                account_was_bound |= binding.account_id == account_id;
                if key.value() == chat.0 {
                    previous = Some(binding);
                }
            }

            let binding = AccountBinding {
                chat_id: chat,
                phone: phone.to_string(),
                account_id: account_id.to_string(),
                bound_at: now_millis(),
            };
            let bytes = serde_json::to_vec(&binding)?;
            table.insert(chat.0, bytes.as_slice())?;
            (previous, account_was_bound)
        };

        let mut cleared = 0usize;
        if account_was_bound {
            let mut table = txn.open_table(SNAPSHOTS_TABLE)?;
            let mut stale = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let snapshot: OrderSnapshot = serde_json::from_slice(value.value())?;
                if snapshot.account_id == account_id && snapshot.message_ref.is_some() {
                    stale.push((key.value().to_string(), snapshot));
                }
            }
            for (order_id, mut snapshot) in stale {
                snapshot.message_ref = None;
                snapshot.updated_at = now_millis();
                let bytes = serde_json::to_vec(&snapshot)?;
                table.insert(order_id.as_str(), bytes.as_slice())?;
                cleared += 1;
            }
        }
        txn.commit()?;

        tracing::info!(chat_id = %chat, account_id = %account_id, cleared_message_refs = cleared, "Chat bound to account");
        Ok(previous)
    }

    fn account_for_chat(&self, chat: ChatId) -> StorageResult<Option<AccountId>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;
        match table.get(chat.0)? {
            Some(value) => {
                let binding: AccountBinding = serde_json::from_slice(value.value())?;
                Ok(Some(binding.account_id))
            }
            None => Ok(None),
        }
    }

    fn chat_for_account(&self, account_id: &str) -> StorageResult<Option<ChatId>> {
        Ok(self
            .read_bindings()?
            .into_iter()
            .filter(|b| b.account_id == account_id)
            .max_by_key(|b| (b.bound_at, b.chat_id))
            .map(|b| b.chat_id))
    }

    fn list_accounts(&self) -> StorageResult<Vec<AccountId>> {
        let accounts: BTreeSet<AccountId> = self
            .read_bindings()?
            .into_iter()
            .map(|b| b.account_id)
            .collect();
        Ok(accounts.into_iter().collect())
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MessageRef;

    fn posted(chat: i64, message: i64) -> Option<PostedMessage> {
        Some(PostedMessage::new(ChatId(chat), MessageRef(message)))
    }

    #[test]
    fn test_upsert_preserves_message_ref_when_omitted() {
        let store = RedbStore::open_in_memory().unwrap();
        store.upsert("100", "acc-1", "fp-a", posted(1, 7)).unwrap();
        store.upsert("100", "acc-1", "fp-b", None).unwrap();

        let snapshot = store.get_snapshot("100").unwrap().unwrap();
        assert_eq!(snapshot.fingerprint, "fp-b");
        assert_eq!(snapshot.message_ref, posted(1, 7));

        store.upsert("100", "acc-1", "fp-c", posted(1, 9)).unwrap();
        assert_eq!(store.get_message_ref("100").unwrap(), posted(1, 9));
    }

    #[test]
    fn test_missing_snapshot() {
        let store = RedbStore::open_in_memory().unwrap();
        assert!(store.get_fingerprint("nope").unwrap().is_none());
        assert!(store.get_message_ref("nope").unwrap().is_none());
        // 清除不存在的快照不是错误
        store.clear_message_ref("nope").unwrap();
        assert_eq!(store.snapshot_count().unwrap(), 0);
    }

    #[test]
    fn test_clear_message_ref_keeps_fingerprint() {
        let store = RedbStore::open_in_memory().unwrap();
        store.upsert("100", "acc-1", "fp-a", posted(1, 7)).unwrap();
        store.clear_message_ref("100").unwrap();

        let snapshot = store.get_snapshot("100").unwrap().unwrap();
        assert_eq!(snapshot.fingerprint, "fp-a");
        assert!(snapshot.message_ref.is_none());
    }

    #[test]
    fn test_list_snapshots_by_account() {
        let store = RedbStore::open_in_memory().unwrap();
        store.upsert("100", "acc-1", "a", None).unwrap();
        store.upsert("101", "acc-2", "b", None).unwrap();
        store.upsert("102", "acc-1", "c", None).unwrap();

        let mut ids: Vec<String> = store
            .list_snapshots("acc-1")
            .unwrap()
            .into_iter()
            .map(|s| s.order_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["100", "102"]);
    }

    #[test]
    fn test_bind_returns_previous_binding() {
        let store = RedbStore::open_in_memory().unwrap();
        assert!(store.bind(ChatId(1), "79000000001", "acc-1").unwrap().is_none());

        let previous = store.bind(ChatId(1), "79000000001", "acc-2").unwrap().unwrap();
        assert_eq!(previous.account_id, "acc-1");
        assert_eq!(
            store.account_for_chat(ChatId(1)).unwrap().as_deref(),
            Some("acc-2")
        );
        assert!(store.account_for_chat(ChatId(2)).unwrap().is_none());
    }

    #[test]
    fn test_rebinding_account_clears_message_refs() {
        let store = RedbStore::open_in_memory().unwrap();
        store.bind(ChatId(1), "79000000001", "acc-1").unwrap();
        store.upsert("100", "acc-1", "fp-a", posted(1, 1000)).unwrap();
        store.upsert("200", "acc-2", "fp-b", posted(5, 2000)).unwrap();

        // 同一账户在另一个聊天授权：本聊天之前没有绑定，也要清除
        assert!(store.bind(ChatId(2), "79000000001", "acc-1").unwrap().is_none());
        let snapshot = store.get_snapshot("100").unwrap().unwrap();
        assert!(snapshot.message_ref.is_none());
        assert_eq!(snapshot.fingerprint, "fp-a");
        // 其它账户不受影响
        assert_eq!(store.get_message_ref("200").unwrap(), posted(5, 2000));

        // 同一聊天重新绑定同一账户
        store.upsert("100", "acc-1", "fp-a", posted(2, 1001)).unwrap();
        store.bind(ChatId(2), "79000000001", "acc-1").unwrap();
        assert!(store.get_message_ref("100").unwrap().is_none());
    }

    #[test]
    fn test_first_binding_keeps_message_refs() {
        let store = RedbStore::open_in_memory().unwrap();
        store.upsert("100", "acc-1", "fp-a", posted(1, 1000)).unwrap();
        store.bind(ChatId(1), "79000000001", "acc-1").unwrap();
        assert_eq!(store.get_message_ref("100").unwrap(), posted(1, 1000));
    }

    #[test]
    fn test_chat_for_account_and_list_accounts() {
        let store = RedbStore::open_in_memory().unwrap();
        store.bind(ChatId(1), "79000000001", "acc-1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.bind(ChatId(2), "79000000001", "acc-1").unwrap();
        store.bind(ChatId(3), "79000000003", "acc-3").unwrap();

        assert_eq!(store.chat_for_account("acc-1").unwrap(), Some(ChatId(2)));
        assert_eq!(store.chat_for_account("acc-3").unwrap(), Some(ChatId(3)));
        assert!(store.chat_for_account("acc-9").unwrap().is_none());
        assert_eq!(store.list_accounts().unwrap(), vec!["acc-1", "acc-3"]);
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.upsert("100", "acc-1", "fp", posted(1, 5)).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get_fingerprint("100").unwrap().as_deref(), Some("fp"));
    }
}
