//! 测试替身：可编排的订单来源、账户解析、会失败的存储与记录调用的聊天通道

use crate::channel::{
    BotChannel, ChannelError, ChannelResult, ChatChannel, DeleteOutcome, EditOutcome, Keyboard,
};
use crate::source::{AccountResolver, OrderSource, ResolvedAccount, SourceError};
use crate::store::{
    AccountBinding, AccountDirectory, OrderSnapshot, PostedMessage, RedbStore, SnapshotStore,
    StorageError, StorageResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{AccountId, ChatId, LineItem, MessageRef, OrderRecord};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

/// 构造订单：每个状态对应一个行项目
pub fn order(number: &str, paid: bool, statuses: &[&str]) -> OrderRecord {
    OrderRecord {
        number: number.to_string(),
        paid,
        sum: rust_decimal::Decimal::new(150000, 2),
        positions: statuses
            .iter()
            .map(|status| LineItem {
                brand: "Bosch".into(),
                description: "Фильтр масляный".into(),
                status: status.to_string(),
                price_out: "1500".into(),
                quantity: "1".into(),
            })
            .collect(),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeSource {
    /// None = 编排为失败
    responses: Mutex<HashMap<String, Option<Vec<OrderRecord>>>>,
    fetches: Mutex<HashMap<String, usize>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_orders(&self, account_id: &str, orders: Vec<OrderRecord>) {
        self.responses
            .lock()
            .insert(account_id.to_string(), Some(orders));
    }

    pub fn fail(&self, account_id: &str) {
        self.responses.lock().insert(account_id.to_string(), None);
    }

    pub fn fetch_count(&self, account_id: &str) -> usize {
        self.fetches.lock().get(account_id).copied().unwrap_or(0)
    }

    /// 每次拉取前等待，用于观察并发
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// 同时进行中的拉取数的最大值
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderSource for FakeSource {
    async fn fetch(&self, account_id: &str) -> Result<Vec<OrderRecord>, SourceError> {
        *self
            .fetches
            .lock()
            .entry(account_id.to_string())
            .or_default() += 1;

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.responses.lock().get(account_id) {
            Some(Some(orders)) => Ok(orders.clone()),
            Some(None) => Err(SourceError::Transport("scripted failure".into())),
            None => Ok(Vec::new()),
        }
    }
}

/// 手机号 → 账户的固定映射
#[derive(Default)]
pub struct FakeResolver {
    accounts: Mutex<HashMap<String, ResolvedAccount>>,
    failing: AtomicBool,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, phone: &str, account_id: &str, name: &str) {
        self.accounts.lock().insert(
            phone.to_string(),
            ResolvedAccount {
                account_id: account_id.to_string(),
                name: name.to_string(),
                balance: "0.00".into(),
                debt: "0.00".into(),
            },
        );
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountResolver for FakeResolver {
    async fn resolve_phone(&self, phone: &str) -> Result<Option<ResolvedAccount>, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Status { status: 503 });
        }
        Ok(self.accounts.lock().get(phone).cloned())
    }
}

/// 内存 redb 之上的存储，可编排写入失败
pub struct FailingStore {
    inner: RedbStore,
    fail_writes: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: RedbStore::open_in_memory().expect("in-memory store"),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Storage(redb::StorageError::Io(
                std::io::Error::other("disk full"),
            )));
        }
        Ok(())
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for FailingStore {
    fn get_snapshot(&self, order_id: &str) -> StorageResult<Option<OrderSnapshot>> {
        self.inner.get_snapshot(order_id)
    }

    fn upsert(
        &self,
        order_id: &str,
        account_id: &str,
        fingerprint: &str,
        message_ref: Option<PostedMessage>,
    ) -> StorageResult<()> {
        self.check_write()?;
        self.inner
            .upsert(order_id, account_id, fingerprint, message_ref)
    }

    fn list_snapshots(&self, account_id: &str) -> StorageResult<Vec<OrderSnapshot>> {
        self.inner.list_snapshots(account_id)
    }

    fn clear_message_ref(&self, order_id: &str) -> StorageResult<()> {
        self.check_write()?;
        self.inner.clear_message_ref(order_id)
    }
}

impl AccountDirectory for FailingStore {
    fn bind(
        &self,
        chat: ChatId,
        phone: &str,
        account_id: &str,
    ) -> StorageResult<Option<AccountBinding>> {
        self.check_write()?;
        self.inner.bind(chat, phone, account_id)
    }

    fn account_for_chat(&self, chat: ChatId) -> StorageResult<Option<AccountId>> {
        self.inner.account_for_chat(chat)
    }

    fn chat_for_account(&self, account_id: &str) -> StorageResult<Option<ChatId>> {
        self.inner.chat_for_account(account_id)
    }

    fn list_accounts(&self) -> StorageResult<Vec<AccountId>> {
        self.inner.list_accounts()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelCall {
    Send {
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
        message: MessageRef,
    },
    Edit {
        chat: ChatId,
        message: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Delete {
        chat: ChatId,
        message: MessageRef,
    },
    ContactRequest {
        chat: ChatId,
        text: String,
        message: MessageRef,
    },
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ScriptedEdit {
    Outcome(EditOutcome),
    Fail,
}

pub struct RecordingChannel {
    calls: Mutex<Vec<ChannelCall>>,
    edits: Mutex<VecDeque<ScriptedEdit>>,
    /// 已删除或已失效的消息
    gone: Mutex<HashSet<MessageRef>>,
    next_id: AtomicI64,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            edits: Mutex::new(VecDeque::new()),
            gone: Mutex::new(HashSet::new()),
            next_id: AtomicI64::new(1000),
        }
    }

    pub fn script_edit(&self, edit: ScriptedEdit) {
        self.edits.lock().push_back(edit);
    }

    pub fn mark_gone(&self, message: MessageRef) {
        self.gone.lock().insert(message);
    }

    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn sent_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ChannelCall::Send { .. }))
            .count()
    }

    pub fn edit_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ChannelCall::Edit { .. }))
            .count()
    }

    pub fn last_text(&self) -> Option<String> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            ChannelCall::Send { text, .. }
            | ChannelCall::Edit { text, .. }
            | ChannelCall::ContactRequest { text, .. } => Some(text.clone()),
            ChannelCall::Delete { .. } | ChannelCall::AnswerCallback { .. } => None,
        })
    }

    /// 最近一次回调应答的提示
    pub fn last_answer(&self) -> Option<Option<String>> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            ChannelCall::AnswerCallback { text, .. } => Some(text.clone()),
            _ => None,
        })
    }

    fn next_message(&self) -> MessageRef {
        MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatChannel for RecordingChannel {
    async fn send(
        &self,
        chat: ChatId,
        text: &str,
        controls: Option<&Keyboard>,
    ) -> ChannelResult<MessageRef> {
        let message = self.next_message();
        self.calls.lock().push(ChannelCall::Send {
            chat,
            text: text.to_string(),
            keyboard: controls.cloned(),
            message,
        });
        Ok(message)
    }

    async fn edit(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
        controls: Option<&Keyboard>,
    ) -> ChannelResult<EditOutcome> {
        self.calls.lock().push(ChannelCall::Edit {
            chat,
            message,
            text: text.to_string(),
            keyboard: controls.cloned(),
        });
        match self.edits.lock().pop_front() {
            Some(ScriptedEdit::Outcome(outcome)) => Ok(outcome),
            Some(ScriptedEdit::Fail) => Err(ChannelError::Api {
                code: 429,
                description: "Too Many Requests: retry after 5".into(),
            }),
            None if self.gone.lock().contains(&message) => Ok(EditOutcome::NotFound),
            None => Ok(EditOutcome::Edited),
        }
    }

    async fn delete(&self, chat: ChatId, message: MessageRef) -> ChannelResult<DeleteOutcome> {
        self.calls.lock().push(ChannelCall::Delete { chat, message });
        if self.gone.lock().insert(message) {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }
}

#[async_trait]
impl BotChannel for RecordingChannel {
    async fn send_contact_request(
        &self,
        chat: ChatId,
        text: &str,
        _button_label: &str,
    ) -> ChannelResult<MessageRef> {
        let message = self.next_message();
        self.calls.lock().push(ChannelCall::ContactRequest {
            chat,
            text: text.to_string(),
            message,
        });
        Ok(message)
    }

    async fn send_removing_reply_keyboard(
        &self,
        chat: ChatId,
        text: &str,
    ) -> ChannelResult<MessageRef> {
        self.send(chat, text, None).await
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> ChannelResult<()> {
        self.calls.lock().push(ChannelCall::AnswerCallback {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}
