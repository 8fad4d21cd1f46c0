//! 变更检测
//!
//! 一轮巡检：并发拉取所有账户的订单，结果按账户输入顺序汇回单一路径后
//! 逐个订单分类。分类顺序为 缓存 → 快照库：
//!
//! - 首次出现：写入基线指纹，不通知
//! - 未变化：与缓存或快照一致，必要时刷新缓存
//! - 已变化：产出一个 [`NotificationAction`]，由分发器送达后再落库

use crate::cache::FingerprintCache;
use crate::render::{self, OfficeAliases};
use crate::source::{OrderSource, SourceError};
use crate::store::{PostedMessage, SnapshotStore};
use shared::{AccountId, OrderRecord};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One pending notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub account_id: AccountId,
    pub order_id: String,
    /// 上一次通知所在的消息，优先原地编辑
    pub prior_message_ref: Option<PostedMessage>,
    pub rendered_text: String,
    /// 送达后写入快照的指纹
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    FirstSighting,
    Unchanged,
    Changed(NotificationAction),
    /// 快照库读取失败，本轮跳过
    Skipped,
}

/// 一轮巡检的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub accounts: usize,
    pub failed_accounts: usize,
    pub orders: usize,
    pub first_sightings: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub skipped: usize,
}

pub struct ChangeDetector {
    source: Arc<dyn OrderSource>,
    store: Arc<dyn SnapshotStore>,
    cache: Arc<FingerprintCache>,
    aliases: Arc<OfficeAliases>,
    /// 同时进行的拉取数上限
    concurrency: usize,
}

impl ChangeDetector {
    pub fn new(
        source: Arc<dyn OrderSource>,
        store: Arc<dyn SnapshotStore>,
        cache: Arc<FingerprintCache>,
        aliases: Arc<OfficeAliases>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            store,
            cache,
            aliases,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one polling pass over `accounts`
    ///
    /// 单个账户失败只记录日志，不影响其它账户。
    pub async fn run_pass(&self, accounts: &[AccountId]) -> (Vec<NotificationAction>, PassReport) {
        let mut report = PassReport {
            accounts: accounts.len(),
            ..Default::default()
        };
        let mut actions = Vec::new();

        let fetched = self.fetch_all(accounts).await;
        for (account_id, result) in accounts.iter().zip(fetched) {
            let orders = match result {
                Ok(orders) => orders,
                Err(e) => {
                    report.failed_accounts += 1;
                    tracing::warn!(account_id = %account_id, error = %e, "Order fetch failed, skipping account this pass");
                    continue;
                }
            };

            tracing::debug!(account_id = %account_id, count = orders.len(), "Checking orders");
            for order in &orders {
                report.orders += 1;
                match self.classify(account_id, order) {
                    Classification::FirstSighting => report.first_sightings += 1,
                    Classification::Unchanged => report.unchanged += 1,
                    Classification::Skipped => report.skipped += 1,
                    Classification::Changed(action) => {
                        report.changed += 1;
                        tracing::info!(account_id = %account_id, order_id = %action.order_id, "Order status changed");
                        actions.push(action);
                    }
                }
            }
        }

        (actions, report)
    }

    /// 并发拉取，结果按输入顺序返回
    async fn fetch_all(
        &self,
        accounts: &[AccountId],
    ) -> Vec<Result<Vec<OrderRecord>, SourceError>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, account_id) in accounts.iter().enumerate() {
            let source = self.source.clone();
            let semaphore = semaphore.clone();
            let account_id = account_id.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, source.fetch(&account_id).await)
            });
        }

        let mut results: Vec<Option<Result<Vec<OrderRecord>, SourceError>>> =
            (0..accounts.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Order fetch task failed"),
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(SourceError::Transport("fetch task aborted".into()))))
            .collect()
    }

    /// Classify one order against the cache and the snapshot store
    pub fn classify(&self, account_id: &str, order: &OrderRecord) -> Classification {
        let order_id = order.id();
        let fingerprint = render::fingerprint(order);

        if self.cache.matches(order_id, &fingerprint) {
            return Classification::Unchanged;
        }

        let stored = match self.store.get_snapshot(order_id) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(order_id = %order_id, error = %e, "Snapshot read failed, skipping order");
                return Classification::Skipped;
            }
        };

        match stored {
            None => {
                if self.persist_baseline(account_id, order_id, &fingerprint) {
                    tracing::debug!(order_id = %order_id, "First sighting, baseline stored");
                }
                Classification::FirstSighting
            }
            Some(stored) if stored.fingerprint == fingerprint => {
                self.cache.put(order_id, &fingerprint);
                Classification::Unchanged
            }
            Some(stored) => {
                let card = render::order_card(order, &self.aliases);
                Classification::Changed(NotificationAction {
                    account_id: account_id.to_string(),
                    order_id: order_id.to_string(),
                    prior_message_ref: stored.message_ref,
                    rendered_text: render::notification_text(&card),
                    fingerprint,
                })
            }
        }
    }

    /// Accept the current state of `orders` as already communicated
    ///
    /// 交互式强制同步时调用：用户刚看到的状态不再作为通知重复推送。
    /// 消息引用保持不变。返回写入快照的订单数。
    pub fn acknowledge(&self, account_id: &str, orders: &[OrderRecord]) -> usize {
        let mut written = 0;
        for order in orders {
            let order_id = order.id();
            let fingerprint = render::fingerprint(order);
            if self.cache.matches(order_id, &fingerprint) {
                continue;
            }
            match self.store.get_fingerprint(order_id) {
                Ok(Some(stored)) if stored == fingerprint => {
                    self.cache.put(order_id, &fingerprint);
                }
                Ok(_) => {
                    if self.persist_baseline(account_id, order_id, &fingerprint) {
                        written += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "Snapshot read failed during acknowledge");
                }
            }
        }
        if written > 0 {
            tracing::debug!(account_id = %account_id, written, "Interactive sync acknowledged orders");
        }
        written
    }

    /// 写入指纹（保留消息引用）并刷新缓存；写入失败只记录
    fn persist_baseline(&self, account_id: &str, order_id: &str, fingerprint: &str) -> bool {
        match self.store.upsert(order_id, account_id, fingerprint, None) {
            Ok(()) => {
                self.cache.put(order_id, fingerprint);
                true
            }
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "Failed to persist snapshot");
                false
            }
        }
    }
}
