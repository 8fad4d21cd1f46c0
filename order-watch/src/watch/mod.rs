//! 订单状态巡检
//!
//! [`WatchPass`] 是定时任务的一轮：列出已绑定账户 → 检测 → 分发 → 缓存落盘。

pub mod detector;
pub mod dispatcher;

pub use detector::{ChangeDetector, Classification, NotificationAction, PassReport};
pub use dispatcher::{DispatchReport, NotificationDispatcher};

use crate::cache::FingerprintCache;
use crate::core::PeriodicJob;
use crate::store::AccountDirectory;
use async_trait::async_trait;
use std::sync::Arc;

pub struct WatchPass {
    accounts: Arc<dyn AccountDirectory>,
    detector: Arc<ChangeDetector>,
    dispatcher: Arc<NotificationDispatcher>,
    cache: Arc<FingerprintCache>,
}

impl WatchPass {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        detector: Arc<ChangeDetector>,
        dispatcher: Arc<NotificationDispatcher>,
        cache: Arc<FingerprintCache>,
    ) -> Self {
        Self {
            accounts,
            detector,
            dispatcher,
            cache,
        }
    }

    /// 执行一轮并返回统计
    pub async fn run(&self) -> (PassReport, DispatchReport) {
        let accounts = match self.accounts.list_accounts() {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list accounts, skipping watch pass");
                return Default::default();
            }
        };
        if accounts.is_empty() {
            tracing::debug!("No bound accounts, nothing to watch");
            return Default::default();
        }

        let (actions, pass) = self.detector.run_pass(&accounts).await;
        let dispatch = self.dispatcher.dispatch(actions).await;
        self.cache.flush_if_dirty();

        tracing::info!(
            accounts = pass.accounts,
            failed_accounts = pass.failed_accounts,
            orders = pass.orders,
            first_sightings = pass.first_sightings,
            changed = pass.changed,
            delivered = dispatch.delivered(),
            "Watch pass finished"
        );
        (pass, dispatch)
    }
}

#[async_trait]
impl PeriodicJob for WatchPass {
    fn name(&self) -> &'static str {
        "order_watch"
    }

    async fn run_once(&self) {
        self.run().await;
    }
}
