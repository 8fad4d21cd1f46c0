//! 定时任务
//!
//! [`PeriodicJob`] 描述"做一轮"，[`PeriodicRunner`] 是唯一的计时实现：
//! 固定初始延迟 → 固定间隔循环 → 响应 shutdown。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// 周期执行的一轮工作
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &'static str;

    /// 执行一轮；内部错误自行记录，不向外传播
    async fn run_once(&self);
}

/// 基于 tokio interval 的定时执行器
pub struct PeriodicRunner {
    job: Arc<dyn PeriodicJob>,
    initial_delay: Duration,
    interval: Duration,
    shutdown: CancellationToken,
}

impl PeriodicRunner {
    pub fn new(
        job: Arc<dyn PeriodicJob>,
        initial_delay: Duration,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            job,
            initial_delay,
            interval,
            shutdown,
        }
    }

    /// 主循环：初始延迟 → 周期触发
    ///
    /// 上一轮未结束时不会启动下一轮，错过的 tick 顺延。
    pub async fn run(self) {
        let name = self.job.name();
        tracing::info!(
            job = name,
            initial_delay_secs = self.initial_delay.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Periodic job started"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.initial_delay) => {}
            _ = self.shutdown.cancelled() => {
                tracing::info!(job = name, "Periodic job cancelled before first run");
                return;
            }
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!(job = name, "Periodic job received shutdown signal");
                    return;
                }
            }

            let started = std::time::Instant::now();
            self.job.run_once().await;
            tracing::debug!(
                job = name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Periodic job round finished"
            );
        }
    }
}
