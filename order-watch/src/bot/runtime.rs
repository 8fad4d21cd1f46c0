//! 长轮询更新循环

use super::handlers::BotHandlers;
use crate::channel::telegram::TelegramChannel;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// 连续失败时的等待时间翻倍，封顶 [`MAX_BACKOFF`]
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Update loop worker
///
/// 每个更新在独立任务中处理；同一聊天的请求由会话锁串行化。
pub struct BotRuntime {
    channel: Arc<TelegramChannel>,
    handlers: Arc<BotHandlers>,
    updates_timeout_secs: u64,
    shutdown: CancellationToken,
}

impl BotRuntime {
    pub fn new(
        channel: Arc<TelegramChannel>,
        handlers: Arc<BotHandlers>,
        updates_timeout_secs: u64,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            channel,
            handlers,
            updates_timeout_secs,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(
            timeout_secs = self.updates_timeout_secs,
            "Bot update loop started"
        );
        let mut offset: i64 = 0;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let result = tokio::select! {
                result = self.channel.get_updates(offset, self.updates_timeout_secs) => result,
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Bot update loop received shutdown signal");
                    return;
                }
            };

            match result {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    if !updates.is_empty() {
                        tracing::debug!(count = updates.len(), offset, "Updates received");
                    }
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let handlers = self.handlers.clone();
                        tokio::spawn(async move {
                            handlers.handle_update(update).await;
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_secs = backoff.as_secs(),
                        "Failed to fetch updates"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = self.shutdown.cancelled() => {
                            tracing::info!("Bot update loop received shutdown signal");
                            return;
                        }
                    }
                    backoff = next_backoff(backoff);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(next_backoff(INITIAL_BACKOFF), Duration::from_secs(2));
        assert_eq!(next_backoff(Duration::from_secs(40)), MAX_BACKOFF);
        assert_eq!(next_backoff(MAX_BACKOFF), MAX_BACKOFF);
    }
}
