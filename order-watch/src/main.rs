use order_watch::{BackgroundTasks, Config, ServerState, cleanup_old_logs, init_logger_with_file};
use std::time::Duration;

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    dotenv::dotenv().ok();

    // 2. 加载并校验配置
    let config = Config::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    config.ensure_work_dir_structure()?;

    // 3. 日志
    let log_dir = config.log_dir();
    init_logger_with_file(Some(&config.log_level), Some(&log_dir));
    match cleanup_old_logs(&log_dir, config.log_retention_days) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "Old log files removed"),
        Err(e) => tracing::warn!(error = %e, "Failed to clean up old logs"),
    }

    tracing::info!(work_dir = %config.work_dir, "Order watch starting...");

    // 4. 组件与后台任务
    let state = ServerState::initialize(&config)?;
    let mut tasks = BackgroundTasks::new();
    state.start_background_tasks(&mut tasks);
    tasks.log_summary();

    // 5. 等待退出信号，期间定时检查后台任务
    let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    health.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = health.tick() => {
                let failed = tasks.check_health();
                if failed > 0 {
                    tracing::error!(failed, "Background tasks are not running");
                }
            }
        }
    }
    tracing::info!("Shutdown signal received");
    tasks.shutdown().await;

    if let Err(e) = state.cache.save() {
        tracing::error!(error = %e, "Failed to save fingerprint cache");
    }
    tracing::info!("Order watch stopped");
    Ok(())
}
