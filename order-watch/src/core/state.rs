use std::sync::Arc;

use abcp_client::{AbcpClient, ClientConfig};
use anyhow::Context;

use crate::bot::{BotHandlers, BotRuntime};
use crate::cache::FingerprintCache;
use crate::channel::telegram::TelegramChannel;
use crate::core::{BackgroundTasks, Config, PeriodicRunner, TaskKind};
use crate::navigation::Navigator;
use crate::render::OfficeAliases;
use crate::session::SessionCache;
use crate::source::AbcpOrderSource;
use crate::store::RedbStore;
use crate::watch::{ChangeDetector, NotificationDispatcher, WatchPass};

/// 服务状态 - 持有所有组件的共享引用
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | store | 快照与账户绑定 (redb) |
/// | cache | 指纹缓存 (JSON 文件) |
/// | source | 远端订单来源 / 账户查询 |
/// | channel | 聊天通道 |
/// | detector / dispatcher | 巡检与通知分发 |
/// | sessions / navigator | 交互会话与导航 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub store: Arc<RedbStore>,
    pub cache: Arc<FingerprintCache>,
    pub source: Arc<AbcpOrderSource>,
    pub channel: Arc<TelegramChannel>,
    pub aliases: Arc<OfficeAliases>,
    pub detector: Arc<ChangeDetector>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub sessions: Arc<SessionCache>,
    pub navigator: Arc<Navigator>,
}

impl ServerState {
    /// 初始化服务状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/order-watch.redb) 与指纹缓存
    /// 3. 远端来源、聊天通道
    /// 4. 巡检、会话与导航组件
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        config
            .ensure_work_dir_structure()
            .context("Failed to create work directory structure")?;

        let db_path = config.database_path();
        let store = Arc::new(
            RedbStore::open(&db_path)
                .with_context(|| format!("Failed to open database {}", db_path.display()))?,
        );
        let cache = Arc::new(FingerprintCache::load(config.fingerprint_cache_path()));
        let aliases = Arc::new(OfficeAliases::load(&config.office_aliases_path()));

        let client_config = ClientConfig::new(
            config.abcp_users_url.clone(),
            config.abcp_orders_url.clone(),
            config.abcp_login.clone(),
            config.abcp_password.clone(),
        )
        .with_timeouts(config.users_timeout_secs, config.orders_timeout_secs);
        let client = AbcpClient::new(client_config).context("Failed to build ABCP client")?;
        let source = Arc::new(AbcpOrderSource::new(client));

        let channel = Arc::new(
            TelegramChannel::new(&config.telegram_api_url, &config.bot_token)
                .context("Failed to build Telegram channel")?,
        );

        let detector = Arc::new(ChangeDetector::new(
            source.clone(),
            store.clone(),
            cache.clone(),
            aliases.clone(),
            config.fetch_concurrency,
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            channel.clone(),
            store.clone(),
            store.clone(),
            cache.clone(),
        ));
        let sessions = Arc::new(SessionCache::new(source.clone(), detector.clone()));
        let navigator = Arc::new(Navigator::new(
            sessions.clone(),
            channel.clone(),
            store.clone(),
            aliases.clone(),
        ));

        tracing::info!(
            database = %db_path.display(),
            cached_fingerprints = cache.len(),
            "Server state initialized"
        );

        Ok(Self {
            config: config.clone(),
            store,
            cache,
            source,
            channel,
            aliases,
            detector,
            dispatcher,
            sessions,
            navigator,
        })
    }

    /// 启动后台任务
    ///
    /// - 订单状态巡检 (Periodic)
    /// - 聊天更新循环 (Worker)
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let watch = Arc::new(WatchPass::new(
            self.store.clone(),
            self.detector.clone(),
            self.dispatcher.clone(),
            self.cache.clone(),
        ));
        let runner = PeriodicRunner::new(
            watch,
            self.config.poll_initial_delay(),
            self.config.poll_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("order_watch", TaskKind::Periodic, runner.run());

        let handlers = Arc::new(BotHandlers::new(
            self.channel.clone(),
            self.source.clone(),
            self.store.clone(),
            self.navigator.clone(),
        ));
        let bot = BotRuntime::new(
            self.channel.clone(),
            handlers,
            self.config.updates_timeout_secs,
            tasks.shutdown_token(),
        );
        tasks.spawn("bot_updates", TaskKind::Worker, bot.run());
    }
}
