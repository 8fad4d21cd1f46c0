use std::path::PathBuf;
use std::time::Duration;

/// 服务配置 - 所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖（启动时先加载 `.env`）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/order-watch | 工作目录 (数据库、缓存、日志) |
/// | BOT_TOKEN | (必填) | 聊天机器人令牌 |
/// | TELEGRAM_API_URL | https://api.telegram.org | Bot API 地址 |
/// | ABCP_USERS_URL | (必填) | 用户查询接口 |
/// | ABCP_ORDERS_URL | (必填) | 订单查询接口 |
/// | ABCP_LOGIN | (空) | 接口账号 |
/// | ABCP_PASSWORD | (空) | 接口密码 |
/// | USERS_TIMEOUT_SECS | 10 | 用户接口超时(秒) |
/// | ORDERS_TIMEOUT_SECS | 15 | 订单接口超时(秒) |
/// | POLL_INTERVAL_SECS | 120 | 巡检间隔(秒) |
/// | POLL_INITIAL_DELAY_SECS | 10 | 首次巡检延迟(秒) |
/// | FETCH_CONCURRENCY | 4 | 巡检并发拉取数 |
/// | UPDATES_TIMEOUT_SECS | 30 | 长轮询超时(秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_RETENTION_DAYS | 7 | 日志保留天数 |
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    pub bot_token: String,
    pub telegram_api_url: String,
    pub abcp_users_url: String,
    pub abcp_orders_url: String,
    pub abcp_login: String,
    pub abcp_password: String,
    pub users_timeout_secs: u64,
    pub orders_timeout_secs: u64,
    /// 巡检间隔
    pub poll_interval_secs: u64,
    /// 首次巡检延迟
    pub poll_initial_delay_secs: u64,
    /// 巡检时同时拉取的账户数上限
    pub fetch_concurrency: usize,
    pub updates_timeout_secs: u64,
    pub log_level: String,
    pub log_retention_days: u64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: env_or("WORK_DIR", "/var/lib/order-watch"),
            bot_token: env_or("BOT_TOKEN", ""),
            telegram_api_url: env_or("TELEGRAM_API_URL", "https://api.telegram.org"),
            abcp_users_url: env_or("ABCP_USERS_URL", ""),
            abcp_orders_url: env_or("ABCP_ORDERS_URL", ""),
            abcp_login: env_or("ABCP_LOGIN", ""),
            abcp_password: env_or("ABCP_PASSWORD", ""),
            users_timeout_secs: env_parse("USERS_TIMEOUT_SECS", 10),
            orders_timeout_secs: env_parse("ORDERS_TIMEOUT_SECS", 15),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS", 120),
            poll_initial_delay_secs: env_parse("POLL_INITIAL_DELAY_SECS", 10),
            fetch_concurrency: env_parse("FETCH_CONCURRENCY", 4usize).max(1),
            updates_timeout_secs: env_parse("UPDATES_TIMEOUT_SECS", 30),
            log_level: env_or("LOG_LEVEL", "info"),
            log_retention_days: env_parse("LOG_RETENTION_DAYS", 7),
        }
    }

    /// 使用自定义工作目录覆盖配置
    ///
    /// 常用于测试场景
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    /// 检查必填项
    pub fn validate(&self) -> Result<(), String> {
        let missing: Vec<&str> = [
            ("BOT_TOKEN", &self.bot_token),
            ("ABCP_USERS_URL", &self.abcp_users_url),
            ("ABCP_ORDERS_URL", &self.abcp_orders_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("Missing required settings: {}", missing.join(", ")))
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
    }

    /// work_dir/database
    pub fn database_dir(&self) -> PathBuf {
        self.work_dir().join("database")
    }

    /// 快照库路径
    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("order-watch.redb")
    }

    /// 指纹缓存文件
    pub fn fingerprint_cache_path(&self) -> PathBuf {
        self.work_dir().join("status_cache.json")
    }

    /// 网点别名文件 (可选)
    pub fn office_aliases_path(&self) -> PathBuf {
        self.work_dir().join("office_aliases.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.work_dir().join("logs")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn poll_initial_delay(&self) -> Duration {
        Duration::from_secs(self.poll_initial_delay_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config = Config::with_work_dir("/tmp/ow");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/ow/database/order-watch.redb")
        );
        assert_eq!(
            config.fingerprint_cache_path(),
            PathBuf::from("/tmp/ow/status_cache.json")
        );
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/ow/logs"));
    }

    #[test]
    fn test_validate_reports_missing_keys() {
        let mut config = Config::with_work_dir("/tmp/ow");
        config.bot_token = String::new();
        config.abcp_users_url = "https://abcp.example/users".into();
        config.abcp_orders_url = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.contains("BOT_TOKEN"));
        assert!(err.contains("ABCP_ORDERS_URL"));
        assert!(!err.contains("ABCP_USERS_URL"));
    }
}
