use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::errors::{ClickflowError, Result};

/// 环境变量前缀，例如 CLICKFLOW__WORKER__CONCURRENCY=20
pub const ENV_PREFIX: &str = "CLICKFLOW";

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML + 环境变量加载，启动时使用）
///
/// - server: HTTP 接口监听地址
/// - database: 点击记录存储
/// - redis: 队列与去重共享的 Redis
/// - queue: 队列名称与重试策略
/// - dedup: 去重窗口
/// - worker: 消费者并发与超时
/// - enrichment: GeoIP 数据库
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > TOML 文件 > 默认值
    /// ENV 前缀：CLICKFLOW，分隔符：__
    pub fn load(path: Option<&str>) -> Result<Self> {
        use config::{Config, Environment, File};

        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ClickflowError::config(format!("Failed to build config: {}", e)))?;

        let config: StaticConfig = settings
            .try_deserialize()
            .map_err(|e| ClickflowError::config(format!("Failed to deserialize config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<()> {
        if self.worker.concurrency == 0 {
            return Err(ClickflowError::config("worker.concurrency must be at least 1"));
        }
        if self.dedup.ttl_secs == 0 {
            return Err(ClickflowError::config("dedup.ttl_secs must be at least 1"));
        }
        if self.queue.max_attempts == 0 {
            return Err(ClickflowError::config("queue.max_attempts must be at least 1"));
        }
        if self.worker.job_timeout_secs == 0 {
            return Err(ClickflowError::config("worker.job_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// 跨进程的模式（worker / enqueue / queue-status）需要共享队列
    ///
    /// memory 队列只存在于当前进程，入队的任务没有人消费，worker 也永远等不到任务。
    pub fn require_shared_queue(&self) -> Result<()> {
        if self.queue.backend == StoreBackend::Memory {
            return Err(ClickflowError::config(
                "queue.backend = \"memory\" is process-local; this mode needs queue.backend = \"redis\"",
            ));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClickflowError::serialization(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// HTTP 接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 可信代理（IP 或 CIDR），只有来自这些地址的 X-Forwarded-For 才会被采信
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
}

/// Redis 配置（队列与去重共用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

/// 队列后端类型
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// 队列配置
///
/// 重试、退避与死信都属于队列的职责，消费者本身不做重试。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// 总尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// 单次 reserve 最长等待时间
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// 队列为空时的轮询间隔
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 把到期的延迟任务移回等待队列的间隔
    #[serde(default = "default_promote_interval_ms")]
    pub promote_interval_ms: u64,
}

impl QueueConfig {
    pub fn backoff(&self) -> crate::queue::BackoffPolicy {
        crate::queue::BackoffPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.backoff_base_ms,
            max_delay_ms: self.backoff_max_ms,
        }
    }
}

/// 去重配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// redis：跨进程共享窗口；memory：仅限单进程部署
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 消费者配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// 使用队列 job id 作为幂等键，重复投递不会产生第二条记录
    #[serde(default)]
    pub idempotent_writes: bool,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

/// 富化配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnrichmentConfig {
    /// MaxMindDB 文件路径 (GeoLite2-City.mmdb)
    /// 未配置或不可读时，所有地理字段为 "Unknown"
    #[serde(default)]
    pub maxminddb_path: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    5002
}

fn default_database_url() -> String {
    "sqlite://clickflow.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    8
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_key_prefix() -> String {
    "clickflow:".to_string()
}

fn default_queue_name() -> String {
    "click-events".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_poll_timeout_secs() -> u64 {
    1
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_promote_interval_ms() -> u64 {
    1000
}

fn default_dedup_ttl_secs() -> u64 {
    10
}

fn default_worker_concurrency() -> usize {
    10
}

fn default_job_timeout_secs() -> u64 {
    30
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            name: default_queue_name(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            promote_interval_ms: default_promote_interval_ms(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_worker_concurrency(),
            job_timeout_secs: default_job_timeout_secs(),
            idempotent_writes: false,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
