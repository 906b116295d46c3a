use std::path::PathBuf;
use std::time::Duration;

use crate::broadcast::DEFAULT_CHANNEL_CAPACITY;
use crate::orders::{PricingPolicy, RetentionPolicy};

/// 草稿同步配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | DRAFT_DB_FILE | drafts.redb | 草稿数据库文件 (相对 WORK_DIR) |
/// | SYNC_CHANNEL_NAME | pos-draft-orders | 广播通道名称 |
/// | SYNC_CHANNEL_CAPACITY | 1024 | 广播通道容量 |
/// | BROADCAST_ENABLED | true | 是否启用广播 |
/// | PAID_RETENTION_MS | 2000 | 已支付草稿保留时间(毫秒) |
/// | STALE_DRAFT_MAX_AGE_HOURS | 24 | 废弃草稿清理阈值(小时) |
/// | RETENTION_SWEEP_INTERVAL_SECS | 60 | 清理周期(秒) |
/// | CELEBRATION_MS | 3000 | 顾客屏支付动画时长(毫秒) |
/// | TAX_RATE_PERCENT | 0 | 税率(%) |
/// | FINALIZE_API_URL | - | 远程订单 API 地址 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录 (设置后写入按天滚动文件) |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/pos TAX_RATE_PERCENT=12 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放草稿数据库
    pub work_dir: String,
    pub draft_db_file: String,
    pub sync_channel_name: String,
    pub sync_channel_capacity: usize,
    /// 关闭时所有写入仅落库，不广播
    pub broadcast_enabled: bool,
    pub paid_retention_ms: u64,
    pub stale_draft_max_age_hours: u64,
    pub retention_sweep_interval_secs: u64,
    pub celebration_ms: u64,
    pub tax_rate_percent: f64,
    pub finalize_api_url: Option<String>,
    pub log_level: String,
    pub log_dir: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            draft_db_file: std::env::var("DRAFT_DB_FILE").unwrap_or_else(|_| "drafts.redb".into()),
            sync_channel_name: std::env::var("SYNC_CHANNEL_NAME")
                .unwrap_or_else(|_| "pos-draft-orders".into()),
            sync_channel_capacity: env_parse("SYNC_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY),
            broadcast_enabled: env_parse("BROADCAST_ENABLED", true),
            paid_retention_ms: env_parse("PAID_RETENTION_MS", 2000),
            stale_draft_max_age_hours: env_parse("STALE_DRAFT_MAX_AGE_HOURS", 24),
            retention_sweep_interval_secs: env_parse("RETENTION_SWEEP_INTERVAL_SECS", 60),
            celebration_ms: env_parse("CELEBRATION_MS", 3000),
            tax_rate_percent: env_parse("TAX_RATE_PERCENT", 0.0),
            finalize_api_url: env_opt("FINALIZE_API_URL"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env_opt("LOG_DIR"),
        }
    }

    /// 使用自定义工作目录，其他配置取环境变量
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    /// 草稿数据库完整路径
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.draft_db_file)
    }

    pub fn pricing(&self) -> PricingPolicy {
        PricingPolicy::with_tax_rate(self.tax_rate_percent)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            paid_grace: Duration::from_millis(self.paid_retention_ms),
            stale_after: Duration::from_secs(self.stale_draft_max_age_hours * 60 * 60),
            sweep_interval: Duration::from_secs(self.retention_sweep_interval_secs.max(1)),
        }
    }

    pub fn celebration(&self) -> Duration {
        Duration::from_millis(self.celebration_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
