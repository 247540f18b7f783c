//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::{ChainRegistry, TRON_MAINNET_CHAIN_ID};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tron: TronConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// TRON 网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TronConfig {
    pub chain_id: i64,
    /// 主端点在前，备用端点依次排列
    pub rpc_urls: Vec<String>,
}

/// 限流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 同一端点两次请求之间的最小间隔
    pub min_interval_ms: u64,
    /// 命中任一模式的主机才限流
    pub host_patterns: Vec<String>,
}

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// 数据库配置（未配置 url 时使用内存存储）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

pub fn default_tron_rpc_urls() -> Vec<String> {
    vec![
        "https://api.trongrid.io".to_string(),
        "https://tron.drpc.org".to_string(),
        "https://tron-rpc.publicnode.com".to_string(),
    ]
}

impl Default for TronConfig {
    fn default() -> Self {
        Self {
            chain_id: std::env::var("TRON_CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(TRON_MAINNET_CHAIN_ID),
            rpc_urls: env_list("TRON_RPC_URLS")
                .filter(|urls| !urls.is_empty())
                .unwrap_or_else(default_tron_rpc_urls),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            // 15 req/s 上限，留出余量
            min_interval_ms: std::env::var("RATE_LIMIT_MIN_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(70),
            host_patterns: env_list("RATE_LIMITED_HOST_PATTERNS")
                .unwrap_or_else(|| vec!["quiknode.pro".to_string()]),
        }
    }
}

impl RateLimitConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            connect_timeout_secs: std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").ok(),
            max_connections: std::env::var("DB_MAX_CONNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
            min_connections: std::env::var("DB_MIN_CONNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            acquire_timeout_secs: std::env::var("DB_ACQ_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tron: TronConfig::default(),
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置（缺省的段落取环境变量默认值）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !ChainRegistry::new().is_tron_chain(self.tron.chain_id) {
            anyhow::bail!(
                "TRON_CHAIN_ID {} is not a registered TRON network",
                self.tron.chain_id
            );
        }

        if self.tron.rpc_urls.is_empty() {
            anyhow::bail!("TRON_RPC_URLS must contain at least one endpoint");
        }
        for url in &self.tron.rpc_urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("TRON endpoint must be an http(s) URL: {}", url);
            }
        }

        if self.http.timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be greater than 0");
        }

        if let Some(url) = &self.database.url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://");
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
