//!
//! 配置模块
//!

use std::fs;
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 10;
pub const DEFAULT_CONNECTION_COUNT: usize = 4;
pub const DEFAULT_RETRY_COUNT: u8 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 单个 chunk 最终失败时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkFailurePolicy {
    /// 取消其余 chunk，返回该错误
    #[default]
    Abort,
    /// 继续下载，返回的文件中记录失败的 chunk
    BestEffort,
}

/// 单个下载器的运行配置，创建后只读
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub chunk_size: NonZeroU64,
    // 同时进行中的 chunk 请求上限
    pub connection_count: NonZeroUsize,
    // 首次请求之外的重试次数
    pub retry_count: u8,
    pub retry_backoff: Duration,
    pub request_timeout: Option<Duration>,
    pub failure_policy: ChunkFailurePolicy,
    pub header_map: HeaderMap,
}

impl DownloadConfig {
    /// 第 `attempt` 次重试前的等待时间，每次翻倍
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(factor)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let mut header_map = HeaderMap::new();
        header_map.insert(ACCEPT, HeaderValue::from_static("*/*"));

        Self {
            chunk_size: NonZeroU64::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroU64::MIN),
            connection_count: NonZeroUsize::new(DEFAULT_CONNECTION_COUNT).unwrap_or(NonZeroUsize::MIN),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            failure_policy: ChunkFailurePolicy::default(),
            header_map,
        }
    }
}

/// 配置文件
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub chunk_size: u64,
    pub max_connections: usize,
    pub retry_times: u8,
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: Option<u64>,
    pub failure_policy: ChunkFailurePolicy,
    pub download_dir: PathBuf,
    pub log_file: Option<String>,
}

impl Config {
    pub fn load_from_file(file_path: &str) -> Result<Self> {
        let config_data = fs::read_to_string(file_path)
            .with_context(|| format!("Read config file failed: {}", file_path))?;
        let config: Config = serde_json::from_str(&config_data)
            .with_context(|| format!("Parse config file failed: {}", file_path))?;

        Ok(config)
    }

    pub fn download_config(&self) -> Result<DownloadConfig> {
        let chunk_size = NonZeroU64::new(self.chunk_size).context("`chunk_size` must be positive")?;
        let connection_count =
            NonZeroUsize::new(self.max_connections).context("`max_connections` must be positive")?;

        Ok(DownloadConfig {
            chunk_size,
            connection_count,
            retry_count: self.retry_times,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            failure_policy: self.failure_policy,
            ..DownloadConfig::default()
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let download_dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_connections: DEFAULT_CONNECTION_COUNT,
            retry_times: DEFAULT_RETRY_COUNT,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF.as_millis() as u64,
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT.as_secs()),
            failure_policy: ChunkFailurePolicy::Abort,
            download_dir,
            log_file: None,
        }
    }
}
