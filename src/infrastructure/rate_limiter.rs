//! 按端点的请求间隔限流
//!
//! 只对主机名命中限流模式的端点生效。每个端点保存“下一个可用时间槽”，
//! 预约时槽位的读-改-写在同一把锁内完成，等待在锁外进行。

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::config::RateLimitConfig;

pub struct EndpointRateLimiter {
    min_interval: Duration,
    host_patterns: Vec<String>,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl EndpointRateLimiter {
    pub fn new(min_interval: Duration, host_patterns: Vec<String>) -> Self {
        Self {
            min_interval,
            host_patterns: host_patterns
                .into_iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            last_request: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.min_interval(), config.host_patterns.clone())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 端点是否属于限流的服务商
    pub fn is_rate_limited(&self, base_url: &str) -> bool {
        if self.min_interval.is_zero() {
            return false;
        }
        let host = reqwest::Url::parse(base_url)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.to_lowercase()))
            .unwrap_or_else(|| base_url.to_lowercase());
        self.host_patterns.iter().any(|p| host.contains(p.as_str()))
    }

    /// 等待直到可以向该端点发出请求，返回实际等待时长
    pub async fn acquire(&self, base_url: &str) -> Duration {
        if !self.is_rate_limited(base_url) {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let slot = {
            let mut last = self.last_request.lock().await;
            let slot = match last.get(base_url) {
                Some(previous) => (*previous + self.min_interval).max(now),
                None => now,
            };
            last.insert(base_url.to_string(), slot);
            slot
        };

        let wait = slot.saturating_duration_since(now);
        if !wait.is_zero() {
            tracing::debug!(
                endpoint = %base_url,
                wait_ms = wait.as_millis() as u64,
                "rate limit: delaying request"
            );
            sleep_until(slot).await;
        }
        wait
    }
}
