//! RPC 端点选择与故障转移
//!
//! 按配置顺序（主端点 → 备用端点）依次尝试，首个成功即返回；
//! 所有端点失败时返回携带最后一次错误的聚合失败。

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::WalletError;
use crate::infrastructure::rate_limiter::EndpointRateLimiter;

/// 错误响应体写入日志前的最大长度
const MAX_ERROR_BODY_LEN: usize = 256;

/// 单个端点的一次失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointAttemptError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
    /// 节点正常应答但拒绝了请求
    #[error("{0}")]
    Rejected(String),
}

impl From<reqwest::Error> for EndpointAttemptError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EndpointAttemptError::Decode(err.to_string())
        } else {
            EndpointAttemptError::Transport(err.to_string())
        }
    }
}

/// 所有端点均失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointsExhausted {
    pub operation: String,
    pub attempts: usize,
    pub last_error: Option<EndpointAttemptError>,
}

impl EndpointsExhausted {
    pub fn last_error_message(&self) -> String {
        match &self.last_error {
            Some(err) => err.to_string(),
            None => "no endpoints configured".to_string(),
        }
    }
}

impl From<EndpointsExhausted> for WalletError {
    fn from(err: EndpointsExhausted) -> Self {
        let last_error = err.last_error_message();
        WalletError::AllEndpointsFailed {
            operation: err.operation,
            attempts: err.attempts,
            last_error,
        }
    }
}

pub struct EndpointSelector {
    endpoints: Vec<String>,
    rate_limiter: Arc<EndpointRateLimiter>,
    http_client: reqwest::Client,
}

impl EndpointSelector {
    pub fn new(
        endpoints: Vec<String>,
        rate_limiter: Arc<EndpointRateLimiter>,
        http_client: reqwest::Client,
    ) -> Result<Self, WalletError> {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(WalletError::Config(
                "at least one RPC endpoint is required".to_string(),
            ));
        }
        Ok(Self {
            endpoints,
            rate_limiter,
            http_client,
        })
    }

    /// 由配置构建（TRON 端点、限流、HTTP 超时）
    pub fn from_config(config: &Config) -> Result<Self, WalletError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http.timeout())
            .connect_timeout(config.http.connect_timeout())
            .build()
            .map_err(|e| WalletError::Config(format!("failed to build HTTP client: {}", e)))?;
        Self::new(
            config.tron.rpc_urls.clone(),
            Arc::new(EndpointRateLimiter::from_config(&config.rate_limit)),
            http_client,
        )
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn rate_limiter(&self) -> &EndpointRateLimiter {
        &self.rate_limiter
    }

    /// 依次对每个端点执行 `attempt`，限流后调用；首个 `Ok` 立即返回
    pub async fn for_each_endpoint<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt: F,
    ) -> Result<T, EndpointsExhausted>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, EndpointAttemptError>>,
    {
        let mut last_error = None;

        for (index, base_url) in self.endpoints.iter().enumerate() {
            self.rate_limiter.acquire(base_url).await;

            match attempt(base_url.clone()).await {
                Ok(value) => {
                    tracing::debug!(
                        operation,
                        endpoint = %base_url,
                        attempt = index + 1,
                        "endpoint call succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    tracing::warn!(
                        operation,
                        endpoint = %base_url,
                        attempt = index + 1,
                        error = %err,
                        "endpoint call failed, trying next"
                    );
                    last_error = Some(err);
                }
            }
        }

        let exhausted = EndpointsExhausted {
            operation: operation.to_string(),
            attempts: self.endpoints.len(),
            last_error,
        };
        tracing::error!(
            operation,
            attempts = exhausted.attempts,
            last_error = %exhausted.last_error_message(),
            "all endpoints failed"
        );
        Err(exhausted)
    }

    /// POST JSON 并解析 JSON 应答
    pub async fn post_json<B, T>(
        &self,
        base_url: &str,
        path: &str,
        body: &B,
    ) -> Result<T, EndpointAttemptError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", base_url, path);
        let response = self.http_client.post(&url).json(body).send().await?;
        read_json(response).await
    }

    /// GET 并解析 JSON 应答
    pub async fn get_json<T>(&self, base_url: &str, path: &str) -> Result<T, EndpointAttemptError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", base_url, path);
        let response = self.http_client.get(&url).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, EndpointAttemptError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(EndpointAttemptError::HttpStatus {
            status: status.as_u16(),
            body: truncate(&text),
        });
    }

    serde_json::from_str(&text)
        .map_err(|e| EndpointAttemptError::Decode(format!("{} (body: {})", e, truncate(&text))))
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
