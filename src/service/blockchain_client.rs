// 区块链客户端服务 - TRON 节点广播与余额查询
// 广播与查询都经由 EndpointSelector：按顺序故障转移，限流端点自动排队

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::tron::decode_node_message;
use crate::error::{Result, WalletError};
use crate::infrastructure::log_redact::redact_address;
use crate::infrastructure::rpc_selector::{EndpointAttemptError, EndpointSelector};
use crate::service::transaction_signer::SignedTransaction;
use crate::utils::address_validator::AddressValidator;

/// `/wallet/broadcasttransaction` 应答
///
/// 节点版本不同，字段名也不同：
/// - 交易 ID：`txid` 优先，其次 `txID`
/// - 错误信息：`Error` 优先，其次 `message`（可能是十六进制 UTF-8）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BroadcastResponse {
    #[serde(default)]
    pub result: bool,
    pub txid: Option<String>,
    #[serde(rename = "txID")]
    pub tx_id_alt: Option<String>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
    pub message: Option<String>,
    pub code: Option<String>,
}

impl BroadcastResponse {
    pub fn tx_id(&self) -> Option<&str> {
        self.txid
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.tx_id_alt.as_deref().filter(|id| !id.is_empty()))
    }

    /// 解码后的错误信息；都没有时退回错误码
    pub fn error_message(&self) -> String {
        self.error
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| self.message.as_deref().filter(|m| !m.is_empty()))
            .map(decode_node_message)
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "broadcast rejected without message".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    data: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
struct AccountEntry {
    balance: Option<u64>,
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// 广播已签名交易，返回交易 ID
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String>;
}

pub struct TronBlockchainClient {
    selector: Arc<EndpointSelector>,
}

impl TronBlockchainClient {
    pub fn new(selector: Arc<EndpointSelector>) -> Self {
        Self { selector }
    }

    /// 查询 TRX 余额（单位 SUN）
    ///
    /// 账户不存在（`data` 为空）时余额为 0；所有端点失败时返回错误而不是 0
    pub async fn get_balance(&self, address: &str) -> Result<u64> {
        if !AddressValidator::validate_tron_address(address) {
            return Err(WalletError::invalid_address(address));
        }

        let selector = &self.selector;
        let path = format!("/v1/accounts/{}", address);
        let path = path.as_str();

        let balance = selector
            .for_each_endpoint("get_balance", |base| async move {
                selector
                    .get_json::<AccountsResponse>(&base, path)
                    .await
                    .map(|response| {
                        response
                            .data
                            .first()
                            .and_then(|account| account.balance)
                            .unwrap_or(0)
                    })
            })
            .await?;

        tracing::debug!(
            address = %redact_address(address),
            balance_sun = balance,
            "balance fetched"
        );
        Ok(balance)
    }
}

#[async_trait]
impl Broadcaster for TronBlockchainClient {
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        let selector = &self.selector;
        let payload = &signed.payload;

        let outcome = selector
            .for_each_endpoint("broadcasttransaction", |base| async move {
                let response: BroadcastResponse = selector
                    .post_json(&base, "/wallet/broadcasttransaction", payload)
                    .await?;
                if response.result {
                    Ok(response)
                } else {
                    Err(EndpointAttemptError::Rejected(response.error_message()))
                }
            })
            .await;

        match outcome {
            Ok(response) => {
                let tx_id = response
                    .tx_id()
                    .map(str::to_string)
                    .unwrap_or_else(|| signed.tx_id.clone());
                tracing::info!(tx_id = %tx_id, "transaction broadcast accepted");
                Ok(tx_id)
            }
            Err(exhausted) => {
                let message = match exhausted.last_error {
                    Some(EndpointAttemptError::Rejected(message)) => message,
                    Some(other) => other.to_string(),
                    None => "no endpoints configured".to_string(),
                };
                Err(WalletError::BroadcastFailed { message })
            }
        }
    }
}
