//! TRON 交易构建
//!
//! 交易的线上编码由节点构造（`/wallet/createtransaction`），本模块只取回
//! 节点返回的载荷并校验其中的 `raw_data_hex`，签名只针对这些原始字节。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::tron::{check_transfer_amount, decode_node_message, RefBlockInfo};
use crate::error::{Result, WalletError};
use crate::infrastructure::rpc_selector::{EndpointAttemptError, EndpointSelector};

/// 节点构造的未签名交易
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    payload: Value,
    raw_data: Vec<u8>,
}

impl UnsignedTransaction {
    /// 校验节点返回的载荷；缺少 `raw_data_hex` 视为节点拒绝
    pub fn from_payload(payload: Value) -> std::result::Result<Self, EndpointAttemptError> {
        let raw_data_hex = match payload.get("raw_data_hex").and_then(Value::as_str) {
            Some(hex) if !hex.is_empty() => hex,
            _ => {
                let reason = payload
                    .get("Error")
                    .or_else(|| payload.get("message"))
                    .and_then(Value::as_str)
                    .map(decode_node_message)
                    .unwrap_or_else(|| "response has no raw_data_hex".to_string());
                return Err(EndpointAttemptError::Rejected(reason));
            }
        };

        let raw_data = hex::decode(raw_data_hex)
            .map_err(|e| EndpointAttemptError::Decode(format!("raw_data_hex is not hex: {}", e)))?;

        Ok(Self { payload, raw_data })
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    pub fn raw_data_hex(&self) -> String {
        hex::encode(&self.raw_data)
    }

    /// 节点给出的交易 ID
    pub fn tx_id(&self) -> Option<&str> {
        self.payload
            .get("txID")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    /// 最新区块的引用绑定信息
    async fn latest_block(&self) -> Result<RefBlockInfo>;

    /// 由节点构造 TRX 转账交易（金额单位 SUN）
    async fn create_transaction(
        &self,
        from_address: &str,
        to_address: &str,
        amount_sun: u64,
    ) -> Result<UnsignedTransaction>;
}

#[derive(Debug, Deserialize)]
struct NowBlockResponse {
    #[serde(rename = "blockID")]
    block_id: Option<String>,
    block_header: Option<BlockHeader>,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    raw_data: Option<BlockRawData>,
}

#[derive(Debug, Deserialize)]
struct BlockRawData {
    number: Option<u64>,
}

impl NowBlockResponse {
    fn into_ref_block(self) -> std::result::Result<(u64, RefBlockInfo), EndpointAttemptError> {
        let number = self
            .block_header
            .and_then(|h| h.raw_data)
            .and_then(|r| r.number)
            .ok_or_else(|| {
                EndpointAttemptError::Decode("missing block_header.raw_data.number".to_string())
            })?;
        let block_id = self
            .block_id
            .ok_or_else(|| EndpointAttemptError::Decode("missing blockID".to_string()))?;

        let info = RefBlockInfo::from_block(number, &block_id)
            .map_err(|e| EndpointAttemptError::Decode(e.to_string()))?;
        Ok((number, info))
    }
}

pub struct TronTransactionBuilder {
    selector: Arc<EndpointSelector>,
}

impl TronTransactionBuilder {
    pub fn new(selector: Arc<EndpointSelector>) -> Self {
        Self { selector }
    }

    /// 单个端点上的 getnowblock
    pub async fn latest_block_from(
        &self,
        base_url: &str,
    ) -> std::result::Result<(u64, RefBlockInfo), EndpointAttemptError> {
        let response: NowBlockResponse = self
            .selector
            .post_json(base_url, "/wallet/getnowblock", &json!({}))
            .await?;
        response.into_ref_block()
    }
}

#[async_trait]
impl TransactionBuilder for TronTransactionBuilder {
    async fn latest_block(&self) -> Result<RefBlockInfo> {
        let (number, info) = self
            .selector
            .for_each_endpoint("getnowblock", |base| async move {
                self.latest_block_from(&base).await
            })
            .await
            .map_err(|exhausted| WalletError::BlockFetch {
                last_error: exhausted.last_error_message(),
            })?;

        tracing::debug!(
            block_number = number,
            ref_block_bytes = %info.ref_block_bytes_hex(),
            ref_block_hash = %info.ref_block_hash_hex(),
            "latest block retrieved"
        );
        Ok(info)
    }

    async fn create_transaction(
        &self,
        from_address: &str,
        to_address: &str,
        amount_sun: u64,
    ) -> Result<UnsignedTransaction> {
        check_transfer_amount(amount_sun)?;

        // visible=true：地址以 Base58 形式提交
        let body = json!({
            "owner_address": from_address,
            "to_address": to_address,
            "amount": amount_sun,
            "visible": true,
        });
        let selector = &self.selector;
        let body = &body;

        let unsigned = selector
            .for_each_endpoint("createtransaction", |base| async move {
                let payload: Value = selector
                    .post_json(&base, "/wallet/createtransaction", body)
                    .await?;
                UnsignedTransaction::from_payload(payload)
            })
            .await?;

        tracing::debug!(
            tx_id = unsigned.tx_id().unwrap_or("-"),
            raw_data_len = unsigned.raw_data().len(),
            "transaction created by node"
        );
        Ok(unsigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_transaction_requires_raw_data_hex() {
        let err = UnsignedTransaction::from_payload(json!({"txID": "aa"})).unwrap_err();
        assert_eq!(
            err,
            EndpointAttemptError::Rejected("response has no raw_data_hex".into())
        );

        let err = UnsignedTransaction::from_payload(json!({
            "Error": hex::encode("account does not exist")
        }))
        .unwrap_err();
        assert_eq!(
            err,
            EndpointAttemptError::Rejected("account does not exist".into())
        );

        assert!(matches!(
            UnsignedTransaction::from_payload(json!({"raw_data_hex": "xyz"})).unwrap_err(),
            EndpointAttemptError::Decode(_)
        ));
    }

    #[test]
    fn test_unsigned_transaction_accessors() {
        let tx = UnsignedTransaction::from_payload(json!({
            "txID": "abc",
            "raw_data": {"ref_block_bytes": "b2c3"},
            "raw_data_hex": "0A02B2C3",
        }))
        .unwrap();

        assert_eq!(tx.raw_data(), &[0x0a, 0x02, 0xb2, 0xc3]);
        assert_eq!(tx.raw_data_hex(), "0a02b2c3");
        assert_eq!(tx.tx_id(), Some("abc"));
    }

    #[test]
    fn test_now_block_parsing() {
        let response: NowBlockResponse = serde_json::from_value(json!({
            "blockID": "0000000003a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b",
            "block_header": {"raw_data": {"number": 61_000_387u64, "timestamp": 1}}
        }))
        .unwrap();
        let (number, info) = response.into_ref_block().unwrap();
        assert_eq!(number, 61_000_387);
        assert_eq!(info.ref_block_hash_hex(), "d4e5f60718293a4b");

        let missing: NowBlockResponse =
            serde_json::from_value(json!({"blockID": "00"})).unwrap();
        assert!(matches!(
            missing.into_ref_block().unwrap_err(),
            EndpointAttemptError::Decode(_)
        ));
    }
}
