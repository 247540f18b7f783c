//! TRON 交易签名
//!
//! 签名对象是节点返回的 `raw_data_hex` 原始字节：
//! SHA-256(raw_data) → secp256k1 可恢复签名 → 65 字节 (r‖s‖v) → Base64

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k256::ecdsa::{RecoveryId, Signature};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::derivation::SecretKey;
use crate::error::{Result, WalletError};
use crate::infrastructure::log_redact::redact_signature;
use crate::service::transaction_builder::UnsignedTransaction;

/// 已签名、可直接广播的交易
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    /// 节点载荷的副本，附加了 `signature` 字段
    pub payload: Value,
    /// Base64 编码的 65 字节签名
    pub signature: String,
    pub tx_id: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TronTransactionSigner;

impl TronTransactionSigner {
    pub fn new() -> Self {
        Self
    }

    /// 对十六进制原始交易签名，返回 Base64 签名
    pub fn sign(&self, raw_data_hex: &str, key: &SecretKey) -> Result<String> {
        let raw_data = hex::decode(raw_data_hex)
            .map_err(|e| WalletError::Signing(format!("raw_data_hex is not hex: {}", e)))?;
        self.sign_bytes(&raw_data, key)
    }

    /// 签名并把签名附加到载荷副本上
    pub fn sign_transaction(
        &self,
        unsigned: &UnsignedTransaction,
        key: &SecretKey,
    ) -> Result<SignedTransaction> {
        let signature = self.sign_bytes(unsigned.raw_data(), key)?;

        let mut payload = unsigned.payload().clone();
        let object = payload.as_object_mut().ok_or_else(|| {
            WalletError::Signing("transaction payload is not a JSON object".to_string())
        })?;
        object.insert(
            "signature".to_string(),
            Value::Array(vec![Value::String(signature.clone())]),
        );

        let tx_id = match unsigned.tx_id() {
            Some(id) => id.to_string(),
            None => hex::encode(Sha256::digest(unsigned.raw_data())),
        };

        tracing::debug!(
            tx_id = %tx_id,
            signature = %redact_signature(&signature),
            "transaction signed"
        );

        Ok(SignedTransaction {
            payload,
            signature,
            tx_id,
        })
    }

    fn sign_bytes(&self, raw_data: &[u8], key: &SecretKey) -> Result<String> {
        let digest = Sha256::digest(raw_data);
        let signing_key = key.signing_key()?;
        let (signature, recovery_id): (Signature, RecoveryId) = signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| WalletError::Signing(e.to_string()))?;

        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte());
        Ok(BASE64.encode(bytes))
    }
}
