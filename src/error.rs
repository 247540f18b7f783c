//! 统一错误类型
//!
//! 所有对外操作返回 `WalletError`；仓储层与配置加载内部使用 `anyhow`，
//! 在服务边界转换。

use std::fmt;

use thiserror::Error;

/// 稳定的错误码（日志、上层展示使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletErrorCode {
    InvalidAddress,
    InvalidAmount,
    InvalidMnemonic,
    ChainNotSupported,
    KeyDerivationUnsupported,
    KeyDerivationFailed,
    BlockFetchFailed,
    AllEndpointsFailed,
    BroadcastFailed,
    SigningFailed,
    StorageError,
    AuthenticationFailed,
    Cancelled,
    ConfigError,
}

impl WalletErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletErrorCode::InvalidAddress => "invalid_address",
            WalletErrorCode::InvalidAmount => "invalid_amount",
            WalletErrorCode::InvalidMnemonic => "invalid_mnemonic",
            WalletErrorCode::ChainNotSupported => "chain_not_supported",
            WalletErrorCode::KeyDerivationUnsupported => "key_derivation_unsupported",
            WalletErrorCode::KeyDerivationFailed => "key_derivation_failed",
            WalletErrorCode::BlockFetchFailed => "block_fetch_failed",
            WalletErrorCode::AllEndpointsFailed => "all_endpoints_failed",
            WalletErrorCode::BroadcastFailed => "broadcast_failed",
            WalletErrorCode::SigningFailed => "signing_failed",
            WalletErrorCode::StorageError => "storage_error",
            WalletErrorCode::AuthenticationFailed => "authentication_failed",
            WalletErrorCode::Cancelled => "cancelled",
            WalletErrorCode::ConfigError => "config_error",
        }
    }
}

impl fmt::Display for WalletErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 钱包核心错误
#[derive(Debug, Error)]
pub enum WalletError {
    /// 地址格式校验失败（前缀、长度或字符集）
    #[error("invalid address: {address}")]
    InvalidAddress { address: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("chain not supported: {0}")]
    ChainNotSupported(i64),

    /// 派生引擎不支持该 coin type / 钱包类型（能力缺失，不是瞬时故障）
    #[error("key derivation unsupported: {0}")]
    KeyDerivationUnsupported(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("failed to fetch latest block: {last_error}")]
    BlockFetch { last_error: String },

    #[error("all {attempts} endpoints failed for {operation}: {last_error}")]
    AllEndpointsFailed {
        operation: String,
        attempts: usize,
        last_error: String,
    },

    /// 节点明确拒绝了已签名交易
    #[error("broadcast failed: {message}")]
    BroadcastFailed { message: String },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = WalletError> = std::result::Result<T, E>;

impl WalletError {
    pub fn invalid_address(address: impl Into<String>) -> Self {
        WalletError::InvalidAddress {
            address: address.into(),
        }
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        WalletError::Storage(err.to_string())
    }

    pub fn code(&self) -> WalletErrorCode {
        match self {
            WalletError::InvalidAddress { .. } => WalletErrorCode::InvalidAddress,
            WalletError::InvalidAmount(_) => WalletErrorCode::InvalidAmount,
            WalletError::InvalidMnemonic(_) => WalletErrorCode::InvalidMnemonic,
            WalletError::ChainNotSupported(_) => WalletErrorCode::ChainNotSupported,
            WalletError::KeyDerivationUnsupported(_) => WalletErrorCode::KeyDerivationUnsupported,
            WalletError::KeyDerivation(_) => WalletErrorCode::KeyDerivationFailed,
            WalletError::BlockFetch { .. } => WalletErrorCode::BlockFetchFailed,
            WalletError::AllEndpointsFailed { .. } => WalletErrorCode::AllEndpointsFailed,
            WalletError::BroadcastFailed { .. } => WalletErrorCode::BroadcastFailed,
            WalletError::Signing(_) => WalletErrorCode::SigningFailed,
            WalletError::Storage(_) => WalletErrorCode::StorageError,
            WalletError::Authentication(_) => WalletErrorCode::AuthenticationFailed,
            WalletError::Cancelled => WalletErrorCode::Cancelled,
            WalletError::Config(_) => WalletErrorCode::ConfigError,
        }
    }

    /// 每种失败只对应一条用户可读消息
    pub fn user_message(&self) -> String {
        match self {
            WalletError::InvalidAddress { .. } => {
                "The address is not valid for this network.".to_string()
            }
            WalletError::InvalidAmount(_) => "The amount is not valid.".to_string(),
            WalletError::InvalidMnemonic(_) => "The recovery phrase is not valid.".to_string(),
            WalletError::ChainNotSupported(_) => "This network is not supported.".to_string(),
            WalletError::KeyDerivationUnsupported(_) => {
                "This wallet cannot sign for this network.".to_string()
            }
            WalletError::KeyDerivation(_) | WalletError::Signing(_) => {
                "The transaction could not be signed.".to_string()
            }
            WalletError::BlockFetch { .. } | WalletError::AllEndpointsFailed { .. } => {
                "The network is temporarily unavailable, please try again later.".to_string()
            }
            WalletError::BroadcastFailed { message } => {
                format!("The network rejected the transaction: {}", message)
            }
            WalletError::Storage(_) => {
                "Wallet data is temporarily unavailable, please try again later.".to_string()
            }
            WalletError::Authentication(_) => "Authentication failed.".to_string(),
            WalletError::Cancelled => "The operation was cancelled.".to_string(),
            WalletError::Config(_) => "The wallet is not configured correctly.".to_string(),
        }
    }

    /// 是否属于网络瞬时故障
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WalletError::BlockFetch { .. } | WalletError::AllEndpointsFailed { .. }
        )
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Signing(format!("malformed transaction payload: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            WalletError::invalid_address("Tx").code().as_str(),
            "invalid_address"
        );
        assert_eq!(
            WalletError::BroadcastFailed {
                message: "bandwidth exceeded".into()
            }
            .code(),
            WalletErrorCode::BroadcastFailed
        );
        assert_eq!(WalletError::Cancelled.code().to_string(), "cancelled");
    }

    #[test]
    fn test_user_message_carries_node_reason() {
        let err = WalletError::BroadcastFailed {
            message: "bandwidth exceeded".into(),
        };
        assert!(err.user_message().contains("bandwidth exceeded"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(WalletError::BlockFetch {
            last_error: "timeout".into()
        }
        .is_transient());
        assert!(!WalletError::invalid_address("x").is_transient());
        assert!(!WalletError::KeyDerivationUnsupported("coin 0".into()).is_transient());
    }
}
