//! 助记词获取门面
//!
//! 钱包的助记词只能通过认证流程（PIN、生物识别等）取得。调用方把结果
//! 作为 future 的返回值拿到，不经过任何进程级共享回调。

use async_trait::async_trait;

use crate::domain::derivation::MnemonicPhrase;
use crate::domain::wallet::Wallet;
use crate::error::{Result, WalletError};

/// 一次认证请求的上下文
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// 认证会话标识（由上层界面生成）
    pub session_id: Option<String>,
    /// 向用户展示的用途说明
    pub purpose: String,
}

impl AuthContext {
    pub fn new(purpose: impl Into<String>) -> Self {
        Self {
            session_id: None,
            purpose: purpose.into(),
        }
    }
}

/// 认证流程的三种结局
#[derive(Debug)]
pub enum MnemonicOutcome {
    Mnemonic(MnemonicPhrase),
    Failure(String),
    Cancelled,
}

impl MnemonicOutcome {
    pub fn into_result(self) -> Result<MnemonicPhrase> {
        match self {
            MnemonicOutcome::Mnemonic(mnemonic) => Ok(mnemonic),
            MnemonicOutcome::Failure(reason) => Err(WalletError::Authentication(reason)),
            MnemonicOutcome::Cancelled => Err(WalletError::Cancelled),
        }
    }
}

#[async_trait]
pub trait MnemonicProvider: Send + Sync {
    async fn obtain_mnemonic(&self, wallet: &Wallet, auth: &AuthContext) -> MnemonicOutcome;
}
