//! 钱包领域模型
//! 只包含公开信息；助记词通过认证门面按需获取

use serde::{Deserialize, Serialize};

/// 钱包类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// 助记词派生（可派生任意 coin type）
    Hd,
    /// 导入的单个私钥
    Imported,
    /// 只读观察钱包
    Watch,
}

impl WalletType {
    pub fn can_derive_keys(&self) -> bool {
        matches!(self, WalletType::Hd)
    }
}

/// 钱包（基础地址为 EVM 风格地址）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub name: String,
    pub wallet_type: WalletType,
}

impl Wallet {
    pub fn hd(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            wallet_type: WalletType::Hd,
        }
    }
}

/// 展示用的网络钱包条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkWallet {
    pub name: String,
    /// 该网络上的地址
    pub address: String,
    pub chain_id: i64,
    /// 余额显示符号
    pub balance_symbol: String,
    /// 派生条目的来源钱包地址
    pub origin_address: Option<String>,
    pub wallet_type: WalletType,
}

impl NetworkWallet {
    pub fn is_derived(&self) -> bool {
        self.origin_address.is_some()
    }
}
