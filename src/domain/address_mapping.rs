//! 跨链地址映射模型
//!
//! 一个基础（EVM 风格）钱包地址在某条链上对应的原生地址。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 规范化钱包地址：带 0x 前缀的地址转小写，其它格式保持原样
pub fn normalize_wallet_address(address: &str) -> String {
    if address.starts_with("0x") || address.starts_with("0X") {
        address.to_lowercase()
    } else {
        address.to_string()
    }
}

/// 映射的结构化复合键 (wallet_address, chain_id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingKey {
    pub wallet_address: String,
    pub chain_id: i64,
}

impl MappingKey {
    pub fn new(wallet_address: impl Into<String>, chain_id: i64) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            chain_id,
        }
    }

    /// 同一 (钱包, 链) 的规范键
    pub fn normalized(&self) -> Self {
        Self {
            wallet_address: normalize_wallet_address(&self.wallet_address),
            chain_id: self.chain_id,
        }
    }

    pub fn is_normalized(&self) -> bool {
        normalize_wallet_address(&self.wallet_address) == self.wallet_address
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.wallet_address, self.chain_id)
    }
}

/// 地址映射记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMapping {
    pub wallet_address: String,
    pub chain_id: i64,
    pub network_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AddressMapping {
    pub fn new(key: &MappingKey, network_address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            wallet_address: key.wallet_address.clone(),
            chain_id: key.chain_id,
            network_address: network_address.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> MappingKey {
        MappingKey::new(self.wallet_address.clone(), self.chain_id)
    }
}

/// 映射查询结果
///
/// `Absent` 表示从未派生，`Unavailable` 表示存储层出错；调用方自行决定降级或上报。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingLookup {
    Found(String),
    Absent,
    Unavailable(String),
}

impl MappingLookup {
    pub fn found(self) -> Option<String> {
        match self {
            MappingLookup::Found(address) => Some(address),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, MappingLookup::Found(_))
    }
}

/// 迁移跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationSkipReason {
    /// 旧键与规范键相同
    SameKey,
    /// 规范键记录已存在
    AlreadyNormalized,
    /// 旧键记录不存在
    SourceMissing,
}

/// 迁移结果（跳过不是错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated,
    Skipped(MigrationSkipReason),
}
