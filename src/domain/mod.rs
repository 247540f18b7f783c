//! Domain 模块
//!
//! 链配置、地址派生、地址映射与 TRON 协议常量

pub mod address_mapping;
pub mod chain_config;
pub mod derivation;
pub mod tron;
pub mod wallet;

// 重新导出常用类型
pub use address_mapping::{
    AddressMapping, MappingKey, MappingLookup, MigrationOutcome, MigrationSkipReason,
};
pub use chain_config::{AddressFamily, ChainConfig, ChainRegistry};
pub use derivation::{Bip44Deriver, CoinDerivation, MnemonicPhrase, SecretKey};
pub use tron::RefBlockInfo;
pub use wallet::{NetworkWallet, Wallet, WalletType};
