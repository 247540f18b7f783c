//! 多链钱包核心
//!
//! 一个助记词 → 各网络地址（EVM / TRON）的派生与映射，
//! 以及 TRON 交易的构建、签名、广播（多端点故障转移 + 限流）

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;
pub mod utils;

pub use error::{Result, WalletError, WalletErrorCode};

// 统一模块导出
pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            AddressFamily, Bip44Deriver, ChainConfig, ChainRegistry, CoinDerivation,
            MappingKey, MappingLookup, MnemonicPhrase, SecretKey, Wallet, WalletType,
        },
        error::{Result, WalletError, WalletErrorCode},
        service::{
            AddressMappingStore, AddressSource, AuthContext, MnemonicOutcome, MnemonicProvider,
            NetworkAddressService, ResolvedAddress, TronTransactionService,
        },
    };
}
