//! 测试辅助模块
//! 提供固定助记词、模拟认证门面和指向 mock 节点的服务构建函数

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use multichain_wallet::domain::chain_config::{ChainRegistry, COIN_TYPE_TRON, TRON_MAINNET_CHAIN_ID};
use multichain_wallet::domain::derivation::{Bip44Deriver, CoinDerivation, MnemonicPhrase};
use multichain_wallet::domain::wallet::Wallet;
use multichain_wallet::infrastructure::rate_limiter::EndpointRateLimiter;
use multichain_wallet::infrastructure::rpc_selector::EndpointSelector;
use multichain_wallet::repository::InMemoryAddressMappingRepository;
use multichain_wallet::service::{
    AddressMappingStore, AuthContext, MnemonicOutcome, MnemonicProvider, NetworkAddressService,
    TronTransactionService,
};

/// BIP39 标准测试向量
pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
/// 测试向量对应的 Ethereum 地址 (m/44'/60'/0'/0/0)
pub const TEST_WALLET_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D23EC58E053e11f";
pub const RECIPIENT: &str = "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8";

pub fn test_wallet() -> Wallet {
    Wallet::hd(TEST_WALLET_ADDRESS, "Main")
}

pub fn test_mnemonic() -> MnemonicPhrase {
    MnemonicPhrase::parse(TEST_MNEMONIC).expect("test vector is a valid mnemonic")
}

/// 测试助记词的 TRON 地址 (m/44'/195'/0'/0/0)
pub fn tron_sender() -> String {
    let deriver = Bip44Deriver::new();
    let key = deriver
        .derive_key(&test_mnemonic(), COIN_TYPE_TRON)
        .expect("derive TRON key");
    deriver
        .derive_address(COIN_TYPE_TRON, &key)
        .expect("derive TRON address")
}

/// 认证门面的三种结局
pub enum ProviderBehaviour {
    Succeed,
    Fail(&'static str),
    Cancel,
}

pub struct StaticMnemonicProvider {
    behaviour: ProviderBehaviour,
    calls: AtomicUsize,
}

impl StaticMnemonicProvider {
    pub fn new(behaviour: ProviderBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MnemonicProvider for StaticMnemonicProvider {
    async fn obtain_mnemonic(&self, _wallet: &Wallet, _auth: &AuthContext) -> MnemonicOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            ProviderBehaviour::Succeed => MnemonicOutcome::Mnemonic(test_mnemonic()),
            ProviderBehaviour::Fail(reason) => MnemonicOutcome::Failure(reason.to_string()),
            ProviderBehaviour::Cancel => MnemonicOutcome::Cancelled,
        }
    }
}

/// 指向给定节点地址的端点选择器（不限流）
pub fn selector_for(base_urls: &[String]) -> Arc<EndpointSelector> {
    Arc::new(
        EndpointSelector::new(
            base_urls.to_vec(),
            Arc::new(EndpointRateLimiter::new(Duration::ZERO, vec![])),
            reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("build HTTP client"),
        )
        .expect("at least one endpoint"),
    )
}

pub fn tron_service(base_urls: &[String]) -> TronTransactionService {
    TronTransactionService::new(selector_for(base_urls), Arc::new(Bip44Deriver::new()))
}

/// 基于内存存储的网络地址服务
pub fn address_service() -> (NetworkAddressService, Arc<InMemoryAddressMappingRepository>) {
    let repo = Arc::new(InMemoryAddressMappingRepository::new());
    let registry = Arc::new(ChainRegistry::new());
    let store = Arc::new(AddressMappingStore::new(repo.clone(), registry.clone()));
    let service = NetworkAddressService::new(
        store,
        Arc::new(Bip44Deriver::new()),
        registry,
        TRON_MAINNET_CHAIN_ID,
    );
    (service, repo)
}

/// getnowblock 的典型应答
pub fn now_block_body() -> serde_json::Value {
    serde_json::json!({
        "blockID": "0000000003a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b",
        "block_header": {
            "raw_data": {
                "number": 61_000_387u64,
                "timestamp": 1_700_000_000_000u64
            }
        }
    })
}

/// createtransaction 的典型应答
pub fn create_transaction_body() -> serde_json::Value {
    serde_json::json!({
        "visible": true,
        "txID": "5f2c8c0d8a1b3e4f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7",
        "raw_data": {
            "contract": [{
                "parameter": {
                    "value": {"amount": 1_000_000u64},
                    "type_url": "type.googleapis.com/protocol.TransferContract"
                },
                "type": "TransferContract"
            }],
            "ref_block_bytes": "c3b2",
            "ref_block_hash": "d4e5f60718293a4b",
            "expiration": 1_700_000_060_000u64,
            "timestamp": 1_700_000_000_000u64
        },
        "raw_data_hex": "0a02c3b22208d4e5f60718293a4b40e0a7c2f3c03152"
    })
}
