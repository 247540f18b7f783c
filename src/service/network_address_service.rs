//! 网络地址服务
//!
//! 回答「钱包在链 X 上的地址是什么」：
//! - EVM 系列链与基础地址共享密钥空间，直接返回钱包地址
//! - 需要独立派生的链（TRON）查询地址映射；尚未派生时返回基础地址作为占位，
//!   并通过 `needs_generation()` 提示调用方按需派生

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::address_mapping::MappingLookup;
use crate::domain::chain_config::{ChainRegistry, ETHEREUM_MAINNET_CHAIN_ID};
use crate::domain::derivation::{CoinDerivation, MnemonicPhrase};
use crate::domain::wallet::{NetworkWallet, Wallet};
use crate::error::{Result, WalletError};
use crate::infrastructure::log_redact::redact_address;
use crate::service::address_mapping_store::AddressMappingStore;
use crate::utils::address_validator::AddressValidator;

/// 解析结果的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// 已派生并存储的网络地址
    Derived,
    /// 与基础地址共享密钥空间（EVM 系列）
    SameKeySpace,
    /// 尚无可用映射，返回的是基础地址
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub address: String,
    pub source: AddressSource,
}

impl ResolvedAddress {
    /// 占位地址不能用于该链上的转账，调用方应先派生
    pub fn needs_generation(&self) -> bool {
        self.source == AddressSource::Placeholder
    }
}

pub struct NetworkAddressService {
    store: Arc<AddressMappingStore>,
    deriver: Arc<dyn CoinDerivation>,
    registry: Arc<ChainRegistry>,
    tron_chain_id: i64,
}

impl NetworkAddressService {
    pub fn new(
        store: Arc<AddressMappingStore>,
        deriver: Arc<dyn CoinDerivation>,
        registry: Arc<ChainRegistry>,
        tron_chain_id: i64,
    ) -> Self {
        Self {
            store,
            deriver,
            registry,
            tron_chain_id,
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn tron_chain_id(&self) -> i64 {
        self.tron_chain_id
    }

    /// 解析钱包在指定链上的地址
    pub async fn resolve(&self, wallet_address: &str, chain_id: i64) -> ResolvedAddress {
        let family = self.registry.address_family(chain_id);
        if !family.requires_derivation() {
            return ResolvedAddress {
                address: wallet_address.to_string(),
                source: AddressSource::SameKeySpace,
            };
        }

        match self.store.get(wallet_address, chain_id).await {
            MappingLookup::Found(address) if AddressValidator::validate(family, &address) => {
                ResolvedAddress {
                    address,
                    source: AddressSource::Derived,
                }
            }
            MappingLookup::Found(address) => {
                tracing::warn!(
                    wallet = %redact_address(wallet_address),
                    chain_id,
                    stored = %redact_address(&address),
                    "stored network address is malformed, treating as missing"
                );
                placeholder(wallet_address)
            }
            MappingLookup::Absent => placeholder(wallet_address),
            MappingLookup::Unavailable(error) => {
                tracing::warn!(
                    wallet = %redact_address(wallet_address),
                    chain_id,
                    %error,
                    "address mapping unavailable, falling back to base address"
                );
                placeholder(wallet_address)
            }
        }
    }

    /// TRON 地址便捷查询
    pub async fn tron_address(&self, wallet_address: &str) -> ResolvedAddress {
        self.resolve(wallet_address, self.tron_chain_id).await
    }

    /// 地址是否为该链的有效地址（用于区分真实派生地址与占位地址）
    pub fn is_valid_network_address(&self, chain_id: i64, address: &str) -> bool {
        AddressValidator::validate(self.registry.address_family(chain_id), address)
    }

    /// 派生并存储钱包在指定链上的地址（幂等）
    pub async fn ensure_derived(
        &self,
        wallet: &Wallet,
        chain_id: i64,
        mnemonic: &MnemonicPhrase,
    ) -> Result<String> {
        let chain = self
            .registry
            .get_by_chain_id(chain_id)
            .ok_or(WalletError::ChainNotSupported(chain_id))?;
        if !chain.address_family.requires_derivation() {
            return Ok(wallet.address.clone());
        }
        ensure_wallet_can_derive(wallet)?;

        let address = self.derive_address(chain.coin_type, mnemonic).await?;
        self.store.put(&wallet.address, chain_id, &address).await?;

        tracing::info!(
            wallet = %redact_address(&wallet.address),
            chain_id,
            network_address = %redact_address(&address),
            "network address derived"
        );
        Ok(address)
    }

    /// 为钱包生成并存储所有网络地址
    ///
    /// 基础 EVM 映射 + 每条需要派生的链；单条链失败只记录日志，不影响其它链
    pub async fn generate_and_store_all(
        &self,
        wallet: &Wallet,
        mnemonic: &MnemonicPhrase,
    ) -> Result<BTreeMap<i64, String>> {
        ensure_wallet_can_derive(wallet)?;

        let mut stored = BTreeMap::new();
        match self
            .store
            .put(&wallet.address, ETHEREUM_MAINNET_CHAIN_ID, &wallet.address)
            .await
        {
            Ok(_) => {
                stored.insert(ETHEREUM_MAINNET_CHAIN_ID, wallet.address.clone());
            }
            Err(e) => {
                tracing::error!(
                    wallet = %redact_address(&wallet.address),
                    error = %e,
                    "failed to store base address mapping"
                );
            }
        }

        // 同一 coin type 只派生一次（主网与测试网共用）
        let mut derived: HashMap<u32, String> = HashMap::new();
        for chain in self.registry.derivation_chains() {
            let address = match derived.get(&chain.coin_type) {
                Some(address) => address.clone(),
                None => match self.derive_address(chain.coin_type, mnemonic).await {
                    Ok(address) => {
                        derived.insert(chain.coin_type, address.clone());
                        address
                    }
                    Err(e) => {
                        tracing::error!(
                            chain_id = chain.chain_id,
                            coin_type = chain.coin_type,
                            error = %e,
                            "network address derivation failed"
                        );
                        continue;
                    }
                },
            };

            match self.store.put(&wallet.address, chain.chain_id, &address).await {
                Ok(_) => {
                    stored.insert(chain.chain_id, address);
                }
                Err(e) => {
                    tracing::error!(
                        chain_id = chain.chain_id,
                        error = %e,
                        "failed to store network address"
                    );
                }
            }
        }

        tracing::info!(
            wallet = %redact_address(&wallet.address),
            chains = stored.len(),
            "network addresses generated"
        );
        Ok(stored)
    }

    /// 展示用的网络钱包列表
    ///
    /// 每个钱包一条基础条目；已有有效 TRON 地址且与基础地址不同的，追加一条 TRON 条目
    pub async fn network_wallets(&self, wallets: &[Wallet]) -> Vec<NetworkWallet> {
        let base_symbol = self
            .registry
            .get_by_chain_id(ETHEREUM_MAINNET_CHAIN_ID)
            .map(|c| c.symbol.clone())
            .unwrap_or_else(|| "ETH".to_string());
        let tron_symbol = self
            .registry
            .get_by_chain_id(self.tron_chain_id)
            .map(|c| c.symbol.clone())
            .unwrap_or_else(|| "TRX".to_string());

        let mut entries = Vec::with_capacity(wallets.len() * 2);
        for wallet in wallets {
            entries.push(NetworkWallet {
                name: wallet.name.clone(),
                address: wallet.address.clone(),
                chain_id: ETHEREUM_MAINNET_CHAIN_ID,
                balance_symbol: base_symbol.clone(),
                origin_address: None,
                wallet_type: wallet.wallet_type,
            });

            let tron = self.tron_address(&wallet.address).await;
            if tron.source == AddressSource::Derived && tron.address != wallet.address {
                entries.push(NetworkWallet {
                    name: format!("{} (TRON)", wallet.name),
                    address: tron.address,
                    chain_id: self.tron_chain_id,
                    balance_symbol: tron_symbol.clone(),
                    origin_address: Some(wallet.address.clone()),
                    wallet_type: wallet.wallet_type,
                });
            }
        }
        entries
    }

    /// 助记词 → 地址；种子拉伸放在阻塞线程池中
    async fn derive_address(&self, coin_type: u32, mnemonic: &MnemonicPhrase) -> Result<String> {
        let deriver = Arc::clone(&self.deriver);
        let mnemonic = mnemonic.clone();
        tokio::task::spawn_blocking(move || {
            let key = deriver.derive_key(&mnemonic, coin_type)?;
            deriver.derive_address(coin_type, &key)
        })
        .await
        .map_err(|e| WalletError::KeyDerivation(format!("derivation task failed: {}", e)))?
    }
}

fn placeholder(wallet_address: &str) -> ResolvedAddress {
    ResolvedAddress {
        address: wallet_address.to_string(),
        source: AddressSource::Placeholder,
    }
}

fn ensure_wallet_can_derive(wallet: &Wallet) -> Result<()> {
    if wallet.wallet_type.can_derive_keys() {
        Ok(())
    } else {
        Err(WalletError::KeyDerivationUnsupported(format!(
            "{:?} wallets cannot derive network keys",
            wallet.wallet_type
        )))
    }
}
