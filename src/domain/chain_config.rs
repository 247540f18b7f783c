//! 多链配置模块
//!
//! 定义钱包支持的网络、所属地址族及其派生参数

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// TRON 主网链 ID
pub const TRON_MAINNET_CHAIN_ID: i64 = 728126428;
/// TRON Nile 测试网链 ID
pub const TRON_NILE_CHAIN_ID: i64 = 3448148188;
/// Ethereum 主网链 ID（基础地址所在的网络）
pub const ETHEREUM_MAINNET_CHAIN_ID: i64 = 1;

/// EVM 系列 coin type
pub const COIN_TYPE_EVM: u32 = 60;
/// TRON coin type
pub const COIN_TYPE_TRON: u32 = 195;

/// 地址族
///
/// 同一地址族内的网络共享同一套密钥空间与地址编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// 0x 十六进制地址 (Ethereum, BSC, Polygon, ...)
    Evm,
    /// Base58Check 地址，前缀 T
    Tron,
}

impl AddressFamily {
    /// 该地址族是否需要单独派生（与基础 EVM 地址不共享）
    pub fn requires_derivation(&self) -> bool {
        matches!(self, AddressFamily::Tron)
    }

    /// 地址格式是否自描述（可凭前缀与字符集识别）
    pub fn is_self_describing(&self) -> bool {
        matches!(self, AddressFamily::Tron)
    }
}

/// 链配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// 链 ID
    pub chain_id: i64,
    /// 链名称
    pub name: String,
    /// 原生币符号 (ETH, TRX, ...)
    pub symbol: String,
    /// 地址族
    pub address_family: AddressFamily,
    /// BIP44 coin type
    pub coin_type: u32,
    /// 是否为测试网
    pub is_testnet: bool,
    /// 区块浏览器交易页前缀
    pub explorer_tx_url: Option<String>,
}

impl ChainConfig {
    /// BIP44 派生路径 m/44'/coin'/account'/0/index
    pub fn derivation_path(&self, account: u32, index: u32) -> String {
        format!("m/44'/{}'/{}'/0/{}", self.coin_type, account, index)
    }

    /// 默认派生路径（account 0, index 0）
    pub fn default_derivation_path(&self) -> String {
        self.derivation_path(0, 0)
    }

    /// 交易在区块浏览器中的链接
    pub fn explorer_link(&self, tx_id: &str) -> Option<String> {
        self.explorer_tx_url
            .as_ref()
            .map(|base| format!("{}{}", base, tx_id))
    }
}

/// 链配置注册表
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    configs: BTreeMap<i64, ChainConfig>,
    symbol_map: HashMap<String, i64>,
}

impl ChainRegistry {
    /// 创建预配置的注册表
    pub fn new() -> Self {
        let mut registry = Self {
            configs: BTreeMap::new(),
            symbol_map: HashMap::new(),
        };

        registry.register_default_chains();
        registry
    }

    fn register_default_chains(&mut self) {
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // EVM 系列（共享基础地址）
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        let evm_chains: [(i64, &str, &str, bool); 7] = [
            (1, "Ethereum", "ETH", false),
            (11155111, "Ethereum Sepolia", "ETH", true),
            (56, "BNB Smart Chain", "BNB", false),
            (137, "Polygon", "POL", false),
            (42161, "Arbitrum One", "ETH", false),
            (10, "Optimism", "ETH", false),
            (43114, "Avalanche C-Chain", "AVAX", false),
        ];

        for (chain_id, name, symbol, is_testnet) in evm_chains {
            self.register(ChainConfig {
                chain_id,
                name: name.to_string(),
                symbol: symbol.to_string(),
                address_family: AddressFamily::Evm,
                coin_type: COIN_TYPE_EVM,
                is_testnet,
                explorer_tx_url: None,
            });
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // TRON（独立派生，m/44'/195'/0'/0/0）
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        self.register(ChainConfig {
            chain_id: TRON_MAINNET_CHAIN_ID,
            name: "TRON".to_string(),
            symbol: "TRX".to_string(),
            address_family: AddressFamily::Tron,
            coin_type: COIN_TYPE_TRON,
            is_testnet: false,
            explorer_tx_url: Some("https://tronscan.org/#/transaction/".to_string()),
        });

        self.register(ChainConfig {
            chain_id: TRON_NILE_CHAIN_ID,
            name: "TRON Nile".to_string(),
            symbol: "TRX".to_string(),
            address_family: AddressFamily::Tron,
            coin_type: COIN_TYPE_TRON,
            is_testnet: true,
            explorer_tx_url: Some("https://nile.tronscan.org/#/transaction/".to_string()),
        });
    }

    /// 注册链配置
    ///
    /// 符号索引只指向主网；同符号的多个主网以先注册者为准
    pub fn register(&mut self, config: ChainConfig) {
        let chain_id = config.chain_id;
        if !config.is_testnet {
            self.symbol_map
                .entry(config.symbol.to_lowercase())
                .or_insert(chain_id);
        }
        self.configs.insert(chain_id, config);
    }

    /// 通过 chain_id 获取配置
    pub fn get_by_chain_id(&self, chain_id: i64) -> Option<&ChainConfig> {
        self.configs.get(&chain_id)
    }

    /// 通过符号获取配置
    pub fn get_by_symbol(&self, symbol: &str) -> Option<&ChainConfig> {
        let chain_id = self.symbol_map.get(&symbol.to_lowercase())?;
        self.configs.get(chain_id)
    }

    /// 链所属地址族；未注册的链按 EVM 处理
    pub fn address_family(&self, chain_id: i64) -> AddressFamily {
        self.get_by_chain_id(chain_id)
            .map(|c| c.address_family)
            .unwrap_or(AddressFamily::Evm)
    }

    /// 需要独立派生地址的链（按 chain_id 升序）
    pub fn derivation_chains(&self) -> Vec<&ChainConfig> {
        self.configs
            .values()
            .filter(|c| c.address_family.requires_derivation())
            .collect()
    }

    /// 是否为已注册的 TRON 地址族链
    pub fn is_tron_chain(&self, chain_id: i64) -> bool {
        self.get_by_chain_id(chain_id)
            .map_or(false, |c| c.address_family == AddressFamily::Tron)
    }

    /// 验证链配置完整性
    pub fn validate_configs(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (chain_id, config) in &self.configs {
            if *chain_id <= 0 {
                errors.push(format!(
                    "Chain {} has invalid chain_id: {}",
                    config.name, chain_id
                ));
            }
            if config.name.is_empty() {
                errors.push(format!("Chain {} has empty name", chain_id));
            }
            if config.symbol.is_empty() {
                errors.push(format!("Chain {} has empty symbol", chain_id));
            }

            // 地址族与 coin type 必须匹配
            let expected_coin = match config.address_family {
                AddressFamily::Evm => COIN_TYPE_EVM,
                AddressFamily::Tron => COIN_TYPE_TRON,
            };
            if config.coin_type != expected_coin {
                errors.push(format!(
                    "Chain {} has coin_type {} but address family {:?} expects {}",
                    config.name, config.coin_type, config.address_family, expected_coin
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}
