//! 币种派生引擎
//!
//! BIP39 助记词 → BIP32/44 私钥 → 各地址族的地址。
//! 私钥与助记词只存在于 `SecretKey` / `MnemonicPhrase` 中，离开作用域即清零。

use std::fmt;

use bip39::{Language, Mnemonic};
use coins_bip32::path::DerivationPath;
use k256::ecdsa::{SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::domain::chain_config::{COIN_TYPE_EVM, COIN_TYPE_TRON};
use crate::error::{Result, WalletError};

/// TRON 地址版本字节
pub const TRON_ADDRESS_PREFIX: u8 = 0x41;

/// 助记词（Debug 输出被屏蔽，drop 时清零）
#[derive(Clone)]
pub struct MnemonicPhrase(Zeroizing<String>);

impl MnemonicPhrase {
    /// 解析并校验 BIP39 英文助记词
    pub fn parse(phrase: &str) -> Result<Self> {
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        );
        Mnemonic::parse_in(Language::English, normalized.as_str())
            .map(Zeroizing::new)
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Self(normalized))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn word_count(&self) -> usize {
        self.0.split(' ').count()
    }
}

impl fmt::Debug for MnemonicPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MnemonicPhrase([REDACTED])")
    }
}

/// secp256k1 私钥（32 字节）
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; 32]>);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        // 拒绝零值或超出曲线阶的标量
        SigningKey::from_slice(&bytes)
            .map_err(|e| WalletError::KeyDerivation(format!("invalid private key: {}", e)))?;
        Ok(Self(Zeroizing::new(bytes)))
    }

    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let raw = Zeroizing::new(
            hex::decode(hex_key.trim_start_matches("0x"))
                .map_err(|e| WalletError::KeyDerivation(format!("invalid key hex: {}", e)))?,
        );
        if raw.len() != 32 {
            return Err(WalletError::KeyDerivation(format!(
                "private key must be 32 bytes, got {}",
                raw.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        let key = Self::from_bytes(bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
        key
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.as_ref()))
    }

    pub fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_slice(self.0.as_ref())
            .map_err(|e| WalletError::KeyDerivation(format!("invalid private key: {}", e)))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// 币种派生能力
///
/// `derive_key` 包含 BIP39 种子拉伸（PBKDF2 2048 轮），属于 CPU 密集操作，
/// 异步调用方应放在 `spawn_blocking` 中执行。
pub trait CoinDerivation: Send + Sync {
    fn derive_key(&self, mnemonic: &MnemonicPhrase, coin_type: u32) -> Result<SecretKey>;

    fn derive_address(&self, coin_type: u32, key: &SecretKey) -> Result<String>;

    fn supports(&self, coin_type: u32) -> bool;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BIP44 secp256k1 派生 (EVM coin 60, TRON coin 195)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default)]
pub struct Bip44Deriver;

impl Bip44Deriver {
    pub fn new() -> Self {
        Self
    }

    fn ensure_supported(&self, coin_type: u32) -> Result<()> {
        if self.supports(coin_type) {
            Ok(())
        } else {
            Err(WalletError::KeyDerivationUnsupported(format!(
                "coin type {} is not supported",
                coin_type
            )))
        }
    }
}

impl CoinDerivation for Bip44Deriver {
    fn derive_key(&self, mnemonic: &MnemonicPhrase, coin_type: u32) -> Result<SecretKey> {
        use coins_bip32::prelude::*;

        self.ensure_supported(coin_type)?;

        let parsed = Mnemonic::parse_in(Language::English, mnemonic.expose())
            .map(Zeroizing::new)
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        let seed = Zeroizing::new(parsed.to_seed(""));

        let path = format!("m/44'/{}'/0'/0/0", coin_type);
        let derivation_path = path
            .parse::<DerivationPath>()
            .map_err(|e| WalletError::KeyDerivation(format!("invalid path {}: {}", path, e)))?;

        let master_key = XPriv::root_from_seed(seed.as_ref(), None)
            .map_err(|e| WalletError::KeyDerivation(format!("master key: {}", e)))?;
        let derived_key = master_key
            .derive_path(&derivation_path)
            .map_err(|e| WalletError::KeyDerivation(format!("derive {}: {}", path, e)))?;

        // XPriv 实现 AsRef<SigningKey>
        let signing_key: &SigningKey = derived_key.as_ref();
        let field_bytes = signing_key.to_bytes();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(field_bytes.as_slice());
        let key = SecretKey::from_bytes(bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
        key
    }

    fn derive_address(&self, coin_type: u32, key: &SecretKey) -> Result<String> {
        self.ensure_supported(coin_type)?;

        let signing_key = key.signing_key()?;
        let payload = address_payload(signing_key.verifying_key());

        match coin_type {
            COIN_TYPE_EVM => Ok(to_checksum_address(&payload)),
            COIN_TYPE_TRON => Ok(tron_address_from_payload(&payload)),
            other => Err(WalletError::KeyDerivationUnsupported(format!(
                "coin type {} is not supported",
                other
            ))),
        }
    }

    fn supports(&self, coin_type: u32) -> bool {
        matches!(coin_type, COIN_TYPE_EVM | COIN_TYPE_TRON)
    }
}

/// 公钥 → 20 字节地址体：Keccak256(未压缩公钥去掉 0x04) 的后 20 字节
pub fn address_payload(verifying_key: &VerifyingKey) -> [u8; 20] {
    let encoded = verifying_key.to_encoded_point(false);
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]);
    let mut payload = [0u8; 20];
    payload.copy_from_slice(&hash[12..]);
    payload
}

/// EIP-55 校验和地址
pub fn to_checksum_address(payload: &[u8; 20]) -> String {
    let lower = hex::encode(payload);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// 0x41 + 20 字节，Base58Check 编码
pub fn tron_address_from_payload(payload: &[u8; 20]) -> String {
    let mut raw = Vec::with_capacity(21);
    raw.push(TRON_ADDRESS_PREFIX);
    raw.extend_from_slice(payload);
    bs58::encode(raw).with_check().into_string()
}

/// 解码 TRON 地址为 20 字节地址体（校验和、版本字节均需正确）
pub fn tron_address_to_payload(address: &str) -> Option<[u8; 20]> {
    let raw = bs58::decode(address)
        .with_check(Some(TRON_ADDRESS_PREFIX))
        .into_vec()
        .ok()?;
    if raw.len() != 21 {
        return None;
    }
    let mut payload = [0u8; 20];
    payload.copy_from_slice(&raw[1..]);
    Some(payload)
}
