//! 地址生成算法验证测试
//!
//! 验证地址生成与标准钱包（MetaMask、TronLink 等）使用的 BIP39/BIP44 向量一致

mod common;

use multichain_wallet::domain::chain_config::{ChainRegistry, COIN_TYPE_EVM, COIN_TYPE_TRON};
use multichain_wallet::domain::derivation::{
    address_payload, tron_address_to_payload, Bip44Deriver, CoinDerivation, MnemonicPhrase,
};
use multichain_wallet::error::WalletError;
use multichain_wallet::utils::AddressValidator;

use common::*;

/// 测试向量：
/// - Mnemonic: "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon
///   abandon about"
/// - Expected Ethereum address: 0x9858EfFD232B4033E47d90003D23EC58E053e11f
#[test]
fn test_ethereum_address_generation_bip39_vector() {
    let deriver = Bip44Deriver::new();
    let key = deriver.derive_key(&test_mnemonic(), COIN_TYPE_EVM).unwrap();
    let address = deriver.derive_address(COIN_TYPE_EVM, &key).unwrap();

    assert_eq!(address, TEST_WALLET_ADDRESS);
    assert!(AddressValidator::validate_evm_address(&address));
}

/// TRON 地址：34 字符、T 开头、Base58Check 可解码回同一公钥的地址体
#[test]
fn test_tron_address_generation_format() {
    let deriver = Bip44Deriver::new();
    let key = deriver.derive_key(&test_mnemonic(), COIN_TYPE_TRON).unwrap();
    let address = deriver.derive_address(COIN_TYPE_TRON, &key).unwrap();

    assert_eq!(address.len(), 34);
    assert!(address.starts_with('T'));
    assert!(AddressValidator::validate_tron_address(&address));

    let signing_key = key.signing_key().unwrap();
    assert_eq!(
        tron_address_to_payload(&address),
        Some(address_payload(signing_key.verifying_key()))
    );
}

/// 同一助记词、同一 coin type 多次派生结果一致；不同 coin type 得到不同密钥
#[test]
fn test_derivation_is_deterministic() {
    let deriver = Bip44Deriver::new();
    let mnemonic = test_mnemonic();

    for coin_type in [COIN_TYPE_EVM, COIN_TYPE_TRON] {
        let first = deriver.derive_key(&mnemonic, coin_type).unwrap();
        let second = deriver.derive_key(&mnemonic, coin_type).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(
            deriver.derive_address(coin_type, &first).unwrap(),
            deriver.derive_address(coin_type, &second).unwrap()
        );
    }

    let evm = deriver.derive_key(&mnemonic, COIN_TYPE_EVM).unwrap();
    let tron = deriver.derive_key(&mnemonic, COIN_TYPE_TRON).unwrap();
    assert_ne!(evm.as_bytes(), tron.as_bytes());
}

/// 多余空白不影响派生结果
#[test]
fn test_mnemonic_whitespace_is_normalized() {
    let spaced = MnemonicPhrase::parse(&format!("  {}  ", TEST_MNEMONIC.replace(' ', "   ")))
        .unwrap();
    assert_eq!(spaced.word_count(), 12);

    let deriver = Bip44Deriver::new();
    let key = deriver.derive_key(&spaced, COIN_TYPE_TRON).unwrap();
    assert_eq!(
        deriver.derive_address(COIN_TYPE_TRON, &key).unwrap(),
        tron_sender()
    );
}

#[test]
fn test_invalid_mnemonic_rejected() {
    let err = MnemonicPhrase::parse(&TEST_MNEMONIC.replace("about", "abandon")).unwrap_err();
    assert!(matches!(err, WalletError::InvalidMnemonic(_)));
}

#[test]
fn test_unsupported_coin_type() {
    let deriver = Bip44Deriver::new();
    // Solana (501) 不在支持范围内
    let err = deriver.derive_key(&test_mnemonic(), 501).unwrap_err();
    assert!(matches!(err, WalletError::KeyDerivationUnsupported(_)));
}

/// 注册表中的派生路径与派生引擎一致
#[test]
fn test_registry_derivation_paths() {
    let registry = ChainRegistry::new();
    for chain in registry.derivation_chains() {
        assert_eq!(chain.coin_type, COIN_TYPE_TRON);
        assert_eq!(chain.default_derivation_path(), "m/44'/195'/0'/0/0");
    }
    assert_eq!(
        registry.get_by_symbol("eth").unwrap().default_derivation_path(),
        "m/44'/60'/0'/0/0"
    );
}
