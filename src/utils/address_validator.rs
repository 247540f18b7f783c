//! 地址验证模块
//!
//! 按地址族统一校验地址格式

use sha3::{Digest, Keccak256};

use crate::domain::chain_config::AddressFamily;

/// Base58 字符集（不含 0 O I l）
pub const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// TRON 地址固定长度
pub const TRON_ADDRESS_LEN: usize = 34;

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 按地址族验证地址格式
    pub fn validate(family: AddressFamily, address: &str) -> bool {
        match family {
            AddressFamily::Evm => Self::validate_evm_address(address),
            AddressFamily::Tron => Self::validate_tron_address(address),
        }
    }

    /// TRON 地址：长度 34、以 T 开头、全部字符属于 Base58 字符集
    pub fn validate_tron_address(address: &str) -> bool {
        address.len() == TRON_ADDRESS_LEN
            && address.starts_with('T')
            && address.chars().all(|c| BASE58_ALPHABET.contains(c))
    }

    /// 验证EVM地址（支持EIP-55 Checksum）
    pub fn validate_evm_address(address: &str) -> bool {
        if !address.starts_with("0x") || address.len() != 42 {
            return false;
        }

        let hex_part = &address[2..];
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 全小写或全大写不带校验和；混合大小写时必须满足 EIP-55
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Self::verify_eip55_checksum(address);
        }

        true
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(address: &str) -> bool {
        let addr_lower = address[2..].to_lowercase();
        let hash = Keccak256::digest(addr_lower.as_bytes());

        for (i, ch) in address[2..].chars().enumerate() {
            if ch.is_ascii_alphabetic() {
                let hash_byte = hash[i / 2];
                let hash_nibble = if i % 2 == 0 {
                    hash_byte >> 4
                } else {
                    hash_byte & 0x0f
                };

                if ch.is_ascii_uppercase() != (hash_nibble >= 8) {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tron_address_validation() {
        assert!(AddressValidator::validate_tron_address(
            "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8"
        ));
        // 长度不对
        assert!(!AddressValidator::validate_tron_address("TJRabPrwbZy45sbavfcjinPJC18kjpRTv"));
        // 前缀不对
        assert!(!AddressValidator::validate_tron_address(
            "AJRabPrwbZy45sbavfcjinPJC18kjpRTv8"
        ));
        // 含歧义字符 0
        assert!(!AddressValidator::validate_tron_address(
            "TJRabPrwbZy45sbavfcjinPJC18kjpRT08"
        ));
        // EVM 地址不是 TRON 地址
        assert!(!AddressValidator::validate(
            AddressFamily::Tron,
            "0x9858EfFD232B4033E47d90003D23EC58E053e11f"
        ));
    }

    #[test]
    fn test_evm_address_validation() {
        assert!(AddressValidator::validate_evm_address(
            "0x9858EfFD232B4033E47d90003D23EC58E053e11f"
        ));
        assert!(AddressValidator::validate_evm_address(
            "0x9858effd232b4033e47d90003d23ec58e053e11f"
        ));
        // 校验和错误
        assert!(!AddressValidator::validate_evm_address(
            "0x9858eFFD232B4033E47d90003D23EC58E053e11f"
        ));
        assert!(!AddressValidator::validate_evm_address("0x1234"));
        assert!(!AddressValidator::validate(
            AddressFamily::Evm,
            "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8"
        ));
    }

    proptest! {
        #[test]
        fn prop_ambiguous_characters_never_pass(
            body in "[1-9A-HJ-NP-Za-km-z]{33}",
            pos in 0usize..33,
            bad in prop::sample::select(vec!['0', 'O', 'I', 'l']),
        ) {
            let mut address = format!("T{}", body);
            prop_assert!(AddressValidator::validate_tron_address(&address));

            address.replace_range(pos + 1..pos + 2, &bad.to_string());
            prop_assert!(!AddressValidator::validate_tron_address(&address));
        }

        #[test]
        fn prop_wrong_length_rejected(body in "[1-9A-HJ-NP-Za-km-z]{0,40}") {
            let address = format!("T{}", body);
            prop_assert_eq!(
                AddressValidator::validate_tron_address(&address),
                address.len() == TRON_ADDRESS_LEN
            );
        }
    }
}
