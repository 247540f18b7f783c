//! TRON 协议常量、引用区块绑定与单位换算

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};

/// 1 TRX = 1,000,000 SUN
pub const SUN_PER_TRX: u64 = 1_000_000;

/// TRX 金额最多 6 位小数
pub const TRX_DECIMALS: u32 = 6;

/// 节点端 amount 为有符号 64 位整数
pub const MAX_TRANSFER_SUN: u64 = i64::MAX as u64;

/// blockID 中作为 ref_block_hash 的字节区间
const REF_BLOCK_HASH_RANGE: std::ops::Range<usize> = 8..16;

/// 引用区块绑定信息（每次构建交易时重新获取，不持久化）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefBlockInfo {
    /// 区块高度低 16 位
    pub ref_block_bytes: [u8; 2],
    /// blockID 第 8..16 字节
    pub ref_block_hash: [u8; 8],
}

impl RefBlockInfo {
    /// 由区块高度与 blockID（hex）计算：高度低 16 位按小端写入
    pub fn from_block(number: u64, block_id: &str) -> Result<Self> {
        let hash = hex::decode(block_id.trim_start_matches("0x")).map_err(|e| {
            WalletError::BlockFetch {
                last_error: format!("blockID is not hex: {}", e),
            }
        })?;
        if hash.len() < REF_BLOCK_HASH_RANGE.end {
            return Err(WalletError::BlockFetch {
                last_error: format!("blockID too short: {} bytes", hash.len()),
            });
        }

        let low = (number & 0xffff) as u16;
        let mut ref_block_hash = [0u8; 8];
        ref_block_hash.copy_from_slice(&hash[REF_BLOCK_HASH_RANGE]);

        Ok(Self {
            ref_block_bytes: low.to_le_bytes(),
            ref_block_hash,
        })
    }

    pub fn ref_block_bytes_hex(&self) -> String {
        hex::encode(self.ref_block_bytes)
    }

    pub fn ref_block_hash_hex(&self) -> String {
        hex::encode(self.ref_block_hash)
    }
}

/// TRX → SUN，精确整数乘法
pub fn trx_to_sun(trx: u64) -> Result<u64> {
    trx.checked_mul(SUN_PER_TRX)
        .ok_or_else(|| WalletError::InvalidAmount(format!("{} TRX overflows SUN range", trx)))
}

/// SUN → 整 TRX（截断小数部分）
/// 转账金额必须在 1..=MAX_TRANSFER_SUN 之间
pub fn check_transfer_amount(amount_sun: u64) -> Result<()> {
    if amount_sun == 0 {
        return Err(WalletError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    if amount_sun > MAX_TRANSFER_SUN {
        return Err(WalletError::InvalidAmount(format!(
            "amount {} SUN exceeds the network maximum {}",
            amount_sun, MAX_TRANSFER_SUN
        )));
    }
    Ok(())
}

pub fn sun_to_trx(sun: u64) -> u64 {
    sun / SUN_PER_TRX
}

/// 解析十进制 TRX 金额字符串为 SUN
pub fn parse_trx_amount(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let value = Decimal::from_str(trimmed)
        .map_err(|e| WalletError::InvalidAmount(format!("{}: {}", trimmed, e)))?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(WalletError::InvalidAmount(format!(
            "{}: amount must not be negative",
            trimmed
        )));
    }
    if value.normalize().scale() > TRX_DECIMALS {
        return Err(WalletError::InvalidAmount(format!(
            "{}: at most {} decimal places",
            trimmed, TRX_DECIMALS
        )));
    }

    value
        .checked_mul(Decimal::from(SUN_PER_TRX))
        .and_then(|sun| sun.to_u64())
        .ok_or_else(|| WalletError::InvalidAmount(format!("{}: out of range", trimmed)))
}

/// SUN 格式化为 TRX 字符串（去掉多余的尾随零）
pub fn format_sun_as_trx(sun: u64) -> String {
    Decimal::from_i128_with_scale(i128::from(sun), TRX_DECIMALS)
        .normalize()
        .to_string()
}

/// 节点返回的十六进制 UTF-8 消息解码；非十六进制原样返回
pub fn decode_node_message(message: &str) -> String {
    let looks_hex = !message.is_empty()
        && message.len() % 2 == 0
        && message.chars().all(|c| c.is_ascii_hexdigit());
    if !looks_hex {
        return message.to_string();
    }

    match hex::decode(message)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    {
        Some(text) if !text.is_empty() && text.chars().all(|c| !c.is_control() || c == '\n') => {
            text
        }
        _ => message.to_string(),
    }
}
