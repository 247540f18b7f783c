//! 日志脱敏
//! 地址、签名、交易原文进入日志前截短；私钥与助记词类型本身不可格式化

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    if !hex.is_char_boundary(show_chars.min(hex.len())) || hex.len() <= show_chars * 2 {
        return "*".repeat(hex.chars().count());
    }

    let prefix = &hex[..show_chars];
    let suffix = &hex[hex.len() - show_chars..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return "*".repeat(address.chars().count());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏签名（只保留前 8 个字符）
pub fn redact_signature(signature: &str) -> String {
    match signature.get(..8) {
        Some(prefix) if signature.len() > 8 => format!("{}...", prefix),
        _ => "*".repeat(signature.chars().count()),
    }
}
