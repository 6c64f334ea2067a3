//! Token address helpers
//!
//! Validity check used at the API boundary, and the cache key normalization.

/// Normalize an address into a cache key.
///
/// EVM hex addresses are case-insensitive and get lowercased.
/// Base58 addresses (Solana) are case-sensitive and are only trimmed.
#[inline]
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// `0x` + 40 hex chars, or base58 of 32..=44 chars
pub fn is_valid_address(address: &str) -> bool {
    let address = address.trim();
    if let Some(hex) = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
        return hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    (32..=44).contains(&address.len()) && address.chars().all(is_base58_char)
}

fn is_base58_char(c: char) -> bool {
    c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_address_normalization() {
        assert_eq!(
            normalize_address(" 0xDAC17F958D2EE523A2206206994597C13D831EC7 "),
            "0xdac17f958d2ee523a2206206994597c13d831ec7"
        );
    }

    #[test]
    fn test_base58_keeps_case() {
        let mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        assert_eq!(normalize_address(mint), mint);
    }

    #[test]
    fn test_address_validity() {
        assert!(is_valid_address("0xdAC17F958D2ee523a2206206994597C13D831ec7"));
        assert!(is_valid_address("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(!is_valid_address("0x1234"));
        assert!(!is_valid_address("0xZZC17F958D2ee523a2206206994597C13D831ec7"));
        assert!(!is_valid_address("not an address"));
        assert!(!is_valid_address(""));
    }
}
