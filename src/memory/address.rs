//! Address and byte text parsing
//!
//! Debuggers report addresses as `0x`-prefixed hex and bytes as two hex
//! digits. An address expression typed with a leading `#` is evaluated once
//! and then frozen to its numeric value.

use super::dump::DumpError;

/// Parse a debugger address such as `0x7ffd1000` or `7ffd1000`
pub fn parse_address(text: &str) -> Result<u64, DumpError> {
    let trimmed = text.trim();
    let digits = strip_hex_prefix(trimmed);
    if digits.is_empty() {
        return Err(DumpError::InvalidAddress(text.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| DumpError::InvalidAddress(text.to_string()))
}

/// Parse one byte written as hex digits
pub fn parse_hex_byte(text: &str) -> Result<u8, DumpError> {
    let digits = strip_hex_prefix(text.trim());
    if digits.is_empty() || digits.len() > 2 {
        return Err(DumpError::InvalidByte(text.to_string()));
    }
    u8::from_str_radix(digits, 16).map_err(|_| DumpError::InvalidByte(text.to_string()))
}

/// Format an address the way it is shown in row labels and frozen fields
pub fn format_address(address: u64) -> String {
    format!("0x{:x}", address)
}

/// Split a typed address into the expression to evaluate and the freeze flag.
///
/// `"#$rsp"` becomes `("$rsp", true)`, `" 0x10 "` becomes `("0x10", false)`.
pub fn split_freeze(text: &str) -> (String, bool) {
    let trimmed = text.trim();
    match trimmed.strip_prefix('#') {
        Some(rest) => (rest.trim_start().to_string(), true),
        None => (trimmed.to_string(), false),
    }
}

fn strip_hex_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_address("0X7FFD").unwrap(), 0x7ffd);
        assert_eq!(parse_address(" ffff ").unwrap(), 0xffff);
        assert_eq!(
            parse_address("0xffffffffffffffff").unwrap(),
            u64::MAX
        );
        assert!(parse_address("0x").is_err());
        assert!(parse_address("$rsp").is_err());
    }

    #[test]
    fn test_parse_hex_byte() {
        assert_eq!(parse_hex_byte("41").unwrap(), 0x41);
        assert_eq!(parse_hex_byte("0xff").unwrap(), 0xff);
        assert_eq!(parse_hex_byte("7").unwrap(), 7);
        assert!(parse_hex_byte("100").is_err());
        assert!(parse_hex_byte("zz").is_err());
        assert!(parse_hex_byte("").is_err());
    }

    #[test]
    fn test_split_freeze() {
        assert_eq!(split_freeze("#$rsp"), ("$rsp".to_string(), true));
        assert_eq!(split_freeze("  # buf + 4"), ("buf + 4".to_string(), true));
        assert_eq!(split_freeze(" 0x10 "), ("0x10".to_string(), false));
    }
}
