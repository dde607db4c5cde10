//! String formatting and address utilities.

use once_cell::sync::Lazy;
use regex::Regex;

static EVM_ADDRESS: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("static address pattern is valid")
});

/// Truncates a hash or id for log output.
///
/// Shows only the first 10 characters (`0x` plus eight hex digits) followed by
/// ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(10) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Checks the `0x` + 40 hex digits shape of an EVM address.
///
/// Checksums are not verified; mixed case is accepted as is.
pub fn is_valid_evm_address(address: &str) -> bool {
	EVM_ADDRESS.is_match(address)
}
