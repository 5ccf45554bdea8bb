//! Ether denomination helpers

use alloy_primitives::U256;

use crate::error::ParseEtherError;

/// Wei in one ether
pub const WEI_PER_ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Fixed entry fee, in ether
pub const ENTRY_FEE_ETHER: &str = "0.000002";

/// Fixed entry fee, in wei
pub const ENTRY_FEE_WEI: u64 = 2_000_000_000_000;

const DECIMALS: usize = 18;

/// Format a wei amount as decimal ether, keeping at least one fractional digit.
///
/// `3 * 10^18` formats as `3.0`, `6 * 10^12` as `0.000006`.
pub fn format_ether(wei: U256) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;

    let frac = format!("{:0>width$}", frac.to_string(), width = DECIMALS);
    let frac = frac.trim_end_matches('0');
    let frac = if frac.is_empty() { "0" } else { frac };

    format!("{whole}.{frac}")
}

/// Parse a decimal ether amount (e.g. `"0.000002"`) into wei
pub fn parse_ether(amount: &str) -> Result<U256, ParseEtherError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(ParseEtherError::Empty);
    }

    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(ParseEtherError::Invalid(amount.to_string()));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseEtherError::Invalid(amount.to_string()));
    }
    if frac.len() > DECIMALS {
        return Err(ParseEtherError::TooPrecise(amount.to_string()));
    }

    let digits = format!("{}{:0<width$}", if whole.is_empty() { "0" } else { whole }, frac, width = DECIMALS);
    digits.parse::<U256>().map_err(|_| ParseEtherError::Overflow(amount.to_string()))
}
