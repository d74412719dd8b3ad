//! # Protocol Configuration & Constants
//!
//! Every fixed parameter of a Tessera offering lives here. Deployment-time
//! values (window, cap, rate) can be overridden per sale; the constants
//! below are the defaults the replay host and the tests fall back to.
//!
//! Amounts are integers in the smallest unit. Both the ledger token and the
//! contributed value use 18 fractional digits, so `1 * UNIT` is one whole
//! token (or one whole unit of value).

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Address width in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Domain tag mixed into label-derived addresses.
pub const ADDRESS_LABEL_DOMAIN: &[u8] = b"tessera-address-v1";

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Fractional digits of every ledger amount.
pub const DECIMALS: u8 = 18;

/// One whole token (or unit of value) in the smallest denomination.
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Default token name.
pub const DEFAULT_TOKEN_NAME: &str = "Tessera Token";

/// Default token ticker.
pub const DEFAULT_TOKEN_SYMBOL: &str = "TSR";

// ---------------------------------------------------------------------------
// Sale Defaults
// ---------------------------------------------------------------------------

/// Tokens minted per smallest unit of contributed value.
pub const DEFAULT_RATE: u128 = 1_000;

/// Smallest accepted contribution per purchase: 0.1 units of value.
pub const DEFAULT_MIN_AMOUNT: u128 = UNIT / 10;

/// Cumulative contribution ceiling for a non-whitelisted purchaser.
pub const DEFAULT_MAX_AMOUNT: u128 = 5 * UNIT;

/// Total value the sale accepts before it is sold out.
pub const DEFAULT_CAP: u128 = 1_000 * UNIT;

/// Issuer pool minted to the sale wallet at finalisation.
pub const DEFAULT_RESERVE_TOKENS: u128 = 0;

/// Delay between deployment and the start of the sale window.
pub const DEFAULT_START_DELAY_SECS: i64 = 24 * 60 * 60;

/// Length of the sale window.
pub const DEFAULT_SALE_DURATION_SECS: i64 = 30 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Converts whole units to the smallest denomination.
///
/// Returns `None` on overflow rather than wrapping.
pub fn units(whole: u128) -> Option<u128> {
    whole.checked_mul(UNIT)
}

/// Renders an amount as a decimal string with [`DECIMALS`] fractional
/// digits, trimming trailing zeros (e.g. `1.5`, `0.0001`, `42`).
pub fn format_amount(amount: u128) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:018}", frac);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

/// Parses a decimal string (`"1.5"`, `"0.0001"`, `"42"`) into the smallest
/// denomination. Returns `None` for malformed input, more than
/// [`DECIMALS`] fractional digits, or overflow.
pub fn parse_amount(s: &str) -> Option<u128> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > DECIMALS as usize {
        return None;
    }
    let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !digits(whole) || !digits(frac) {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<18}", frac);
        padded.parse().ok()?
    };
    units(whole)?.checked_add(frac)
}
