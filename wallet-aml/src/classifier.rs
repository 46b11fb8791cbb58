//! Hot/cold wallet classification.
//!
//! Known exchange and cold-storage addresses are looked up first; anything
//! else falls back to a heuristic on the trailing hex digits so every input
//! gets a reproducible answer.

use crate::risk::WalletType;

/// Known exchange (hot) wallets.
pub const KNOWN_HOT_ADDRESSES: &[&str] = &[
    "0x8C8D7C46219D9205f056f28fee5950aD564d7465",
    "0x6B175474E89094C44Da98b954EedeAC495271d0F",
    "0x514910771AF9Ca656af840dff83E8264EcF986CA",
];

/// Known cold-storage wallets.
pub const KNOWN_COLD_ADDRESSES: &[&str] = &["0x742d35Cc6634C0532925a3b844Bc454e4438f44e"];

/// Number of trailing hex digits the fallback heuristic reads.
const FALLBACK_DIGITS: usize = 4;

#[derive(Debug, Clone)]
pub struct AddressClassifier {
    hot: &'static [&'static str],
    cold: &'static [&'static str],
}

impl AddressClassifier {
    pub fn new(hot: &'static [&'static str], cold: &'static [&'static str]) -> Self {
        Self { hot, cold }
    }

    /// Classify an address. Total: any string yields a wallet type.
    pub fn classify(&self, address: &str) -> WalletType {
        if self.hot.contains(&address) {
            return WalletType::Hot;
        }

        if self.cold.contains(&address) {
            return WalletType::Cold;
        }

        match trailing_hex_value(address) {
            Some(value) if value % 3 == 0 => WalletType::Cold,
            _ => WalletType::Hot,
        }
    }
}

impl Default for AddressClassifier {
    fn default() -> Self {
        Self::new(KNOWN_HOT_ADDRESSES, KNOWN_COLD_ADDRESSES)
    }
}

/// Value of the last (up to) four characters after the `0x` prefix.
///
/// Only the leading run of hex digits in that tail is read; a tail that does
/// not start with a hex digit has no value.
fn trailing_hex_value(address: &str) -> Option<u32> {
    let body = address.strip_prefix("0x").unwrap_or(address);
    let chars: Vec<char> = body.chars().collect();
    let start = chars.len().saturating_sub(FALLBACK_DIGITS);

    let digits: String = chars[start..]
        .iter()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    if digits.is_empty() {
        return None;
    }

    u32::from_str_radix(&digits, 16).ok()
}
