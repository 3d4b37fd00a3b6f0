//! Shared text formatting helpers for alert messages.

/// Abbreviates an address to its first and last four characters.
pub fn shorten_address(address: &str) -> String {
    let n = address.chars().count();
    if n <= 10 {
        return address.to_string();
    }
    let head: String = address.chars().take(4).collect();
    let tail: String = address.chars().skip(n - 4).collect();
    format!("{}...{}", head, tail)
}

/// Abbreviates a vault public key to its last four characters.
pub fn shorten_pubkey(pubkey: &str) -> String {
    let n = pubkey.chars().count();
    if n <= 10 {
        return pubkey.to_string();
    }
    pubkey.chars().skip(n - 4).collect()
}

/// Formats a ratio as a percentage with two decimal places.
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}
