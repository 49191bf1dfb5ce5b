//! Avalanche C-Chain token and contract definitions
//!
//! Decimals matter: USDC/USDT are 6, BTC.b is 8, everything else here is 18.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Token information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Identifier used by the public price API
    pub price_id: String,
}

impl Token {
    pub fn new(address: Address, symbol: &str, name: &str, decimals: u8, price_id: &str) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            price_id: price_id.to_string(),
        }
    }
}

pub const WAVAX: Address = address!("B31f66AA3C1e785363F0875A1B74E27b85FD66c7");
pub const USDC: Address = address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E");
pub const USDT: Address = address!("9702230A8Ea53601f5cD2dc00fDBc13d4dF4A8c7");
pub const BTC_B: Address = address!("152b9d0FdC40C096757F570A51E494bd4b943E50");
pub const SAVAX: Address = address!("2b2C81e08f1Af8835a78Bb2A90AE924ACE0eA4bE");
pub const GGAVAX: Address = address!("A25EaF2906FA1a3a13EdAc9B9657108Af7B703e3");
pub const AVUSD: Address = address!("24dE8771bC5DdB3362Db529Fc3358F2df3A0E346");
pub const SAVUSD: Address = address!("06d47F3fb376649c3A9Dafe069B3D6E35572219E");

/// BENQI lending markets (qiTokens)
pub const QI_AVAX: Address = address!("5C0401e81Bc07Ca70fAD469b451682c0d747Ef1c");
pub const QI_USDC: Address = address!("B715808a78F6041E46d61Cb123C9B4A27056AE9C");
pub const QI_USDT: Address = address!("d8fcDa6ec4Bdc547C0827B8804e89aCd817d56EF");
pub const QI_BTC_B: Address = address!("89a415b3D20098E6A6C8f7a59001C67BD3129821");
pub const QI_SAVAX: Address = address!("F362feA9659cf036792c9cb02f8ff8198E21B4cB");

/// Well-known tokens keyed by upper-case symbol
pub static TOKENS: LazyLock<HashMap<&'static str, Token>> = LazyLock::new(|| {
    let mut tokens = HashMap::new();
    tokens.insert("AVAX", Token::new(WAVAX, "AVAX", "Avalanche", 18, "avalanche-2"));
    tokens.insert("USDC", Token::new(USDC, "USDC", "USD Coin", 6, "usd-coin"));
    tokens.insert("USDT", Token::new(USDT, "USDT", "Tether USD", 6, "tether"));
    tokens.insert("BTC.B", Token::new(BTC_B, "BTC.b", "Bitcoin (Avalanche Bridge)", 8, "bitcoin"));
    tokens.insert(
        "SAVAX",
        Token::new(SAVAX, "sAVAX", "BENQI Liquid Staked AVAX", 18, "benqi-liquid-staked-avax"),
    );
    tokens.insert("GGAVAX", Token::new(GGAVAX, "ggAVAX", "GoGoPool AVAX", 18, "gogopool-ggavax"));
    tokens.insert("AVUSD", Token::new(AVUSD, "avUSD", "Avant USD", 18, "avant-usd"));
    tokens.insert("SAVUSD", Token::new(SAVUSD, "savUSD", "Staked avUSD", 18, "avant-staked-usd"));
    tokens
});

/// Static USD prices used when the price API is unavailable, keyed by lower-case symbol
pub static FALLBACK_PRICES: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(|| {
    HashMap::from([
        ("avax", 42.50),
        ("savax", 50.15),
        ("ggavax", 44.20),
        ("usdc", 1.00),
        ("usdt", 1.00),
        ("btc.b", 65_000.0),
        ("avusd", 1.00),
        ("savusd", 1.08),
        ("qi", 0.015),
        ("ggp", 8.50),
        ("png", 0.06),
    ])
});

/// Look up a token by symbol, case-insensitively
pub fn get_token(symbol: &str) -> Option<&'static Token> {
    TOKENS.get(symbol.to_uppercase().as_str())
}

/// Price API identifier for a symbol
pub fn price_id(symbol: &str) -> Option<&'static str> {
    get_token(symbol).map(|t| t.price_id.as_str()).or_else(|| {
        match symbol.to_lowercase().as_str() {
            "qi" => Some("benqi"),
            "ggp" => Some("gogopool"),
            "png" => Some("pangolin"),
            _ => None,
        }
    })
}

/// Token decimals, defaulting to 18
pub fn decimals_of(symbol: &str) -> u8 {
    get_token(symbol).map(|t| t.decimals).unwrap_or(18)
}

/// Static fallback USD price
pub fn fallback_price(symbol: &str) -> Option<f64> {
    FALLBACK_PRICES.get(symbol.to_lowercase().as_str()).copied()
}

/// Display symbol for wrapped native tokens
pub fn display_symbol(symbol: &str) -> &str {
    match symbol {
        "WAVAX" => "AVAX",
        "WETH.e" => "ETH",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stablecoin_decimals() {
        assert_eq!(decimals_of("usdc"), 6);
        assert_eq!(decimals_of("USDT"), 6);
        assert_eq!(decimals_of("btc.b"), 8);
        assert_eq!(decimals_of("sAVAX"), 18);
        assert_eq!(decimals_of("unknown"), 18);
    }

    #[test]
    fn test_price_ids() {
        assert_eq!(price_id("AVAX"), Some("avalanche-2"));
        assert_eq!(price_id("qi"), Some("benqi"));
        assert_eq!(price_id("nope"), None);
    }

    #[test]
    fn test_fallback_avax_price() {
        assert_eq!(FALLBACK_PRICES.get("avax"), Some(&42.50));
    }

    #[test]
    fn test_display_symbol() {
        assert_eq!(display_symbol("WAVAX"), "AVAX");
        assert_eq!(display_symbol("USDC"), "USDC");
    }
}
