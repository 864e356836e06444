//! Token identity and lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;

use super::market::MarketReading;

/// Source tag whose discoveries are classified as tier 2
pub const PUMPFUN_SOURCE: &str = "pumpfun";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Dead,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TokenStatus::Active),
            "dead" => Some(TokenStatus::Dead),
            _ => None,
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate token returned by a discovery scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredToken {
    pub address: String,
    pub chain: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub source: Option<String>,
}

/// Discovery candidate after classification
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub source: Option<String>,
    pub tier: u8,
    pub status: TokenStatus,
}

pub fn classify(candidate: DiscoveredToken) -> ClassifiedToken {
    let tier = if candidate.source.as_deref() == Some(PUMPFUN_SOURCE) { 2 } else { 1 };

    ClassifiedToken {
        address: candidate.address,
        name: candidate.name,
        symbol: candidate.symbol,
        source: candidate.source,
        tier,
        status: TokenStatus::Active,
    }
}

/// Token row with its current market fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub source: Option<String>,
    pub tier: u8,
    pub status: TokenStatus,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub liquidity: Option<f64>,
    pub holders: Option<u64>,
    pub dex_id: Option<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub last_ai_check_at: Option<i64>,
}

impl Token {
    pub fn from_classified(token: ClassifiedToken, now: i64) -> Self {
        Self {
            address: token.address,
            name: token.name,
            symbol: token.symbol,
            source: token.source,
            tier: token.tier,
            status: token.status,
            price: None,
            market_cap: None,
            volume_24h: None,
            liquidity: None,
            holders: None,
            dex_id: None,
            created_at: now,
            updated_at: None,
            last_ai_check_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TokenStatus::Active
    }

    /// Merge a discovery candidate into an existing row, keeping known identity fields
    pub fn merge_discovery(&mut self, token: &ClassifiedToken) {
        if self.name.is_none() {
            self.name = token.name.clone();
        }
        if self.symbol.is_none() {
            self.symbol = token.symbol.clone();
        }
        if self.source.is_none() {
            self.source = token.source.clone();
        }
    }

    /// Apply a fresh market reading to the current-value fields.
    /// A missing holder count keeps the last known one.
    pub fn apply_market(&mut self, reading: &MarketReading, holders: Option<u64>, now: i64) {
        self.price = reading.price;
        self.market_cap = reading.market_cap;
        self.volume_24h = reading.volume_24h;
        self.liquidity = reading.liquidity;
        if holders.is_some() {
            self.holders = holders;
        }
        if reading.name.is_some() {
            self.name = reading.name.clone();
        }
        if reading.symbol.is_some() {
            self.symbol = reading.symbol.clone();
        }
        if reading.dex_id.is_some() {
            self.dex_id = reading.dex_id.clone();
        }
        self.updated_at = Some(now);
    }

    /// Whole days since the token was first discovered
    pub fn age_days(&self, now: i64) -> i64 {
        (now - self.created_at).div_euclid(86_400_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: Option<&str>) -> DiscoveredToken {
        DiscoveredToken {
            address: "Mint111".to_string(),
            chain: "solana".to_string(),
            name: Some("Pulse".to_string()),
            symbol: Some("PLS".to_string()),
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_tiers() {
        assert_eq!(classify(candidate(Some("pumpfun"))).tier, 2);
        assert_eq!(classify(candidate(Some("pumpswap"))).tier, 1);
        assert_eq!(classify(candidate(None)).tier, 1);
        assert_eq!(classify(candidate(None)).status, TokenStatus::Active);
    }

    #[test]
    fn test_merge_keeps_existing_identity() {
        let mut token = Token::from_classified(classify(candidate(Some("pumpswap"))), 0);
        let mut other = classify(candidate(None));
        other.name = Some("Renamed".to_string());

        token.merge_discovery(&other);
        assert_eq!(token.name.as_deref(), Some("Pulse"));
        assert_eq!(token.source.as_deref(), Some("pumpswap"));
    }

    #[test]
    fn test_merge_fills_missing_identity() {
        let mut bare = candidate(None);
        bare.name = None;
        let mut token = Token::from_classified(classify(bare), 0);

        token.merge_discovery(&classify(candidate(Some("pumpswap"))));
        assert_eq!(token.name.as_deref(), Some("Pulse"));
        assert_eq!(token.source.as_deref(), Some("pumpswap"));
    }

    #[test]
    fn test_apply_market_updates_current_fields() {
        let mut token = Token::from_classified(classify(candidate(None)), 0);
        let reading = MarketReading {
            price: Some(0.01),
            market_cap: Some(2_000_000.0),
            volume_24h: Some(400_000.0),
            liquidity: Some(90_000.0),
            name: None,
            symbol: Some("PLS2".to_string()),
            dex_id: Some("raydium".to_string()),
        };

        token.apply_market(&reading, Some(320), 5_000);
        assert_eq!(token.market_cap, Some(2_000_000.0));
        assert_eq!(token.holders, Some(320));
        assert_eq!(token.name.as_deref(), Some("Pulse"));
        assert_eq!(token.symbol.as_deref(), Some("PLS2"));
        assert_eq!(token.updated_at, Some(5_000));

        token.apply_market(&reading, None, 6_000);
        assert_eq!(token.holders, Some(320));
        assert_eq!(token.updated_at, Some(6_000));
    }

    #[test]
    fn test_age_days() {
        let token = Token::from_classified(classify(candidate(None)), 0);
        assert_eq!(token.age_days(86_400_000 * 3 + 10), 3);
        assert_eq!(token.age_days(1), 0);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TokenStatus::parse("dead"), Some(TokenStatus::Dead));
        assert_eq!(TokenStatus::parse("zombie"), None);
        assert_eq!(TokenStatus::Active.to_string(), "active");
    }
}
