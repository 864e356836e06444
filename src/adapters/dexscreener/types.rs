//! DexScreener response payloads

use serde::Deserialize;

use crate::domain::market::MarketReading;

pub const SOLANA_CHAIN: &str = "solana";

/// Entry of `/token-boosts/top/v1`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostEntry {
    pub chain_id: String,
    pub token_address: String,
}

/// Body of `/latest/dex/tokens/{address}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenPairsResponse {
    #[serde(default)]
    pub pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub chain_id: String,
    #[serde(default)]
    pub dex_id: Option<String>,
    /// Decimal string
    #[serde(default)]
    pub price_usd: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub volume: Option<PairVolume>,
    #[serde(default)]
    pub liquidity: Option<PairLiquidity>,
    #[serde(default)]
    pub base_token: Option<BaseToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairVolume {
    #[serde(default)]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseToken {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl Pair {
    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }

    pub fn into_reading(self) -> MarketReading {
        let liquidity = self.liquidity_usd();
        let (name, symbol) = match self.base_token {
            Some(base) => (base.name, base.symbol),
            None => (None, None),
        };

        MarketReading {
            price: self.price_usd.and_then(|p| p.parse::<f64>().ok()),
            market_cap: self.market_cap,
            volume_24h: self.volume.and_then(|v| v.h24),
            liquidity,
            name,
            symbol,
            dex_id: self.dex_id.filter(|d| !d.is_empty()),
        }
    }
}

/// Solana pair with the deepest USD liquidity; the first listed wins ties
pub fn select_primary_pair(pairs: Vec<Pair>) -> Option<Pair> {
    let mut best: Option<Pair> = None;

    for pair in pairs.into_iter().filter(|p| p.chain_id == SOLANA_CHAIN) {
        let deeper = match &best {
            None => true,
            Some(current) => pair.liquidity_usd().unwrap_or(0.0) > current.liquidity_usd().unwrap_or(0.0),
        };
        if deeper {
            best = Some(pair);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIRS_JSON: &str = r#"{
        "schemaVersion": "1.0.0",
        "pairs": [
            {
                "chainId": "ethereum",
                "dexId": "uniswap",
                "priceUsd": "9.0",
                "liquidity": { "usd": 9000000 }
            },
            {
                "chainId": "solana",
                "dexId": "pumpswap",
                "priceUsd": "0.00041",
                "marketCap": 410000,
                "volume": { "h24": 220000, "h6": 50000 },
                "liquidity": { "usd": 30000, "base": 1, "quote": 2 },
                "baseToken": { "address": "Mint", "name": "Pulse", "symbol": "PLS" }
            },
            {
                "chainId": "solana",
                "dexId": "raydium",
                "priceUsd": "0.00042",
                "marketCap": 420000,
                "volume": { "h24": 250000 },
                "liquidity": { "usd": 55000 },
                "baseToken": { "name": "Pulse", "symbol": "PLS" }
            }
        ]
    }"#;

    #[test]
    fn test_picks_deepest_solana_pair() {
        let response: TokenPairsResponse = serde_json::from_str(PAIRS_JSON).unwrap();
        let pair = select_primary_pair(response.pairs.unwrap()).unwrap();
        let reading = pair.into_reading();

        assert_eq!(reading.dex_id.as_deref(), Some("raydium"));
        assert_eq!(reading.price, Some(0.00042));
        assert_eq!(reading.market_cap, Some(420_000.0));
        assert_eq!(reading.volume_24h, Some(250_000.0));
        assert_eq!(reading.liquidity, Some(55_000.0));
        assert_eq!(reading.symbol.as_deref(), Some("PLS"));
    }

    #[test]
    fn test_null_pairs_and_sparse_fields() {
        let response: TokenPairsResponse = serde_json::from_str(r#"{"pairs": null}"#).unwrap();
        assert!(response.pairs.is_none());

        let sparse: Pair = serde_json::from_str(r#"{"chainId": "solana", "dexId": "", "priceUsd": "n/a"}"#).unwrap();
        let reading = sparse.into_reading();
        assert_eq!(reading.price, None);
        assert_eq!(reading.dex_id, None);
        assert_eq!(reading.liquidity, None);
    }

    #[test]
    fn test_no_solana_pair() {
        let response: TokenPairsResponse = serde_json::from_str(
            r#"{"pairs": [{"chainId": "base", "liquidity": {"usd": 1.0}}]}"#,
        )
        .unwrap();
        assert!(select_primary_pair(response.pairs.unwrap()).is_none());
    }

    #[test]
    fn test_boost_entries() {
        let entries: Vec<BoostEntry> = serde_json::from_str(
            r#"[
                {"url": "x", "chainId": "solana", "tokenAddress": "AAA", "totalAmount": 500},
                {"chainId": "bsc", "tokenAddress": "0xBBB"}
            ]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].token_address, "AAA");
        assert_eq!(entries[1].chain_id, "bsc");
    }
}
