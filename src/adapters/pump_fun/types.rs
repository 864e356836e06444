//! Pump.fun runner payloads

use serde::Deserialize;

use crate::domain::token::DiscoveredToken;

/// Source tag recorded for runner discoveries
pub const RUNNERS_SOURCE: &str = "pumpswap";

/// Entry of `/api/runners`
#[derive(Debug, Clone, Deserialize)]
pub struct Runner {
    #[serde(default)]
    pub coin: Option<RunnerCoin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerCoin {
    pub mint: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub usd_market_cap: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Runner {
    /// `None` for entries without a coin
    pub fn into_discovered(self) -> Option<DiscoveredToken> {
        let coin = self.coin?;
        Some(DiscoveredToken {
            address: coin.mint,
            chain: "solana".to_string(),
            name: non_empty(coin.name),
            symbol: non_empty(coin.symbol),
            source: Some(RUNNERS_SOURCE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_into_discovered() {
        let runners: Vec<Runner> = serde_json::from_str(
            r#"[
                {"coin": {"mint": "Run1pump", "name": "Runner", "symbol": "RUN", "usd_market_cap": 812000.5, "is_currently_live": true}},
                {"coin": {"mint": "Run2pump", "name": "", "symbol": null}},
                {"description": "no coin"}
            ]"#,
        )
        .unwrap();

        let tokens: Vec<DiscoveredToken> = runners.into_iter().filter_map(Runner::into_discovered).collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].symbol.as_deref(), Some("RUN"));
        assert_eq!(tokens[0].source.as_deref(), Some("pumpswap"));
        assert_eq!(tokens[1].name, None);
        assert_eq!(tokens[1].symbol, None);
    }
}
