//! DexScreener Client
//!
//! Two endpoints are used:
//! - `/token-boosts/top/v1` as a discovery source (Solana entries only)
//! - `/latest/dex/tokens/{address}` for the per-token market readout

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::types::{select_primary_pair, BoostEntry, TokenPairsResponse, SOLANA_CHAIN};
use crate::domain::market::MarketReading;
use crate::domain::token::DiscoveredToken;
use crate::ports::discovery::{DiscoveryError, DiscoveryPort};
use crate::ports::market_data::{MarketDataError, MarketDataPort};

pub const DEXSCREENER_API: &str = "https://api.dexscreener.com";

#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    http: Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(DEXSCREENER_API, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn boosts_url(&self) -> String {
        format!("{}/token-boosts/top/v1", self.base_url)
    }

    fn pairs_url(&self, token_address: &str) -> String {
        format!("{}/latest/dex/tokens/{}", self.base_url, token_address)
    }
}

#[async_trait]
impl DiscoveryPort for DexScreenerClient {
    fn name(&self) -> &str {
        "dexscreener"
    }

    async fn discover(&self) -> Result<Vec<DiscoveredToken>, DiscoveryError> {
        let response = self
            .http
            .get(self.boosts_url())
            .send()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Request(format!("boosts returned status {}", response.status())));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(e.to_string()))?;

        // Anything other than an array is treated as an empty listing
        if !body.is_array() {
            warn!("[DISCOVERY] dexscreener boosts payload is not a list");
            return Ok(Vec::new());
        }
        let entries: Vec<BoostEntry> =
            serde_json::from_value(body).map_err(|e| DiscoveryError::Parse(e.to_string()))?;

        let tokens: Vec<DiscoveredToken> = entries
            .into_iter()
            .filter(|e| e.chain_id == SOLANA_CHAIN)
            .map(|e| DiscoveredToken {
                address: e.token_address,
                chain: SOLANA_CHAIN.to_string(),
                name: None,
                symbol: None,
                source: None,
            })
            .collect();

        debug!("[DISCOVERY] dexscreener returned {} solana boosts", tokens.len());
        Ok(tokens)
    }
}

#[async_trait]
impl MarketDataPort for DexScreenerClient {
    async fn fetch_pair(&self, token_address: &str) -> Result<Option<MarketReading>, MarketDataError> {
        let response = self
            .http
            .get(self.pairs_url(token_address))
            .send()
            .await
            .map_err(|e| MarketDataError::RestError(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(MarketDataError::RateLimited("dexscreener".to_string())),
            status if !status.is_success() => {
                return Err(MarketDataError::RestError(format!("pairs returned status {}", status)));
            }
            _ => {}
        }

        let body: TokenPairsResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::ParseError(e.to_string()))?;

        Ok(body
            .pairs
            .and_then(select_primary_pair)
            .map(|pair| pair.into_reading()))
    }
}
