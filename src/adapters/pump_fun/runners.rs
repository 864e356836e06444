//! Pump.fun runners scanner
//!
//! Lists the currently trending coins from `/api/runners`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::types::Runner;
use crate::domain::token::DiscoveredToken;
use crate::ports::discovery::{DiscoveryError, DiscoveryPort};

pub const PUMPFUN_RUNNERS_URL: &str = "https://pump.fun/api/runners";

#[derive(Debug, Clone)]
pub struct PumpFunRunners {
    http: Client,
    url: String,
}

impl PumpFunRunners {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_url(PUMPFUN_RUNNERS_URL, timeout)
    }

    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }
}

/// Runner entries of a raw payload; non-list payloads yield nothing
pub fn parse_runners(body: serde_json::Value) -> Result<Vec<DiscoveredToken>, DiscoveryError> {
    if !body.is_array() {
        warn!("[DISCOVERY] pump.fun runners payload is not a list");
        return Ok(Vec::new());
    }

    let runners: Vec<Runner> = serde_json::from_value(body).map_err(|e| DiscoveryError::Parse(e.to_string()))?;
    Ok(runners.into_iter().filter_map(Runner::into_discovered).collect())
}

#[async_trait]
impl DiscoveryPort for PumpFunRunners {
    fn name(&self) -> &str {
        "pumpswap"
    }

    async fn discover(&self) -> Result<Vec<DiscoveredToken>, DiscoveryError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Request(format!("runners returned status {}", response.status())));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(e.to_string()))?;

        let tokens = parse_runners(body)?;
        debug!("[DISCOVERY] pump.fun returned {} runners", tokens.len());
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_list_payload_is_empty() {
        assert!(parse_runners(json!({"error": "maintenance"})).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_runner_is_parse_error() {
        let result = parse_runners(json!([{"coin": {"name": "no mint"}}]));
        assert!(matches!(result, Err(DiscoveryError::Parse(_))));
    }
}
