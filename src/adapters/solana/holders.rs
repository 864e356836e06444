//! On-chain holder estimate
//!
//! Reads the largest token accounts and the total supply for a mint and feeds
//! them to `approximate_holders`. The RPC client is blocking, so every call
//! runs on the blocking pool.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use crate::domain::market::approximate_holders;
use crate::ports::holders::{HolderCountPort, HolderError};

#[derive(Clone)]
pub struct SolanaHolderEstimator {
    client: Arc<RpcClient>,
}

impl SolanaHolderEstimator {
    /// Unknown commitment levels fall back to `confirmed`
    pub fn new(rpc_url: String, commitment: &str) -> Self {
        let commitment = CommitmentConfig::from_str(commitment).unwrap_or_else(|_| {
            warn!("[HOLDERS] Unknown commitment '{}', using confirmed", commitment);
            CommitmentConfig::confirmed()
        });
        let client = Arc::new(RpcClient::new_with_commitment(rpc_url, commitment));
        Self { client }
    }
}

fn classify_rpc_error(err: ClientError) -> HolderError {
    let message = err.to_string();
    if is_rate_limit_message(&message) {
        HolderError::RateLimited
    } else {
        HolderError::Rpc(message)
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    message.contains("429") || message.to_lowercase().contains("rate limit")
}

/// Raw base-unit amount; unparseable amounts count as zero
fn parse_amount(amount: &str) -> u64 {
    amount.parse::<u64>().unwrap_or(0)
}

#[async_trait]
impl HolderCountPort for SolanaHolderEstimator {
    async fn holder_count(&self, mint: &str) -> Result<u64, HolderError> {
        let pubkey = Pubkey::from_str(mint).map_err(|e| HolderError::InvalidMint(e.to_string()))?;
        let client = Arc::clone(&self.client);
        let mint = mint.to_string();

        let count = tokio::task::spawn_blocking(move || {
            let largest = client
                .get_token_largest_accounts(&pubkey)
                .map_err(classify_rpc_error)?;
            if largest.is_empty() {
                return Err(HolderError::NoAccounts(mint));
            }
            let balances: Vec<u64> = largest.iter().map(|a| parse_amount(&a.amount.amount)).collect();

            let supply = client.get_token_supply(&pubkey).map_err(classify_rpc_error)?;
            Ok(approximate_holders(&balances, parse_amount(&supply.amount)))
        })
        .await
        .map_err(|e| HolderError::Rpc(format!("Task join error: {}", e)))??;

        Ok(count)
    }
}
