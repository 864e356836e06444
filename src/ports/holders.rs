use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HolderError {
    #[error("Invalid mint address: {0}")]
    InvalidMint(String),

    #[error("No token accounts for mint {0}")]
    NoAccounts(String),

    #[error("RPC rate limited")]
    RateLimited,

    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Approximate holder count derived from on-chain concentration.
///
/// Callers treat any error as "unknown"; it is never fatal to a refresh.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HolderCountPort: Send + Sync {
    async fn holder_count(&self, mint: &str) -> Result<u64, HolderError>;
}
