use async_trait::async_trait;
use thiserror::Error;

use crate::domain::market::MarketReading;

/// Market data error type
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("REST API error: {0}")]
    RestError(String),

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),
}

/// Best-available trading pair lookup for a token
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// `Ok(None)` when no pair exists for the token
    async fn fetch_pair(&self, token_address: &str) -> Result<Option<MarketReading>, MarketDataError>;
}
