use async_trait::async_trait;
use thiserror::Error;

use crate::domain::token::DiscoveredToken;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Scanner request failed: {0}")]
    Request(String),

    #[error("Unexpected scanner payload: {0}")]
    Parse(String),
}

/// External scanner that lists candidate tokens
#[async_trait]
pub trait DiscoveryPort: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn discover(&self) -> Result<Vec<DiscoveredToken>, DiscoveryError>;
}
