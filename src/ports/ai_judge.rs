//! AI judge port
//!
//! A judge classifies one raw snapshot into exactly `BUY` or `NO_TRADE`.
//! Anything else is a protocol error for that call only.

use async_trait::async_trait;
use thiserror::Error;

use crate::analysis::snapshot::RawSnapshot;
use crate::domain::ai::{Decision, DecisionHistoryEntry};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JudgeError {
    #[error("Rate limited (429)")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),
}

impl JudgeError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, JudgeError::RateLimited)
    }
}

#[async_trait]
pub trait AiJudge: Send + Sync {
    /// Model identifier stored with every decision
    fn model(&self) -> &str;

    async fn judge(&self, snapshot: &RawSnapshot, history: &[DecisionHistoryEntry]) -> Result<Decision, JudgeError>;
}

/// Strict reply parsing shared by every provider
pub fn parse_reply(reply: &str) -> Result<Decision, JudgeError> {
    reply.parse::<Decision>().map_err(JudgeError::InvalidDecision)
}
