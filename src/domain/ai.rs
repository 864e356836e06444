//! AI judge verdicts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The only verdicts a judge may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Buy,
    NoTrade,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Buy => "BUY",
            Decision::NoTrade => "NO_TRADE",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    /// Strict parse of a raw judge reply after trimming and uppercasing
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Decision::Buy),
            "NO_TRADE" => Ok(Decision::NoTrade),
            other => Err(other.to_string()),
        }
    }
}

/// Immutable record of one judge call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiDecision {
    pub token_address: String,
    pub token_name: Option<String>,
    pub model: String,
    pub decision: Decision,
    pub snapshot_hash: String,
    pub created_at: i64,
}

/// Past verdict passed to judges as context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionHistoryEntry {
    pub decision: Decision,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl From<&AiDecision> for DecisionHistoryEntry {
    fn from(d: &AiDecision) -> Self {
        Self {
            decision: d.decision,
            created_at: d.created_at,
        }
    }
}

/// True only when at least one verdict was returned and every verdict is BUY
pub fn is_buy_consensus(decisions: &[Decision]) -> bool {
    !decisions.is_empty() && decisions.iter().all(|d| *d == Decision::Buy)
}
