//! Analysis store port
//!
//! The shared time-series store every stage reads from and writes to. Each
//! method is one stage's read or write contract, so stages can be tested
//! against `MemoryStore` fixtures instead of a live database.
//!
//! Writes that must be atomic (market update with signal advance, dead-token
//! purge, AI decision batches) are single methods here.

use serde::Serialize;
use thiserror::Error;

use crate::domain::ai::AiDecision;
use crate::domain::candle::{Candle, Timeframe};
use crate::domain::indicators::{
    BreakoutState, BuySellScore, PumpScore, RiskProfile, SupportResistance, Timing15m, TransitionState,
    TrendBias, VolumeAnomaly,
};
use crate::domain::market::MarketSnapshot;
use crate::domain::signal::{NewSignal, Signal};
use crate::domain::token::{ClassifiedToken, Token};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of ingesting one discovery candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryUpsert {
    Inserted,
    Merged,
    /// Already marked dead, left untouched
    SkippedDead,
}

/// Current-value indicator rows for one token; absent rows are `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenIndicators {
    pub trend_4h: Option<TrendBias>,
    pub timing_15m: Option<Timing15m>,
    pub volume: Option<VolumeAnomaly>,
    pub pump: Option<PumpScore>,
    pub risk: Option<RiskProfile>,
    pub breakout: Option<BreakoutState>,
    pub transition: Option<TransitionState>,
    pub score: Option<BuySellScore>,
}

/// One indicator row to upsert by token key
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorRow {
    Trend(TrendBias),
    Timing(Timing15m),
    Volume(VolumeAnomaly),
    Pump(PumpScore),
    Risk(RiskProfile),
    Breakout(BreakoutState),
    Transition(TransitionState),
    Score(BuySellScore),
}

impl IndicatorRow {
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorRow::Trend(_) => "trend",
            IndicatorRow::Timing(_) => "timing",
            IndicatorRow::Volume(_) => "volume",
            IndicatorRow::Pump(_) => "pump",
            IndicatorRow::Risk(_) => "risk",
            IndicatorRow::Breakout(_) => "breakout",
            IndicatorRow::Transition(_) => "transition",
            IndicatorRow::Score(_) => "score",
        }
    }

    /// Replace the matching field of `indicators`
    pub fn apply_to(self, indicators: &mut TokenIndicators) {
        match self {
            IndicatorRow::Trend(v) => indicators.trend_4h = Some(v),
            IndicatorRow::Timing(v) => indicators.timing_15m = Some(v),
            IndicatorRow::Volume(v) => indicators.volume = Some(v),
            IndicatorRow::Pump(v) => indicators.pump = Some(v),
            IndicatorRow::Risk(v) => indicators.risk = Some(v),
            IndicatorRow::Breakout(v) => indicators.breakout = Some(v),
            IndicatorRow::Transition(v) => indicators.transition = Some(v),
            IndicatorRow::Score(v) => indicators.score = Some(v),
        }
    }
}

/// Everything the updater writes for one token refresh
#[derive(Debug, Clone, Copy)]
pub struct TokenMarketUpdate<'a> {
    /// Token row with the new market fields applied
    pub token: &'a Token,
    pub snapshot: &'a MarketSnapshot,
    /// OPEN signal after advancement, if the token has one
    pub signal: Option<&'a Signal>,
}

/// Bounded history kept per token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub snapshots_per_token: usize,
    pub candles_per_timeframe: usize,
    pub ai_decisions_per_token: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            snapshots_per_token: 10_000,
            candles_per_timeframe: 500,
            ai_decisions_per_token: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub dead_tokens_purged: usize,
    pub snapshots_pruned: usize,
    pub candles_pruned: usize,
    pub ai_decisions_pruned: usize,
}

pub trait AnalysisStore: Send + Sync {
    // --- tokens ---

    fn upsert_discovered(&self, token: &ClassifiedToken, now: i64) -> Result<DiscoveryUpsert, StoreError>;

    fn token(&self, address: &str) -> Result<Option<Token>, StoreError>;

    fn active_tokens(&self) -> Result<Vec<Token>, StoreError>;

    /// Active tokens never updated or last updated before `stale_before`, stalest first
    fn tokens_due_for_update(&self, stale_before: i64) -> Result<Vec<Token>, StoreError>;

    /// Flag a token dead and drop its snapshots, candles and derived rows in one transaction
    fn mark_dead(&self, address: &str, now: i64) -> Result<(), StoreError>;

    /// Token fields, snapshot append and signal advancement in one transaction
    fn record_market_update(&self, update: &TokenMarketUpdate<'_>) -> Result<(), StoreError>;

    // --- snapshots ---

    fn insert_snapshot(&self, snapshot: &MarketSnapshot) -> Result<(), StoreError>;

    /// Snapshots with `timestamp >= since`, ascending
    fn snapshots_since(&self, address: &str, since: i64) -> Result<Vec<MarketSnapshot>, StoreError>;

    /// Newest first
    fn latest_snapshots(&self, address: &str, limit: usize) -> Result<Vec<MarketSnapshot>, StoreError>;

    fn snapshot_count(&self, address: &str) -> Result<usize, StoreError>;

    // --- candles ---

    fn latest_candle(&self, address: &str, timeframe: Timeframe) -> Result<Option<Candle>, StoreError>;

    /// Upsert by (token, timeframe, bucket start)
    fn upsert_candles(&self, address: &str, timeframe: Timeframe, candles: &[Candle]) -> Result<(), StoreError>;

    /// Most recent `limit` candles, ascending; `None` for all of them
    fn recent_candles(&self, address: &str, timeframe: Timeframe, limit: Option<usize>) -> Result<Vec<Candle>, StoreError>;

    /// Candles across every timeframe
    fn candle_count(&self, address: &str) -> Result<usize, StoreError>;

    // --- support/resistance ---

    fn support_resistance(&self, address: &str, timeframe: Timeframe) -> Result<Option<SupportResistance>, StoreError>;

    fn upsert_support_resistance(
        &self,
        address: &str,
        timeframe: Timeframe,
        levels: &SupportResistance,
        now: i64,
    ) -> Result<(), StoreError>;

    // --- indicators ---

    fn indicators(&self, address: &str) -> Result<TokenIndicators, StoreError>;

    fn upsert_indicator(&self, address: &str, row: &IndicatorRow, now: i64) -> Result<(), StoreError>;

    // --- signals ---

    fn open_signal(&self, address: &str) -> Result<Option<Signal>, StoreError>;

    /// Rejected with `StoreError::Conflict` while the token has an OPEN signal
    fn insert_signal(&self, signal: &NewSignal) -> Result<Signal, StoreError>;

    /// Newest first
    fn signals(&self) -> Result<Vec<Signal>, StoreError>;

    // --- AI decisions ---

    fn latest_ai_decision(&self, address: &str) -> Result<Option<AiDecision>, StoreError>;

    fn latest_ai_decision_for_model(&self, address: &str, model: &str) -> Result<Option<AiDecision>, StoreError>;

    /// Newest first
    fn recent_ai_decisions(&self, address: &str, limit: usize) -> Result<Vec<AiDecision>, StoreError>;

    /// All or nothing
    fn insert_ai_decisions(&self, decisions: &[AiDecision]) -> Result<(), StoreError>;

    fn touch_ai_check(&self, address: &str, now: i64) -> Result<(), StoreError>;

    // --- maintenance ---

    /// Remove every row of every dead token, token row included; returns tokens purged
    fn purge_dead_tokens(&self) -> Result<usize, StoreError>;

    fn prune_history(&self, policy: &RetentionPolicy) -> Result<PruneReport, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::{PumpLabel, TimingSignal};

    #[test]
    fn test_indicator_row_applies_to_matching_field() {
        let mut indicators = TokenIndicators::default();

        IndicatorRow::Pump(PumpScore { score: 0.55, label: PumpLabel::Questionable, previous_score: None })
            .apply_to(&mut indicators);
        IndicatorRow::Timing(Timing15m { momentum: 0.01, volatility: 0.005, entry_quality: 1.0, signal: TimingSignal::Good })
            .apply_to(&mut indicators);

        assert_eq!(indicators.pump.as_ref().map(|p| p.score), Some(0.55));
        assert_eq!(indicators.timing_15m.as_ref().map(|t| t.signal), Some(TimingSignal::Good));
        assert!(indicators.risk.is_none());
    }

    #[test]
    fn test_default_retention() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.snapshots_per_token, 10_000);
        assert_eq!(policy.candles_per_timeframe, 500);
        assert_eq!(policy.ai_decisions_per_token, 20);
    }
}
