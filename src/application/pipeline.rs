//! Analysis stages
//!
//! Candle aggregation, support/resistance and the indicator chain. Each stage
//! walks the active tokens one at a time, reads the rows upstream stages
//! wrote, and upserts its own. A token that lacks its inputs is skipped
//! quietly; a token whose store calls fail is logged and the stage moves on.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::analysis::breakout::{BREAKOUT_WINDOW, MIN_BREAKOUT_CLOSES, MISSING_VOLATILITY};
use crate::analysis::pump::DEFAULT_DURATION_BARS;
use crate::analysis::timing::TIMING_WINDOW;
use crate::analysis::volume::VOLUME_WINDOW;
use crate::analysis::{
    buy_sell_score, detect_breakout, detect_transition, needs_recalculation, pump_score, risk_profile,
    support_resistance, timing_15m, trend_bias, volume_anomaly, BreakoutInputs, LevelParams, PumpInputs, RiskInputs,
    ScoreInputs, TransitionInputs,
};
use crate::application::context::PipelineContext;
use crate::config::PacingSection;
use crate::domain::candle::{aggregate, Candle, Timeframe};
use crate::domain::indicators::BreakoutLevel;
use crate::domain::token::Token;
use crate::ports::store::{AnalysisStore, IndicatorRow, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Per-stage tally for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageReport {
    pub fn new(stage: impl Into<String>) -> Self {
        Self { stage: stage.into(), ..Default::default() }
    }

    fn record(&mut self, tag: &str, address: &str, result: Result<bool, StoreError>) {
        match result {
            Ok(true) => self.written += 1,
            Ok(false) => self.skipped += 1,
            Err(e) => {
                self.failed += 1;
                error!("[{}] {} failed: {}", tag, address, e);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Candles
// ----------------------------------------------------------------------------

/// Fold new snapshots for one token and timeframe into candles.
///
/// Snapshots are read from the start of the latest stored bucket, so that
/// bucket is re-folded from complete data. Candles equal to the stored
/// latest one are not rewritten. Returns the number of candles written.
pub fn build_candles(store: &dyn AnalysisStore, address: &str, timeframe: Timeframe) -> Result<usize, StoreError> {
    let latest = store.latest_candle(address, timeframe)?;
    let since = latest.as_ref().map_or(0, |c| c.timestamp);
    let snapshots = store.snapshots_since(address, since)?;

    let candles: Vec<Candle> = aggregate(&snapshots, timeframe)
        .into_iter()
        .filter(|candle| latest.as_ref() != Some(candle))
        .collect();

    if candles.is_empty() {
        return Ok(0);
    }
    store.upsert_candles(address, timeframe, &candles)?;
    Ok(candles.len())
}

pub async fn run_candles(
    ctx: &PipelineContext,
    pacing: &PacingSection,
    timeframe: Timeframe,
) -> Result<StageReport, PipelineError> {
    let tokens = ctx.store.active_tokens()?;
    let pause_ms = match timeframe {
        Timeframe::H4 => pacing.candle_batch_pause_4h_ms,
        _ => pacing.candle_batch_pause_ms,
    };
    let mut report = StageReport::new(format!("candles {}", timeframe));

    for (index, batch) in tokens.chunks(pacing.candle_batch_size.max(1)).enumerate() {
        if index > 0 && pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
        }
        for token in batch {
            let result = build_candles(ctx.store.as_ref(), &token.address, timeframe).map(|n| n > 0);
            report.record("CANDLES", &token.address, result);
        }
    }

    info!(
        "[CANDLES] {} built for {} tokens ({} unchanged)",
        timeframe, report.written, report.skipped
    );
    Ok(report)
}

// ----------------------------------------------------------------------------
// Support / resistance
// ----------------------------------------------------------------------------

/// Recalculate levels when candles newer than the last calculation exist
pub fn recalculate_levels(
    store: &dyn AnalysisStore,
    address: &str,
    timeframe: Timeframe,
    now: i64,
) -> Result<bool, StoreError> {
    let candles = store.recent_candles(address, timeframe, None)?;
    let previous = store.support_resistance(address, timeframe)?;
    if !needs_recalculation(&candles, previous.as_ref()) {
        return Ok(false);
    }

    let params = LevelParams::default();
    if candles.len() < params.min_candles {
        debug!("[SR] {} {} has {} candles, skipping", address, timeframe, candles.len());
        return Ok(false);
    }

    let levels = support_resistance(&candles, now, &params);
    store.upsert_support_resistance(address, timeframe, &levels, now)?;
    Ok(true)
}

pub fn run_support_resistance(ctx: &PipelineContext, timeframe: Timeframe) -> Result<StageReport, PipelineError> {
    let tokens = ctx.store.active_tokens()?;
    let now = ctx.now_ms();
    let mut report = StageReport::new(format!("sr {}", timeframe));

    for token in &tokens {
        let result = recalculate_levels(ctx.store.as_ref(), &token.address, timeframe, now);
        report.record("SR", &token.address, result);
    }

    info!("[SR] {} levels updated for {} tokens", timeframe, report.written);
    Ok(report)
}

// ----------------------------------------------------------------------------
// Indicator chain
// ----------------------------------------------------------------------------

/// Derive one indicator row for a token, `None` when inputs are missing
pub type Derivation = fn(&dyn AnalysisStore, &str) -> Result<Option<IndicatorRow>, StoreError>;

/// Indicator stages in dependency order
pub const INDICATOR_STAGES: [(&str, Derivation); 8] = [
    ("TREND", derive_trend),
    ("TIMING", derive_timing),
    ("SCORE", derive_score),
    ("VOLUME", derive_volume),
    ("PUMP", derive_pump),
    ("RISK", derive_risk),
    ("BREAKOUT", derive_breakout),
    ("TRANSITION", derive_transition),
];

pub fn derive_trend(store: &dyn AnalysisStore, address: &str) -> Result<Option<IndicatorRow>, StoreError> {
    let Some(levels) = store.support_resistance(address, Timeframe::H4)? else {
        return Ok(None);
    };
    let candles = store.recent_candles(address, Timeframe::H4, None)?;
    Ok(trend_bias(&candles, &levels).map(IndicatorRow::Trend))
}

pub fn derive_timing(store: &dyn AnalysisStore, address: &str) -> Result<Option<IndicatorRow>, StoreError> {
    let candles = store.recent_candles(address, Timeframe::M15, Some(TIMING_WINDOW))?;
    Ok(timing_15m(&candles).map(IndicatorRow::Timing))
}

pub fn derive_score(store: &dyn AnalysisStore, address: &str) -> Result<Option<IndicatorRow>, StoreError> {
    let Some(trend) = store.indicators(address)?.trend_4h else {
        return Ok(None);
    };
    let Some(levels) = store.support_resistance(address, Timeframe::H1)? else {
        return Ok(None);
    };
    let candles = store.recent_candles(address, Timeframe::H1, Some(2))?;
    let [previous, last] = candles.as_slice() else {
        return Ok(None);
    };

    let inputs = ScoreInputs {
        trend: &trend,
        support: levels.strongest_support(),
        resistance: levels.strongest_resistance(),
        close: last.close,
        previous_close: previous.close,
    };
    Ok(buy_sell_score(&inputs).map(IndicatorRow::Score))
}

pub fn derive_volume(store: &dyn AnalysisStore, address: &str) -> Result<Option<IndicatorRow>, StoreError> {
    let candles = store.recent_candles(address, Timeframe::M15, Some(VOLUME_WINDOW))?;
    Ok(volume_anomaly(&candles).map(IndicatorRow::Volume))
}

pub fn derive_pump(store: &dyn AnalysisStore, address: &str) -> Result<Option<IndicatorRow>, StoreError> {
    let indicators = store.indicators(address)?;
    let Some(volume) = indicators.volume else {
        return Ok(None);
    };
    let structure_count = store
        .support_resistance(address, Timeframe::H1)?
        .map_or(0, |levels| levels.supports.len());

    let inputs = PumpInputs {
        volume_ratio: volume.volume_ratio,
        duration_bars: DEFAULT_DURATION_BARS,
        structure_count,
    };
    Ok(Some(IndicatorRow::Pump(pump_score(&inputs, indicators.pump.as_ref()))))
}

pub fn derive_risk(store: &dyn AnalysisStore, address: &str) -> Result<Option<IndicatorRow>, StoreError> {
    let indicators = store.indicators(address)?;
    let (Some(pump), Some(timing), Some(trend), Some(score)) =
        (indicators.pump, indicators.timing_15m, indicators.trend_4h, indicators.score)
    else {
        return Ok(None);
    };

    let inputs = RiskInputs {
        pump_score: pump.score,
        timing: timing.signal,
        volatility_pct: timing.volatility * 100.0,
        trend_4h: trend.trend,
        buy_score: score.buy_score,
    };
    Ok(Some(IndicatorRow::Risk(risk_profile(&inputs))))
}

pub fn derive_breakout(store: &dyn AnalysisStore, address: &str) -> Result<Option<IndicatorRow>, StoreError> {
    let candles = store.recent_candles(address, Timeframe::H1, Some(BREAKOUT_WINDOW))?;
    if candles.len() < MIN_BREAKOUT_CLOSES {
        return Ok(None);
    }
    let resistance = store
        .support_resistance(address, Timeframe::H1)?
        .and_then(|levels| levels.strongest_resistance().map(|level| level.price));
    if resistance.is_none() {
        return Ok(None);
    }

    let indicators = store.indicators(address)?;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let inputs = BreakoutInputs {
        closes: &closes,
        resistance,
        volume_ratio: indicators.volume.map_or(0.0, |v| v.volume_ratio),
        volatility_15m: indicators.timing_15m.map_or(MISSING_VOLATILITY, |t| t.volatility),
    };
    Ok(Some(IndicatorRow::Breakout(detect_breakout(&inputs))))
}

pub fn derive_transition(store: &dyn AnalysisStore, address: &str) -> Result<Option<IndicatorRow>, StoreError> {
    let indicators = store.indicators(address)?;
    let (Some(volume), Some(pump), Some(risk), Some(timing)) =
        (indicators.volume, indicators.pump, indicators.risk, indicators.timing_15m)
    else {
        return Ok(None);
    };
    let Some(levels) = store.support_resistance(address, Timeframe::H1)? else {
        return Ok(None);
    };
    let Some(support) = levels.nearest_support() else {
        return Ok(None);
    };
    let Some(last) = store.recent_candles(address, Timeframe::H1, Some(1))?.pop() else {
        return Ok(None);
    };

    let inputs = TransitionInputs {
        breakout: indicators.breakout.map_or(BreakoutLevel::No, |b| b.state),
        price_above_support: last.close > support.price,
        volume_ratio: volume.volume_ratio,
        pump_delta: pump.delta(),
        momentum_15m: timing.momentum,
        risk_level: risk.risk_level,
        failure_risk: risk.failure_risk,
        expected_move: risk.expected_move,
    };
    Ok(Some(IndicatorRow::Transition(detect_transition(&inputs))))
}

/// Run one derivation over every token and upsert what it produces
pub fn run_indicator(
    store: &dyn AnalysisStore,
    tokens: &[Token],
    tag: &str,
    derive: Derivation,
    now: i64,
) -> StageReport {
    let mut report = StageReport::new(tag.to_lowercase());

    for token in tokens {
        let result = derive(store, &token.address).and_then(|row| match row {
            Some(row) => store.upsert_indicator(&token.address, &row, now).map(|_| true),
            None => {
                debug!("[{}] {} lacks inputs, skipping", tag, token.address);
                Ok(false)
            }
        });
        report.record(tag, &token.address, result);
    }

    info!("[{}] updated {} tokens", tag, report.written);
    report
}

/// Candles, levels and the indicator chain, in dependency order
pub async fn run_analysis_stages(
    ctx: &PipelineContext,
    pacing: &PacingSection,
) -> Result<Vec<StageReport>, PipelineError> {
    let mut reports = Vec::new();

    for timeframe in Timeframe::ALL {
        reports.push(run_candles(ctx, pacing, timeframe).await?);
    }
    for timeframe in [Timeframe::H1, Timeframe::H4] {
        reports.push(run_support_resistance(ctx, timeframe)?);
    }

    let tokens = ctx.store.active_tokens()?;
    for (tag, derive) in INDICATOR_STAGES {
        reports.push(run_indicator(ctx.store.as_ref(), &tokens, tag, derive, ctx.now_ms()));
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStore;
    use crate::application::context::fixtures::seed_token;
    use crate::domain::indicators::{
        BreakoutState, ExpectedMove, Level, PumpLabel, PumpScore, RiskLevel, RiskProfile, SupportResistance,
        Timing15m, TimingSignal, TransitionPhase, VolumeAnomaly,
    };
    use crate::domain::market::MarketSnapshot;

    const T0: i64 = 1_700_000_000_000;
    const MIN: i64 = 60_000;

    fn snapshot(ts: i64, price: f64) -> MarketSnapshot {
        MarketSnapshot {
            token_address: "Mint111".to_string(),
            price: Some(price),
            market_cap: Some(price * 1_000_000.0),
            volume_24h: Some(150_000.0),
            liquidity: Some(40_000.0),
            holders: Some(120),
            dex_id: None,
            timestamp: ts,
        }
    }

    fn hourly(store: &MemoryStore, count: i64, base: f64) {
        let candles: Vec<Candle> = (0..count)
            .map(|i| {
                let close = base + (i % 4) as f64 * 0.05;
                Candle::new(i * 60 * MIN, close, close + 0.1, close - 0.1, close, 1_000.0)
            })
            .collect();
        store.upsert_candles("Mint111", Timeframe::H1, &candles).unwrap();
    }

    #[test]
    fn test_build_candles_is_idempotent() {
        let store = MemoryStore::new();
        seed_token(&store, "Mint111", T0);
        for i in 0..6 {
            store.insert_snapshot(&snapshot(T0 + i * 5 * MIN, 1.0 + i as f64 * 0.01)).unwrap();
        }

        let first = build_candles(&store, "Mint111", Timeframe::M15).unwrap();
        let rows = store.recent_candles("Mint111", Timeframe::M15, None).unwrap();
        let second = build_candles(&store, "Mint111", Timeframe::M15).unwrap();

        assert!(first > 0);
        assert_eq!(second, 0);
        assert_eq!(store.recent_candles("Mint111", Timeframe::M15, None).unwrap(), rows);
    }

    #[test]
    fn test_build_candles_refolds_open_bucket() {
        let store = MemoryStore::new();
        seed_token(&store, "Mint111", T0);
        let bucket = Timeframe::H1.bucket_start(T0);
        store.insert_snapshot(&snapshot(bucket, 1.0)).unwrap();
        build_candles(&store, "Mint111", Timeframe::H1).unwrap();

        store.insert_snapshot(&snapshot(bucket + 10 * MIN, 1.4)).unwrap();
        assert_eq!(build_candles(&store, "Mint111", Timeframe::H1).unwrap(), 1);

        let candle = store.latest_candle("Mint111", Timeframe::H1).unwrap().unwrap();
        assert_eq!(candle.open, 1.0);
        assert_eq!(candle.high, 1.4);
        assert_eq!(candle.close, 1.4);
    }

    #[test]
    fn test_levels_need_ten_candles() {
        let store = MemoryStore::new();
        hourly(&store, 9, 1.0);
        assert!(!recalculate_levels(&store, "Mint111", Timeframe::H1, T0).unwrap());
        assert!(store.support_resistance("Mint111", Timeframe::H1).unwrap().is_none());
    }

    #[test]
    fn test_levels_skip_without_new_candles() {
        let store = MemoryStore::new();
        hourly(&store, 24, 1.0);

        assert!(recalculate_levels(&store, "Mint111", Timeframe::H1, T0).unwrap());
        assert!(!recalculate_levels(&store, "Mint111", Timeframe::H1, T0).unwrap());
    }

    #[test]
    fn test_pump_requires_volume_row() {
        let store = MemoryStore::new();
        assert!(derive_pump(&store, "Mint111").unwrap().is_none());

        store
            .upsert_indicator("Mint111", &IndicatorRow::Volume(VolumeAnomaly { volume_ratio: 3.2, anomaly: true }), T0)
            .unwrap();
        let Some(IndicatorRow::Pump(pump)) = derive_pump(&store, "Mint111").unwrap() else {
            panic!("expected a pump row");
        };
        // 0.4 volume + 0.15 duration, no structure
        assert!((pump.score - 0.55).abs() < 1e-9);
        assert_eq!(pump.label, PumpLabel::Questionable);
    }

    #[test]
    fn test_breakout_defaults_missing_rows() {
        let store = MemoryStore::new();
        hourly(&store, 8, 1.0);
        let levels = SupportResistance {
            supports: vec![],
            resistances: vec![Level { price: 0.5, strength: 0.8, touches: 3, first_touch: 0 }],
            last_calculated_at: 0,
        };
        store.upsert_support_resistance("Mint111", Timeframe::H1, &levels, T0).unwrap();

        let Some(IndicatorRow::Breakout(state)) = derive_breakout(&store, "Mint111").unwrap() else {
            panic!("expected a breakout row");
        };
        // both closes above, volume ratio 0, volatility 999
        assert_eq!(state.score, 2);
        assert_eq!(state.resistance, Some(0.5));
    }

    #[test]
    fn test_transition_waits_without_breakout() {
        let store = MemoryStore::new();
        hourly(&store, 4, 1.0);
        let levels = SupportResistance {
            supports: vec![Level { price: 0.8, strength: 0.7, touches: 2, first_touch: 0 }],
            resistances: vec![],
            last_calculated_at: 0,
        };
        store.upsert_support_resistance("Mint111", Timeframe::H1, &levels, T0).unwrap();
        let rows = [
            IndicatorRow::Volume(VolumeAnomaly { volume_ratio: 2.5, anomaly: true }),
            IndicatorRow::Pump(PumpScore { score: 0.8, label: PumpLabel::Valid, previous_score: Some(0.5) }),
            IndicatorRow::Risk(RiskProfile {
                risk_level: RiskLevel::Low,
                expected_move: ExpectedMove::Pct30To100,
                failure_risk: 20.0,
                setup_quality: 70.0,
            }),
            IndicatorRow::Timing(Timing15m { momentum: 0.02, volatility: 0.005, entry_quality: 1.0, signal: TimingSignal::Good }),
            IndicatorRow::Breakout(BreakoutState { state: BreakoutLevel::Weak, score: 2, resistance: Some(1.2) }),
        ];
        for row in &rows {
            store.upsert_indicator("Mint111", row, T0).unwrap();
        }

        let Some(IndicatorRow::Transition(state)) = derive_transition(&store, "Mint111").unwrap() else {
            panic!("expected a transition row");
        };
        assert_eq!(state.state, TransitionPhase::Wait);
        assert_eq!(state.satisfied, 0);
    }

    #[test]
    fn test_run_indicator_counts_skips() {
        let store = MemoryStore::new();
        seed_token(&store, "Mint111", T0);
        seed_token(&store, "Mint222", T0);
        let tokens = store.active_tokens().unwrap();

        let report = run_indicator(&store, &tokens, "RISK", derive_risk, T0);

        assert_eq!(report.written, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.stage, "risk");
    }
}
