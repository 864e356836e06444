//! Read models
//!
//! Pure reads over the derived tables for the CLI and any other presenter.
//! Missing rows come back as `None`, never as errors.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::Config;
use crate::domain::ai::AiDecision;
use crate::domain::candle::{Candle, Timeframe};
use crate::domain::indicators::SupportResistance;
use crate::domain::pnl::{equity_curve, live_pnl, signal_kpis, EquityPoint, SignalKpi, SignalRange};
use crate::domain::signal::Signal;
use crate::domain::token::Token;
use crate::ports::store::{AnalysisStore, StoreError, TokenIndicators};

/// 15m closes returned per token by `top_market_cap`
pub const TOP_CLOSES: usize = 30;

/// 1h candles in the analysis bundle
pub const ANALYSIS_CANDLES: usize = 60;

#[derive(Debug, Clone, Serialize)]
pub struct ActiveTokenRow {
    #[serde(flatten)]
    pub token: Token,
    pub openai: Option<AiDecision>,
    pub gemini: Option<AiDecision>,
}

fn by_market_cap_desc(tokens: &mut [Token]) {
    tokens.sort_by(|a, b| {
        let a = a.market_cap.unwrap_or(f64::MIN);
        let b = b.market_cap.unwrap_or(f64::MIN);
        b.total_cmp(&a)
    });
}

/// Active tokens by market cap, each with the latest verdict of both judges
pub fn active_token_rows(store: &dyn AnalysisStore, config: &Config) -> Result<Vec<ActiveTokenRow>, StoreError> {
    let mut tokens = store.active_tokens()?;
    by_market_cap_desc(&mut tokens);

    tokens
        .into_iter()
        .map(|token| {
            let openai = store.latest_ai_decision_for_model(&token.address, &config.ai.openai.model)?;
            let gemini = store.latest_ai_decision_for_model(&token.address, &config.ai.gemini.model)?;
            Ok(ActiveTokenRow { token, openai, gemini })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TopToken {
    #[serde(flatten)]
    pub token: Token,
    /// Ascending
    pub closes_15m: Vec<f64>,
}

pub fn top_market_cap(store: &dyn AnalysisStore, limit: usize) -> Result<Vec<TopToken>, StoreError> {
    let mut tokens = store.active_tokens()?;
    by_market_cap_desc(&mut tokens);
    tokens.truncate(limit);

    tokens
        .into_iter()
        .map(|token| {
            let closes_15m = store
                .recent_candles(&token.address, Timeframe::M15, Some(TOP_CLOSES))?
                .iter()
                .map(|c| c.close)
                .collect();
            Ok(TopToken { token, closes_15m })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenAnalysis {
    pub token: Option<Token>,
    pub candles_1h: Vec<Candle>,
    pub sr_1h: Option<SupportResistance>,
    pub sr_4h: Option<SupportResistance>,
    #[serde(flatten)]
    pub indicators: TokenIndicators,
}

pub fn token_analysis(store: &dyn AnalysisStore, address: &str) -> Result<TokenAnalysis, StoreError> {
    Ok(TokenAnalysis {
        token: store.token(address)?,
        candles_1h: store.recent_candles(address, Timeframe::H1, Some(ANALYSIS_CANDLES))?,
        sr_1h: store.support_resistance(address, Timeframe::H1)?,
        sr_4h: store.support_resistance(address, Timeframe::H4)?,
        indicators: store.indicators(address)?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalHistory {
    /// Newest first
    pub signals: Vec<Signal>,
    pub kpis: SignalKpi,
    /// Percent across OPEN signals
    pub live_pnl: Decimal,
    pub equity: Vec<EquityPoint>,
}

pub fn signal_history(store: &dyn AnalysisStore, range: SignalRange, now: i64) -> Result<SignalHistory, StoreError> {
    let signals = range.filter(store.signals()?, now);

    Ok(SignalHistory {
        kpis: signal_kpis(&signals),
        live_pnl: live_pnl(&signals),
        equity: equity_curve(&signals),
        signals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStore;
    use crate::application::context::fixtures::seed_token;
    use crate::domain::ai::Decision;
    use crate::domain::market::MarketReading;
    use crate::domain::signal::NewSignal;
    use crate::ports::store::TokenMarketUpdate;
    use rust_decimal_macros::dec;

    const T0: i64 = 1_700_000_000_000;
    const DAY: i64 = 86_400_000;

    fn with_market_cap(store: &MemoryStore, address: &str, market_cap: f64) {
        seed_token(store, address, T0);
        let mut token = store.token(address).unwrap().unwrap();
        let reading = MarketReading { price: Some(1.0), market_cap: Some(market_cap), ..Default::default() };
        token.apply_market(&reading, None, T0);
        let snapshot = reading.into_snapshot(address, None, T0);
        store
            .record_market_update(&TokenMarketUpdate { token: &token, snapshot: &snapshot, signal: None })
            .unwrap();
    }

    fn decision(address: &str, model: &str, verdict: Decision, at: i64) -> AiDecision {
        AiDecision {
            token_address: address.to_string(),
            token_name: None,
            model: model.to_string(),
            decision: verdict,
            snapshot_hash: "h".to_string(),
            created_at: at,
        }
    }

    #[test]
    fn test_active_rows_sorted_with_latest_per_model() {
        let store = MemoryStore::new();
        with_market_cap(&store, "Small", 200_000.0);
        with_market_cap(&store, "Large", 9_000_000.0);
        seed_token(&store, "Unpriced", T0);
        store
            .insert_ai_decisions(&[
                decision("Large", "gpt-4o-mini", Decision::NoTrade, T0),
                decision("Large", "gpt-4o-mini", Decision::Buy, T0 + 1),
                decision("Large", "gemini-2.0-flash", Decision::NoTrade, T0 + 1),
            ])
            .unwrap();

        let rows = active_token_rows(&store, &Config::default()).unwrap();

        let order: Vec<&str> = rows.iter().map(|r| r.token.address.as_str()).collect();
        assert_eq!(order, vec!["Large", "Small", "Unpriced"]);
        assert_eq!(rows[0].openai.as_ref().map(|d| d.decision), Some(Decision::Buy));
        assert_eq!(rows[0].gemini.as_ref().map(|d| d.decision), Some(Decision::NoTrade));
        assert!(rows[1].openai.is_none());
    }

    #[test]
    fn test_top_market_cap_limits_and_tails_closes() {
        let store = MemoryStore::new();
        with_market_cap(&store, "A", 5_000_000.0);
        with_market_cap(&store, "B", 1_000_000.0);
        let candles: Vec<Candle> =
            (0..40).map(|i| Candle::new(i * 900_000, 1.0, 1.0, 1.0, i as f64, 1.0)).collect();
        store.upsert_candles("A", Timeframe::M15, &candles).unwrap();

        let top = top_market_cap(&store, 1).unwrap();

        assert_eq!(top.len(), 1);
        assert_eq!(top[0].closes_15m.len(), TOP_CLOSES);
        assert_eq!(top[0].closes_15m.last(), Some(&39.0));
    }

    #[test]
    fn test_analysis_of_unknown_token_is_empty() {
        let store = MemoryStore::new();
        let analysis = token_analysis(&store, "Nobody").unwrap();

        assert!(analysis.token.is_none());
        assert!(analysis.candles_1h.is_empty());
        assert!(analysis.sr_1h.is_none());
        assert!(analysis.indicators.pump.is_none());
    }

    #[test]
    fn test_signal_history_range() {
        let store = MemoryStore::new();
        store
            .insert_signal(&NewSignal::new("Old".to_string(), dec!(1000000), T0 - 10 * DAY).unwrap())
            .unwrap();
        store
            .insert_signal(&NewSignal::new("New".to_string(), dec!(2000000), T0 - DAY / 2).unwrap())
            .unwrap();

        let week = signal_history(&store, SignalRange::Week, T0).unwrap();
        let all = signal_history(&store, SignalRange::All, T0).unwrap();

        assert_eq!(week.signals.len(), 1);
        assert_eq!(week.signals[0].token_address, "New");
        assert_eq!(all.signals.len(), 2);
        assert_eq!(all.live_pnl, Decimal::ZERO);
        assert!(all.equity.is_empty());
    }
}
