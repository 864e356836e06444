//! Pipeline Integration Tests
//!
//! Drive whole ticks through the scheduler against real stores:
//! 1. Discovery -> updater -> candles -> levels -> indicators
//! 2. AI consensus opening a signal, then the updater stopping it out
//! 3. The same tick on an on-disk SQLite database
//!
//! All tests are deterministic (no real network calls) and use stub ports.

use std::sync::Arc;

use pulse_oracle::adapters::storage::{MemoryStore, SqliteStore};
use pulse_oracle::application::{run_maintenance, PipelineContext, Pacing, Scheduler, TickEvent};
use pulse_oracle::config::{Config, SettingsHandle};
use pulse_oracle::domain::ai::Decision;
use pulse_oracle::domain::candle::{Candle, Timeframe};
use pulse_oracle::domain::market::{MarketReading, MarketSnapshot};
use pulse_oracle::domain::signal::SignalStatus;
use pulse_oracle::domain::token::{classify, DiscoveredToken, TokenStatus};
use pulse_oracle::ports::{
    AnalysisStore, ManualClock, StubDiscovery, StubHolders, StubJudge, StubMarketData, TokenMarketUpdate,
};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

const T0: i64 = 1_700_000_000_000;
const MIN: i64 = 60_000;

// ============================================================================
// Test Fixtures
// ============================================================================

fn candidate(address: &str, source: &str) -> DiscoveredToken {
    DiscoveredToken {
        address: address.to_string(),
        chain: "solana".to_string(),
        name: Some(format!("{} Token", address)),
        symbol: Some(address.to_uppercase()),
        source: Some(source.to_string()),
    }
}

fn reading(price: f64, market_cap: f64, volume: f64) -> MarketReading {
    MarketReading {
        price: Some(price),
        market_cap: Some(market_cap),
        volume_24h: Some(volume),
        liquidity: Some(90_000.0),
        dex_id: Some("raydium".to_string()),
        ..Default::default()
    }
}

fn snapshot(address: &str, ts: i64) -> MarketSnapshot {
    reading(0.002, 2_000_000.0, 400_000.0).into_snapshot(address, Some(300), ts)
}

/// Settings with no tick spacing so a test can tick back to back
fn settings() -> Arc<SettingsHandle> {
    let mut config = Config::default();
    config.scheduler.min_tick_gap_secs = 0;
    Arc::new(SettingsHandle::fixed(config))
}

struct Harness {
    clock: Arc<ManualClock>,
    market: Arc<StubMarketData>,
    openai: Arc<StubJudge>,
    gemini: Arc<StubJudge>,
    scheduler: Scheduler,
}

fn harness(store: Arc<dyn AnalysisStore>, scanner: StubDiscovery, openai: Decision, gemini: Decision) -> Harness {
    let clock = Arc::new(ManualClock::new(T0));
    let market = Arc::new(StubMarketData::new());
    let openai = Arc::new(StubJudge::new("gpt-4o-mini", openai));
    let gemini = Arc::new(StubJudge::new("gemini-2.0-flash", gemini));
    let pacing = Pacing::unthrottled();

    let ctx = PipelineContext::new(store, market.clone(), Arc::new(StubHolders::new()), clock.clone(), settings())
        .with_scanner(Arc::new(scanner))
        .with_judge(openai.clone(), pacing.openai.clone())
        .with_judge(gemini.clone(), pacing.gemini.clone())
        .with_pacing(pacing);

    Harness { clock, market, openai, gemini, scheduler: Scheduler::new(Arc::new(ctx)) }
}

/// Token with enough history to be escalated: 100 snapshots, 100 15m candles
fn seed_ready_token(store: &dyn AnalysisStore, address: &str) {
    store
        .upsert_discovered(&classify(candidate(address, "dexscreener")), T0 - 200 * MIN)
        .unwrap();
    for i in 0..100 {
        store.insert_snapshot(&snapshot(address, T0 - (200 - i) * MIN)).unwrap();
    }
    let candles: Vec<Candle> = (0..100)
        .map(|i| Candle::new(T0 - (100 - i) * 15 * MIN, 0.002, 0.0021, 0.0019, 0.002, 500.0))
        .collect();
    store.upsert_candles(address, Timeframe::M15, &candles).unwrap();

    let mut token = store.token(address).unwrap().unwrap();
    token.apply_market(&reading(0.002, 2_000_000.0, 400_000.0), Some(300), T0 - 2 * MIN);
    store
        .record_market_update(&TokenMarketUpdate {
            token: &token,
            snapshot: &snapshot(address, T0 - 2 * MIN),
            signal: None,
        })
        .unwrap();
}

// ============================================================================
// Tick flow
// ============================================================================

#[tokio::test]
async fn test_ticks_build_history_and_mark_dead_tokens() {
    let store = Arc::new(MemoryStore::new());
    let scanner = StubDiscovery::new("dexscreener")
        .with_tokens(vec![candidate("alpha", "dexscreener"), candidate("dusty", "pumpfun")]);
    let h = harness(store.clone(), scanner, Decision::NoTrade, Decision::NoTrade);
    h.market.set_reading("alpha", reading(0.001, 500_000.0, 250_000.0));
    h.market.set_reading("dusty", reading(0.0001, 40_000.0, 5_000.0));

    let first = h.scheduler.tick().await.unwrap().expect("tick should start");

    assert_eq!(first.discovery.inserted, 2);
    assert_eq!(first.update.refreshed, 1);
    assert_eq!(first.update.marked_dead, 1);
    assert_eq!(store.token("dusty").unwrap().map(|t| t.status), Some(TokenStatus::Dead));
    let stage_names: Vec<&str> = first.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(stage_names.first(), Some(&"candles 15m"));
    assert_eq!(stage_names.last(), Some(&"transition"));

    for i in 1..=40 {
        h.clock.advance(MIN + 1_000);
        let price = 0.001 * (1.0 + i as f64 / 100.0);
        h.market.set_reading("alpha", reading(price, 500_000.0 * (1.0 + i as f64 / 100.0), 250_000.0));
        h.scheduler.tick().await.unwrap().expect("tick should start");
    }

    assert_eq!(store.snapshot_count("alpha").unwrap(), 41);
    let candles = store.recent_candles("alpha", Timeframe::M15, None).unwrap();
    assert!(candles.len() >= 3, "expected several 15m candles, got {}", candles.len());
    assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    // not enough history for the AI pass
    assert_eq!(h.openai.call_count(), 0);
    assert!(store.signals().unwrap().is_empty());

    let report = run_maintenance(store.as_ref(), &Config::default().retention_policy()).unwrap();
    assert_eq!(report.dead_tokens_purged, 1);
    assert!(store.token("dusty").unwrap().is_none());
}

#[tokio::test]
async fn test_consensus_opens_signal_and_updater_stops_it() {
    let store = Arc::new(MemoryStore::new());
    seed_ready_token(store.as_ref(), "ready");
    let scanner = StubDiscovery::new("dexscreener").with_tokens(vec![candidate("ready", "dexscreener")]);
    let h = harness(store.clone(), scanner, Decision::Buy, Decision::Buy);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let scheduler = h.scheduler.with_events(events_tx);
    h.market.set_reading("ready", reading(0.002, 2_000_000.0, 400_000.0));

    let report = scheduler.tick().await.unwrap().expect("tick should start");

    let ai = report.ai.expect("AI pass due on the first tick");
    assert_eq!(ai.selected, 1);
    assert_eq!(ai.decisions, 2);
    assert_eq!(ai.signals_opened, 1);
    assert_eq!(h.openai.call_count(), 1);
    assert_eq!(h.gemini.call_count(), 1);

    let signal = store.open_signal("ready").unwrap().expect("signal opened");
    assert_eq!(signal.start_market_cap, dec!(2000000));
    assert!(signal.decision_raw.is_some());
    assert!(matches!(events_rx.try_recv(), Ok(TickEvent::Succeeded(_))));

    // -30% from entry trips the -25% stop
    h.clock.advance(2 * MIN);
    h.market.set_reading("ready", reading(0.0014, 1_400_000.0, 400_000.0));
    let report = scheduler.tick().await.unwrap().expect("tick should start");

    assert_eq!(report.update.signals_closed, 1);
    assert!(store.open_signal("ready").unwrap().is_none());
    let signals = store.signals().unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].status, SignalStatus::Stopped);
    assert_eq!(signals[0].last_market_cap, dec!(1400000));
    // still inside the recheck interval, so the judges were not asked again
    assert_eq!(h.openai.call_count(), 1);
}

#[tokio::test]
async fn test_split_verdict_records_decisions_without_signal() {
    let store = Arc::new(MemoryStore::new());
    seed_ready_token(store.as_ref(), "ready");
    let h = harness(store.clone(), StubDiscovery::new("dexscreener"), Decision::Buy, Decision::NoTrade);
    h.market.set_reading("ready", reading(0.002, 2_000_000.0, 400_000.0));

    let report = h.scheduler.tick().await.unwrap().expect("tick should start");

    // failing scanner contributes nothing but does not fail the tick
    assert_eq!(report.discovery.candidates, 0);
    assert_eq!(report.ai.map(|a| a.signals_opened), Some(0));
    assert!(store.signals().unwrap().is_empty());
    assert!(store.token("ready").unwrap().and_then(|t| t.last_ai_check_at).is_some());
    assert_eq!(
        store.latest_ai_decision_for_model("ready", "gemini-2.0-flash").unwrap().map(|d| d.decision),
        Some(Decision::NoTrade)
    );
}

#[tokio::test]
async fn test_tick_on_sqlite_database() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn AnalysisStore> = Arc::new(SqliteStore::open(&dir.path().join("oracle.db")).unwrap());
    let scanner = StubDiscovery::new("pumpfun").with_tokens(vec![candidate("beta", "pumpfun")]);
    let h = harness(store.clone(), scanner, Decision::NoTrade, Decision::NoTrade);
    h.market.set_reading("beta", reading(0.01, 900_000.0, 300_000.0));

    for _ in 0..3 {
        h.scheduler.tick().await.unwrap().expect("tick should start");
        h.clock.advance(MIN + 1_000);
    }

    let token = store.token("beta").unwrap().expect("token stored");
    assert_eq!(token.tier, 2);
    assert_eq!(token.market_cap, Some(900_000.0));
    assert_eq!(store.snapshot_count("beta").unwrap(), 3);
    assert_eq!(store.recent_candles("beta", Timeframe::M15, None).unwrap().len(), 1);
}
