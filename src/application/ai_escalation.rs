//! AI escalation
//!
//! Two paths share the raw snapshot and its content hash:
//!
//! - **Scheduled**: a bounded batch of eligible tokens, stalest AI check
//!   first. Judges are polled one after another with provider and token
//!   gaps, and a BUY from every judge that answered opens a signal.
//! - **On demand**: one token, judges polled concurrently with recent
//!   history, verdicts returned to the caller.
//!
//! Both skip the judges when the snapshot hash matches the last stored
//! decision.

use futures::future::join_all;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::analysis::snapshot::{build_raw_snapshot, hash_json, RawSnapshot, SnapshotSources, SNAPSHOT_CANDLES};
use crate::application::context::{PacedJudge, PipelineContext};
use crate::application::pipeline::PipelineError;
use crate::config::Config;
use crate::domain::ai::{is_buy_consensus, AiDecision, Decision, DecisionHistoryEntry};
use crate::domain::candle::Timeframe;
use crate::domain::signal::NewSignal;
use crate::domain::token::Token;
use crate::ports::ai_judge::JudgeError;
use crate::ports::store::{AnalysisStore, StoreError};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No token address provided")]
    NoTokenAddress,

    #[error("Insufficient snapshot data")]
    InsufficientData,

    #[error("All AI providers failed")]
    AllProvidersFailed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Raw snapshot with its serialized form and content hash
#[derive(Debug, Clone)]
pub struct PreparedSnapshot {
    pub token: Token,
    pub snapshot: RawSnapshot,
    pub json: String,
    pub hash: String,
}

/// Build the raw snapshot for a token from the store.
///
/// `None` when the token row or its current snapshot is missing.
pub fn prepare_snapshot(
    store: &dyn AnalysisStore,
    address: &str,
    now: i64,
) -> Result<Option<PreparedSnapshot>, StoreError> {
    let Some(token) = store.token(address)? else {
        return Ok(None);
    };
    let latest = store.latest_snapshots(address, 2)?;
    let Some(current) = latest.first() else {
        return Ok(None);
    };
    let candles_15m = store.recent_candles(address, Timeframe::M15, Some(SNAPSHOT_CANDLES))?;
    let candles_1h = store.recent_candles(address, Timeframe::H1, Some(SNAPSHOT_CANDLES))?;

    let snapshot = build_raw_snapshot(&SnapshotSources {
        token: &token,
        current,
        previous: latest.get(1),
        candles_15m: &candles_15m,
        candles_1h: &candles_1h,
        now_ms: now,
    });
    let json = snapshot.to_json()?;
    let hash = hash_json(&json);

    Ok(Some(PreparedSnapshot { token, snapshot, json, hash }))
}

/// Latest stored decision when it was made on the same snapshot
fn cached_decision(store: &dyn AnalysisStore, address: &str, hash: &str) -> Result<Option<AiDecision>, StoreError> {
    Ok(store.latest_ai_decision(address)?.filter(|d| d.snapshot_hash == hash))
}

fn log_judge_failure(model: &str, address: &str, err: &JudgeError) {
    match err {
        JudgeError::RateLimited => warn!("[RATE LIMIT] {} returned 429 for {}", model, address),
        other => error!("[AI] {} failed for {}: {}", model, address, other),
    }
}

fn record(prepared: &PreparedSnapshot, model: &str, decision: Decision, created_at: i64) -> AiDecision {
    AiDecision {
        token_address: prepared.token.address.clone(),
        token_name: prepared.token.name.clone(),
        model: model.to_string(),
        decision,
        snapshot_hash: prepared.hash.clone(),
        created_at,
    }
}

// ----------------------------------------------------------------------------
// Scheduled escalation
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EscalationReport {
    /// Tokens that passed eligibility
    pub selected: usize,
    pub cache_hits: usize,
    pub decisions: usize,
    pub provider_failures: usize,
    pub signals_opened: usize,
    pub failed: usize,
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Escalation {
    Ineligible(&'static str),
    CacheHit,
    Judged { decisions: usize, failures: usize, signal_opened: bool },
}

fn eligibility(
    store: &dyn AnalysisStore,
    config: &Config,
    token: &Token,
    now: i64,
) -> Result<Option<&'static str>, StoreError> {
    let ai = &config.ai;

    if token.volume_24h.unwrap_or(0.0) < ai.min_volume {
        return Ok(Some("volume below minimum"));
    }
    let recheck_ms = (ai.recheck_interval_secs * 1000) as i64;
    if token.last_ai_check_at.is_some_and(|checked| now - checked < recheck_ms) {
        return Ok(Some("checked recently"));
    }
    if store.open_signal(&token.address)?.is_some() {
        return Ok(Some("signal already open"));
    }
    if store.snapshot_count(&token.address)? < ai.min_snapshots {
        return Ok(Some("too few snapshots"));
    }
    if store.candle_count(&token.address)? < ai.min_candles {
        return Ok(Some("too few candles"));
    }
    Ok(None)
}

/// Open a signal at the token's latest market cap. `false` when one is
/// already open or no usable market cap exists.
fn open_consensus_signal(ctx: &PipelineContext, prepared: &PreparedSnapshot, now: i64) -> Result<bool, StoreError> {
    let token = &prepared.token;
    let Some(market_cap) = token.market_cap.and_then(Decimal::from_f64) else {
        warn!("[SIGNAL] {} has no market cap, consensus ignored", token.address);
        return Ok(false);
    };
    let entry = match NewSignal::new(token.address.clone(), market_cap, now) {
        Ok(entry) => entry
            .with_identity(token.name.clone(), token.symbol.clone())
            .with_decision_raw(prepared.json.clone()),
        Err(e) => {
            warn!("[SIGNAL] {}: {}", token.address, e);
            return Ok(false);
        }
    };

    match ctx.store.insert_signal(&entry) {
        Ok(signal) => {
            info!(
                "[SIGNAL] Opened #{} for {} at market cap {}",
                signal.id, token.address, signal.start_market_cap
            );
            Ok(true)
        }
        Err(StoreError::Conflict(reason)) => {
            warn!("[SIGNAL] {} not opened: {}", token.address, reason);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn escalate_token(ctx: &PipelineContext, config: &Config, token: &Token) -> Result<Escalation, StoreError> {
    let now = ctx.now_ms();
    let address = token.address.as_str();

    if let Some(reason) = eligibility(ctx.store.as_ref(), config, token, now)? {
        return Ok(Escalation::Ineligible(reason));
    }
    let Some(prepared) = prepare_snapshot(ctx.store.as_ref(), address, now)? else {
        return Ok(Escalation::Ineligible("no current snapshot"));
    };

    if cached_decision(ctx.store.as_ref(), address, &prepared.hash)?.is_some() {
        ctx.store.touch_ai_check(address, now)?;
        debug!("[AI] {} unchanged since last decision", address);
        return Ok(Escalation::CacheHit);
    }

    ctx.pacing.ai_token_gap.acquire().await;

    let mut decisions = Vec::new();
    let mut failures = 0;
    for paced in &ctx.judges {
        ctx.pacing.ai_provider_gap.acquire().await;
        paced.limiter.acquire().await;
        match paced.judge.judge(&prepared.snapshot, &[]).await {
            Ok(decision) => {
                info!("[AI] {} -> {} for {}", paced.model(), decision, address);
                decisions.push(record(&prepared, paced.model(), decision, ctx.now_ms()));
            }
            Err(e) => {
                failures += 1;
                log_judge_failure(paced.model(), address, &e);
            }
        }
    }

    if !decisions.is_empty() {
        ctx.store.insert_ai_decisions(&decisions)?;
    }

    let verdicts: Vec<Decision> = decisions.iter().map(|d| d.decision).collect();
    let signal_opened = is_buy_consensus(&verdicts) && open_consensus_signal(ctx, &prepared, now)?;

    ctx.store.touch_ai_check(address, ctx.now_ms())?;

    Ok(Escalation::Judged { decisions: decisions.len(), failures, signal_opened })
}

/// Escalate up to `max_tokens_per_run` eligible tokens within the run budget
pub async fn run_scheduled(ctx: &PipelineContext, config: &Config) -> Result<EscalationReport, PipelineError> {
    let ai = &config.ai;
    let started = Instant::now();

    let mut tokens = ctx.store.active_tokens()?;
    tokens.sort_by_key(|t| t.last_ai_check_at.unwrap_or(i64::MIN));

    let mut report = EscalationReport::default();
    for token in &tokens {
        if report.selected >= ai.max_tokens_per_run {
            break;
        }
        if started.elapsed() >= ai.run_budget() {
            report.budget_exhausted = true;
            warn!("[AI] Run budget of {}s spent, stopping early", ai.run_budget_secs);
            break;
        }

        match escalate_token(ctx, config, token).await {
            Ok(Escalation::Ineligible(reason)) => {
                debug!("[AI] Skipping {}: {}", token.address, reason);
            }
            Ok(Escalation::CacheHit) => {
                report.selected += 1;
                report.cache_hits += 1;
            }
            Ok(Escalation::Judged { decisions, failures, signal_opened }) => {
                report.selected += 1;
                report.decisions += decisions;
                report.provider_failures += failures;
                if signal_opened {
                    report.signals_opened += 1;
                }
            }
            Err(e) => {
                report.selected += 1;
                report.failed += 1;
                error!("[AI] {} failed: {}", token.address, e);
            }
        }
    }

    info!(
        "[AI] {} tokens: {} cached, {} decisions, {} signals opened",
        report.selected, report.cache_hits, report.decisions, report.signals_opened
    );
    Ok(report)
}

// ----------------------------------------------------------------------------
// On-demand analysis
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Cached {
        decision: Decision,
        model: String,
        created_at: i64,
    },
    Fresh {
        decisions: Vec<AiDecision>,
        created_at: i64,
    },
}

async fn ask(paced: &PacedJudge, snapshot: &RawSnapshot, history: &[DecisionHistoryEntry]) -> Result<Decision, JudgeError> {
    paced.limiter.acquire().await;
    paced.judge.judge(snapshot, history).await
}

/// Judge one token now, reusing the last decision when the snapshot is unchanged
pub async fn analyze_on_demand(ctx: &PipelineContext, address: &str) -> Result<AnalysisOutcome, AnalysisError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AnalysisError::NoTokenAddress);
    }

    let config = ctx.settings.current();
    let now = ctx.now_ms();
    let prepared =
        prepare_snapshot(ctx.store.as_ref(), address, now)?.ok_or(AnalysisError::InsufficientData)?;

    if let Some(cached) = cached_decision(ctx.store.as_ref(), address, &prepared.hash)? {
        return Ok(AnalysisOutcome::Cached {
            decision: cached.decision,
            model: cached.model,
            created_at: cached.created_at,
        });
    }

    let history: Vec<DecisionHistoryEntry> = ctx
        .store
        .recent_ai_decisions(address, config.ai.history_len)?
        .iter()
        .map(DecisionHistoryEntry::from)
        .collect();

    let replies = join_all(ctx.judges.iter().map(|paced| ask(paced, &prepared.snapshot, &history))).await;

    let created_at = ctx.now_ms();
    let mut decisions = Vec::new();
    for (paced, reply) in ctx.judges.iter().zip(replies) {
        match reply {
            Ok(decision) => decisions.push(record(&prepared, paced.model(), decision, created_at)),
            Err(e) => log_judge_failure(paced.model(), address, &e),
        }
    }

    if decisions.is_empty() {
        return Err(AnalysisError::AllProvidersFailed);
    }
    ctx.store.insert_ai_decisions(&decisions)?;

    Ok(AnalysisOutcome::Fresh { decisions, created_at })
}
