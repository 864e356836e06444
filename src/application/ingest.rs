//! Discovery and market refresh
//!
//! Discovery pulls candidates from every scanner concurrently and upserts
//! them. The updater then refreshes stale active tokens one at a time:
//! fetch the best pair, retire tokens under the floors, resolve holders,
//! and write token fields, snapshot and signal advancement together.

use futures::future::join_all;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::application::context::PipelineContext;
use crate::application::pipeline::PipelineError;
use crate::config::Config;
use crate::domain::signal::{Signal, SignalEvent, SignalThresholds};
use crate::domain::token::{classify, DiscoveredToken, Token};
use crate::ports::holders::HolderError;
use crate::ports::market_data::MarketDataError;
use crate::ports::store::{DiscoveryUpsert, TokenMarketUpdate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub candidates: usize,
    pub inserted: usize,
    pub merged: usize,
    pub skipped_dead: usize,
    pub failed: usize,
}

/// Run every scanner concurrently and upsert the candidates in scanner order
pub async fn run_discovery(ctx: &PipelineContext) -> Result<DiscoveryReport, PipelineError> {
    let scans = ctx.scanners.iter().map(|scanner| async move { (scanner.name(), scanner.discover().await) });

    let mut candidates: Vec<DiscoveredToken> = Vec::new();
    for (name, result) in join_all(scans).await {
        match result {
            Ok(tokens) => {
                debug!("[DISCOVERY] {} returned {} candidates", name, tokens.len());
                candidates.extend(tokens);
            }
            Err(e) => warn!("[DISCOVERY] {} scan failed: {}", name, e),
        }
    }

    let now = ctx.now_ms();
    let mut report = DiscoveryReport::default();
    for candidate in candidates {
        report.candidates += 1;
        let address = candidate.address.clone();
        match ctx.store.upsert_discovered(&classify(candidate), now) {
            Ok(DiscoveryUpsert::Inserted) => report.inserted += 1,
            Ok(DiscoveryUpsert::Merged) => report.merged += 1,
            Ok(DiscoveryUpsert::SkippedDead) => report.skipped_dead += 1,
            Err(e) => {
                report.failed += 1;
                error!("[DISCOVERY] Failed to store {}: {}", address, e);
            }
        }
    }

    info!(
        "[DISCOVERY] {} candidates: {} new, {} known, {} dead",
        report.candidates, report.inserted, report.merged, report.skipped_dead
    );
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Refreshed,
    /// Market data had no pair for the token
    NoPair,
    MarkedDead,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub due: usize,
    pub refreshed: usize,
    pub no_pair: usize,
    pub marked_dead: usize,
    pub failed: usize,
    pub signals_closed: usize,
}

/// Holder count for this refresh: fetched when due, otherwise carried forward
async fn resolve_holders(ctx: &PipelineContext, token: &Token, now: i64, refresh_ms: i64) -> Option<u64> {
    let address = token.address.as_str();
    if !ctx.memory.holders_due(address, now, refresh_ms) {
        return last_known_holders(ctx, token);
    }

    ctx.pacing.rpc.acquire().await;
    ctx.memory.mark_holders_checked(address, now);
    match ctx.holders.holder_count(address).await {
        Ok(count) => Some(count),
        Err(HolderError::RateLimited) => {
            warn!("[RATE LIMIT] Holder count for {} throttled by RPC", address);
            last_known_holders(ctx, token)
        }
        Err(e) => {
            warn!("[HOLDERS] {}: {}", address, e);
            last_known_holders(ctx, token)
        }
    }
}

fn last_known_holders(ctx: &PipelineContext, token: &Token) -> Option<u64> {
    ctx.memory
        .latest(&token.address)
        .and_then(|s| s.holders)
        .or(token.holders)
}

fn advance_signal(signal: &mut Signal, market_cap: Option<f64>, now: i64, thresholds: &SignalThresholds) -> bool {
    let Some(market_cap) = market_cap.and_then(Decimal::from_f64).filter(|mc| *mc > Decimal::ZERO) else {
        debug!("[SIGNAL] {} has no market cap this refresh", signal.token_address);
        return false;
    };

    match signal.advance(market_cap, now, thresholds) {
        Ok(SignalEvent::Stopped) => {
            info!(
                "[SIGNAL] {} stopped out at {}%",
                signal.token_address,
                (signal.pnl_at(market_cap) * Decimal::ONE_HUNDRED).round_dp(2)
            );
            true
        }
        Ok(SignalEvent::ClosedTime(reason)) => {
            info!("[SIGNAL] {} closed on time ({:?})", signal.token_address, reason);
            true
        }
        Ok(SignalEvent::TakeProfit(stage)) => {
            info!("[SIGNAL] {} reached TP{}", signal.token_address, stage);
            false
        }
        Ok(SignalEvent::Refreshed) => false,
        Err(e) => {
            warn!("[SIGNAL] {}: {}", signal.token_address, e);
            false
        }
    }
}

/// Refresh one token. Returns whether an open signal closed, with the outcome.
pub async fn update_token(
    ctx: &PipelineContext,
    config: &Config,
    mut token: Token,
) -> Result<(UpdateOutcome, bool), PipelineError> {
    let updater = &config.updater;

    ctx.pacing.market_data.acquire().await;
    let reading = match ctx.market_data.fetch_pair(&token.address).await {
        Ok(Some(reading)) => reading,
        Ok(None) => {
            debug!("[UPDATER] No pair for {}", token.address);
            return Ok((UpdateOutcome::NoPair, false));
        }
        Err(MarketDataError::RateLimited(source)) => {
            warn!("[RATE LIMIT] {} throttled refresh of {}", source, token.address);
            return Ok((UpdateOutcome::NoPair, false));
        }
        Err(e) => {
            warn!("[UPDATER] Fetch failed for {}: {}", token.address, e);
            return Ok((UpdateOutcome::NoPair, false));
        }
    };

    let now = ctx.now_ms();
    if reading.is_below_floor(updater.market_cap_floor, updater.volume_floor) {
        ctx.store.mark_dead(&token.address, now)?;
        ctx.memory.evict(&token.address);
        info!(
            "[UPDATER] {} marked dead (mc {:?}, vol {:?})",
            token.address, reading.market_cap, reading.volume_24h
        );
        return Ok((UpdateOutcome::MarkedDead, false));
    }

    let holders = resolve_holders(ctx, &token, now, (updater.holder_refresh_secs * 1000) as i64).await;

    let mut signal = ctx.store.open_signal(&token.address)?;
    let closed = match signal.as_mut() {
        Some(signal) => advance_signal(signal, reading.market_cap, now, &config.signal_thresholds()),
        None => false,
    };

    token.apply_market(&reading, holders, now);
    let snapshot = reading.into_snapshot(&token.address, holders, now);
    ctx.store.record_market_update(&TokenMarketUpdate {
        token: &token,
        snapshot: &snapshot,
        signal: signal.as_ref(),
    })?;
    ctx.memory.push(snapshot);

    Ok((UpdateOutcome::Refreshed, closed))
}

/// Refresh every active token that is due, stalest first
pub async fn run_updater(ctx: &PipelineContext, config: &Config) -> Result<UpdateReport, PipelineError> {
    let stale_before = ctx.now_ms() - (config.updater.stale_after_secs * 1000) as i64;
    let due = ctx.store.tokens_due_for_update(stale_before)?;

    let mut report = UpdateReport { due: due.len(), ..Default::default() };
    for token in due {
        let address = token.address.clone();
        match update_token(ctx, config, token).await {
            Ok((outcome, closed)) => {
                match outcome {
                    UpdateOutcome::Refreshed => report.refreshed += 1,
                    UpdateOutcome::NoPair => report.no_pair += 1,
                    UpdateOutcome::MarkedDead => report.marked_dead += 1,
                }
                if closed {
                    report.signals_closed += 1;
                }
            }
            Err(e) => {
                report.failed += 1;
                error!("[UPDATER] {} failed: {}", address, e);
            }
        }
    }

    info!(
        "[UPDATER] {} due: {} refreshed, {} dead, {} without pair",
        report.due, report.refreshed, report.marked_dead, report.no_pair
    );
    Ok(report)
}
