//! In-memory analysis store
//!
//! Mutex-guarded maps with the same semantics as the SQLite store. Used by
//! tests and `--dry-run` sessions.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::domain::ai::AiDecision;
use crate::domain::candle::{Candle, Timeframe};
use crate::domain::indicators::SupportResistance;
use crate::domain::market::MarketSnapshot;
use crate::domain::signal::{NewSignal, Signal};
use crate::domain::token::{ClassifiedToken, Token, TokenStatus};
use crate::ports::store::{
    AnalysisStore, DiscoveryUpsert, IndicatorRow, PruneReport, RetentionPolicy, StoreError, TokenIndicators,
    TokenMarketUpdate,
};

type SeriesKey = (String, Timeframe);

#[derive(Debug, Default)]
struct MemoryState {
    tokens: BTreeMap<String, Token>,
    /// Ascending by timestamp
    snapshots: HashMap<String, Vec<MarketSnapshot>>,
    candles: HashMap<SeriesKey, BTreeMap<i64, Candle>>,
    levels: HashMap<SeriesKey, SupportResistance>,
    indicators: HashMap<String, TokenIndicators>,
    signals: Vec<Signal>,
    next_signal_id: i64,
    /// Insertion order
    ai_decisions: HashMap<String, Vec<AiDecision>>,
}

impl MemoryState {
    fn drop_history(&mut self, address: &str) {
        self.snapshots.remove(address);
        self.candles.retain(|(addr, _), _| addr != address);
        self.levels.retain(|(addr, _), _| addr != address);
        self.indicators.remove(address);
    }

    fn decisions_newest_first(&self, address: &str) -> Vec<AiDecision> {
        let mut decisions = self.ai_decisions.get(address).cloned().unwrap_or_default();
        // stable sort keeps later inserts ahead on equal timestamps once reversed
        decisions.sort_by_key(|d| d.created_at);
        decisions.reverse();
        decisions
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }
}

impl AnalysisStore for MemoryStore {
    fn upsert_discovered(&self, token: &ClassifiedToken, now: i64) -> Result<DiscoveryUpsert, StoreError> {
        let mut state = self.state()?;

        match state.tokens.get_mut(&token.address) {
            Some(existing) if existing.status == TokenStatus::Dead => Ok(DiscoveryUpsert::SkippedDead),
            Some(existing) => {
                existing.merge_discovery(token);
                Ok(DiscoveryUpsert::Merged)
            }
            None => {
                state
                    .tokens
                    .insert(token.address.clone(), Token::from_classified(token.clone(), now));
                Ok(DiscoveryUpsert::Inserted)
            }
        }
    }

    fn token(&self, address: &str) -> Result<Option<Token>, StoreError> {
        Ok(self.state()?.tokens.get(address).cloned())
    }

    fn active_tokens(&self) -> Result<Vec<Token>, StoreError> {
        Ok(self.state()?.tokens.values().filter(|t| t.is_active()).cloned().collect())
    }

    fn tokens_due_for_update(&self, stale_before: i64) -> Result<Vec<Token>, StoreError> {
        let mut due: Vec<Token> = self
            .state()?
            .tokens
            .values()
            .filter(|t| t.is_active())
            .filter(|t| t.updated_at.map_or(true, |at| at < stale_before))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.updated_at);
        Ok(due)
    }

    fn mark_dead(&self, address: &str, now: i64) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let token = state
            .tokens
            .get_mut(address)
            .ok_or_else(|| StoreError::NotFound(address.to_string()))?;
        token.status = TokenStatus::Dead;
        token.updated_at = Some(now);
        state.drop_history(address);
        Ok(())
    }

    fn record_market_update(&self, update: &TokenMarketUpdate<'_>) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let address = update.token.address.as_str();

        if !state.tokens.contains_key(address) {
            return Err(StoreError::NotFound(address.to_string()));
        }
        if let Some(signal) = update.signal {
            if !state.signals.iter().any(|s| s.id == signal.id) {
                return Err(StoreError::NotFound(format!("signal {}", signal.id)));
            }
        }

        state.tokens.insert(address.to_string(), update.token.clone());
        push_snapshot(&mut state, update.snapshot.clone());
        if let Some(signal) = update.signal {
            if let Some(stored) = state.signals.iter_mut().find(|s| s.id == signal.id) {
                *stored = signal.clone();
            }
        }
        Ok(())
    }

    fn insert_snapshot(&self, snapshot: &MarketSnapshot) -> Result<(), StoreError> {
        push_snapshot(&mut *self.state()?, snapshot.clone());
        Ok(())
    }

    fn snapshots_since(&self, address: &str, since: i64) -> Result<Vec<MarketSnapshot>, StoreError> {
        Ok(self
            .state()?
            .snapshots
            .get(address)
            .map(|all| all.iter().filter(|s| s.timestamp >= since).cloned().collect())
            .unwrap_or_default())
    }

    fn latest_snapshots(&self, address: &str, limit: usize) -> Result<Vec<MarketSnapshot>, StoreError> {
        Ok(self
            .state()?
            .snapshots
            .get(address)
            .map(|all| all.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn snapshot_count(&self, address: &str) -> Result<usize, StoreError> {
        Ok(self.state()?.snapshots.get(address).map_or(0, Vec::len))
    }

    fn latest_candle(&self, address: &str, timeframe: Timeframe) -> Result<Option<Candle>, StoreError> {
        Ok(self
            .state()?
            .candles
            .get(&(address.to_string(), timeframe))
            .and_then(|series| series.values().next_back().cloned()))
    }

    fn upsert_candles(&self, address: &str, timeframe: Timeframe, candles: &[Candle]) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let series = state.candles.entry((address.to_string(), timeframe)).or_default();
        for candle in candles {
            series.insert(candle.timestamp, candle.clone());
        }
        Ok(())
    }

    fn recent_candles(&self, address: &str, timeframe: Timeframe, limit: Option<usize>) -> Result<Vec<Candle>, StoreError> {
        let state = self.state()?;
        let Some(series) = state.candles.get(&(address.to_string(), timeframe)) else {
            return Ok(Vec::new());
        };
        let skip = limit.map_or(0, |n| series.len().saturating_sub(n));
        Ok(series.values().skip(skip).cloned().collect())
    }

    fn candle_count(&self, address: &str) -> Result<usize, StoreError> {
        Ok(self
            .state()?
            .candles
            .iter()
            .filter(|((addr, _), _)| addr == address)
            .map(|(_, series)| series.len())
            .sum())
    }

    fn support_resistance(&self, address: &str, timeframe: Timeframe) -> Result<Option<SupportResistance>, StoreError> {
        Ok(self.state()?.levels.get(&(address.to_string(), timeframe)).cloned())
    }

    fn upsert_support_resistance(
        &self,
        address: &str,
        timeframe: Timeframe,
        levels: &SupportResistance,
        _now: i64,
    ) -> Result<(), StoreError> {
        self.state()?.levels.insert((address.to_string(), timeframe), levels.clone());
        Ok(())
    }

    fn indicators(&self, address: &str) -> Result<TokenIndicators, StoreError> {
        Ok(self.state()?.indicators.get(address).cloned().unwrap_or_default())
    }

    fn upsert_indicator(&self, address: &str, row: &IndicatorRow, _now: i64) -> Result<(), StoreError> {
        let mut state = self.state()?;
        row.clone().apply_to(state.indicators.entry(address.to_string()).or_default());
        Ok(())
    }

    fn open_signal(&self, address: &str) -> Result<Option<Signal>, StoreError> {
        Ok(self
            .state()?
            .signals
            .iter()
            .find(|s| s.token_address == address && s.is_open())
            .cloned())
    }

    fn insert_signal(&self, signal: &NewSignal) -> Result<Signal, StoreError> {
        let mut state = self.state()?;
        if state.signals.iter().any(|s| s.token_address == signal.token_address && s.is_open()) {
            return Err(StoreError::Conflict(format!("open signal exists for {}", signal.token_address)));
        }

        state.next_signal_id += 1;
        let stored = signal.clone().into_signal(state.next_signal_id);
        state.signals.push(stored.clone());
        Ok(stored)
    }

    fn signals(&self) -> Result<Vec<Signal>, StoreError> {
        let mut signals = self.state()?.signals.clone();
        signals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(signals)
    }

    fn latest_ai_decision(&self, address: &str) -> Result<Option<AiDecision>, StoreError> {
        Ok(self.state()?.decisions_newest_first(address).into_iter().next())
    }

    fn latest_ai_decision_for_model(&self, address: &str, model: &str) -> Result<Option<AiDecision>, StoreError> {
        Ok(self
            .state()?
            .decisions_newest_first(address)
            .into_iter()
            .find(|d| d.model == model))
    }

    fn recent_ai_decisions(&self, address: &str, limit: usize) -> Result<Vec<AiDecision>, StoreError> {
        let mut decisions = self.state()?.decisions_newest_first(address);
        decisions.truncate(limit);
        Ok(decisions)
    }

    fn insert_ai_decisions(&self, decisions: &[AiDecision]) -> Result<(), StoreError> {
        let mut state = self.state()?;
        for decision in decisions {
            state
                .ai_decisions
                .entry(decision.token_address.clone())
                .or_default()
                .push(decision.clone());
        }
        Ok(())
    }

    fn touch_ai_check(&self, address: &str, now: i64) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let token = state
            .tokens
            .get_mut(address)
            .ok_or_else(|| StoreError::NotFound(address.to_string()))?;
        token.last_ai_check_at = Some(now);
        Ok(())
    }

    fn purge_dead_tokens(&self) -> Result<usize, StoreError> {
        let mut state = self.state()?;
        let dead: Vec<String> = state
            .tokens
            .values()
            .filter(|t| t.status == TokenStatus::Dead)
            .map(|t| t.address.clone())
            .collect();

        for address in &dead {
            state.drop_history(address);
            state.ai_decisions.remove(address);
            state.signals.retain(|s| &s.token_address != address);
            state.tokens.remove(address);
        }
        Ok(dead.len())
    }

    fn prune_history(&self, policy: &RetentionPolicy) -> Result<PruneReport, StoreError> {
        let mut state = self.state()?;
        let mut report = PruneReport::default();

        for series in state.snapshots.values_mut() {
            let excess = series.len().saturating_sub(policy.snapshots_per_token);
            series.drain(..excess);
            report.snapshots_pruned += excess;
        }

        for series in state.candles.values_mut() {
            while series.len() > policy.candles_per_timeframe {
                series.pop_first();
                report.candles_pruned += 1;
            }
        }

        for decisions in state.ai_decisions.values_mut() {
            decisions.sort_by_key(|d| d.created_at);
            let excess = decisions.len().saturating_sub(policy.ai_decisions_per_token);
            decisions.drain(..excess);
            report.ai_decisions_pruned += excess;
        }

        Ok(report)
    }
}

fn push_snapshot(state: &mut MemoryState, snapshot: MarketSnapshot) {
    let series = state.snapshots.entry(snapshot.token_address.clone()).or_default();
    let at = series.partition_point(|s| s.timestamp <= snapshot.timestamp);
    series.insert(at, snapshot);
}
