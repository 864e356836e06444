//! Pipeline context
//!
//! Owns everything a tick needs: the store, the external ports, the clock,
//! the late-bound settings, per-token snapshot memory and pacing. Stages
//! borrow it; nothing in the pipeline reaches for module-level state.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::application::rate_limiter::{Pacing, RateLimiter};
use crate::config::SettingsHandle;
use crate::domain::market::MarketSnapshot;
use crate::ports::{AiJudge, AnalysisStore, Clock, DiscoveryPort, HolderCountPort, MarketDataPort};

/// Readings kept per token (one day at one per minute)
pub const TOKEN_MEMORY_CAPACITY: usize = 1_440;

#[derive(Debug, Default)]
struct MemoryState {
    readings: HashMap<String, VecDeque<MarketSnapshot>>,
    holders_checked_at: HashMap<String, i64>,
}

/// Bounded per-token ring buffer of recent snapshots
#[derive(Debug)]
pub struct TokenMemory {
    capacity: usize,
    state: Mutex<MemoryState>,
}

impl Default for TokenMemory {
    fn default() -> Self {
        Self::with_capacity(TOKEN_MEMORY_CAPACITY)
    }
}

impl TokenMemory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), state: Mutex::new(MemoryState::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, snapshot: MarketSnapshot) {
        let mut state = self.lock();
        let buffer = state.readings.entry(snapshot.token_address.clone()).or_default();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(snapshot);
    }

    pub fn latest(&self, address: &str) -> Option<MarketSnapshot> {
        self.lock().readings.get(address).and_then(|b| b.back().cloned())
    }

    /// Oldest first
    pub fn history(&self, address: &str) -> Vec<MarketSnapshot> {
        self.lock()
            .readings
            .get(address)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn evict(&self, address: &str) {
        let mut state = self.lock();
        state.readings.remove(address);
        state.holders_checked_at.remove(address);
    }

    pub fn len(&self, address: &str) -> usize {
        self.lock().readings.get(address).map_or(0, VecDeque::len)
    }

    /// Tokens currently held in memory
    pub fn token_count(&self) -> usize {
        self.lock().readings.len()
    }

    /// Whether the holder count for `address` should be fetched again
    pub fn holders_due(&self, address: &str, now: i64, refresh_ms: i64) -> bool {
        match self.lock().holders_checked_at.get(address) {
            None => true,
            Some(checked_at) => now - checked_at > refresh_ms,
        }
    }

    pub fn mark_holders_checked(&self, address: &str, now: i64) {
        self.lock().holders_checked_at.insert(address.to_string(), now);
    }
}

/// AI judge paired with its provider limiter
#[derive(Clone)]
pub struct PacedJudge {
    pub judge: Arc<dyn AiJudge>,
    pub limiter: Arc<RateLimiter>,
}

impl PacedJudge {
    pub fn new(judge: Arc<dyn AiJudge>, limiter: Arc<RateLimiter>) -> Self {
        Self { judge, limiter }
    }

    pub fn model(&self) -> &str {
        self.judge.model()
    }
}

pub struct PipelineContext {
    pub store: Arc<dyn AnalysisStore>,
    pub scanners: Vec<Arc<dyn DiscoveryPort>>,
    pub market_data: Arc<dyn MarketDataPort>,
    pub holders: Arc<dyn HolderCountPort>,
    /// Polled in order on the scheduled path
    pub judges: Vec<PacedJudge>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<SettingsHandle>,
    pub memory: TokenMemory,
    pub pacing: Pacing,
}

impl PipelineContext {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        market_data: Arc<dyn MarketDataPort>,
        holders: Arc<dyn HolderCountPort>,
        clock: Arc<dyn Clock>,
        settings: Arc<SettingsHandle>,
    ) -> Self {
        let pacing = Pacing::from_config(&settings.current());
        Self {
            store,
            scanners: Vec::new(),
            market_data,
            holders,
            judges: Vec::new(),
            clock,
            settings,
            memory: TokenMemory::default(),
            pacing,
        }
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn DiscoveryPort>) -> Self {
        self.scanners.push(scanner);
        self
    }

    pub fn with_judge(mut self, judge: Arc<dyn AiJudge>, limiter: Arc<RateLimiter>) -> Self {
        self.judges.push(PacedJudge::new(judge, limiter));
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use super::PipelineContext;
    use crate::adapters::storage::MemoryStore;
    use crate::application::rate_limiter::Pacing;
    use crate::config::{Config, SettingsHandle};
    use crate::domain::token::{classify, DiscoveredToken};
    use crate::ports::{AnalysisStore, ManualClock, StubHolders, StubMarketData};

    pub fn seed_token(store: &dyn AnalysisStore, address: &str, now: i64) {
        let candidate = DiscoveredToken {
            address: address.to_string(),
            chain: "solana".to_string(),
            name: Some(format!("{} name", address)),
            symbol: Some("TKN".to_string()),
            source: Some("dexscreener".to_string()),
        };
        store.upsert_discovered(&classify(candidate), now).unwrap();
    }

    /// Context over a memory store with stub ports and no pacing
    pub fn context(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> PipelineContext {
        PipelineContext::new(
            store,
            Arc::new(StubMarketData::new()),
            Arc::new(StubHolders::new()),
            clock,
            Arc::new(SettingsHandle::fixed(Config::default())),
        )
        .with_pacing(Pacing::unthrottled())
    }
}
