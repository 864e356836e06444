//! Hand-written stand-ins for the external ports.
//!
//! Each stub records the calls it receives and replies from a configured
//! table, so pipeline tests can assert on both outcomes and call counts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::analysis::snapshot::RawSnapshot;
use crate::domain::ai::{Decision, DecisionHistoryEntry};
use crate::domain::market::MarketReading;
use crate::domain::token::DiscoveredToken;

use super::ai_judge::{AiJudge, JudgeError};
use super::discovery::{DiscoveryError, DiscoveryPort};
use super::holders::{HolderCountPort, HolderError};
use super::market_data::{MarketDataError, MarketDataPort};

/// Recorded state stays readable after a panicking test thread
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scanner returning a fixed candidate list, or failing when none is set
#[derive(Debug, Default, Clone)]
pub struct StubDiscovery {
    name: String,
    tokens: Arc<Mutex<Option<Vec<DiscoveredToken>>>>,
    calls: Arc<Mutex<usize>>,
}

impl StubDiscovery {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn with_tokens(self, tokens: Vec<DiscoveredToken>) -> Self {
        *lock(&self.tokens) = Some(tokens);
        self
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.calls)
    }
}

#[async_trait]
impl DiscoveryPort for StubDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover(&self) -> Result<Vec<DiscoveredToken>, DiscoveryError> {
        *lock(&self.calls) += 1;
        lock(&self.tokens)
            .clone()
            .ok_or_else(|| DiscoveryError::Request("No response configured".to_string()))
    }
}

/// Market data keyed by token address; unknown tokens have no pair
#[derive(Debug, Default, Clone)]
pub struct StubMarketData {
    calls: Arc<Mutex<Vec<String>>>,
    readings: Arc<Mutex<HashMap<String, MarketReading>>>,
}

impl StubMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(self, token: &str, reading: MarketReading) -> Self {
        self.set_reading(token, reading);
        self
    }

    /// Replace the reading returned from now on
    pub fn set_reading(&self, token: &str, reading: MarketReading) {
        lock(&self.readings).insert(token.to_string(), reading);
    }

    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl MarketDataPort for StubMarketData {
    async fn fetch_pair(&self, token_address: &str) -> Result<Option<MarketReading>, MarketDataError> {
        lock(&self.calls).push(token_address.to_string());
        Ok(lock(&self.readings).get(token_address).cloned())
    }
}

/// Holder counts keyed by mint; unknown mints fail like an RPC error
#[derive(Debug, Default, Clone)]
pub struct StubHolders {
    calls: Arc<Mutex<Vec<String>>>,
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl StubHolders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(self, mint: &str, count: u64) -> Self {
        lock(&self.counts).insert(mint.to_string(), count);
        self
    }

    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl HolderCountPort for StubHolders {
    async fn holder_count(&self, mint: &str) -> Result<u64, HolderError> {
        lock(&self.calls).push(mint.to_string());
        lock(&self.counts)
            .get(mint)
            .copied()
            .ok_or_else(|| HolderError::Rpc("No response configured".to_string()))
    }
}

/// Judge replying from a queue, then repeating a default reply
#[derive(Debug, Clone)]
pub struct StubJudge {
    model: String,
    queued: Arc<Mutex<VecDeque<Result<Decision, JudgeError>>>>,
    fallback: Result<Decision, JudgeError>,
    calls: Arc<Mutex<Vec<(String, usize)>>>,
}

impl StubJudge {
    /// Always replies with `decision`
    pub fn new(model: &str, decision: Decision) -> Self {
        Self::replying(model, Ok(decision))
    }

    pub fn replying(model: &str, reply: Result<Decision, JudgeError>) -> Self {
        Self {
            model: model.to_string(),
            queued: Arc::new(Mutex::new(VecDeque::new())),
            fallback: reply,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply once with `reply` before falling back
    pub fn then(self, reply: Result<Decision, JudgeError>) -> Self {
        lock(&self.queued).push_back(reply);
        self
    }

    /// (token address, history length) per call
    pub fn get_calls(&self) -> Vec<(String, usize)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl AiJudge for StubJudge {
    fn model(&self) -> &str {
        &self.model
    }

    async fn judge(&self, snapshot: &RawSnapshot, history: &[DecisionHistoryEntry]) -> Result<Decision, JudgeError> {
        lock(&self.calls).push((snapshot.token.address.clone(), history.len()));
        let queued = lock(&self.queued).pop_front();
        queued.unwrap_or_else(|| self.fallback.clone())
    }
}
