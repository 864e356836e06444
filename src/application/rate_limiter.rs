//! Per-dependency call pacing
//!
//! Every external dependency (market data, RPC, each AI provider) gets its
//! own limiter. A limiter enforces a minimum spacing between calls and an
//! optional requests-per-minute window. Time comes from `tokio::time`, so
//! pacing can be driven with paused time in tests.
//!
//! Spacing and caps follow the settings file: the scheduler retunes the
//! limiters from the refreshed configuration at the start of every tick.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::config::Config;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct LimiterState {
    last_request: Option<Instant>,
    requests_in_window: u32,
    window_start: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    min_interval_ms: AtomicU64,
    /// 0 means uncapped
    rpm_limit: AtomicU32,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(name: &'static str, min_interval: Duration) -> Self {
        Self {
            name,
            min_interval_ms: AtomicU64::new(duration_ms(min_interval)),
            rpm_limit: AtomicU32::new(0),
            state: Mutex::new(LimiterState {
                last_request: None,
                requests_in_window: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Also cap calls per rolling minute
    pub fn with_rpm(self, rpm_limit: Option<u32>) -> Self {
        self.set_rpm(rpm_limit);
        self
    }

    /// Change the minimum spacing; applies from the next call
    pub fn set_spacing(&self, min_interval: Duration) {
        let ms = duration_ms(min_interval);
        if self.min_interval_ms.swap(ms, Ordering::Relaxed) != ms {
            tracing::debug!("[RATE LIMIT] {} spacing now {}ms", self.name, ms);
        }
    }

    pub fn set_rpm(&self, rpm_limit: Option<u32>) {
        self.rpm_limit.store(rpm_limit.unwrap_or(0), Ordering::Relaxed);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms.load(Ordering::Relaxed))
    }

    pub fn rpm_limit(&self) -> Option<u32> {
        Some(self.rpm_limit.load(Ordering::Relaxed)).filter(|limit| *limit > 0)
    }

    /// Time to wait before the next call may go out, if any
    fn check(&self, state: &mut LimiterState, now: Instant) -> Option<Duration> {
        let elapsed = now.duration_since(state.window_start);
        if elapsed >= WINDOW {
            state.window_start = now;
            state.requests_in_window = 0;
        }

        if let Some(limit) = self.rpm_limit() {
            if state.requests_in_window >= limit {
                return Some(WINDOW.saturating_sub(elapsed));
            }
        }

        let last = state.last_request?;
        let min_interval = self.min_interval();
        let since_last = now.duration_since(last);
        (since_last < min_interval).then(|| min_interval - since_last)
    }

    /// Wait until a call may be made, then record it.
    ///
    /// Callers queue on the internal lock, so concurrent acquirers are
    /// released one spacing apart.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        while let Some(wait) = self.check(&mut state, Instant::now()) {
            tracing::debug!("[RATE LIMIT] {} waiting {}ms", self.name, wait.as_millis());
            tokio::time::sleep(wait).await;
        }
        state.last_request = Some(Instant::now());
        state.requests_in_window += 1;
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// One limiter per external dependency plus the AI sequencing gaps
#[derive(Debug, Clone)]
pub struct Pacing {
    pub market_data: Arc<RateLimiter>,
    pub rpc: Arc<RateLimiter>,
    pub openai: Arc<RateLimiter>,
    pub gemini: Arc<RateLimiter>,
    /// Spacing between consecutive provider calls for one token
    pub ai_provider_gap: Arc<RateLimiter>,
    /// Spacing before moving on to the next token
    pub ai_token_gap: Arc<RateLimiter>,
    follows_config: bool,
}

impl Pacing {
    pub fn from_config(config: &Config) -> Self {
        let pacing = &config.pacing;
        Self {
            market_data: Arc::new(RateLimiter::new(
                "market-data",
                Duration::from_millis(config.updater.token_pacing_ms),
            )),
            rpc: Arc::new(RateLimiter::new("rpc", Duration::from_millis(pacing.rpc_spacing_ms))),
            openai: Arc::new(RateLimiter::new("openai", Duration::ZERO).with_rpm(pacing.openai_rpm)),
            gemini: Arc::new(RateLimiter::new("gemini", Duration::ZERO).with_rpm(pacing.gemini_rpm)),
            ai_provider_gap: Arc::new(RateLimiter::new(
                "ai-provider-gap",
                Duration::from_millis(pacing.ai_provider_gap_ms),
            )),
            ai_token_gap: Arc::new(RateLimiter::new(
                "ai-token-gap",
                Duration::from_millis(pacing.ai_token_gap_ms),
            )),
            follows_config: true,
        }
    }

    /// Re-space every limiter from a refreshed configuration.
    /// Unthrottled pacing stays unthrottled.
    pub fn retune(&self, config: &Config) {
        if !self.follows_config {
            return;
        }
        let pacing = &config.pacing;
        self.market_data.set_spacing(Duration::from_millis(config.updater.token_pacing_ms));
        self.rpc.set_spacing(Duration::from_millis(pacing.rpc_spacing_ms));
        self.openai.set_rpm(pacing.openai_rpm);
        self.gemini.set_rpm(pacing.gemini_rpm);
        self.ai_provider_gap.set_spacing(Duration::from_millis(pacing.ai_provider_gap_ms));
        self.ai_token_gap.set_spacing(Duration::from_millis(pacing.ai_token_gap_ms));
    }

    /// No spacing anywhere; for dry runs and tests
    pub fn unthrottled() -> Self {
        let open = |name| Arc::new(RateLimiter::new(name, Duration::ZERO));
        Self {
            market_data: open("market-data"),
            rpc: open("rpc"),
            openai: open("openai"),
            gemini: open("gemini"),
            ai_provider_gap: open("ai-provider-gap"),
            ai_token_gap: open("ai-token-gap"),
            follows_config: false,
        }
    }
}
