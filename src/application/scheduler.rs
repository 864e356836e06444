//! Scheduler
//!
//! One recurring tick runs every stage in dependency order:
//!
//! discovery -> updater -> candles -> S/R -> indicators -> AI (gated)
//!
//! The tick gate refuses a start while a tick is in flight or too soon after
//! the previous start. Each tick reports a `TickEvent`. The `Supervisor`
//! hosts the loop in its own task and restarts it after a crash.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::application::ai_escalation::{run_scheduled, EscalationReport};
use crate::application::context::PipelineContext;
use crate::application::ingest::{run_discovery, run_updater, DiscoveryReport, UpdateReport};
use crate::application::pipeline::{run_analysis_stages, PipelineError, StageReport};
use crate::config::Config;

/// Why a tick did not start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRefusal {
    AlreadyRunning,
    TooSoon { since_last_ms: i64 },
}

/// Overlap and spacing guard for ticks and the AI pass
#[derive(Debug, Default)]
pub struct TickGate {
    running: bool,
    last_started: Option<i64>,
    last_ai_run: Option<i64>,
}

impl TickGate {
    pub fn try_begin(&mut self, now: i64, min_gap_ms: i64) -> Result<(), TickRefusal> {
        if self.running {
            return Err(TickRefusal::AlreadyRunning);
        }
        if let Some(last) = self.last_started {
            let since_last_ms = now - last;
            if since_last_ms < min_gap_ms {
                return Err(TickRefusal::TooSoon { since_last_ms });
            }
        }
        self.running = true;
        self.last_started = Some(now);
        Ok(())
    }

    pub fn finish(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Claim the AI pass when its interval has elapsed
    pub fn claim_ai(&mut self, now: i64, gap_ms: i64) -> bool {
        let due = self.last_ai_run.map_or(true, |last| now - last >= gap_ms);
        if due {
            self.last_ai_run = Some(now);
        }
        due
    }
}

/// Clears the running flag even when a stage panics
struct TickGuard<'a> {
    gate: &'a Mutex<TickGate>,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        lock(self.gate).finish();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub started_at: i64,
    pub discovery: DiscoveryReport,
    pub update: UpdateReport,
    pub stages: Vec<StageReport>,
    /// `None` when the AI pass was not due
    pub ai: Option<EscalationReport>,
}

#[derive(Debug, Clone)]
pub enum TickEvent {
    Succeeded(TickReport),
    Failed { started_at: i64, error: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub ticks_succeeded: u64,
    pub ticks_failed: u64,
    pub ticks_refused: u64,
    pub last_tick_at: Option<i64>,
}

pub struct Scheduler {
    ctx: Arc<PipelineContext>,
    gate: Mutex<TickGate>,
    stats: Mutex<SchedulerStatus>,
    is_running: Arc<RwLock<bool>>,
    events: Option<mpsc::UnboundedSender<TickEvent>>,
}

impl Scheduler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            gate: Mutex::new(TickGate::default()),
            stats: Mutex::new(SchedulerStatus::default()),
            is_running: Arc::new(RwLock::new(false)),
            events: None,
        }
    }

    /// Emit an event for every tick that starts
    pub fn with_events(mut self, events: mpsc::UnboundedSender<TickEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Shared stop flag, also watched by the cleanup loop
    pub fn running_flag(&self) -> Arc<RwLock<bool>> {
        Arc::clone(&self.is_running)
    }

    fn emit(&self, event: TickEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("[SCHEDULER] Event receiver dropped");
            }
        }
    }

    async fn run_stages(&self, config: &Config, started_at: i64) -> Result<TickReport, PipelineError> {
        let ctx = self.ctx.as_ref();

        let discovery = run_discovery(ctx).await?;
        let update = run_updater(ctx, config).await?;
        let stages = run_analysis_stages(ctx, &config.pacing).await?;

        let ai_gap_ms = (config.scheduler.ai_gate_secs * 1000) as i64;
        let ai_due = lock(&self.gate).claim_ai(ctx.now_ms(), ai_gap_ms);
        let ai = if ai_due { Some(run_scheduled(ctx, config).await?) } else { None };

        Ok(TickReport { started_at, discovery, update, stages, ai })
    }

    /// Run one tick. `Ok(None)` when the gate refused to start it.
    pub async fn tick(&self) -> Result<Option<TickReport>, PipelineError> {
        let config = self.ctx.settings.refresh();
        self.ctx.pacing.retune(&config);
        let started_at = self.ctx.now_ms();
        let min_gap_ms = (config.scheduler.min_tick_gap_secs * 1000) as i64;

        if let Err(refusal) = lock(&self.gate).try_begin(started_at, min_gap_ms) {
            debug!("[SCHEDULER] Tick refused: {:?}", refusal);
            lock(&self.stats).ticks_refused += 1;
            return Ok(None);
        }
        let _guard = TickGuard { gate: &self.gate };

        let result = self.run_stages(&config, started_at).await;

        let mut stats = lock(&self.stats);
        stats.last_tick_at = Some(started_at);
        match &result {
            Ok(report) => {
                stats.ticks_succeeded += 1;
                drop(stats);
                info!("[SCHEDULER] Tick complete in {}ms", self.ctx.now_ms() - started_at);
                self.emit(TickEvent::Succeeded(report.clone()));
            }
            Err(e) => {
                stats.ticks_failed += 1;
                drop(stats);
                error!("[SCHEDULER] Tick failed: {}", e);
                self.emit(TickEvent::Failed { started_at, error: e.to_string() });
            }
        }

        result.map(Some)
    }

    /// Tick on the configured period until stopped
    pub async fn run(&self) {
        *self.is_running.write().await = true;
        info!(
            "[SCHEDULER] Starting, tick every {:?}",
            self.ctx.settings.current().scheduler.tick_period()
        );
        self.run_loop().await;
    }

    async fn run_loop(&self) {
        while *self.is_running.read().await {
            if let Err(e) = self.tick().await {
                error!("Tick error: {}", e);
            }
            tokio::time::sleep(self.ctx.settings.current().scheduler.tick_period()).await;
        }
        info!("[SCHEDULER] Stopped");
    }

    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        info!("[SCHEDULER] Stop signal sent");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        let mut status = lock(&self.stats).clone();
        status.is_running = *self.is_running.read().await;
        status
    }
}

/// Hosts the scheduler loop in its own task and restarts it after a crash
pub struct Supervisor {
    scheduler: Arc<Scheduler>,
    backoff: Duration,
}

impl Supervisor {
    pub fn new(scheduler: Arc<Scheduler>, backoff: Duration) -> Self {
        Self { scheduler, backoff }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Returns once the scheduler stops cleanly or is stopped after a crash
    pub async fn run(&self) {
        *self.scheduler.is_running.write().await = true;
        let mut restarts = 0u32;

        loop {
            let scheduler = Arc::clone(&self.scheduler);
            let handle = tokio::spawn(async move { scheduler.run_loop().await });

            match handle.await {
                Ok(()) => break,
                Err(e) => {
                    error!("[SUPERVISOR] Scheduler task ended abnormally: {}", e);
                    if !self.scheduler.is_running().await {
                        break;
                    }
                    restarts += 1;
                    warn!("[SUPERVISOR] Restarting in {:?} (restart #{})", self.backoff, restarts);
                    tokio::time::sleep(self.backoff).await;
                    if !self.scheduler.is_running().await {
                        break;
                    }
                }
            }
        }

        info!("[SUPERVISOR] Supervision ended after {} restarts", restarts);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::adapters::storage::MemoryStore;
    use crate::application::context::fixtures::{context, seed_token};
    use crate::config::SettingsHandle;
    use crate::domain::market::MarketReading;
    use crate::ports::market_data::{MarketDataError, MarketDataPort};
    use crate::ports::{ManualClock, StubHolders, StubMarketData};

    const T0: i64 = 1_700_000_000_000;

    struct PanickingMarket {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataPort for PanickingMarket {
        async fn fetch_pair(&self, _token_address: &str) -> Result<Option<MarketReading>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("pair decoder blew up");
        }
    }

    #[test]
    fn test_gate_refuses_overlap_and_close_starts() {
        let mut gate = TickGate::default();
        assert!(gate.try_begin(0, 25_000).is_ok());
        assert_eq!(gate.try_begin(30_000, 25_000), Err(TickRefusal::AlreadyRunning));

        gate.finish();
        assert_eq!(gate.try_begin(10_000, 25_000), Err(TickRefusal::TooSoon { since_last_ms: 10_000 }));
        assert!(gate.try_begin(25_000, 25_000).is_ok());
    }

    #[test]
    fn test_ai_claim_interval() {
        let mut gate = TickGate::default();
        assert!(gate.claim_ai(0, 60_000));
        assert!(!gate.claim_ai(30_000, 60_000));
        assert!(gate.claim_ai(60_000, 60_000));
    }

    #[tokio::test]
    async fn test_tick_emits_success_and_gates_ai() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(Arc::new(context(store, clock.clone()))).with_events(tx);

        let first = scheduler.tick().await.unwrap().unwrap();
        assert!(first.ai.is_some());
        assert!(matches!(rx.try_recv(), Ok(TickEvent::Succeeded(_))));

        // refused inside the minimum gap
        clock.advance(10_000);
        assert!(scheduler.tick().await.unwrap().is_none());

        clock.advance(20_000);
        let second = scheduler.tick().await.unwrap().unwrap();
        assert!(second.ai.is_none());

        let status = scheduler.status().await;
        assert_eq!(status.ticks_succeeded, 2);
        assert_eq!(status.ticks_refused, 1);
    }

    #[tokio::test]
    async fn test_tick_runs_stages_in_order() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let reading = MarketReading {
            price: Some(0.001),
            market_cap: Some(1_000_000.0),
            volume_24h: Some(300_000.0),
            ..Default::default()
        };
        seed_token(store.as_ref(), "Mint111", T0);
        let mut ctx = context(store.clone(), clock);
        ctx.market_data = Arc::new(StubMarketData::new().with_reading("Mint111", reading));
        let scheduler = Scheduler::new(Arc::new(ctx));

        let report = scheduler.tick().await.unwrap().unwrap();

        assert_eq!(report.update.refreshed, 1);
        let stages: Vec<&str> = report.stages.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(
            stages,
            vec![
                "candles 15m", "candles 1h", "candles 4h", "sr 1h", "sr 4h", "trend", "timing", "score", "volume",
                "pump", "risk", "breakout", "transition"
            ]
        );
        assert_eq!(report.stages[0].written, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_restarts_after_panic() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        seed_token(store.as_ref(), "Mint111", T0);

        let mut config = Config::default();
        config.scheduler.min_tick_gap_secs = 0;
        let market = Arc::new(PanickingMarket { calls: AtomicUsize::new(0) });
        let mut ctx = context(store, clock);
        ctx.market_data = market.clone();
        ctx.settings = Arc::new(SettingsHandle::fixed(config));

        let scheduler = Arc::new(Scheduler::new(Arc::new(ctx)));
        let supervisor = Supervisor::new(Arc::clone(&scheduler), Duration::from_secs(3));
        let handle = tokio::spawn(async move { supervisor.run().await });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(market.calls.load(Ordering::SeqCst) >= 2);
        assert!(!lock(&scheduler.gate).is_running());

        scheduler.stop().await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_tick_retunes_pacing_from_settings() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[pacing]\nai_provider_gap_ms = 1000\n").unwrap();
        let settings = Arc::new(SettingsHandle::load(file.path()).unwrap());
        let ctx = PipelineContext::new(
            store,
            Arc::new(StubMarketData::new()),
            Arc::new(StubHolders::new()),
            clock,
            settings,
        );
        let scheduler = Scheduler::new(Arc::new(ctx));
        assert_eq!(scheduler.ctx.pacing.ai_provider_gap.min_interval(), Duration::from_secs(1));

        std::fs::write(file.path(), "[pacing]\nai_provider_gap_ms = 4000\nrpc_spacing_ms = 50\n").unwrap();
        scheduler.tick().await.unwrap().unwrap();

        assert_eq!(scheduler.ctx.pacing.ai_provider_gap.min_interval(), Duration::from_secs(4));
        assert_eq!(scheduler.ctx.pacing.rpc.min_interval(), Duration::from_millis(50));
    }
}
