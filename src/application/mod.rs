//! Application Layer - Stage runners and scheduling
//!
//! The scheduler drives one tick through every stage; the same stage
//! functions are reachable on their own for the CLI and tests.

pub mod rate_limiter;
pub mod context;
pub mod pipeline;
pub mod ingest;
pub mod ai_escalation;
pub mod maintenance;
pub mod queries;
pub mod scheduler;

pub use rate_limiter::{Pacing, RateLimiter};
pub use context::{PacedJudge, PipelineContext, TokenMemory, TOKEN_MEMORY_CAPACITY};
pub use pipeline::{build_candles, recalculate_levels, run_analysis_stages, PipelineError, StageReport};
pub use ingest::{run_discovery, run_updater, update_token, DiscoveryReport, UpdateOutcome, UpdateReport};
pub use ai_escalation::{
    analyze_on_demand, prepare_snapshot, run_scheduled, AnalysisError, AnalysisOutcome, EscalationReport,
    PreparedSnapshot,
};
pub use maintenance::{run_cleanup_loop, run_maintenance};
pub use queries::{
    active_token_rows, signal_history, token_analysis, top_market_cap, ActiveTokenRow, SignalHistory, TokenAnalysis,
    TopToken,
};
pub use scheduler::{
    Scheduler, SchedulerStatus, Supervisor, TickEvent, TickGate, TickRefusal, TickReport,
};
