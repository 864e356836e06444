//! Analysis Layer - Pure indicator derivations
//!
//! Every function here is a deterministic function of candles and upstream
//! indicator rows. Reading and writing those rows is the job of the
//! application stages.
//!
//! Dependency order inside a tick:
//! levels -> trend -> timing -> score -> volume -> pump -> risk -> breakout -> transition

pub mod levels;
pub mod trend;
pub mod timing;
pub mod volume;
pub mod pump;
pub mod risk;
pub mod breakout;
pub mod transition;
pub mod score;
pub mod snapshot;

pub use levels::{needs_recalculation, support_resistance, LevelParams};
pub use trend::trend_bias;
pub use timing::timing_15m;
pub use volume::volume_anomaly;
pub use pump::{pump_label, pump_score, PumpInputs};
pub use risk::{risk_profile, RiskInputs};
pub use breakout::{detect_breakout, BreakoutInputs};
pub use transition::{detect_transition, TransitionInputs};
pub use score::{buy_sell_score, ScoreInputs};
pub use snapshot::{build_raw_snapshot, hash_json, RawSnapshot, SnapshotSources};
