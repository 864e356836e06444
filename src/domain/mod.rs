//! Domain Layer - Core types and state machines for the analysis engine
//!
//! Pure types and logic with no I/O. All external interactions happen
//! through the ports layer.
//!
//! - `token`: token identity, lifecycle and discovery classification
//! - `market`: market readings, snapshots and holder approximation
//! - `candle`: timeframes and the OHLCV candle builder
//! - `indicators`: derived indicator rows (levels, trend, timing, pump, risk, ...)
//! - `signal`: the trading signal state machine
//! - `pnl`: realized/live PnL, KPIs and equity curve
//! - `ai`: AI judge verdicts and consensus

pub mod token;
pub mod market;
pub mod candle;
pub mod indicators;
pub mod signal;
pub mod pnl;
pub mod ai;

pub use token::{classify, ClassifiedToken, DiscoveredToken, Token, TokenStatus};
pub use market::{approximate_holders, MarketReading, MarketSnapshot};
pub use candle::{aggregate, Candle, CandleBuilder, Timeframe};
pub use indicators::{
    BreakoutLevel, BreakoutState, BuySellScore, ExpectedMove, Level, PricePosition, PumpLabel,
    PumpScore, RiskLevel, RiskProfile, SupportResistance, Timing15m, TimingSignal, TradeDecision,
    TransitionConditions, TransitionPhase, TransitionState, Trend, TrendBias, VolumeAnomaly,
};
pub use signal::{ExitReason, NewSignal, Signal, SignalError, SignalEvent, SignalStatus, SignalThresholds};
pub use pnl::{equity_curve, live_pnl, signal_kpis, EquityPoint, SignalKpi, SignalRange};
pub use ai::{is_buy_consensus, AiDecision, Decision, DecisionHistoryEntry};
