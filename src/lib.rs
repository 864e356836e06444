//! Pulse Oracle - Token Analysis and Signal Orchestration Library
//!
//! Discovers Solana tokens, records market snapshots, folds them into
//! candles and derives support/resistance plus a chain of indicators.
//! Two AI judges vote on eligible tokens; a unanimous BUY opens a signal
//! that is then walked through its take-profit and stop-loss exits.
//!
//! # Modules
//!
//! - `domain`: Core types and state machines (Token, Candle, Signal, PnL)
//! - `analysis`: Pure indicator derivations and the AI snapshot
//! - `ports`: Trait abstractions (AnalysisStore, DiscoveryPort, MarketDataPort, AiJudge)
//! - `adapters`: External implementations (SQLite, DexScreener, pump.fun, Solana RPC, AI, CLI)
//! - `config`: Configuration loading, validation and late binding
//! - `application`: Stage runners, scheduler, maintenance and read models

pub mod domain;
pub mod analysis;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
