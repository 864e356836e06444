//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Storage: SQLite and in-memory analysis stores
//! - DexScreener: boost discovery and pair lookups
//! - Pump.fun: runners discovery
//! - Solana: RPC holder estimates
//! - AI: OpenAI and Gemini judges
//! - CLI: Command-line interface handlers

pub mod storage;
pub mod dexscreener;
pub mod pump_fun;
pub mod solana;
pub mod ai;
pub mod cli;

pub use storage::{MemoryStore, SqliteStore};
pub use dexscreener::DexScreenerClient;
pub use pump_fun::PumpFunRunners;
pub use solana::SolanaHolderEstimator;
pub use ai::{GeminiJudge, OpenAiJudge};
pub use cli::CliApp;
