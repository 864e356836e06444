//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - The shared analysis store (tokens, snapshots, candles, indicators, signals)
//! - Token discovery scanners
//! - Market pair lookups and on-chain holder counts
//! - AI judges
//! - Wall-clock time

pub mod store;
pub mod discovery;
pub mod market_data;
pub mod holders;
pub mod ai_judge;
pub mod clock;
pub mod mocks;

// Re-export main traits and types
pub use store::{
    AnalysisStore, DiscoveryUpsert, IndicatorRow, PruneReport, RetentionPolicy, StoreError, TokenIndicators,
    TokenMarketUpdate,
};
pub use discovery::{DiscoveryError, DiscoveryPort};
pub use market_data::{MarketDataError, MarketDataPort};
pub use holders::{HolderCountPort, HolderError};
pub use ai_judge::{parse_reply, AiJudge, JudgeError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use mocks::{StubDiscovery, StubHolders, StubJudge, StubMarketData};
