//! Pump.fun adapter
//!
//! Polls the runners listing and turns each coin into a discovery candidate
//! tagged with the `pumpswap` source.

pub mod runners;
pub mod types;

pub use runners::{parse_runners, PumpFunRunners, PUMPFUN_RUNNERS_URL};
pub use types::{Runner, RUNNERS_SOURCE};
