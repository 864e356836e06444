//! DexScreener adapter: boost discovery and pair lookups

pub mod client;
pub mod types;

pub use client::{DexScreenerClient, DEXSCREENER_API};
