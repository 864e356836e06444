//! Solana RPC adapter

pub mod holders;

pub use holders::SolanaHolderEstimator;
