//! Market readings and point-in-time snapshots

use serde::{Deserialize, Serialize};

/// Holder approximation never reports more than this
pub const MAX_APPROX_HOLDERS: u64 = 50_000;

/// Best-available trading pair readout for a token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketReading {
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub liquidity: Option<f64>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub dex_id: Option<String>,
}

impl MarketReading {
    /// True when a reported market cap or 24h volume sits below its floor.
    /// Unknown values never trip the floor.
    pub fn is_below_floor(&self, market_cap_floor: f64, volume_floor: f64) -> bool {
        let low_cap = self.market_cap.map_or(false, |mc| mc < market_cap_floor);
        let low_volume = self.volume_24h.map_or(false, |v| v < volume_floor);
        low_cap || low_volume
    }

    pub fn into_snapshot(self, token_address: &str, holders: Option<u64>, timestamp: i64) -> MarketSnapshot {
        MarketSnapshot {
            token_address: token_address.to_string(),
            price: self.price,
            market_cap: self.market_cap,
            volume_24h: self.volume_24h,
            liquidity: self.liquidity,
            holders,
            dex_id: self.dex_id,
            timestamp,
        }
    }
}

/// Immutable observation appended to the snapshot history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub token_address: String,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub liquidity: Option<f64>,
    pub holders: Option<u64>,
    pub dex_id: Option<String>,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Approximate holder count from the largest token accounts and total supply.
///
/// The more supply the top accounts hold, the fewer holders are assumed to
/// exist beyond them.
pub fn approximate_holders(largest_balances: &[u64], total_supply: u64) -> u64 {
    let balances: Vec<u64> = largest_balances.iter().copied().filter(|b| *b > 0).collect();
    let count = balances.len() as u64;

    if total_supply == 0 || count == 0 {
        return count;
    }

    let top_sum: f64 = balances.iter().map(|b| *b as f64).sum();
    let concentration = top_sum / total_supply as f64;

    let multiplier = if concentration > 0.8 {
        2.0
    } else if concentration > 0.6 {
        4.0
    } else if concentration > 0.4 {
        8.0
    } else if concentration > 0.2 {
        15.0
    } else {
        25.0
    };

    ((count as f64 * multiplier).round() as u64).min(MAX_APPROX_HOLDERS)
}
