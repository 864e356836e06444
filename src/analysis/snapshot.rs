//! Raw AI snapshot
//!
//! Compact, deterministic view of a token handed to the AI judges. Field
//! order is fixed by the struct layout so the serialized form, and the
//! SHA-256 content hash over it, only change when the market state does.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::candle::Candle;
use crate::domain::indicators::round_to;
use crate::domain::market::MarketSnapshot;
use crate::domain::token::Token;

/// Candles of each timeframe included in the snapshot
pub const SNAPSHOT_CANDLES: usize = 15;

const MIN_STRUCTURE_CANDLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenMeta {
    pub age_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketReadout {
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub liquidity: Option<f64>,
    pub holders: Option<u64>,
}

/// Percent change against the prior snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deltas {
    pub price_5m: Option<f64>,
    pub marketcap_5m: Option<f64>,
    pub volume_5m: Option<f64>,
    pub liquidity_5m: Option<f64>,
    pub holders_5m: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HolderTier {
    VeryLow,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HolderTrend {
    Increasing,
    Decreasing,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldersAnalysis {
    pub approx_holders: u64,
    pub holder_tier: HolderTier,
    pub trend: HolderTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StructureTrend {
    Up,
    Down,
    Range,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolatilityBand {
    High,
    Medium,
    Low,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStructure {
    pub trend_15m: StructureTrend,
    pub trend_1h: StructureTrend,
    pub volatility: VolatilityBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSignals {
    pub volume_spike: bool,
    pub liquidity_drop: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotCandle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&Candle> for SnapshotCandle {
    fn from(c: &Candle) -> Self {
        Self { open: c.open, high: c.high, low: c.low, close: c.close, volume: c.volume }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotCandles {
    #[serde(rename = "15m")]
    pub m15: Vec<SnapshotCandle>,
    #[serde(rename = "1h")]
    pub h1: Vec<SnapshotCandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSnapshot {
    pub token: SnapshotToken,
    pub token_meta: TokenMeta,
    pub market_snapshot: MarketReadout,
    pub deltas: Option<Deltas>,
    pub holders_analysis: Option<HoldersAnalysis>,
    pub price_structure: PriceStructure,
    pub derived_signals: DerivedSignals,
    pub candles: SnapshotCandles,
}

impl RawSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Hex SHA-256 of the serialized snapshot
    pub fn content_hash(&self) -> serde_json::Result<String> {
        Ok(hash_json(&self.to_json()?))
    }
}

pub fn hash_json(json: &str) -> String {
    hex::encode(Sha256::digest(json.as_bytes()))
}

/// Everything the builder reads, already fetched from the store
#[derive(Debug, Clone, Copy)]
pub struct SnapshotSources<'a> {
    pub token: &'a Token,
    pub current: &'a MarketSnapshot,
    pub previous: Option<&'a MarketSnapshot>,
    /// Ascending, most recent last
    pub candles_15m: &'a [Candle],
    pub candles_1h: &'a [Candle],
    pub now_ms: i64,
}

fn percent_change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let prev = previous.filter(|p| *p != 0.0)?;
    let curr = current?;
    Some(round_to((curr - prev) / prev * 100.0, 2))
}

fn deltas(current: &MarketSnapshot, previous: &MarketSnapshot) -> Deltas {
    Deltas {
        price_5m: percent_change(current.price, previous.price),
        marketcap_5m: percent_change(current.market_cap, previous.market_cap),
        volume_5m: percent_change(current.volume_24h, previous.volume_24h),
        liquidity_5m: percent_change(current.liquidity, previous.liquidity),
        holders_5m: percent_change(current.holders.map(|h| h as f64), previous.holders.map(|h| h as f64)),
    }
}

pub fn holder_tier(holders: u64) -> HolderTier {
    match holders {
        h if h < 50 => HolderTier::VeryLow,
        h if h < 150 => HolderTier::Low,
        h if h < 500 => HolderTier::Medium,
        _ => HolderTier::High,
    }
}

fn holders_analysis(current: Option<u64>, previous: Option<u64>) -> Option<HoldersAnalysis> {
    let holders = current.filter(|h| *h > 0)?;

    let trend = match previous.filter(|p| *p > 0) {
        Some(prev) if holders as f64 > prev as f64 * 1.05 => HolderTrend::Increasing,
        Some(prev) if (holders as f64) < prev as f64 * 0.95 => HolderTrend::Decreasing,
        _ => HolderTrend::Flat,
    };

    Some(HoldersAnalysis {
        approx_holders: holders,
        holder_tier: holder_tier(holders),
        trend,
    })
}

pub fn structure_trend(candles: &[Candle]) -> StructureTrend {
    if candles.len() < MIN_STRUCTURE_CANDLES {
        return StructureTrend::Unknown;
    }
    let first = candles[0].close;
    let last = candles[candles.len() - 1].close;

    if last > first * 1.03 {
        StructureTrend::Up
    } else if last < first * 0.97 {
        StructureTrend::Down
    } else {
        StructureTrend::Range
    }
}

pub fn volatility_band(candles: &[Candle]) -> VolatilityBand {
    if candles.len() < MIN_STRUCTURE_CANDLES {
        return VolatilityBand::Unknown;
    }
    let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    if low <= 0.0 {
        return VolatilityBand::Unknown;
    }

    let range = (high - low) / low;
    if range > 0.25 {
        VolatilityBand::High
    } else if range > 0.1 {
        VolatilityBand::Medium
    } else {
        VolatilityBand::Low
    }
}

fn tail(candles: &[Candle]) -> &[Candle] {
    &candles[candles.len().saturating_sub(SNAPSHOT_CANDLES)..]
}

/// Assemble the snapshot. Price comes from the current snapshot; the other
/// market fields come from the token row.
pub fn build_raw_snapshot(sources: &SnapshotSources<'_>) -> RawSnapshot {
    let token = sources.token;
    let m15 = tail(sources.candles_15m);
    let h1 = tail(sources.candles_1h);

    let deltas = sources.previous.map(|prev| deltas(sources.current, prev));
    let derived_signals = DerivedSignals {
        volume_spike: deltas.as_ref().and_then(|d| d.volume_5m).is_some_and(|v| v > 100.0),
        liquidity_drop: deltas.as_ref().and_then(|d| d.liquidity_5m).is_some_and(|l| l < -5.0),
    };

    RawSnapshot {
        token: SnapshotToken {
            address: token.address.clone(),
            name: token.name.clone(),
            symbol: token.symbol.clone(),
        },
        token_meta: TokenMeta { age_days: token.age_days(sources.now_ms) },
        market_snapshot: MarketReadout {
            price: sources.current.price,
            market_cap: token.market_cap,
            volume_24h: token.volume_24h,
            liquidity: token.liquidity,
            holders: token.holders,
        },
        deltas,
        holders_analysis: holders_analysis(token.holders, sources.previous.and_then(|p| p.holders)),
        price_structure: PriceStructure {
            trend_15m: structure_trend(m15),
            trend_1h: structure_trend(h1),
            volatility: volatility_band(m15),
        },
        derived_signals,
        candles: SnapshotCandles {
            m15: m15.iter().map(SnapshotCandle::from).collect(),
            h1: h1.iter().map(SnapshotCandle::from).collect(),
        },
    }
}

/// Minimal snapshot for judge tests
#[cfg(test)]
pub(crate) fn sample_snapshot() -> RawSnapshot {
    let token = Token {
        address: "Mint111".to_string(),
        name: Some("Pulse".to_string()),
        symbol: Some("PLS".to_string()),
        source: None,
        tier: 1,
        status: crate::domain::token::TokenStatus::Active,
        price: Some(0.001),
        market_cap: Some(1_000_000.0),
        volume_24h: Some(250_000.0),
        liquidity: Some(50_000.0),
        holders: Some(200),
        dex_id: None,
        created_at: 0,
        updated_at: Some(0),
        last_ai_check_at: None,
    };
    let current = MarketSnapshot {
        token_address: token.address.clone(),
        price: token.price,
        market_cap: token.market_cap,
        volume_24h: token.volume_24h,
        liquidity: token.liquidity,
        holders: token.holders,
        dex_id: None,
        timestamp: 0,
    };
    build_raw_snapshot(&SnapshotSources {
        token: &token,
        current: &current,
        previous: None,
        candles_15m: &[],
        candles_1h: &[],
        now_ms: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::TokenStatus;

    const DAY: i64 = 86_400_000;

    fn token() -> Token {
        Token {
            address: "Mint111".to_string(),
            name: Some("Pulse".to_string()),
            symbol: Some("PLS".to_string()),
            source: None,
            tier: 1,
            status: TokenStatus::Active,
            price: Some(0.002),
            market_cap: Some(2_000_000.0),
            volume_24h: Some(600_000.0),
            liquidity: Some(80_000.0),
            holders: Some(420),
            dex_id: Some("raydium".to_string()),
            created_at: 0,
            updated_at: Some(3 * DAY),
            last_ai_check_at: None,
        }
    }

    fn snapshot(price: f64, volume: f64, liquidity: f64, holders: u64, ts: i64) -> MarketSnapshot {
        MarketSnapshot {
            token_address: "Mint111".to_string(),
            price: Some(price),
            market_cap: Some(price * 1e9),
            volume_24h: Some(volume),
            liquidity: Some(liquidity),
            holders: Some(holders),
            dex_id: None,
            timestamp: ts,
        }
    }

    fn rising(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = 1.0 + i as f64 * 0.01;
                Candle::new(i as i64, c, c, c, c, 10.0)
            })
            .collect()
    }

    #[test]
    fn test_builds_all_sections() {
        let token = token();
        let prev = snapshot(0.001, 200_000.0, 100_000.0, 380, 3 * DAY - 60_000);
        let current = snapshot(0.002, 600_000.0, 80_000.0, 420, 3 * DAY);
        let m15 = rising(20);
        let h1 = rising(5);

        let raw = build_raw_snapshot(&SnapshotSources {
            token: &token,
            current: &current,
            previous: Some(&prev),
            candles_15m: &m15,
            candles_1h: &h1,
            now_ms: 3 * DAY + 1,
        });

        assert_eq!(raw.token_meta.age_days, 3);
        assert_eq!(raw.market_snapshot.price, Some(0.002));
        let deltas = raw.deltas.as_ref().unwrap();
        assert_eq!(deltas.price_5m, Some(100.0));
        assert_eq!(deltas.volume_5m, Some(200.0));
        assert_eq!(deltas.liquidity_5m, Some(-20.0));
        assert!(raw.derived_signals.volume_spike);
        assert!(raw.derived_signals.liquidity_drop);

        let holders = raw.holders_analysis.as_ref().unwrap();
        assert_eq!(holders.holder_tier, HolderTier::Medium);
        assert_eq!(holders.trend, HolderTrend::Increasing);

        assert_eq!(raw.candles.m15.len(), SNAPSHOT_CANDLES);
        assert_eq!(raw.candles.h1.len(), 5);
        assert_eq!(raw.price_structure.trend_15m, StructureTrend::Up);
        assert_eq!(raw.price_structure.trend_1h, StructureTrend::Unknown);
    }

    #[test]
    fn test_without_previous_snapshot() {
        let token = token();
        let current = snapshot(0.002, 600_000.0, 80_000.0, 420, 0);
        let raw = build_raw_snapshot(&SnapshotSources {
            token: &token,
            current: &current,
            previous: None,
            candles_15m: &[],
            candles_1h: &[],
            now_ms: 0,
        });

        assert!(raw.deltas.is_none());
        assert!(!raw.derived_signals.volume_spike);
        assert_eq!(raw.holders_analysis.unwrap().trend, HolderTrend::Flat);
        assert_eq!(raw.price_structure.volatility, VolatilityBand::Unknown);
    }

    #[test]
    fn test_json_layout_and_hash_stability() {
        let token = token();
        let current = snapshot(0.002, 600_000.0, 80_000.0, 420, 0);
        let sources = SnapshotSources {
            token: &token,
            current: &current,
            previous: None,
            candles_15m: &[],
            candles_1h: &[],
            now_ms: 0,
        };

        let json = build_raw_snapshot(&sources).to_json().unwrap();
        assert!(json.starts_with(r#"{"token":{"address":"Mint111""#));
        assert!(json.contains(r#""candles":{"15m":[],"1h":[]}"#));

        let a = build_raw_snapshot(&sources).content_hash().unwrap();
        let b = build_raw_snapshot(&sources).content_hash().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let moved = snapshot(0.003, 600_000.0, 80_000.0, 420, 0);
        let c = build_raw_snapshot(&SnapshotSources { current: &moved, ..sources }).content_hash().unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_bands() {
        assert_eq!(holder_tier(49), HolderTier::VeryLow);
        assert_eq!(holder_tier(150), HolderTier::Medium);
        assert_eq!(holder_tier(500), HolderTier::High);

        let wide: Vec<Candle> = (0..10).map(|i| Candle::new(i, 1.0, 1.3, 1.0, 1.0, 1.0)).collect();
        assert_eq!(volatility_band(&wide), VolatilityBand::High);
        let calm: Vec<Candle> = (0..10).map(|i| Candle::new(i, 1.0, 1.05, 1.0, 1.0, 1.0)).collect();
        assert_eq!(volatility_band(&calm), VolatilityBand::Low);
    }
}
