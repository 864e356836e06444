//! Support/Resistance Engine
//!
//! Swing lows seed supports and swing highs seed resistances. Candidates
//! within 0.2% of a bin's first price share the bin, and every bin is scored:
//!
//! strength = 0.35 * touches + 0.30 * reaction + 0.20 * relative volume + 0.15 * recency
//!
//! Bins below 0.4 are dropped; the three strongest per side are kept.

use statrs::statistics::Statistics;

use crate::domain::candle::Candle;
use crate::domain::indicators::{round_to, Level, SupportResistance};

const HOUR_MS: f64 = 3_600_000.0;

/// Tunables for level detection
#[derive(Debug, Clone)]
pub struct LevelParams {
    /// Relative distance for joining a bin
    pub bin_pct: f64,
    pub min_strength: f64,
    pub max_levels: usize,
    /// Fewer candles than this produce no levels
    pub min_candles: usize,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            bin_pct: 0.002,
            min_strength: 0.4,
            max_levels: 3,
            min_candles: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    index: usize,
    price: f64,
    timestamp: i64,
    volume: f64,
}

#[derive(Debug)]
struct Bin {
    price: f64,
    touches: Vec<Touch>,
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

fn swing_points(candles: &[Candle]) -> (Vec<Touch>, Vec<Touch>) {
    let mut supports = Vec::new();
    let mut resistances = Vec::new();

    for (i, window) in candles.windows(3).enumerate() {
        let (prev, curr, next) = (&window[0], &window[1], &window[2]);

        if curr.low < prev.low && curr.low < next.low {
            supports.push(Touch { index: i + 1, price: curr.low, timestamp: curr.timestamp, volume: curr.volume });
        }
        if curr.high > prev.high && curr.high > next.high {
            resistances.push(Touch { index: i + 1, price: curr.high, timestamp: curr.timestamp, volume: curr.volume });
        }
    }

    (supports, resistances)
}

fn bin_touches(touches: Vec<Touch>, bin_pct: f64) -> Vec<Bin> {
    let mut bins: Vec<Bin> = Vec::new();

    for touch in touches {
        match bins
            .iter_mut()
            .find(|bin| (bin.price - touch.price).abs() / bin.price <= bin_pct)
        {
            Some(bin) => bin.touches.push(touch),
            None => bins.push(Bin { price: touch.price, touches: vec![touch] }),
        }
    }

    bins
}

fn score_bin(bin: &Bin, candles: &[Candle], avg_volume: f64, now_ms: i64) -> Level {
    let touch_count = bin.touches.len();
    let touch_score = clamp01(touch_count as f64 / 5.0);

    // Excursion of the candle right after each touch
    let max_reaction = bin
        .touches
        .iter()
        .filter_map(|t| candles.get(t.index + 1))
        .map(|next| (next.high - bin.price).abs() / bin.price)
        .fold(0.0_f64, f64::max);
    let reaction_score = clamp01(max_reaction / 0.05);

    let avg_touch_volume = bin.touches.iter().map(|t| t.volume).mean();
    let volume_score = if avg_volume > 0.0 {
        clamp01((avg_touch_volume / avg_volume) / 2.0)
    } else {
        0.0
    };

    let first_touch = bin.touches.iter().map(|t| t.timestamp).min().unwrap_or(now_ms);
    let age_hours = (now_ms - first_touch) as f64 / HOUR_MS;
    let time_score = clamp01(1.0 - age_hours / 72.0);

    let strength = 0.35 * touch_score + 0.30 * reaction_score + 0.20 * volume_score + 0.15 * time_score;

    Level {
        price: bin.price,
        strength: round_to(strength, 3),
        touches: touch_count,
        first_touch,
    }
}

fn rank(bins: Vec<Bin>, candles: &[Candle], avg_volume: f64, now_ms: i64, params: &LevelParams) -> Vec<Level> {
    let mut levels: Vec<Level> = bins
        .iter()
        .map(|bin| score_bin(bin, candles, avg_volume, now_ms))
        .filter(|level| level.strength >= params.min_strength)
        .collect();

    levels.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    levels.truncate(params.max_levels);
    levels
}

/// Detect ranked levels from candles in ascending time order.
///
/// `last_calculated_at` is set to the newest candle's timestamp. Returns
/// empty sides when there are fewer than `min_candles` candles.
pub fn support_resistance(candles: &[Candle], now_ms: i64, params: &LevelParams) -> SupportResistance {
    let last_calculated_at = candles.last().map(|c| c.timestamp).unwrap_or(0);

    if candles.len() < params.min_candles {
        return SupportResistance { supports: vec![], resistances: vec![], last_calculated_at };
    }

    let avg_volume = candles.iter().map(|c| c.volume).mean();
    let (supports, resistances) = swing_points(candles);

    SupportResistance {
        supports: rank(bin_touches(supports, params.bin_pct), candles, avg_volume, now_ms, params),
        resistances: rank(bin_touches(resistances, params.bin_pct), candles, avg_volume, now_ms, params),
        last_calculated_at,
    }
}

/// Whether any candle is newer than the previous calculation
pub fn needs_recalculation(candles: &[Candle], previous: Option<&SupportResistance>) -> bool {
    match previous {
        None => true,
        Some(prev) => candles.iter().any(|c| c.timestamp > prev.last_calculated_at),
    }
}
