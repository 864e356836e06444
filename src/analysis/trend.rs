//! 4h Trend Bias
//!
//! slope = (last close - first close) / first close
//! momentum = (up closes - down closes) / N
//!
//! up when slope > 2% and momentum > 0.05, down on the mirrored condition,
//! otherwise range.

use crate::domain::candle::Candle;
use crate::domain::indicators::{round_to, PricePosition, SupportResistance, Trend, TrendBias};

pub const MIN_TREND_CANDLES: usize = 10;

const SLOPE_THRESHOLD: f64 = 0.02;
const MOMENTUM_THRESHOLD: f64 = 0.05;

/// Trend bias over candles in ascending order, `None` below ten candles
pub fn trend_bias(candles: &[Candle], levels: &SupportResistance) -> Option<TrendBias> {
    if candles.len() < MIN_TREND_CANDLES {
        return None;
    }

    let first = candles.first()?.close;
    let last = candles.last()?.close;
    if first == 0.0 {
        return None;
    }
    let slope = (last - first) / first;

    let (ups, downs) = candles.windows(2).fold((0i32, 0i32), |(up, down), w| {
        if w[1].close > w[0].close {
            (up + 1, down)
        } else if w[1].close < w[0].close {
            (up, down + 1)
        } else {
            (up, down)
        }
    });
    let momentum = f64::from(ups - downs) / candles.len() as f64;

    let trend = if slope > SLOPE_THRESHOLD && momentum > MOMENTUM_THRESHOLD {
        Trend::Up
    } else if slope < -SLOPE_THRESHOLD && momentum < -MOMENTUM_THRESHOLD {
        Trend::Down
    } else {
        Trend::Range
    };

    let strength = (slope.abs() * 10.0 + momentum.abs()).min(1.0);

    Some(TrendBias {
        trend,
        strength: round_to(strength, 3),
        price_position: price_position(last, levels),
    })
}

/// Position of the last close against the strongest levels; resistance wins ties
fn price_position(price: f64, levels: &SupportResistance) -> PricePosition {
    let mut position = PricePosition::MidRange;

    if levels.strongest_support().is_some_and(|s| price > s.price) {
        position = PricePosition::AboveSupport;
    }
    if levels.strongest_resistance().is_some_and(|r| price < r.price) {
        position = PricePosition::BelowResistance;
    }

    position
}
