//! 15m entry timing

use crate::domain::candle::Candle;
use crate::domain::indicators::{round_to, Timing15m, TimingSignal};

pub const MIN_TIMING_CANDLES: usize = 5;

/// Window of recent candles the stage hands in
pub const TIMING_WINDOW: usize = 20;

const RANGE_BARS: usize = 5;

/// Momentum, volatility and entry quality for the latest 15m candles.
///
/// Momentum is the last close-to-close change; volatility is the average
/// high-low range of the last five candles over the last close. The signal
/// is classified on the rounded entry quality.
pub fn timing_15m(candles: &[Candle]) -> Option<Timing15m> {
    if candles.len() < MIN_TIMING_CANDLES {
        return None;
    }

    let last = &candles[candles.len() - 1];
    let prev = &candles[candles.len() - 2];
    if prev.close == 0.0 || last.close == 0.0 {
        return None;
    }

    let momentum = (last.close - prev.close) / prev.close;

    let tail = &candles[candles.len() - RANGE_BARS..];
    let avg_range = tail.iter().map(|c| c.high - c.low).sum::<f64>() / RANGE_BARS as f64;
    let volatility = avg_range / last.close;

    let mut quality: f64 = 0.0;
    if momentum > 0.0 {
        quality += 0.4;
    }
    if volatility < 0.02 {
        quality += 0.3;
    }
    if volatility < 0.01 {
        quality += 0.3;
    }
    let entry_quality = round_to(quality.clamp(0.0, 1.0), 2);

    let signal = if entry_quality > 0.7 {
        TimingSignal::Good
    } else if entry_quality < 0.3 {
        TimingSignal::Risky
    } else {
        TimingSignal::Wait
    };

    Some(Timing15m {
        momentum: round_to(momentum, 4),
        volatility: round_to(volatility, 4),
        entry_quality,
        signal,
    })
}
