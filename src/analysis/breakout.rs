//! 1h breakout detection against the first listed resistance

use crate::domain::indicators::{BreakoutLevel, BreakoutState};

/// Recent 1h closes the stage hands in
pub const BREAKOUT_WINDOW: usize = 50;

pub const MIN_BREAKOUT_CLOSES: usize = 5;

/// 15m volatility used when no timing row exists
pub const MISSING_VOLATILITY: f64 = 999.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BreakoutInputs<'a> {
    /// Closes in ascending time order
    pub closes: &'a [f64],
    pub resistance: Option<f64>,
    pub volume_ratio: f64,
    pub volatility_15m: f64,
}

/// One point each for: last close above resistance, last two closes above
/// it, volume ratio of at least 2, 15m volatility of at most 8.
pub fn detect_breakout(inputs: &BreakoutInputs<'_>) -> BreakoutState {
    let none = BreakoutState { state: BreakoutLevel::No, score: 0, resistance: inputs.resistance };

    let Some(resistance) = inputs.resistance else {
        return none;
    };
    let [.., prev, last] = inputs.closes else {
        return none;
    };

    let mut score = 0u8;
    if *last > resistance {
        score += 1;
    }
    if *last > resistance && *prev > resistance {
        score += 1;
    }
    if inputs.volume_ratio >= 2.0 {
        score += 1;
    }
    if inputs.volatility_15m <= 8.0 {
        score += 1;
    }

    let state = match score {
        4.. => BreakoutLevel::Strong,
        3 => BreakoutLevel::Confirmed,
        2 => BreakoutLevel::Weak,
        _ => BreakoutLevel::No,
    };

    BreakoutState { state, score, resistance: Some(resistance) }
}
