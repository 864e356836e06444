//! Pump Score
//!
//! Tiered sum of volume expansion, pump duration and structural support,
//! capped at 1.

use crate::domain::indicators::{round_to, PumpLabel, PumpScore};

/// Bars a pump is assumed to have run for
pub const DEFAULT_DURATION_BARS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpInputs {
    pub volume_ratio: f64,
    pub duration_bars: u32,
    /// Number of 1h supports currently detected
    pub structure_count: usize,
}

pub fn pump_score_value(inputs: &PumpInputs) -> f64 {
    let volume = if inputs.volume_ratio >= 3.0 {
        0.4
    } else if inputs.volume_ratio >= 2.0 {
        0.3
    } else if inputs.volume_ratio >= 1.5 {
        0.15
    } else {
        0.0
    };

    let duration = match inputs.duration_bars {
        d if d >= 6 => 0.25,
        d if d >= 4 => 0.15,
        d if d >= 2 => 0.05,
        _ => 0.0,
    };

    let structure = match inputs.structure_count {
        n if n >= 2 => 0.25,
        1 => 0.1,
        _ => 0.0,
    };

    let total: f64 = volume + duration + structure;
    round_to(total.min(1.0), 2)
}

pub fn pump_label(score: f64) -> PumpLabel {
    if score >= 0.7 {
        PumpLabel::Valid
    } else if score >= 0.4 {
        PumpLabel::Questionable
    } else {
        PumpLabel::Fake
    }
}

/// Score and label, carrying the previously stored score for delta tracking
pub fn pump_score(inputs: &PumpInputs, previous: Option<&PumpScore>) -> PumpScore {
    let score = pump_score_value(inputs);
    PumpScore {
        score,
        label: pump_label(score),
        previous_score: previous.map(|p| p.score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn inputs(volume_ratio: f64, structure_count: usize) -> PumpInputs {
        PumpInputs { volume_ratio, duration_bars: DEFAULT_DURATION_BARS, structure_count }
    }

    #[test]
    fn test_tiers() {
        assert_relative_eq!(pump_score_value(&inputs(3.2, 2)), 0.8);
        assert_relative_eq!(pump_score_value(&inputs(2.0, 1)), 0.55);
        assert_relative_eq!(pump_score_value(&inputs(1.5, 0)), 0.3);
        assert_relative_eq!(pump_score_value(&inputs(1.0, 0)), 0.15);
    }

    #[test]
    fn test_capped_at_one() {
        let big = PumpInputs { volume_ratio: 10.0, duration_bars: 10, structure_count: 3 };
        assert_relative_eq!(pump_score_value(&big), 0.9);
        assert!(pump_score_value(&big) <= 1.0);
    }

    #[test]
    fn test_labels() {
        assert_eq!(pump_label(0.7), PumpLabel::Valid);
        assert_eq!(pump_label(0.55), PumpLabel::Questionable);
        assert_eq!(pump_label(0.39), PumpLabel::Fake);
    }

    #[test]
    fn test_previous_score_carried() {
        let first = pump_score(&inputs(1.0, 0), None);
        assert_eq!(first.previous_score, None);

        let second = pump_score(&inputs(3.0, 2), Some(&first));
        assert_eq!(second.previous_score, Some(0.15));
        assert_relative_eq!(second.delta(), 0.65, epsilon = 1e-9);
    }
}
