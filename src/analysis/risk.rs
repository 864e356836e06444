//! Risk Profile
//!
//! Failure risk starts at 50 and moves with volatility, pump quality,
//! timing and the 4h trend. Setup quality blends the buy score with the
//! pump score.

use crate::domain::indicators::{round_to, ExpectedMove, RiskLevel, RiskProfile, TimingSignal, Trend};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInputs {
    pub pump_score: f64,
    pub timing: TimingSignal,
    /// 15m volatility in percent
    pub volatility_pct: f64,
    pub trend_4h: Trend,
    pub buy_score: f64,
}

fn expected_move(pump: f64, risk: f64) -> ExpectedMove {
    if pump > 0.85 && risk > 60.0 {
        ExpectedMove::Double
    } else if pump > 0.7 {
        ExpectedMove::Pct30To100
    } else if pump > 0.55 {
        ExpectedMove::Pct10To30
    } else if pump > 0.4 {
        ExpectedMove::Pct5To10
    } else {
        ExpectedMove::UpTo5Pct
    }
}

fn risk_level(risk: f64) -> RiskLevel {
    if risk >= 80.0 {
        RiskLevel::Extreme
    } else if risk >= 60.0 {
        RiskLevel::High
    } else if risk >= 40.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn risk_profile(inputs: &RiskInputs) -> RiskProfile {
    let mut risk: f64 = 50.0;

    if inputs.volatility_pct > 6.0 {
        risk += 30.0;
    } else if inputs.volatility_pct > 3.0 {
        risk += 15.0;
    }

    if inputs.pump_score < 0.4 {
        risk += 25.0;
    } else if inputs.pump_score > 0.7 {
        risk -= 10.0;
    }

    match inputs.timing {
        TimingSignal::Risky => risk += 20.0,
        TimingSignal::Good => risk -= 10.0,
        TimingSignal::Wait => {}
    }

    if inputs.trend_4h == Trend::Down {
        risk += 15.0;
    }

    let risk = risk.clamp(0.0, 100.0);

    let mut setup = inputs.buy_score.min(60.0) * 0.5 + inputs.pump_score * 30.0;
    match inputs.timing {
        TimingSignal::Good => setup += 15.0,
        TimingSignal::Risky => setup -= 15.0,
        TimingSignal::Wait => {}
    }

    RiskProfile {
        risk_level: risk_level(risk),
        expected_move: expected_move(inputs.pump_score, risk),
        failure_risk: risk,
        setup_quality: round_to(setup.clamp(0.0, 100.0), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn inputs() -> RiskInputs {
        RiskInputs {
            pump_score: 0.55,
            timing: TimingSignal::Wait,
            volatility_pct: 1.0,
            trend_4h: Trend::Range,
            buy_score: 40.0,
        }
    }

    #[test]
    fn test_baseline() {
        let profile = risk_profile(&inputs());
        assert_relative_eq!(profile.failure_risk, 50.0);
        assert_eq!(profile.risk_level, RiskLevel::Medium);
        assert_eq!(profile.expected_move, ExpectedMove::Pct5To10);
        // 40 * 0.5 + 0.55 * 30 = 36.5
        assert_relative_eq!(profile.setup_quality, 37.0);
    }

    #[test]
    fn test_everything_bad_is_clamped_extreme() {
        let profile = risk_profile(&RiskInputs {
            pump_score: 0.1,
            timing: TimingSignal::Risky,
            volatility_pct: 9.0,
            trend_4h: Trend::Down,
            buy_score: 0.0,
        });
        assert_relative_eq!(profile.failure_risk, 100.0);
        assert_eq!(profile.risk_level, RiskLevel::Extreme);
        assert_eq!(profile.expected_move, ExpectedMove::UpTo5Pct);
        assert_relative_eq!(profile.setup_quality, 0.0);
    }

    #[test]
    fn test_good_setup() {
        let profile = risk_profile(&RiskInputs {
            pump_score: 0.8,
            timing: TimingSignal::Good,
            volatility_pct: 2.0,
            trend_4h: Trend::Up,
            buy_score: 80.0,
        });
        assert_relative_eq!(profile.failure_risk, 30.0);
        assert_eq!(profile.risk_level, RiskLevel::Low);
        assert_eq!(profile.expected_move, ExpectedMove::Pct30To100);
        // 30 + 24 + 15
        assert_relative_eq!(profile.setup_quality, 69.0);
    }

    #[test]
    fn test_high_risk_strong_pump_doubles() {
        let profile = risk_profile(&RiskInputs {
            pump_score: 0.9,
            timing: TimingSignal::Risky,
            volatility_pct: 7.0,
            trend_4h: Trend::Range,
            buy_score: 10.0,
        });
        // 50 + 30 - 10 + 20
        assert_relative_eq!(profile.failure_risk, 90.0);
        assert_eq!(profile.expected_move, ExpectedMove::Double);
    }
}
