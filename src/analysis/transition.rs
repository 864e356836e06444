//! Transition Detector
//!
//! Only a confirmed or strong breakout opens the gate. Past the gate five
//! conditions are scored: four or more is BUY, exactly three is WATCH.

use crate::domain::indicators::{
    BreakoutLevel, ExpectedMove, RiskLevel, TransitionConditions, TransitionPhase, TransitionState,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionInputs {
    pub breakout: BreakoutLevel,
    pub price_above_support: bool,
    pub volume_ratio: f64,
    pub pump_delta: f64,
    pub momentum_15m: f64,
    pub risk_level: RiskLevel,
    pub failure_risk: f64,
    pub expected_move: ExpectedMove,
}

pub fn detect_transition(inputs: &TransitionInputs) -> TransitionState {
    if !inputs.breakout.is_confirmed() {
        return TransitionState {
            state: TransitionPhase::Wait,
            satisfied: 0,
            conditions: TransitionConditions::default(),
        };
    }

    let conditions = TransitionConditions {
        breakout_confirmed: true,
        support_holding: inputs.price_above_support,
        volume_confirmed: inputs.volume_ratio >= 1.5,
        pump_improving: inputs.pump_delta >= 0.15,
        momentum_shift: inputs.momentum_15m > 0.0,
        acceptable_risk: inputs.risk_level != RiskLevel::High
            && inputs.failure_risk <= 60.0
            && inputs.expected_move != ExpectedMove::UpTo5Pct,
    };

    let satisfied = conditions.satisfied();
    let state = match satisfied {
        4.. => TransitionPhase::Buy,
        3 => TransitionPhase::Watch,
        _ => TransitionPhase::Wait,
    };

    TransitionState { state, satisfied, conditions }
}
