//! Derived indicator rows
//!
//! Each type is the current value for one token (per timeframe where noted).
//! The functions that produce them live in `analysis`.

use serde::{Deserialize, Serialize};

/// One clustered support or resistance level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    /// Weighted blend in [0, 1], rounded to 3 decimals
    pub strength: f64,
    pub touches: usize,
    /// Earliest touch, epoch milliseconds
    pub first_touch: i64,
}

/// Ranked levels for one (token, timeframe), strongest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub supports: Vec<Level>,
    pub resistances: Vec<Level>,
    /// Timestamp of the newest candle used for the calculation
    pub last_calculated_at: i64,
}

impl SupportResistance {
    pub fn strongest_support(&self) -> Option<&Level> {
        self.supports.first()
    }

    pub fn strongest_resistance(&self) -> Option<&Level> {
        self.resistances.first()
    }

    /// Last listed support, used as the hold line by the transition detector
    pub fn nearest_support(&self) -> Option<&Level> {
        self.supports.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Range,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Range => "range",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Trend::Up),
            "down" => Some(Trend::Down),
            "range" => Some(Trend::Range),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePosition {
    AboveSupport,
    BelowResistance,
    MidRange,
    Unknown,
}

impl PricePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricePosition::AboveSupport => "above_support",
            PricePosition::BelowResistance => "below_resistance",
            PricePosition::MidRange => "mid_range",
            PricePosition::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "above_support" => Some(PricePosition::AboveSupport),
            "below_resistance" => Some(PricePosition::BelowResistance),
            "mid_range" => Some(PricePosition::MidRange),
            "unknown" => Some(PricePosition::Unknown),
            _ => None,
        }
    }
}

/// 4h trend bias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBias {
    pub trend: Trend,
    pub strength: f64,
    pub price_position: PricePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingSignal {
    Good,
    Wait,
    Risky,
}

impl TimingSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimingSignal::Good => "good",
            TimingSignal::Wait => "wait",
            TimingSignal::Risky => "risky",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "good" => Some(TimingSignal::Good),
            "wait" => Some(TimingSignal::Wait),
            "risky" => Some(TimingSignal::Risky),
            _ => None,
        }
    }
}

/// 15m entry timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing15m {
    pub momentum: f64,
    pub volatility: f64,
    pub entry_quality: f64,
    pub signal: TimingSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAnomaly {
    pub volume_ratio: f64,
    pub anomaly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PumpLabel {
    Valid,
    Questionable,
    Fake,
}

impl PumpLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpLabel::Valid => "VALID",
            PumpLabel::Questionable => "QUESTIONABLE",
            PumpLabel::Fake => "FAKE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VALID" => Some(PumpLabel::Valid),
            "QUESTIONABLE" => Some(PumpLabel::Questionable),
            "FAKE" => Some(PumpLabel::Fake),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpScore {
    pub score: f64,
    pub label: PumpLabel,
    /// Score held before this one was computed
    pub previous_score: Option<f64>,
}

impl PumpScore {
    /// Change since the previous score, zero when there is none
    pub fn delta(&self) -> f64 {
        self.previous_score.map_or(0.0, |prev| self.score - prev)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Extreme => "EXTREME",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            "EXTREME" => Some(RiskLevel::Extreme),
            _ => None,
        }
    }
}

/// Bucketed expected move range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedMove {
    #[serde(rename = "0-5%")]
    UpTo5Pct,
    #[serde(rename = "5-10%")]
    Pct5To10,
    #[serde(rename = "10-30%")]
    Pct10To30,
    #[serde(rename = "30-100%")]
    Pct30To100,
    #[serde(rename = "2x-3x")]
    Double,
}

impl ExpectedMove {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedMove::UpTo5Pct => "0-5%",
            ExpectedMove::Pct5To10 => "5-10%",
            ExpectedMove::Pct10To30 => "10-30%",
            ExpectedMove::Pct30To100 => "30-100%",
            ExpectedMove::Double => "2x-3x",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "0-5%" => Some(ExpectedMove::UpTo5Pct),
            "5-10%" => Some(ExpectedMove::Pct5To10),
            "10-30%" => Some(ExpectedMove::Pct10To30),
            "30-100%" => Some(ExpectedMove::Pct30To100),
            "2x-3x" => Some(ExpectedMove::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub risk_level: RiskLevel,
    pub expected_move: ExpectedMove,
    /// [0, 100]
    pub failure_risk: f64,
    /// [0, 100], rounded
    pub setup_quality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BreakoutLevel {
    No,
    Weak,
    Confirmed,
    Strong,
}

impl BreakoutLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakoutLevel::No => "NO",
            BreakoutLevel::Weak => "WEAK",
            BreakoutLevel::Confirmed => "CONFIRMED",
            BreakoutLevel::Strong => "STRONG",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NO" => Some(BreakoutLevel::No),
            "WEAK" => Some(BreakoutLevel::Weak),
            "CONFIRMED" => Some(BreakoutLevel::Confirmed),
            "STRONG" => Some(BreakoutLevel::Strong),
            _ => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, BreakoutLevel::Confirmed | BreakoutLevel::Strong)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutState {
    pub state: BreakoutLevel,
    /// 0 to 4
    pub score: u8,
    /// Resistance the closes were tested against
    pub resistance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransitionPhase {
    Wait,
    Watch,
    Buy,
}

impl TransitionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionPhase::Wait => "WAIT",
            TransitionPhase::Watch => "WATCH",
            TransitionPhase::Buy => "BUY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAIT" => Some(TransitionPhase::Wait),
            "WATCH" => Some(TransitionPhase::Watch),
            "BUY" => Some(TransitionPhase::Buy),
            _ => None,
        }
    }
}

/// Named booleans evaluated by the transition detector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionConditions {
    pub breakout_confirmed: bool,
    pub support_holding: bool,
    pub volume_confirmed: bool,
    pub pump_improving: bool,
    pub momentum_shift: bool,
    pub acceptable_risk: bool,
}

impl TransitionConditions {
    /// Count of the five scored conditions (the breakout gate is not scored)
    pub fn satisfied(&self) -> u8 {
        [
            self.support_holding,
            self.volume_confirmed,
            self.pump_improving,
            self.momentum_shift,
            self.acceptable_risk,
        ]
        .iter()
        .filter(|c| **c)
        .count() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionState {
    pub state: TransitionPhase,
    pub satisfied: u8,
    pub conditions: TransitionConditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeDecision {
    Buy,
    Sell,
    NoTrade,
}

impl TradeDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDecision::Buy => "BUY",
            TradeDecision::Sell => "SELL",
            TradeDecision::NoTrade => "NO_TRADE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(TradeDecision::Buy),
            "SELL" => Some(TradeDecision::Sell),
            "NO_TRADE" => Some(TradeDecision::NoTrade),
            _ => None,
        }
    }
}

/// Buy/sell composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuySellScore {
    pub buy_score: f64,
    pub sell_score: f64,
    pub decision: TradeDecision,
    pub confidence: f64,
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
