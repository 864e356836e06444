//! Buy/Sell composite score
//!
//! Both sides are built from the 4h trend, the strongest 1h level on that
//! side, proximity to it (full bonus at the level, none past 10%) and 1h
//! momentum, then scaled into [0, 100].

use crate::domain::indicators::{round_to, BuySellScore, Level, TradeDecision, Trend, TrendBias};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInputs<'a> {
    pub trend: &'a TrendBias,
    pub support: Option<&'a Level>,
    pub resistance: Option<&'a Level>,
    /// Latest 1h close
    pub close: f64,
    /// Close before it
    pub previous_close: f64,
}

fn proximity_bonus(distance_pct: f64) -> f64 {
    (1.0 - distance_pct / 10.0).clamp(0.0, 1.0) * 20.0
}

fn scale(raw: f64) -> f64 {
    (raw / 100.0).clamp(0.0, 1.0) * 100.0
}

pub fn buy_sell_score(inputs: &ScoreInputs<'_>) -> Option<BuySellScore> {
    if inputs.previous_close == 0.0 || inputs.close == 0.0 {
        return None;
    }
    let momentum = (inputs.close - inputs.previous_close) / inputs.previous_close;
    let strength = inputs.trend.strength;

    let mut buy = match inputs.trend.trend {
        Trend::Down => -30.0,
        Trend::Up => 20.0 * strength,
        Trend::Range => 0.0,
    };
    if let Some(support) = inputs.support {
        buy += support.strength * 30.0;
        buy += proximity_bonus((inputs.close - support.price) / inputs.close * 100.0);
    }
    buy += momentum.clamp(-1.0, 1.0) * 10.0;
    let buy = scale(buy);

    let mut sell = match inputs.trend.trend {
        Trend::Up => -30.0,
        Trend::Down => 20.0 * strength,
        Trend::Range => 0.0,
    };
    if let Some(resistance) = inputs.resistance {
        sell += resistance.strength * 30.0;
        sell += proximity_bonus((resistance.price - inputs.close) / inputs.close * 100.0);
    }
    sell += (-momentum).clamp(-1.0, 1.0) * 10.0;
    let sell = scale(sell);

    let (decision, confidence) = if buy > 60.0 && buy > sell + 10.0 {
        (TradeDecision::Buy, buy / 100.0)
    } else if sell > 60.0 && sell > buy + 10.0 {
        (TradeDecision::Sell, sell / 100.0)
    } else {
        (TradeDecision::NoTrade, 0.0)
    };

    Some(BuySellScore {
        buy_score: round_to(buy, 1),
        sell_score: round_to(sell, 1),
        decision,
        confidence: round_to(confidence, 2),
    })
}
