//! PnL Reporting
//!
//! Realized PnL treats take-profit stages as partial exits at fixed weights
//! (30% at TP1, 30% at TP2, 40% at TP3) booked at fixed nominal returns
//! (35%, 100%, 250%). Whatever weight remains is marked at the exit move for
//! stopped signals. All results are percentages.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::str::FromStr;

use super::signal::{Signal, SignalStatus};

const DAY_MS: i64 = 86_400_000;

/// (tranche weight, nominal return %) per take-profit stage
const TRANCHES: [(Decimal, Decimal); 3] = [
    (dec!(0.30), dec!(35)),
    (dec!(0.30), dec!(100)),
    (dec!(0.40), dec!(250)),
];

fn move_pct(signal: &Signal) -> Decimal {
    signal.pnl_at(signal.last_market_cap) * dec!(100)
}

/// Weighted realized PnL for one signal, `None` without a usable entry
pub fn weighted_realized_pnl(signal: &Signal) -> Option<Decimal> {
    if signal.start_market_cap <= Decimal::ZERO {
        return None;
    }

    let mut realized = Decimal::ZERO;
    let mut remaining = Decimal::ONE;

    for (stage, (weight, nominal)) in TRANCHES.iter().enumerate() {
        if signal.tp_stage as usize > stage {
            realized += *weight * *nominal;
            remaining -= *weight;
        }
    }

    if signal.tp_stage >= 3 {
        return Some(realized);
    }

    match signal.status {
        SignalStatus::Stopped => realized += remaining * move_pct(signal),
        SignalStatus::ClosedTime if signal.tp_stage == 0 => realized = move_pct(signal),
        _ => {}
    }

    Some(realized)
}

/// Headline PnL for one signal: the highest stage's nominal return, or the stop move
pub fn simple_realized_pnl(signal: &Signal) -> Option<Decimal> {
    if signal.start_market_cap <= Decimal::ZERO {
        return None;
    }

    let pnl = match signal.tp_stage {
        s if s >= 3 => dec!(250),
        2 => dec!(100),
        1 => dec!(35),
        _ if signal.status == SignalStatus::Stopped => move_pct(signal),
        _ => Decimal::ZERO,
    };
    Some(pnl)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalKpi {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    /// Rounded percentage of wins among decided signals
    pub success_rate: u32,
    pub net_pnl: Decimal,
    /// Sum of entry market caps
    pub exposure: Decimal,
}

pub fn signal_kpis(signals: &[Signal]) -> SignalKpi {
    let mut kpi = SignalKpi::default();

    for signal in signals {
        let Some(pnl) = simple_realized_pnl(signal) else {
            continue;
        };

        kpi.total += 1;
        kpi.net_pnl += pnl;
        kpi.exposure += signal.start_market_cap;

        if signal.tp_stage >= 1 {
            kpi.wins += 1;
        } else if signal.status == SignalStatus::Stopped {
            kpi.losses += 1;
        }
    }

    let decided = kpi.wins + kpi.losses;
    if decided > 0 {
        kpi.success_rate = ((kpi.wins as f64 / decided as f64) * 100.0).round() as u32;
    }
    kpi
}

/// Unrealized return across OPEN signals, capital weighted
pub fn live_pnl(signals: &[Signal]) -> Decimal {
    let (pnl_sum, capital) = signals
        .iter()
        .filter(|s| s.is_open())
        .filter(|s| s.start_market_cap > Decimal::ZERO && s.last_market_cap > Decimal::ZERO)
        .fold((Decimal::ZERO, Decimal::ZERO), |(pnl, cap), s| {
            (pnl + (s.last_market_cap - s.start_market_cap), cap + s.start_market_cap)
        });

    pnl_sum
        .checked_div(capital)
        .map(|ratio| ratio * dec!(100))
        .unwrap_or(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub at: i64,
    pub cumulative_pnl: Decimal,
}

/// Cumulative weighted realized PnL over closed or partially realized signals
pub fn equity_curve(signals: &[Signal]) -> Vec<EquityPoint> {
    let mut realized: Vec<&Signal> = signals
        .iter()
        .filter(|s| s.start_market_cap > Decimal::ZERO)
        .filter(|s| s.tp_stage > 0 || !s.is_open())
        .collect();
    realized.sort_by_key(|s| s.updated_at);

    let mut cumulative = Decimal::ZERO;
    realized
        .into_iter()
        .filter_map(|s| {
            let pnl = weighted_realized_pnl(s)?;
            cumulative += pnl;
            Some(EquityPoint { at: s.updated_at, cumulative_pnl: cumulative })
        })
        .collect()
}

/// Reporting window applied to signal creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalRange {
    Day,
    Week,
    Month,
    #[default]
    All,
}

impl SignalRange {
    /// Earliest creation time included, epoch milliseconds
    pub fn since(&self, now: i64) -> i64 {
        match self {
            SignalRange::Day => now - DAY_MS,
            SignalRange::Week => now - 7 * DAY_MS,
            SignalRange::Month => now - 30 * DAY_MS,
            SignalRange::All => 0,
        }
    }

    pub fn filter(&self, signals: Vec<Signal>, now: i64) -> Vec<Signal> {
        let from = self.since(now);
        signals.into_iter().filter(|s| s.created_at >= from).collect()
    }
}

impl FromStr for SignalRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(SignalRange::Day),
            "week" => Ok(SignalRange::Week),
            "month" => Ok(SignalRange::Month),
            "all" => Ok(SignalRange::All),
            other => Err(format!("unknown range: {}", other)),
        }
    }
}
