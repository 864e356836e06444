//! Trading Signal State Machine
//!
//! A signal is a paper position opened by AI consensus. While OPEN it is
//! advanced on every market update for its token:
//!
//! 1. peak market cap is raised to the current market cap
//! 2. pnl at or below the stop loss -> STOPPED
//! 3. held for max hold minutes -> CLOSED_TIME
//! 4. held for no-new-high minutes and trading below peak x drop ratio -> CLOSED_TIME
//! 5. to 7. take-profit stages 3, 2, 1 (highest first, one stage per update)
//! 8. otherwise only the mark is refreshed
//!
//! Thresholds are passed in on every call so they can change at runtime.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MINUTE_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    Open,
    ClosedTime,
    Stopped,
}

impl SignalStatus {
    /// Persisted status code
    pub fn code(&self) -> i64 {
        match self {
            SignalStatus::Open => 1,
            SignalStatus::ClosedTime => 3,
            SignalStatus::Stopped => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SignalStatus::Open),
            3 => Some(SignalStatus::ClosedTime),
            4 => Some(SignalStatus::Stopped),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        *self == SignalStatus::Open
    }
}

/// Exit and take-profit thresholds. Percentages are fractions (0.35 = 35%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    pub stop_loss_pct: Decimal,
    pub tp1_pct: Decimal,
    pub tp2_pct: Decimal,
    pub tp3_pct: Decimal,
    pub max_hold_minutes: i64,
    pub no_new_high_minutes: i64,
    pub no_new_high_drop_ratio: Decimal,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            stop_loss_pct: dec!(-0.25),
            tp1_pct: dec!(0.35),
            tp2_pct: dec!(1.0),
            tp3_pct: dec!(2.5),
            max_hold_minutes: 90,
            no_new_high_minutes: 45,
            no_new_high_drop_ratio: dec!(0.9),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    #[error("Signal {0} is not open")]
    NotOpen(i64),
    #[error("Invalid entry market cap: {0}")]
    InvalidEntry(Decimal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    MaxHold,
    NoNewHigh,
}

/// Outcome of one advancement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Stopped,
    ClosedTime(ExitReason),
    TakeProfit(u8),
    Refreshed,
}

/// Trading position opened by AI consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: i64,
    pub token_address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub start_market_cap: Decimal,
    pub last_market_cap: Decimal,
    pub peak_market_cap: Decimal,
    pub status: SignalStatus,
    /// Highest take-profit tier reached, 0 to 3
    pub tp_stage: u8,
    pub opened_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    /// Raw snapshot JSON that triggered the entry
    pub decision_raw: Option<String>,
}

/// Entry request produced by AI consensus
#[derive(Debug, Clone, PartialEq)]
pub struct NewSignal {
    pub token_address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub entry_market_cap: Decimal,
    pub decision_raw: Option<String>,
    pub opened_at: i64,
}

impl NewSignal {
    pub fn new(
        token_address: String,
        entry_market_cap: Decimal,
        opened_at: i64,
    ) -> Result<Self, SignalError> {
        if entry_market_cap <= Decimal::ZERO {
            return Err(SignalError::InvalidEntry(entry_market_cap));
        }
        Ok(Self {
            token_address,
            name: None,
            symbol: None,
            entry_market_cap,
            decision_raw: None,
            opened_at,
        })
    }

    pub fn with_identity(mut self, name: Option<String>, symbol: Option<String>) -> Self {
        self.name = name;
        self.symbol = symbol;
        self
    }

    pub fn with_decision_raw(mut self, raw: String) -> Self {
        self.decision_raw = Some(raw);
        self
    }

    /// Materialise as an OPEN signal with stage 0 and peak at entry
    pub fn into_signal(self, id: i64) -> Signal {
        Signal {
            id,
            token_address: self.token_address,
            name: self.name,
            symbol: self.symbol,
            start_market_cap: self.entry_market_cap,
            last_market_cap: self.entry_market_cap,
            peak_market_cap: self.entry_market_cap,
            status: SignalStatus::Open,
            tp_stage: 0,
            opened_at: self.opened_at,
            created_at: self.opened_at,
            updated_at: self.opened_at,
            decision_raw: self.decision_raw,
        }
    }
}

impl Signal {
    /// Fractional return of `market_cap` against the entry reference
    pub fn pnl_at(&self, market_cap: Decimal) -> Decimal {
        (market_cap - self.start_market_cap)
            .checked_div(self.start_market_cap)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Advance an OPEN signal with a new market cap observation.
    ///
    /// `last_market_cap` and `updated_at` take every observation, including
    /// the one that stops, time-closes or steps the take-profit stage, so a
    /// closed signal keeps the market cap it exited at and PnL is measured
    /// against the exit rather than the previous tick.
    pub fn advance(
        &mut self,
        market_cap: Decimal,
        now: i64,
        thresholds: &SignalThresholds,
    ) -> Result<SignalEvent, SignalError> {
        if !self.is_open() {
            return Err(SignalError::NotOpen(self.id));
        }

        let pnl = self.pnl_at(market_cap);
        let elapsed_ms = now - self.opened_at;

        self.peak_market_cap = self.peak_market_cap.max(market_cap);
        self.last_market_cap = market_cap;
        self.updated_at = now;

        if pnl <= thresholds.stop_loss_pct {
            self.status = SignalStatus::Stopped;
            return Ok(SignalEvent::Stopped);
        }

        if elapsed_ms >= thresholds.max_hold_minutes * MINUTE_MS {
            self.status = SignalStatus::ClosedTime;
            return Ok(SignalEvent::ClosedTime(ExitReason::MaxHold));
        }

        if elapsed_ms >= thresholds.no_new_high_minutes * MINUTE_MS
            && market_cap < self.peak_market_cap * thresholds.no_new_high_drop_ratio
        {
            self.status = SignalStatus::ClosedTime;
            return Ok(SignalEvent::ClosedTime(ExitReason::NoNewHigh));
        }

        let tiers = [
            (3u8, thresholds.tp3_pct),
            (2u8, thresholds.tp2_pct),
            (1u8, thresholds.tp1_pct),
        ];
        for (stage, target) in tiers {
            if pnl >= target && self.tp_stage < stage {
                self.tp_stage = stage;
                return Ok(SignalEvent::TakeProfit(stage));
            }
        }

        Ok(SignalEvent::Refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn open_signal(entry: Decimal) -> Signal {
        NewSignal::new("Mint111".to_string(), entry, T0).unwrap().into_signal(1)
    }

    fn minutes(m: i64) -> i64 {
        T0 + m * MINUTE_MS
    }

    #[test]
    fn test_new_signal_starts_flat() {
        let signal = open_signal(dec!(1000000));
        assert_eq!(signal.status, SignalStatus::Open);
        assert_eq!(signal.tp_stage, 0);
        assert_eq!(signal.peak_market_cap, dec!(1000000));
        assert_eq!(signal.last_market_cap, dec!(1000000));
        assert_eq!(signal.opened_at, T0);
    }

    #[test]
    fn test_new_signal_rejects_zero_entry() {
        let result = NewSignal::new("Mint111".to_string(), Decimal::ZERO, T0);
        assert!(matches!(result, Err(SignalError::InvalidEntry(_))));
    }

    #[test]
    fn test_tp1_reached_once() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        let event = signal.advance(dec!(1200000), minutes(5), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::Refreshed);

        let event = signal.advance(dec!(1350000), minutes(10), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::TakeProfit(1));
        assert_eq!(signal.tp_stage, 1);
        assert_eq!(signal.peak_market_cap, dec!(1350000));

        let event = signal.advance(dec!(1350000), minutes(11), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::Refreshed);
        assert_eq!(signal.tp_stage, 1);
    }

    #[test]
    fn test_trailing_stall_exit_after_peak() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        signal.advance(dec!(1350000), minutes(10), &thresholds).unwrap();
        let event = signal.advance(dec!(1012500), minutes(46), &thresholds).unwrap();

        assert_eq!(event, SignalEvent::ClosedTime(ExitReason::NoNewHigh));
        assert_eq!(signal.status, SignalStatus::ClosedTime);
        assert_eq!(signal.tp_stage, 1);
        assert_eq!(signal.peak_market_cap, dec!(1350000));

        let result = signal.advance(dec!(5000000), minutes(47), &thresholds);
        assert_eq!(result, Err(SignalError::NotOpen(1)));
        assert_eq!(signal.tp_stage, 1);
    }

    #[test]
    fn test_stall_exit_waits_for_window() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        signal.advance(dec!(1350000), minutes(10), &thresholds).unwrap();
        let event = signal.advance(dec!(1012500), minutes(30), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::Refreshed);
        assert!(signal.is_open());
    }

    #[test]
    fn test_stop_loss_on_fresh_signal() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        let event = signal.advance(dec!(750000), minutes(1), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::Stopped);
        assert_eq!(signal.status, SignalStatus::Stopped);
        assert_eq!(signal.last_market_cap, dec!(750000));
    }

    #[test]
    fn test_exit_and_tp_observations_recorded() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        signal.advance(dec!(1400000), minutes(2), &thresholds).unwrap();
        assert_eq!(signal.tp_stage, 1);
        assert_eq!(signal.last_market_cap, dec!(1400000));
        assert_eq!(signal.updated_at, minutes(2));

        let event = signal.advance(dec!(1050000), minutes(90), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::ClosedTime(ExitReason::MaxHold));
        assert_eq!(signal.last_market_cap, dec!(1050000));
        assert_eq!(signal.updated_at, minutes(90));
    }

    #[test]
    fn test_stop_loss_ignores_tp_stage() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));
        signal.advance(dec!(2100000), minutes(1), &thresholds).unwrap();
        assert_eq!(signal.tp_stage, 2);

        let event = signal.advance(dec!(700000), minutes(2), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::Stopped);
        assert_eq!(signal.tp_stage, 2);
    }

    #[test]
    fn test_stop_loss_wins_over_time_exit() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        let event = signal.advance(dec!(600000), minutes(120), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::Stopped);
    }

    #[test]
    fn test_max_hold_exit() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        let event = signal.advance(dec!(1100000), minutes(90), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::ClosedTime(ExitReason::MaxHold));
    }

    #[test]
    fn test_jump_straight_to_tp3() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        let event = signal.advance(dec!(3500000), minutes(3), &thresholds).unwrap();
        assert_eq!(event, SignalEvent::TakeProfit(3));
        assert_eq!(signal.tp_stage, 3);
        assert!(signal.is_open());
    }

    #[test]
    fn test_thresholds_read_per_call() {
        let mut tight = SignalThresholds::default();
        tight.tp1_pct = dec!(0.1);
        let mut signal = open_signal(dec!(1000000));

        let event = signal.advance(dec!(1150000), minutes(1), &tight).unwrap();
        assert_eq!(event, SignalEvent::TakeProfit(1));
    }

    #[test]
    fn test_peak_never_decreases() {
        let thresholds = SignalThresholds::default();
        let mut signal = open_signal(dec!(1000000));

        signal.advance(dec!(1200000), minutes(1), &thresholds).unwrap();
        signal.advance(dec!(1100000), minutes(2), &thresholds).unwrap();
        assert_eq!(signal.peak_market_cap, dec!(1200000));
        assert_eq!(signal.last_market_cap, dec!(1100000));
    }

    #[test]
    fn test_status_codes() {
        for status in [SignalStatus::Open, SignalStatus::ClosedTime, SignalStatus::Stopped] {
            assert_eq!(SignalStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(SignalStatus::from_code(2), None);
    }
}
