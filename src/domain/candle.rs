//! Candle Builder - Folds market snapshots into OHLCV buckets
//!
//! Buckets are floor-aligned on the timeframe width in epoch milliseconds.
//! Open is the first price seen in the bucket, high/low are running extrema,
//! close is the last price and volume is the sum of snapshot volumes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::market::MarketSnapshot;

const MINUTE_MS: i64 = 60_000;

/// Candle resolutions produced by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::M15, Timeframe::H1, Timeframe::H4];

    /// Bucket width in milliseconds
    pub fn width_ms(&self) -> i64 {
        match self {
            Timeframe::M15 => 15 * MINUTE_MS,
            Timeframe::H1 => 60 * MINUTE_MS,
            Timeframe::H4 => 240 * MINUTE_MS,
        }
    }

    /// Floor-aligned bucket start for a timestamp
    pub fn bucket_start(&self, timestamp_ms: i64) -> i64 {
        timestamp_ms.div_euclid(self.width_ms()) * self.width_ms()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

/// OHLCV bucket keyed by (token, timeframe, bucket start)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start, epoch milliseconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { timestamp, open, high, low, close, volume }
    }
}

/// Accumulates snapshot prices for one timeframe and emits a candle per bucket
#[derive(Debug)]
pub struct CandleBuilder {
    timeframe: Timeframe,
    current: Option<Candle>,
    completed: Vec<Candle>,
}

impl CandleBuilder {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            current: None,
            completed: Vec::new(),
        }
    }

    /// Fold one observation. Observations must arrive in ascending time order.
    pub fn update(&mut self, timestamp_ms: i64, price: f64, volume: f64) {
        let bucket = self.timeframe.bucket_start(timestamp_ms);

        match self.current.as_mut() {
            Some(candle) if candle.timestamp == bucket => {
                candle.high = candle.high.max(price);
                candle.low = candle.low.min(price);
                candle.close = price;
                candle.volume += volume;
            }
            _ => {
                if let Some(done) = self.current.take() {
                    self.completed.push(done);
                }
                self.current = Some(Candle::new(bucket, price, price, price, price, volume));
            }
        }
    }

    /// Close the open bucket and return every candle built so far
    pub fn finish(mut self) -> Vec<Candle> {
        if let Some(done) = self.current.take() {
            self.completed.push(done);
        }
        self.completed
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn is_building(&self) -> bool {
        self.current.is_some()
    }
}

/// Aggregate snapshots into candles for a timeframe.
///
/// Snapshots without a price are ignored; a missing volume counts as zero.
/// Input does not need to be sorted.
pub fn aggregate(snapshots: &[MarketSnapshot], timeframe: Timeframe) -> Vec<Candle> {
    let mut priced: Vec<&MarketSnapshot> = snapshots.iter().filter(|s| s.price.is_some()).collect();
    priced.sort_by_key(|s| s.timestamp);

    let mut builder = CandleBuilder::new(timeframe);
    for snap in priced {
        if let Some(price) = snap.price {
            builder.update(snap.timestamp, price, snap.volume_24h.unwrap_or(0.0));
        }
    }
    builder.finish()
}
