//! 15m volume anomaly

use statrs::statistics::Statistics;

use crate::domain::candle::Candle;
use crate::domain::indicators::{round_to, VolumeAnomaly};

pub const VOLUME_LOOKBACK: usize = 20;

/// Window of recent candles the stage hands in
pub const VOLUME_WINDOW: usize = 25;

const ANOMALY_RATIO: f64 = 2.0;

/// Latest candle volume against the average of the twenty before it.
///
/// `None` with fewer than 21 candles. A zero trailing average yields a
/// ratio of 0 and no anomaly.
pub fn volume_anomaly(candles: &[Candle]) -> Option<VolumeAnomaly> {
    if candles.len() < VOLUME_LOOKBACK + 1 {
        return None;
    }

    let (history, latest) = candles.split_at(candles.len() - 1);
    let trailing = &history[history.len() - VOLUME_LOOKBACK..];
    let average = trailing.iter().map(|c| c.volume).mean();

    if average.is_nan() || average <= 0.0 {
        return Some(VolumeAnomaly { volume_ratio: 0.0, anomaly: false });
    }

    let ratio = latest[0].volume / average;
    Some(VolumeAnomaly {
        volume_ratio: round_to(ratio, 2),
        anomaly: ratio >= ANOMALY_RATIO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn with_volumes(volumes: &[f64]) -> Vec<Candle> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, v)| Candle::new(i as i64, 1.0, 1.0, 1.0, 1.0, *v))
            .collect()
    }

    #[test]
    fn test_requires_21_candles() {
        assert!(volume_anomaly(&with_volumes(&[10.0; 20])).is_none());
    }

    #[test]
    fn test_spike_is_anomalous() {
        let mut volumes = vec![999.0; 4];
        volumes.extend([100.0; 20]);
        volumes.push(250.0);

        let anomaly = volume_anomaly(&with_volumes(&volumes)).unwrap();
        assert_relative_eq!(anomaly.volume_ratio, 2.5);
        assert!(anomaly.anomaly);
    }

    #[test]
    fn test_normal_volume() {
        let mut volumes = vec![100.0; 20];
        volumes.push(150.0);

        let anomaly = volume_anomaly(&with_volumes(&volumes)).unwrap();
        assert_relative_eq!(anomaly.volume_ratio, 1.5);
        assert!(!anomaly.anomaly);
    }

    #[test]
    fn test_zero_average() {
        let mut volumes = vec![0.0; 20];
        volumes.push(50.0);

        let anomaly = volume_anomaly(&with_volumes(&volumes)).unwrap();
        assert_eq!(anomaly.volume_ratio, 0.0);
        assert!(!anomaly.anomaly);
    }
}
