//! Indicator calculations over immutable series
//!
//! All functions are pure. Undefined values are `NaN`, so any comparison
//! against them is false and callers need no special casing for warm-up.

use chrono::{DateTime, Utc};

use super::bars::{Bar, ResampledSeries};
use crate::error::ResampleError;
use crate::execution::MacdParams;

/// Round to a fixed number of decimal digits
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

pub fn round_series(values: &[f64], decimals: i32) -> Vec<f64> {
    values.iter().map(|v| round_to(*v, decimals)).collect()
}

/// Last `n` values (or all of them if shorter)
pub fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Cumulative VWAP from `(typical_price, volume)` pairs.
///
/// A point with zero cumulative volume is `NaN`.
fn cumulative_vwap(points: impl Iterator<Item = (f64, f64)>) -> Vec<f64> {
    let mut sum_pv = 0.0;
    let mut sum_v = 0.0;
    points
        .map(|(price, volume)| {
            sum_pv += price * volume;
            sum_v += volume;
            if sum_v == 0.0 {
                f64::NAN
            } else {
                sum_pv / sum_v
            }
        })
        .collect()
}

/// Session VWAP over the resampled frame, one value per bucket.
pub fn session_vwap(series: &ResampledSeries) -> Result<Vec<f64>, ResampleError> {
    if series.is_empty() {
        return Err(ResampleError::EmptySession);
    }

    let total_volume: f64 = series.volume.iter().sum();
    if total_volume == 0.0 || !total_volume.is_finite() {
        return Err(ResampleError::ZeroVolume);
    }

    let points = (0..series.len()).map(|i| {
        let typical = (series.high[i] + series.low[i] + series.close[i]) / 3.0;
        (typical, series.volume[i])
    });
    Ok(cumulative_vwap(points))
}

/// VWAP anchored at `anchor`: one value per bar at or after the anchor.
pub fn anchored_vwap(bars: &[Bar], anchor: DateTime<Utc>) -> Vec<f64> {
    let points = bars
        .iter()
        .filter(|b| b.timestamp >= anchor)
        .map(|b| (b.typical_price(), b.volume));
    cumulative_vwap(points)
}

/// Exponential moving average seeded with the simple average of the first
/// `period` defined values.
///
/// Leading `NaN`s in the input are skipped; output before the seed is `NaN`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let Some(start) = values.iter().position(|v| v.is_finite()) else {
        return vec![f64::NAN; values.len()];
    };
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    ema_seeded_at(values, period, start + period - 1)
}

/// EMA whose first value sits at `seed_idx`, seeded with the mean of the
/// `period` values ending there.
fn ema_seeded_at(values: &[f64], period: usize, seed_idx: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || seed_idx >= n || seed_idx + 1 < period {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = values[seed_idx + 1 - period..=seed_idx].iter().sum::<f64>() / period as f64;
    result[seed_idx] = prev;

    for i in seed_idx + 1..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }

    result
}

/// MACD line, signal line and histogram, rounded to 3 decimals.
///
/// TA-Lib alignment: both EMAs start at the slow period's first index, the
/// fast one seeded from its own trailing window, and all three series stay
/// `NaN` until the signal line is defined.
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    /// Buckets needed before the signal line and histogram are defined
    pub fn warmup(params: &MacdParams) -> usize {
        params.slow + params.signal - 1
    }
}

pub fn macd(close: &[f64], params: &MacdParams) -> Macd {
    let n = close.len();
    let Some(start) = close.iter().position(|v| v.is_finite()) else {
        return Macd { macd: vec![f64::NAN; n], signal: vec![f64::NAN; n], histogram: vec![f64::NAN; n] };
    };
    let seed_idx = start + params.slow.max(params.fast).max(1) - 1;

    let fast = ema_seeded_at(close, params.fast, seed_idx);
    let slow = ema_seeded_at(close, params.slow, seed_idx);

    let mut line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&line, params.signal);
    for (m, s) in line.iter_mut().zip(&signal) {
        if s.is_nan() {
            *m = f64::NAN;
        }
    }
    let histogram: Vec<f64> = line.iter().zip(&signal).map(|(m, s)| m - s).collect();

    Macd {
        macd: round_series(&line, 3),
        signal: round_series(&signal, 3),
        histogram: round_series(&histogram, 3),
    }
}

/// Least-squares slope of `values` against their index.
///
/// `None` for fewer than two points or any undefined value.
pub fn trend_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 || values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }

    Some(cov / var)
}

/// Slope over the trailing `window` points
pub fn trailing_slope(values: &[f64], window: usize) -> Option<f64> {
    trend_slope(tail(values, window))
}
