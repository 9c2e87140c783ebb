//! Minute bars and session resampling

use std::collections::BTreeMap;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::TradingWindow;

/// OHLCV bar at minute granularity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Intraday VWAP up to and including this bar
    pub average: f64,
    /// Per-bar VWAP, when the feed provides one
    #[serde(default)]
    pub vwap: Option<f64>,
}

impl Bar {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Timestamps must be strictly increasing within one symbol's series
pub fn is_strictly_increasing(bars: &[Bar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

/// Coarse OHLCV frame: parallel columns sharing one index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResampledSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl ResampledSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn push(&mut self, timestamp: DateTime<Utc>, bucket: &Bucket) -> bool {
        let (Some(open), Some(high), Some(low), Some(close)) =
            (bucket.open, bucket.high, bucket.low, bucket.close)
        else {
            return false;
        };
        // Zero-volume buckets carry no information for VWAP
        if bucket.volume == 0.0 {
            return false;
        }
        self.timestamps.push(timestamp);
        self.open.push(open);
        self.high.push(high);
        self.low.push(low);
        self.close.push(close);
        self.volume.push(bucket.volume);
        true
    }
}

/// Per-column accumulator; each column skips its own missing values
#[derive(Debug, Default)]
struct Bucket {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: f64,
}

impl Bucket {
    fn add_bar(&mut self, bar: &Bar) {
        if bar.open.is_finite() && self.open.is_none() {
            self.open = Some(bar.open);
        }
        if bar.high.is_finite() {
            self.high = Some(self.high.map_or(bar.high, |h| h.max(bar.high)));
        }
        if bar.low.is_finite() {
            self.low = Some(self.low.map_or(bar.low, |l| l.min(bar.low)));
        }
        if bar.close.is_finite() {
            self.close = Some(bar.close);
        }
        if bar.volume.is_finite() {
            self.volume += bar.volume;
        }
    }
}

/// Aggregates minute bars into fixed-width buckets inside the session window.
///
/// Buckets are labelled by the timestamp floored to `width` (epoch aligned).
/// Bars before `lower_bound` (floored to the minute) are ignored, as are bars
/// outside `session`. Buckets with zero volume or any undefined column are
/// dropped, so all columns of the result share one index.
pub fn resample_session(
    bars: &[Bar],
    lower_bound: Option<DateTime<Utc>>,
    session: &TradingWindow,
    width: TimeDelta,
) -> ResampledSeries {
    let lower_bound = lower_bound.and_then(|lb| lb.duration_trunc(TimeDelta::minutes(1)).ok());
    let mut buckets: BTreeMap<DateTime<Utc>, Bucket> = BTreeMap::new();

    for bar in bars {
        if lower_bound.is_some_and(|lb| bar.timestamp < lb) {
            continue;
        }
        if !session.contains_inclusive(bar.timestamp) {
            continue;
        }
        let Ok(label) = bar.timestamp.duration_trunc(width) else {
            continue;
        };
        buckets.entry(label).or_default().add_bar(bar);
    }

    let mut series = ResampledSeries::default();
    for (label, bucket) in &buckets {
        series.push(*label, bucket);
    }
    series
}
