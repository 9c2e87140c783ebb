//! Configuration for the short-trap strategy

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

/// Time-of-day window in Eastern Time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingWindow {
    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: u32,
    pub end_minute: u32,
}

impl TradingWindow {
    pub const fn new(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> Self {
        Self { start_hour, start_minute, end_hour, end_minute }
    }

    /// Regular trading hours, 9:30am-4pm ET
    pub const fn regular_session() -> Self {
        Self::new(9, 30, 16, 0)
    }

    fn start_secs(&self) -> u32 {
        (self.start_hour * 60 + self.start_minute) * 60
    }

    fn end_secs(&self) -> u32 {
        (self.end_hour * 60 + self.end_minute) * 60
    }

    /// Seconds since ET midnight, plus whether there is a sub-second part
    fn et_seconds(ts: DateTime<Utc>) -> (u32, bool) {
        let et = ts.with_timezone(&New_York);
        (et.num_seconds_from_midnight(), et.nanosecond() > 0)
    }

    /// Check if within trading hours (start inclusive, end exclusive)
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let (secs, _) = Self::et_seconds(ts);
        secs >= self.start_secs() && secs < self.end_secs()
    }

    /// Check if within the window with both ends inclusive.
    ///
    /// Used for session filtering, where a bar stamped exactly at the close
    /// still belongs to the session.
    pub fn contains_inclusive(&self, ts: DateTime<Utc>) -> bool {
        let (secs, fractional) = Self::et_seconds(ts);
        let end = self.end_secs();
        secs >= self.start_secs() && (secs < end || (secs == end && !fractional))
    }
}

impl std::fmt::Display for TradingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02} ET",
            self.start_hour, self.start_minute, self.end_hour, self.end_minute
        )
    }
}

/// MACD periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self { fast: 12, slow: 26, signal: 9 }
    }
}

/// Configuration for the short-trap strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Strategy name; positions opened under another name are never sold here
    pub name: String,

    /// Session window used for resampling
    pub session: TradingWindow,

    /// Window in which new entries may be signalled
    pub buy_window: TradingWindow,

    /// Window in which exits may be signalled
    pub sell_window: TradingWindow,

    /// Resampling bucket width in minutes
    pub bucket_minutes: i64,

    pub macd: MacdParams,

    /// Consecutive 5-minute bars that must close bearish below VWAP
    pub bearish_lookback: usize,

    /// Trailing window for the trend slope comparison
    pub trend_window: usize,

    /// Minimum anchored VWAP points before confirmation is considered
    pub min_anchored_points: usize,

    /// Stop = VWAP * stop_factor
    pub stop_factor: f64,

    /// Target = stop * target_factor
    pub target_factor: f64,

    /// Fraction of portfolio value risked per entry
    pub risk_fraction: f64,

    /// Attempts at fetching portfolio value before abstaining
    pub account_retries: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "short_trap_buster".to_string(),
            session: TradingWindow::regular_session(),
            buy_window: TradingWindow::new(9, 45, 15, 30),
            sell_window: TradingWindow::regular_session(),
            bucket_minutes: 5,
            macd: MacdParams::default(),
            bearish_lookback: 3,
            trend_window: 10,
            min_anchored_points: 11,
            stop_factor: 0.98,
            target_factor: 1.10,
            risk_fraction: 0.02,
            account_retries: 3,
        }
    }
}

impl StrategyConfig {
    pub fn is_buy_time(&self, now: DateTime<Utc>) -> bool {
        self.buy_window.contains(now)
    }

    pub fn is_sell_time(&self, now: DateTime<Utc>) -> bool {
        self.sell_window.contains(now)
    }
}
