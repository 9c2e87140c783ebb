//! Short-trap detection
//!
//! A stock that traded above VWAP earlier in the session flushes below it
//! (three bearish 5-minute closes under VWAP with MACD rolling over below
//! zero). That flush is a *candidate*. It is *confirmed* once minute closes
//! reclaim the VWAP anchored at the flush and price is rising faster than
//! that anchored VWAP, i.e. the shorts are trapped.
//!
//! Candidates have no expiry; they stay pending until confirmed or until
//! the caller resets the symbol's state.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::bars::{Bar, ResampledSeries};
use super::indicators::{anchored_vwap, tail, trailing_slope, Macd};
use super::state::SymbolState;
use crate::execution::StrategyConfig;

/// Indicator view of the latest bar, as consumed by the detector
#[derive(Debug, Clone, Copy)]
pub struct TrapInputs<'a> {
    /// 5-minute session frame
    pub frame: &'a ResampledSeries,
    /// Frame closes, rounded to 3 decimals
    pub closes: &'a [f64],
    /// Session VWAP per frame bucket, rounded to 3 decimals
    pub vwap: &'a [f64],
    /// MACD on 5-minute closes
    pub macd: &'a Macd,
    /// Raw minute history, latest bar last
    pub minute_bars: &'a [Bar],
    /// Evaluation time; may trail the latest bar's stamp
    pub now: DateTime<Utc>,
}

/// State transition events
#[derive(Debug, Clone, PartialEq)]
pub enum TrapTransition {
    /// Nothing pending and no new candidate
    None,
    /// Flush recognised; candidate anchored at `started_at`
    CandidateDetected { started_at: DateTime<Utc>, price: f64 },
    /// Candidate still waiting for confirmation
    Pending { reason: String },
    /// Confirmed reversal; carries the anchored VWAP used to confirm it
    Confirmed { anchored_vwap: Vec<f64> },
}

/// Result of checking a pending candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    NotEnoughPoints { have: usize, need: usize },
    BelowAnchor,
    SlopeTooFlat { price_slope: Option<f64>, anchor_slope: Option<f64> },
    Confirmed { anchored_vwap: Vec<f64> },
}

#[derive(Debug, Clone)]
pub struct TrapDetector {
    lookback: usize,
    trend_window: usize,
    min_anchored_points: usize,
}

impl TrapDetector {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            lookback: config.bearish_lookback,
            trend_window: config.trend_window,
            min_anchored_points: config.min_anchored_points,
        }
    }

    /// Advance the symbol's trap state for the latest bar
    pub fn evaluate(&self, state: &mut SymbolState, inputs: &TrapInputs<'_>) -> TrapTransition {
        if let Some(anchor) = state.trap_start_time() {
            return match self.check_confirmation(inputs.minute_bars, anchor) {
                Confirmation::Confirmed { anchored_vwap } => TrapTransition::Confirmed { anchored_vwap },
                Confirmation::NotEnoughPoints { have, need } => TrapTransition::Pending {
                    reason: format!("{} anchored points, need {}", have, need),
                },
                Confirmation::BelowAnchor => TrapTransition::Pending {
                    reason: "price below anchored vwap".to_string(),
                },
                Confirmation::SlopeTooFlat { price_slope, anchor_slope } => TrapTransition::Pending {
                    reason: format!(
                        "anchored-vwap slope {:?} not below price slope {:?}",
                        anchor_slope, price_slope
                    ),
                },
            };
        }

        if !self.is_candidate(inputs) {
            return TrapTransition::None;
        }

        // Anchor is the flush bar stamp, not the evaluation time
        let Some(latest) = inputs.minute_bars.last() else {
            return TrapTransition::None;
        };
        if state.begin_candidate(latest.timestamp) {
            TrapTransition::CandidateDetected { started_at: latest.timestamp, price: latest.close }
        } else {
            TrapTransition::None
        }
    }

    /// All candidate conditions, evaluated on the latest bars
    pub fn is_candidate(&self, inputs: &TrapInputs<'_>) -> bool {
        let n = self.lookback;
        if n == 0
            || inputs.frame.len() < n
            || inputs.closes.len() != inputs.frame.len()
            || inputs.vwap.len() != inputs.frame.len()
            || inputs.macd.histogram.len() < n
            || inputs.minute_bars.len() < n
        {
            return false;
        }

        // Bearish 5-minute closes below VWAP
        let closes = tail(inputs.closes, n);
        let opens = tail(&inputs.frame.open, n);
        let vwap = tail(inputs.vwap, n);
        let flushed = (0..n).all(|i| closes[i] < vwap[i] && closes[i] < opens[i]);
        if !flushed {
            return false;
        }

        // MACD below its signal, both negative, histogram falling
        let (Some(&m), Some(&s)) = (inputs.macd.macd.last(), inputs.macd.signal.last()) else {
            return false;
        };
        if !(m < s && s < 0.0) {
            return false;
        }
        let hist = tail(&inputs.macd.histogram, n);
        let hist_falling = hist.windows(2).all(|w| w[1] < w[0]) && hist.iter().all(|h| *h < 0.0);
        if !hist_falling {
            debug!("histogram not falling: {:?}", hist);
            return false;
        }

        // Latest minute bar is red and closes keep stepping down
        let minutes = &inputs.minute_bars[inputs.minute_bars.len() - n..];
        let Some(latest) = minutes.last() else {
            return false;
        };
        latest.is_bearish() && minutes.windows(2).all(|w| w[1].close < w[0].close)
    }

    /// Check whether a pending candidate anchored at `anchor` has reversed
    pub fn check_confirmation(&self, bars: &[Bar], anchor: DateTime<Utc>) -> Confirmation {
        let a_vwap = anchored_vwap(bars, anchor);
        if a_vwap.len() < self.min_anchored_points {
            return Confirmation::NotEnoughPoints {
                have: a_vwap.len(),
                need: self.min_anchored_points,
            };
        }

        // a_vwap is aligned to the tail of `bars`
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let reclaimed = tail(&closes, 2)
            .iter()
            .zip(tail(&a_vwap, 2))
            .all(|(c, a)| c > a);
        if !reclaimed {
            return Confirmation::BelowAnchor;
        }

        let price_slope = trailing_slope(&closes, self.trend_window);
        let anchor_slope = trailing_slope(&a_vwap, self.trend_window);
        match (price_slope, anchor_slope) {
            (Some(p), Some(a)) if p > a => Confirmation::Confirmed { anchored_vwap: a_vwap },
            _ => Confirmation::SlopeTooFlat { price_slope, anchor_slope },
        }
    }
}
