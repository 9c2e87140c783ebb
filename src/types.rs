use serde::{Deserialize, Serialize};

use crate::execution::OrderIntent;

pub use crate::trading_core::bars::{Bar, ResampledSeries};

/// Why an exit fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "stopped")]
    Stopped,
    #[serde(rename = "above target")]
    AboveTarget,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Stopped => write!(f, "stopped"),
            ExitReason::AboveTarget => write!(f, "above target"),
        }
    }
}

/// Trailing indicator values at entry, for telemetry only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyIndicatorSnapshot {
    pub vwap_series: Vec<f64>,
    pub a_vwap_series: Vec<f64>,
    #[serde(rename = "5-min-close")]
    pub close_5min: Vec<f64>,
    /// Feed-provided per-bar VWAP of the latest bar
    pub vwap: Option<f64>,
    /// Running average of the latest bar
    pub avg: f64,
    /// Raw minute volumes
    pub volume: Vec<f64>,
}

/// Indicator values at exit, for telemetry only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellIndicatorSnapshot {
    pub vwap: Option<f64>,
    pub avg: f64,
    pub reasons: Vec<ExitReason>,
}

/// Outcome of one strategy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    NoSignal,
    Buy {
        order: OrderIntent,
        indicators: BuyIndicatorSnapshot,
    },
    Sell {
        order: OrderIntent,
        indicators: SellIndicatorSnapshot,
    },
}

impl Decision {
    pub fn is_signal(&self) -> bool {
        !matches!(self, Decision::NoSignal)
    }

    pub fn order(&self) -> Option<&OrderIntent> {
        match self {
            Decision::NoSignal => None,
            Decision::Buy { order, .. } | Decision::Sell { order, .. } => Some(order),
        }
    }
}
