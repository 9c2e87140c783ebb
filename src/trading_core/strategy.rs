//! Short-trap strategy entry point
//!
//! One call per symbol per new minute bar:
//! 1. Update the sticky above-VWAP flag
//! 2. In the buy window and flat: resample to 5 minutes, compute VWAP/MACD,
//!    advance the trap state and enter on confirmation
//! 3. In the sell window with our own position: check the bracket
//!
//! Calls for one symbol must be serialised by the caller; the state record
//! is mutated without locking.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use super::bars::{resample_session, Bar};
use super::indicators::{macd, round_series, session_vwap};
use super::signals::{EntrySetup, SignalGenerator};
use super::state::SymbolState;
use super::trap::{TrapDetector, TrapInputs, TrapTransition};
use crate::error::StrategyError;
use crate::execution::{AccountClient, StrategyConfig};
use crate::types::Decision;

/// Platform-side facts about the symbol at evaluation time
#[derive(Debug, Clone, Copy)]
pub struct SymbolContext<'a> {
    pub symbol: &'a str,
    pub shortable: bool,
    /// Signed share count; 0 when flat
    pub position: i64,
    pub has_open_order: bool,
    /// Name of the strategy that opened the current position
    pub opened_by: Option<&'a str>,
    pub now: DateTime<Utc>,
    /// Lower bound for the session frame
    pub session_open: DateTime<Utc>,
    /// When absent, fetched from the account client
    pub portfolio_value: Option<f64>,
}

pub struct ShortTrapStrategy {
    config: StrategyConfig,
    detector: TrapDetector,
    signals: SignalGenerator,
}

impl ShortTrapStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        let detector = TrapDetector::new(&config);
        let signals = SignalGenerator::new(&config);
        Self { config, detector, signals }
    }

    /// Replace the signal generator (e.g. with a custom retry policy)
    pub fn with_signals(mut self, signals: SignalGenerator) -> Self {
        self.signals = signals;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Evaluate the latest bar of `history` for one symbol
    pub async fn run(
        &self,
        state: &mut SymbolState,
        ctx: &SymbolContext<'_>,
        history: &[Bar],
        account: Option<&dyn AccountClient>,
    ) -> Result<Decision, StrategyError> {
        if !ctx.shortable {
            return Ok(Decision::NoSignal);
        }
        let Some(latest) = history.last() else {
            return Ok(Decision::NoSignal);
        };

        state.observe_bar(latest);

        if self.config.is_buy_time(ctx.now)
            && ctx.position == 0
            && !ctx.has_open_order
            && state.was_above_vwap()
        {
            if let Some(decision) = self.evaluate_entry(state, ctx, history, account).await? {
                return Ok(decision);
            }
        }

        if self.config.is_sell_time(ctx.now)
            && ctx.position != 0
            && ctx.opened_by == Some(self.name())
            && !ctx.has_open_order
        {
            return Ok(self.signals.exit(state, ctx.symbol, ctx.position, latest, ctx.now));
        }

        Ok(Decision::NoSignal)
    }

    /// `Ok(None)` lets the caller fall through to the exit checks
    async fn evaluate_entry(
        &self,
        state: &mut SymbolState,
        ctx: &SymbolContext<'_>,
        history: &[Bar],
        account: Option<&dyn AccountClient>,
    ) -> Result<Option<Decision>, StrategyError> {
        let width = TimeDelta::minutes(self.config.bucket_minutes);
        let session = &self.config.session;

        let frame = resample_session(history, Some(ctx.session_open), session, width);
        let vwap = match session_vwap(&frame) {
            Ok(vwap) => round_series(&vwap, 3),
            Err(e) => {
                warn!("[{}][{}@{}] session vwap failed: {}", self.name(), ctx.symbol, ctx.now, e);
                return Ok(Some(Decision::NoSignal));
            }
        };
        let closes = round_series(&frame.close, 3);

        // MACD gets the whole history for warm-up, not just today's session
        let macd_frame = resample_session(history, None, session, width);
        let macd = macd(&macd_frame.close, &self.config.macd);

        let inputs = TrapInputs {
            frame: &frame,
            closes: &closes,
            vwap: &vwap,
            macd: &macd,
            minute_bars: history,
            now: ctx.now,
        };

        match self.detector.evaluate(state, &inputs) {
            TrapTransition::None => Ok(None),
            TrapTransition::CandidateDetected { started_at, price } => {
                info!(
                    "[{}][{}@{}] CANDIDATE short-trap @ {:.2}",
                    self.name(),
                    ctx.symbol,
                    started_at,
                    price
                );
                Ok(Some(Decision::NoSignal))
            }
            TrapTransition::Pending { reason } => {
                debug!("[{}][{}@{}] trap pending: {}", self.name(), ctx.symbol, ctx.now, reason);
                Ok(None)
            }
            TrapTransition::Confirmed { anchored_vwap } => {
                info!(
                    "[{}][{}@{}] CONFIRMED crossed above anchored-vwap @ {:.2}",
                    self.name(),
                    ctx.symbol,
                    ctx.now,
                    history.last().map_or(f64::NAN, |b| b.close)
                );
                let setup = EntrySetup {
                    symbol: ctx.symbol,
                    now: ctx.now,
                    minute_bars: history,
                    vwap: &vwap,
                    anchored_vwap: &anchored_vwap,
                    closes_5min: &closes,
                };
                let decision = self.signals.enter(state, &setup, ctx.portfolio_value, account).await?;
                Ok(Some(decision))
            }
        }
    }
}
