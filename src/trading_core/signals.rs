//! Entry sizing, bracket levels and exit checks

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::bars::Bar;
use super::indicators::{round_to, tail};
use super::state::{Bracket, SymbolState};
use crate::error::{RetryError, StrategyError};
use crate::execution::{AccountClient, OrderIntent, RetryPolicy, StrategyConfig};
use crate::types::{BuyIndicatorSnapshot, Decision, ExitReason, SellIndicatorSnapshot};

/// Points kept in each snapshot series
const SNAPSHOT_LEN: usize = 5;

/// Everything known about a confirmed trap at entry time
#[derive(Debug, Clone, Copy)]
pub struct EntrySetup<'a> {
    pub symbol: &'a str,
    pub now: DateTime<Utc>,
    pub minute_bars: &'a [Bar],
    /// Session VWAP per 5-minute bucket (rounded)
    pub vwap: &'a [f64],
    pub anchored_vwap: &'a [f64],
    /// 5-minute closes (rounded)
    pub closes_5min: &'a [f64],
}

#[derive(Debug, Clone)]
pub struct SignalGenerator {
    name: String,
    stop_factor: f64,
    target_factor: f64,
    risk_fraction: f64,
    retry: RetryPolicy,
}

impl SignalGenerator {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            name: config.name.clone(),
            stop_factor: config.stop_factor,
            target_factor: config.target_factor,
            risk_fraction: config.risk_fraction,
            retry: RetryPolicy::new(config.account_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stop below VWAP, target above the stop; both rounded to cents
    pub fn bracket_for(&self, vwap: f64) -> Bracket {
        let stop = vwap * self.stop_factor;
        Bracket {
            stop_price: round_to(stop, 2),
            target_price: round_to(stop * self.target_factor, 2),
        }
    }

    /// Shares to buy: a fixed fraction of the portfolio, at least one
    pub fn position_size(&self, portfolio_value: f64, price: f64) -> u64 {
        let shares = (portfolio_value * self.risk_fraction / price).floor();
        if shares.is_finite() && shares >= 1.0 {
            shares as u64
        } else {
            1
        }
    }

    /// Supplied value wins; otherwise ask the account with bounded retries.
    ///
    /// `Ok(None)` means the value could not be obtained and the caller
    /// should abstain.
    pub async fn resolve_portfolio_value(
        &self,
        supplied: Option<f64>,
        account: Option<&dyn AccountClient>,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<f64>, StrategyError> {
        if let Some(value) = supplied {
            return Ok(Some(value));
        }
        let Some(account) = account else {
            return Err(StrategyError::MissingPortfolioSource { strategy: self.name.clone() });
        };

        match self.retry.run(|| account.portfolio_value()).await {
            Ok(value) if value.is_finite() && value > 0.0 => Ok(Some(value)),
            Ok(value) => {
                warn!("[{}][{}@{}] unusable portfolio value {}", self.name, symbol, now, value);
                Ok(None)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(
                    "[{}][{}@{}] failed to get portfolio value after {} attempts: {}",
                    self.name, symbol, now, attempts, last
                );
                Ok(None)
            }
            Err(RetryError::Fatal(e)) => Err(StrategyError::Account(e)),
        }
    }

    /// Size and emit a limit buy for a confirmed trap.
    ///
    /// The bracket is stored and the trap cleared only when an order is
    /// actually emitted.
    pub async fn enter(
        &self,
        state: &mut SymbolState,
        setup: &EntrySetup<'_>,
        portfolio_value: Option<f64>,
        account: Option<&dyn AccountClient>,
    ) -> Result<Decision, StrategyError> {
        let (Some(latest), Some(&vwap)) = (setup.minute_bars.last(), setup.vwap.last()) else {
            return Ok(Decision::NoSignal);
        };
        if !(vwap.is_finite() && vwap > 0.0) {
            warn!("[{}][{}@{}] no usable vwap for bracket", self.name, setup.symbol, setup.now);
            return Ok(Decision::NoSignal);
        }

        let bracket = self.bracket_for(vwap);

        let Some(portfolio_value) = self
            .resolve_portfolio_value(portfolio_value, account, setup.symbol, setup.now)
            .await?
        else {
            return Ok(Decision::NoSignal);
        };

        let quantity = self.position_size(portfolio_value, latest.close);
        let buy_price = latest.close;

        state.set_bracket(bracket);
        state.clear_trap();

        info!(
            "[{}][{}] BUY {} x {} @ {:.2} | Stop: {:.2} | Target: {:.2}",
            self.name, setup.now, quantity, setup.symbol, buy_price, bracket.stop_price, bracket.target_price
        );

        let volumes: Vec<f64> = setup.minute_bars.iter().map(|b| b.volume).collect();
        let indicators = BuyIndicatorSnapshot {
            vwap_series: tail(setup.vwap, SNAPSHOT_LEN).to_vec(),
            a_vwap_series: tail(setup.anchored_vwap, SNAPSHOT_LEN).to_vec(),
            close_5min: tail(setup.closes_5min, SNAPSHOT_LEN).to_vec(),
            vwap: latest.vwap,
            avg: latest.average,
            volume: tail(&volumes, SNAPSHOT_LEN).to_vec(),
        };

        Ok(Decision::Buy {
            order: OrderIntent::limit_buy(setup.symbol, quantity, buy_price, setup.now),
            indicators,
        })
    }

    /// Stop is checked before target
    pub fn exit_reason(&self, bracket: &Bracket, close: f64) -> Option<ExitReason> {
        if close <= bracket.stop_price {
            Some(ExitReason::Stopped)
        } else if close >= bracket.target_price {
            Some(ExitReason::AboveTarget)
        } else {
            None
        }
    }

    /// Full-position market sell when the bracket is hit
    pub fn exit(
        &self,
        state: &SymbolState,
        symbol: &str,
        position: i64,
        latest: &Bar,
        now: DateTime<Utc>,
    ) -> Decision {
        let Some(bracket) = state.bracket() else {
            debug!("[{}][{}@{}] open position without a bracket", self.name, symbol, now);
            return Decision::NoSignal;
        };
        let Some(reason) = self.exit_reason(&bracket, latest.close) else {
            return Decision::NoSignal;
        };

        let quantity = position.unsigned_abs();
        info!(
            "[{}][{}] SELL {} x {} at market | close {:.2} | reason: {}",
            self.name, now, quantity, symbol, latest.close, reason
        );

        Decision::Sell {
            order: OrderIntent::market_sell(symbol, quantity, now),
            indicators: SellIndicatorSnapshot {
                vwap: latest.vwap,
                avg: latest.average,
                reasons: vec![reason],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccountError;
    use crate::execution::account::tests::FlakyAccount;
    use crate::execution::{OrderSide, OrderType};
    use crate::trading_core::bars::tests::{bar, et};

    fn generator() -> SignalGenerator {
        SignalGenerator::new(&StrategyConfig::default())
    }

    #[test]
    fn test_bracket_levels() {
        let bracket = generator().bracket_for(10.0);
        assert_eq!(bracket.stop_price, 9.8);
        assert_eq!(bracket.target_price, 10.78);
        assert!(bracket.target_price > bracket.stop_price && bracket.stop_price > 0.0);

        let bracket = generator().bracket_for(123.457);
        assert_eq!(bracket.stop_price, 120.99);
        assert_eq!(bracket.target_price, 133.09);
    }

    #[test]
    fn test_position_sizing() {
        let signals = generator();
        assert_eq!(signals.position_size(100_000.0, 50.0), 40);
        assert_eq!(signals.position_size(10.0, 1000.0), 1);
        assert_eq!(signals.position_size(100_000.0, 0.0), 1);
        assert_eq!(signals.position_size(25_000.0, 33.0), 15);
    }

    #[test]
    fn test_exit_reasons() {
        let signals = generator();
        let bracket = Bracket { stop_price: 9.0, target_price: 11.0 };
        assert_eq!(signals.exit_reason(&bracket, 8.5), Some(ExitReason::Stopped));
        assert_eq!(signals.exit_reason(&bracket, 9.0), Some(ExitReason::Stopped));
        assert_eq!(signals.exit_reason(&bracket, 11.5), Some(ExitReason::AboveTarget));
        assert_eq!(signals.exit_reason(&bracket, 10.0), None);

        // Inverted bracket: stop wins
        let inverted = Bracket { stop_price: 11.0, target_price: 9.0 };
        assert_eq!(signals.exit_reason(&inverted, 10.0), Some(ExitReason::Stopped));
    }

    #[test]
    fn test_exit_emits_market_sell() {
        let mut state = SymbolState::default();
        state.set_bracket(Bracket { stop_price: 9.0, target_price: 11.0 });
        let latest = bar(et(11, 0), 10.0, 11.5, 300.0);

        match generator().exit(&state, "AAPL", 25, &latest, et(11, 0)) {
            Decision::Sell { order, indicators } => {
                assert_eq!(order.side, OrderSide::Sell);
                assert_eq!(order.order_type, OrderType::Market);
                assert_eq!(order.quantity, 25);
                assert_eq!(indicators.reasons, vec![ExitReason::AboveTarget]);
                assert_eq!(indicators.avg, latest.average);
            }
            other => panic!("expected sell, got {:?}", other),
        }

        let inside = bar(et(11, 1), 10.0, 10.0, 300.0);
        assert_eq!(generator().exit(&state, "AAPL", 25, &inside, et(11, 1)), Decision::NoSignal);
    }

    #[test]
    fn test_exit_without_bracket() {
        let latest = bar(et(11, 0), 10.0, 1.0, 300.0);
        let state = SymbolState::default();
        assert_eq!(generator().exit(&state, "AAPL", 5, &latest, et(11, 0)), Decision::NoSignal);
    }

    fn setup_bars() -> Vec<Bar> {
        (0..6).map(|i| bar(et(10, i), 49.0, 50.0, 100.0 + i as f64)).collect()
    }

    #[tokio::test]
    async fn test_enter_with_supplied_value() {
        let bars = setup_bars();
        let vwap = [10.5, 10.4, 10.3, 10.2, 10.1, 10.0];
        let anchored = [9.0, 9.1];
        let closes = [9.5, 9.6, 9.7];
        let setup = EntrySetup {
            symbol: "AAPL",
            now: et(10, 5),
            minute_bars: &bars,
            vwap: &vwap,
            anchored_vwap: &anchored,
            closes_5min: &closes,
        };
        let mut state = SymbolState::default();
        state.begin_candidate(et(10, 0));

        let decision = generator().enter(&mut state, &setup, Some(100_000.0), None).await.unwrap();
        let Decision::Buy { order, indicators } = decision else {
            panic!("expected buy");
        };
        assert_eq!(order.quantity, 40);
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.limit_price, Some(50.0));
        assert_eq!(indicators.vwap_series, vec![10.4, 10.3, 10.2, 10.1, 10.0]);
        assert_eq!(indicators.a_vwap_series, vec![9.0, 9.1]);
        assert_eq!(indicators.volume, vec![101.0, 102.0, 103.0, 104.0, 105.0]);

        assert_eq!(state.bracket(), Some(Bracket { stop_price: 9.8, target_price: 10.78 }));
        assert!(!state.potential_trap());
    }

    #[tokio::test]
    async fn test_enter_fetches_with_retries() {
        let bars = setup_bars();
        let vwap = [10.0];
        let setup = EntrySetup {
            symbol: "AAPL",
            now: et(10, 5),
            minute_bars: &bars,
            vwap: &vwap,
            anchored_vwap: &[],
            closes_5min: &[],
        };
        let account = FlakyAccount::new(2, 100_000.0);
        let mut state = SymbolState::default();

        let decision = generator().enter(&mut state, &setup, None, Some(&account)).await.unwrap();
        assert_eq!(decision.order().map(|o| o.quantity), Some(40));
        assert_eq!(account.calls(), 3);
    }

    #[tokio::test]
    async fn test_enter_abstains_when_account_unreachable() {
        let bars = setup_bars();
        let vwap = [10.0];
        let setup = EntrySetup {
            symbol: "AAPL",
            now: et(10, 5),
            minute_bars: &bars,
            vwap: &vwap,
            anchored_vwap: &[],
            closes_5min: &[],
        };
        let account = FlakyAccount::new(3, 100_000.0);
        let mut state = SymbolState::default();
        state.begin_candidate(et(10, 0));
        let before = state.clone();

        let decision = generator().enter(&mut state, &setup, None, Some(&account)).await.unwrap();
        assert_eq!(decision, Decision::NoSignal);
        assert_eq!(account.calls(), 3);
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_missing_portfolio_source_is_fatal() {
        let result = generator().resolve_portfolio_value(None, None, "AAPL", et(10, 0)).await;
        assert!(matches!(result, Err(StrategyError::MissingPortfolioSource { .. })));
    }

    #[tokio::test]
    async fn test_non_connection_error_propagates() {
        struct Broken;

        #[async_trait::async_trait]
        impl AccountClient for Broken {
            async fn portfolio_value(&self) -> Result<f64, AccountError> {
                Err(AccountError::Other("account suspended".into()))
            }
        }

        let result = generator().resolve_portfolio_value(None, Some(&Broken), "AAPL", et(10, 0)).await;
        assert_eq!(result, Err(StrategyError::Account(AccountError::Other("account suspended".into()))));
    }
}
