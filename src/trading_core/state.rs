//! Per-symbol strategy state
//!
//! One `SymbolState` per symbol lives for a trading session. The scheduler
//! owns the `SymbolStates` arena and hands out `&mut SymbolState` for one
//! evaluation at a time; distinct symbols can be evaluated in parallel
//! because they never share a record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bars::Bar;

/// Lifecycle of the trap pattern for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrapPhase {
    /// No pattern being tracked
    #[default]
    None,
    /// Bearish flush seen; waiting for price to reclaim the anchored VWAP
    Candidate { started_at: DateTime<Utc> },
}

/// Stop-loss and take-profit fixed at entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub stop_price: f64,
    pub target_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolState {
    was_above_vwap: bool,
    trap: TrapPhase,
    bracket: Option<Bracket>,
}

impl SymbolState {
    /// Sticky: once a close above the running average is seen it stays set
    pub fn observe_bar(&mut self, bar: &Bar) {
        if bar.close > bar.average {
            self.was_above_vwap = true;
        }
    }

    pub fn was_above_vwap(&self) -> bool {
        self.was_above_vwap
    }

    pub fn trap(&self) -> TrapPhase {
        self.trap
    }

    pub fn potential_trap(&self) -> bool {
        matches!(self.trap, TrapPhase::Candidate { .. })
    }

    pub fn trap_start_time(&self) -> Option<DateTime<Utc>> {
        match self.trap {
            TrapPhase::Candidate { started_at } => Some(started_at),
            TrapPhase::None => None,
        }
    }

    /// Start tracking a candidate. Returns false (and changes nothing) if
    /// one is already pending.
    pub fn begin_candidate(&mut self, at: DateTime<Utc>) -> bool {
        if self.potential_trap() {
            return false;
        }
        self.trap = TrapPhase::Candidate { started_at: at };
        true
    }

    /// Candidate consumed by an entry
    pub fn clear_trap(&mut self) {
        self.trap = TrapPhase::None;
    }

    pub fn bracket(&self) -> Option<Bracket> {
        self.bracket
    }

    pub fn set_bracket(&mut self, bracket: Bracket) {
        self.bracket = Some(bracket);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// New session: clear the sticky flag and any pending candidate. The
    /// bracket survives so a position carried overnight can still exit.
    pub fn reset_session(&mut self) {
        self.was_above_vwap = false;
        self.trap = TrapPhase::None;
    }
}

/// Symbol-keyed arena of `SymbolState`
#[derive(Debug, Default)]
pub struct SymbolStates {
    states: HashMap<String, SymbolState>,
}

impl SymbolStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `symbol`, created empty on first use
    pub fn entry(&mut self, symbol: &str) -> &mut SymbolState {
        self.states.entry(symbol.to_string()).or_default()
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolState> {
        self.states.get(symbol)
    }

    /// Disjoint mutable handles, for evaluating symbols concurrently
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut SymbolState)> {
        self.states.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop every symbol; for a boundary with no positions carried over
    pub fn reset_session(&mut self) {
        self.states.clear();
    }

    /// Session boundary with positions possibly still open: every symbol
    /// starts the session fresh but keeps its bracket
    pub fn roll_session(&mut self) {
        for state in self.states.values_mut() {
            state.reset_session();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading_core::bars::tests::{bar, et};

    #[test]
    fn test_sticky_flag_never_clears() {
        let mut state = SymbolState::default();
        let mut above = bar(et(9, 31), 10.0, 10.5, 100.0);
        above.average = 10.2;
        let mut below = bar(et(9, 32), 10.5, 9.0, 100.0);
        below.average = 10.2;

        state.observe_bar(&below);
        assert!(!state.was_above_vwap());
        state.observe_bar(&above);
        assert!(state.was_above_vwap());
        for _ in 0..5 {
            state.observe_bar(&below);
        }
        assert!(state.was_above_vwap());
    }

    #[test]
    fn test_single_candidate() {
        let mut state = SymbolState::default();
        assert!(state.begin_candidate(et(10, 0)));
        assert!(!state.begin_candidate(et(10, 5)));
        assert_eq!(state.trap_start_time(), Some(et(10, 0)));
        assert!(state.potential_trap());

        state.clear_trap();
        assert!(!state.potential_trap());
        assert_eq!(state.trap_start_time(), None);
        assert!(state.begin_candidate(et(10, 5)));
    }

    #[test]
    fn test_session_reset_keeps_bracket() {
        let mut above = bar(et(10, 0), 10.0, 10.5, 100.0);
        above.average = 10.2;
        let bracket = Bracket { stop_price: 9.8, target_price: 10.78 };

        let mut states = SymbolStates::new();
        let state = states.entry("AAPL");
        state.observe_bar(&above);
        state.begin_candidate(et(11, 0));
        state.set_bracket(bracket);

        states.roll_session();
        let state = states.get("AAPL").unwrap();
        assert!(!state.was_above_vwap());
        assert!(!state.potential_trap());
        assert_eq!(state.bracket(), Some(bracket));
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn test_arena_reset() {
        let mut states = SymbolStates::new();
        states.entry("AAPL").begin_candidate(et(10, 0));
        states.entry("MSFT").set_bracket(Bracket { stop_price: 9.0, target_price: 9.9 });
        assert_eq!(states.len(), 2);
        assert!(states.get("AAPL").unwrap().potential_trap());
        assert!(states.get("TSLA").is_none());

        for (_, state) in states.iter_mut() {
            state.reset();
        }
        assert_eq!(states.get("MSFT").unwrap().bracket(), None);

        states.reset_session();
        assert!(states.is_empty());
    }
}
