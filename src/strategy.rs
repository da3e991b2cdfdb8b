use crate::config::{StrategyKind, StrategyParameters};
use crate::indicators::IndicatorSnapshot;
use crate::models::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

impl PositionState {
    pub fn from_open(is_open: bool) -> Self {
        if is_open {
            PositionState::Long
        } else {
            PositionState::Flat
        }
    }
}

/// Per-bar decision rule. Implementations hold no mutable state.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn decide(
        &self,
        bar: &Bar,
        indicators: &IndicatorSnapshot,
        position: PositionState,
    ) -> Decision;
}

#[path = "strategies/ma_crossover.rs"]
pub mod ma_crossover;

pub use ma_crossover::MaCrossoverStrategy;

#[path = "strategies/rsi.rs"]
pub mod rsi;

pub use rsi::RSIStrategy;

#[path = "strategies/macd.rs"]
pub mod macd;

pub use macd::MACDStrategy;

pub fn create_strategy(parameters: &StrategyParameters) -> Box<dyn Strategy> {
    match parameters.strategy_type {
        StrategyKind::MaCrossover => Box::new(MaCrossoverStrategy::new()),
        StrategyKind::Rsi => Box::new(RSIStrategy::new(
            parameters.rsi_oversold,
            parameters.rsi_overbought,
        )),
        StrategyKind::Macd => Box::new(MACDStrategy::new()),
    }
}
