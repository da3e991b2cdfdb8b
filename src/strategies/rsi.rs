use crate::config::{StrategyKind, DEFAULT_RSI_OVERBOUGHT, DEFAULT_RSI_OVERSOLD};
use crate::indicators::IndicatorSnapshot;
use crate::models::Bar;
use crate::strategy_utils::transition;

use super::{Decision, PositionState};

pub struct RSIStrategy {
    oversold_level: f64,
    overbought_level: f64,
}

impl RSIStrategy {
    pub fn new(oversold_level: f64, overbought_level: f64) -> Self {
        Self {
            oversold_level,
            overbought_level,
        }
    }
}

impl Default for RSIStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_RSI_OVERSOLD, DEFAULT_RSI_OVERBOUGHT)
    }
}

impl super::Strategy for RSIStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rsi
    }

    fn decide(
        &self,
        _bar: &Bar,
        indicators: &IndicatorSnapshot,
        position: PositionState,
    ) -> Decision {
        // Buy when oversold, sell when overbought
        transition(
            position,
            indicators.rsi < self.oversold_level,
            indicators.rsi > self.overbought_level,
        )
    }
}
