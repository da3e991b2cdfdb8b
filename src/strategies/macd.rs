use crate::config::StrategyKind;
use crate::indicators::IndicatorSnapshot;
use crate::models::Bar;
use crate::strategy_utils::transition;

use super::{Decision, PositionState};

#[derive(Debug, Clone, Default)]
pub struct MACDStrategy;

impl MACDStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl super::Strategy for MACDStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Macd
    }

    fn decide(
        &self,
        _bar: &Bar,
        indicators: &IndicatorSnapshot,
        position: PositionState,
    ) -> Decision {
        let macd = indicators.macd;
        let signal = indicators.macd_signal;

        // Bullish: MACD above its signal line and above zero
        let bullish = macd > signal && macd > 0.0;
        // Bearish: MACD below its signal line and below zero
        let bearish = macd < signal && macd < 0.0;

        transition(position, bullish, bearish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use chrono::Utc;

    fn decide(macd: f64, macd_signal: f64, position: PositionState) -> Decision {
        let bar = Bar {
            timestamp: Utc::now(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        };
        let snapshot = IndicatorSnapshot {
            macd,
            macd_signal,
            ..Default::default()
        };
        MACDStrategy::new().decide(&bar, &snapshot, position)
    }

    #[test]
    fn test_requires_line_above_signal_and_zero() {
        assert_eq!(decide(1.0, 0.5, PositionState::Flat), Decision::Open);
        assert_eq!(decide(-0.2, -0.5, PositionState::Flat), Decision::Hold);
        assert_eq!(decide(1.0, 1.0, PositionState::Flat), Decision::Hold);
    }

    #[test]
    fn test_closes_below_signal_and_zero() {
        assert_eq!(decide(-1.0, -0.5, PositionState::Long), Decision::Close);
        assert_eq!(decide(0.2, 0.5, PositionState::Long), Decision::Hold);
    }

    #[test]
    fn test_zero_line_never_triggers() {
        assert_eq!(decide(0.0, 0.0, PositionState::Flat), Decision::Hold);
        assert_eq!(decide(0.0, 0.0, PositionState::Long), Decision::Hold);
    }
}
