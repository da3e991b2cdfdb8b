use crate::config::StrategyKind;
use crate::indicators::IndicatorSnapshot;
use crate::models::Bar;
use crate::strategy_utils::{is_warming_up, transition};

use super::{Decision, PositionState};

/// Long while the 20-bar SMA sits above the 50-bar SMA.
#[derive(Debug, Clone, Default)]
pub struct MaCrossoverStrategy;

impl MaCrossoverStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl super::Strategy for MaCrossoverStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MaCrossover
    }

    fn decide(
        &self,
        _bar: &Bar,
        indicators: &IndicatorSnapshot,
        position: PositionState,
    ) -> Decision {
        if is_warming_up(indicators.sma_20) || is_warming_up(indicators.sma_50) {
            return Decision::Hold;
        }

        transition(
            position,
            indicators.sma_20 > indicators.sma_50,
            indicators.sma_20 < indicators.sma_50,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use chrono::Utc;

    fn bar() -> Bar {
        Bar {
            timestamp: Utc::now(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        }
    }

    fn snapshot(sma_20: f64, sma_50: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            sma_20,
            sma_50,
            ..Default::default()
        }
    }

    #[test]
    fn test_opens_on_bullish_cross_and_closes_on_bearish() {
        let strategy = MaCrossoverStrategy::new();
        assert_eq!(
            strategy.decide(&bar(), &snapshot(105.0, 100.0), PositionState::Flat),
            Decision::Open
        );
        assert_eq!(
            strategy.decide(&bar(), &snapshot(95.0, 100.0), PositionState::Long),
            Decision::Close
        );
    }

    #[test]
    fn test_ties_hold() {
        let strategy = MaCrossoverStrategy::new();
        for position in [PositionState::Flat, PositionState::Long] {
            assert_eq!(
                strategy.decide(&bar(), &snapshot(100.0, 100.0), position),
                Decision::Hold
            );
        }
    }

    #[test]
    fn test_skips_warm_up_placeholders() {
        let strategy = MaCrossoverStrategy::new();
        assert_eq!(
            strategy.decide(&bar(), &snapshot(105.0, 0.0), PositionState::Flat),
            Decision::Hold
        );
    }
}
