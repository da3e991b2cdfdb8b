use crate::config::{EquityMode, StrategyParameters};
use crate::equity::EquityCurve;
use crate::error::{EngineError, EngineResult};
use crate::indicators::IndicatorSet;
use crate::ledger::Ledger;
use crate::models::{EquityPoint, Series, Trade};
use crate::strategy::{Decision, PositionState, Strategy};
use log::debug;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_equity: f64,
}

/// Walks a bar window once, driving the strategy, ledger and equity curve.
pub struct BacktestEngine<'a> {
    strategy: &'a dyn Strategy,
    parameters: &'a StrategyParameters,
    initial_capital: f64,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(
        strategy: &'a dyn Strategy,
        parameters: &'a StrategyParameters,
        initial_capital: f64,
    ) -> Self {
        Self {
            strategy,
            parameters,
            initial_capital,
        }
    }

    /// Simulate over `window`, a range of indices into `series` and `indicators`.
    pub fn simulate(
        &self,
        series: &Series,
        indicators: &IndicatorSet,
        window: Range<usize>,
    ) -> EngineResult<SimulationOutput> {
        if indicators.len() != series.len() {
            return Err(EngineError::InvalidState(format!(
                "indicator length {} does not match series length {}",
                indicators.len(),
                series.len()
            )));
        }
        if window.is_empty() || window.end > series.len() {
            return Err(EngineError::DataUnavailable(format!(
                "no bars in simulation window {:?} of {} bars",
                window,
                series.len()
            )));
        }

        let bars = series.bars();
        let last_index = window.end - 1;
        let mut ledger = Ledger::new();
        let mut curve = EquityCurve::new();
        let mut equity = self.initial_capital;

        for index in window {
            let bar = &bars[index];
            let snapshot = indicators.snapshot(index).ok_or_else(|| {
                EngineError::InvalidState(format!("missing indicators at bar {}", index))
            })?;

            let position = PositionState::from_open(ledger.is_open());
            match self.strategy.decide(bar, &snapshot, position) {
                Decision::Open => {
                    let size = equity * self.parameters.risk_per_trade / bar.close;
                    ledger.open(bar, size)?;
                    debug!("Opened {:.8} units at {} ({})", size, bar.close, bar.timestamp);
                }
                Decision::Close => {
                    equity += ledger.close(bar)?;
                    debug!("Closed at {} ({}), equity {:.2}", bar.close, bar.timestamp, equity);
                }
                Decision::Hold => {}
            }

            if index == last_index && ledger.is_open() {
                equity += ledger.close(bar)?;
                debug!("Force-closed open position at final bar {}", bar.timestamp);
            }

            let recorded = match self.parameters.equity_mode {
                EquityMode::Realized => equity,
                EquityMode::MarkToMarket => {
                    equity
                        + ledger
                            .position()
                            .map(|position| position.unrealized_pnl(bar.close))
                            .unwrap_or(0.0)
                }
            };
            curve.record(bar.timestamp, recorded)?;
        }

        Ok(SimulationOutput {
            trades: ledger.into_trades(),
            equity_curve: curve.into_points(),
            final_equity: equity,
        })
    }
}
