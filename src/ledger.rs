use crate::error::{EngineError, EngineResult};
use crate::models::{Bar, Direction, Position, Trade};

/// At most one open position plus the append-only list of closed trades.
#[derive(Debug, Default)]
pub struct Ledger {
    position: Option<Position>,
    trades: Vec<Trade>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Open a long position at the bar's close.
    pub fn open(&mut self, bar: &Bar, size: f64) -> EngineResult<()> {
        if let Some(position) = &self.position {
            return Err(EngineError::InvalidState(format!(
                "cannot open at {}: position from {} still open",
                bar.timestamp, position.entry_time
            )));
        }
        if !size.is_finite() || size <= 0.0 {
            return Err(EngineError::InvalidState(format!(
                "cannot open at {} with size {}",
                bar.timestamp, size
            )));
        }

        self.position = Some(Position {
            entry_time: bar.timestamp,
            entry_price: bar.close,
            size,
            direction: Direction::Long,
        });
        Ok(())
    }

    /// Close the open position at the bar's close and return the realized P&L.
    pub fn close(&mut self, bar: &Bar) -> EngineResult<f64> {
        let position = self.position.take().ok_or_else(|| {
            EngineError::InvalidState(format!("cannot close at {}: no open position", bar.timestamp))
        })?;

        let exit_price = bar.close;
        let pnl = position.unrealized_pnl(exit_price);
        let pnl_percent = (exit_price / position.entry_price - 1.0) * 100.0;

        self.trades.push(Trade {
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_time: bar.timestamp,
            exit_price,
            size: position.size,
            direction: position.direction,
            pnl,
            pnl_percent,
        });
        Ok(pnl)
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}
