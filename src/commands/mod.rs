pub mod analyze;
pub mod backtest;
pub mod backtest_batch;
pub mod indicators;
pub mod paper_trade;
pub mod predict;
pub mod price;
pub mod signal;

use anyhow::Result;
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
