pub mod analyzer;
pub mod backtester;
pub mod binance;
pub mod candle_utils;
pub mod commands;
pub mod condition;
pub mod config;
pub mod context;
pub mod data_source;
pub mod engine;
pub mod equity;
pub mod error;
pub mod http_client;
pub mod indicators;
pub mod ledger;
pub mod models;
pub mod paper_trade;
pub mod param_utils;
pub mod performance;
pub mod prediction;
mod retry;
pub mod signals;
pub mod strategy;
pub mod strategy_utils;

pub use backtester::{run_backtest, BacktestRequest, Backtester};
pub use error::{EngineError, EngineResult};
pub use models::{BacktestResult, PerformanceMetrics, Series};
