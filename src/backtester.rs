use crate::candle_utils::window_range;
use crate::config::{StrategyParameters, DEFAULT_INITIAL_CAPITAL};
use crate::context::EngineContext;
use crate::data_source::Interval;
use crate::engine::BacktestEngine;
use crate::error::{EngineError, EngineResult};
use crate::indicators::{compute_indicators, WARMUP_BARS};
use crate::models::{BacktestResult, Series};
use crate::performance::PerformanceCalculator;
use crate::strategy::create_strategy;
use chrono::NaiveDate;
use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use uuid::Uuid;

/// Upper bound on bars requested from the data source in one call.
pub const MAX_FETCH_LIMIT: usize = 1000;
pub const BACKTEST_INTERVAL: Interval = Interval::OneDay;

#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub parameters: StrategyParameters,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
}

impl BacktestRequest {
    pub fn new(parameters: StrategyParameters, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            parameters,
            start_date,
            end_date,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
        }
    }

    pub fn with_initial_capital(mut self, initial_capital: f64) -> Self {
        self.initial_capital = initial_capital;
        self
    }

    fn validate(&self) -> EngineResult<()> {
        if self.start_date > self.end_date {
            return Err(EngineError::InvalidRequest(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(EngineError::InvalidRequest(format!(
                "initial capital must be positive (value: {})",
                self.initial_capital
            )));
        }
        Ok(())
    }
}

/// Fetches history, attaches indicators, walks the requested window and scores it.
pub struct Backtester<'a> {
    context: &'a EngineContext,
}

impl<'a> Backtester<'a> {
    pub fn new(context: &'a EngineContext) -> Self {
        Self { context }
    }

    /// Daily bars to request so the window plus indicator warm-up is covered.
    pub fn fetch_limit(&self, start_date: NaiveDate) -> usize {
        let today = self.context.now().date_naive();
        let days = (today - start_date).num_days().max(0) as usize + 1;
        (days + WARMUP_BARS).clamp(WARMUP_BARS, MAX_FETCH_LIMIT)
    }

    pub fn run(&self, request: &BacktestRequest) -> EngineResult<BacktestResult> {
        request.validate()?;
        let limit = self.fetch_limit(request.start_date);
        info!(
            "Backtesting {} from {} to {} (fetching {} {} bars from {})",
            request.parameters.strategy_type.as_str(),
            request.start_date,
            request.end_date,
            limit,
            BACKTEST_INTERVAL,
            self.context.data_source().name()
        );
        let series = self.context.data_source().fetch(BACKTEST_INTERVAL, limit)?;
        self.run_on_series(&series, request)
    }

    /// Backtest against an already loaded series; bars before the window only feed warm-up.
    pub fn run_on_series(
        &self,
        series: &Series,
        request: &BacktestRequest,
    ) -> EngineResult<BacktestResult> {
        request.validate()?;

        let window = window_range(series.bars(), request.start_date, request.end_date);
        if window.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "No data available for the specified date range {} to {}",
                request.start_date, request.end_date
            )));
        }
        if window.start < WARMUP_BARS {
            warn!(
                "Only {} bar(s) of history precede {}; early indicator values are placeholders",
                window.start, request.start_date
            );
        }

        let indicators = compute_indicators(series);
        let strategy = create_strategy(&request.parameters);
        let engine = BacktestEngine::new(
            strategy.as_ref(),
            &request.parameters,
            request.initial_capital,
        );
        let output = engine.simulate(series, &indicators, window)?;

        let metrics = PerformanceCalculator::calculate_performance(
            &output.trades,
            &output.equity_curve,
            request.initial_capital,
        );

        info!(
            "Backtest finished: {} trade(s), return {:.2}%, max drawdown {:.2}%",
            metrics.total_trades, metrics.total_return_pct, metrics.max_drawdown_pct
        );

        Ok(BacktestResult {
            id: Uuid::new_v4().to_string(),
            strategy_type: request.parameters.strategy_type,
            equity_mode: request.parameters.equity_mode,
            start_date: request.start_date,
            end_date: request.end_date,
            initial_capital: request.initial_capital,
            final_equity: output.final_equity,
            profit_loss: metrics.total_return_pct,
            win_rate: metrics.win_rate,
            total_trades: metrics.total_trades,
            trades: output.trades,
            equity_curve: output.equity_curve,
            metrics,
            created_at: self.context.now(),
        })
    }

    /// Independent runs in parallel; one result per request, in request order.
    pub fn run_batch(
        &self,
        requests: &[BacktestRequest],
        progress: Option<&ProgressBar>,
    ) -> Vec<EngineResult<BacktestResult>> {
        requests
            .par_iter()
            .map(|request| {
                let result = self.run(request);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                result
            })
            .collect()
    }
}

/// Entry point for callers holding a raw parameter blob and `YYYY-MM-DD` dates.
pub fn run_backtest(
    context: &EngineContext,
    parameters_json: &str,
    start_date: &str,
    end_date: &str,
    initial_capital: f64,
) -> EngineResult<BacktestResult> {
    let request = BacktestRequest::new(
        StrategyParameters::from_json_str(parameters_json),
        parse_date(start_date)?,
        parse_date(end_date)?,
    )
    .with_initial_capital(initial_capital);
    Backtester::new(context).run(&request)
}

pub fn parse_date(raw: &str) -> EngineResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        EngineError::InvalidRequest(format!("date must be in YYYY-MM-DD format (value: {})", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FixedClock;
    use crate::data_source::StaticDataSource;
    use crate::models::Bar;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn context_with_days(count: i64) -> EngineContext {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..count)
            .map(|i| Bar {
                timestamp: start + Duration::days(i),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect();
        let source = StaticDataSource::from_bars(bars).unwrap();
        let clock = FixedClock(start + Duration::days(count));
        EngineContext::new(Arc::new(clock), Arc::new(source))
    }

    #[test]
    fn fetch_limit_pads_for_warm_up_and_caps() {
        let context = context_with_days(10);
        let backtester = Backtester::new(&context);
        let today = context.now().date_naive();
        assert_eq!(backtester.fetch_limit(today), WARMUP_BARS + 1);
        assert_eq!(
            backtester.fetch_limit(today - Duration::days(9)),
            WARMUP_BARS + 10
        );
        assert_eq!(
            backtester.fetch_limit(today - Duration::days(5_000)),
            MAX_FETCH_LIMIT
        );
        assert_eq!(
            backtester.fetch_limit(today + Duration::days(30)),
            WARMUP_BARS + 1
        );
    }

    #[test]
    fn rejects_inverted_dates() {
        let context = context_with_days(10);
        let error = run_backtest(&context, "{}", "2024-01-05", "2024-01-01", 1_000.0).unwrap_err();
        assert!(matches!(error, EngineError::InvalidRequest(_)));
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_date("01/02/2024").is_err());
        assert_eq!(
            parse_date(" 2024-02-01 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn empty_window_is_data_unavailable() {
        let context = context_with_days(10);
        let error =
            run_backtest(&context, "{}", "2023-01-01", "2023-02-01", 1_000.0).unwrap_err();
        assert!(matches!(error, EngineError::DataUnavailable(_)));
    }

    #[test]
    fn batch_returns_one_result_per_request() {
        let context = context_with_days(30);
        let backtester = Backtester::new(&context);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        let requests = vec![
            BacktestRequest::new(StrategyParameters::default(), start, end),
            BacktestRequest::new(StrategyParameters::from_json_str(r#"{"strategy_type":"rsi"}"#), start, end),
            BacktestRequest::new(StrategyParameters::default(), end, start),
        ];
        let results = backtester.run_batch(&requests, None);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap().total_trades, 0);
        assert!(results[2].is_err());
    }
}
