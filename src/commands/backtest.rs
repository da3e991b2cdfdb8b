use crate::backtester::run_backtest;
use crate::commands::print_json;
use crate::context::AppContext;
use anyhow::Result;
use log::info;

pub fn run(
    app: &AppContext,
    parameters_json: &str,
    start_date: &str,
    end_date: &str,
    initial_capital: Option<f64>,
) -> Result<()> {
    let context = app.engine_context()?;
    let capital = initial_capital.unwrap_or(app.settings().initial_capital);
    info!(
        "Received backtest command for {} - {} with capital {:.2}",
        start_date, end_date, capital
    );

    let result = run_backtest(&context, parameters_json, start_date, end_date, capital)?;
    print_json(&result)
}
