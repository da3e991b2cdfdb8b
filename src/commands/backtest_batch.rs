use crate::backtester::{parse_date, BacktestRequest, Backtester};
use crate::commands::print_json;
use crate::config::StrategyParameters;
use crate::context::AppContext;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// One run described in the batch file.
#[derive(Debug, Deserialize)]
struct BatchEntry {
    #[serde(default)]
    parameters: Value,
    start_date: String,
    end_date: String,
    initial_capital: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BatchOutcome<T> {
    Ok(T),
    Failed { error: String, category: &'static str },
}

pub fn run(app: &AppContext, batch_file: &Path) -> Result<()> {
    let raw = fs::read_to_string(batch_file)
        .with_context(|| format!("failed to read batch file {}", batch_file.display()))?;
    let entries: Vec<BatchEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse batch file {}", batch_file.display()))?;
    if entries.is_empty() {
        info!("Batch file {} contains no runs", batch_file.display());
        return print_json(&Vec::<Value>::new());
    }

    let mut requests = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let request = BacktestRequest::new(
            StrategyParameters::from_value(&entry.parameters),
            parse_date(&entry.start_date).with_context(|| format!("batch entry {}", index))?,
            parse_date(&entry.end_date).with_context(|| format!("batch entry {}", index))?,
        )
        .with_initial_capital(
            entry
                .initial_capital
                .unwrap_or(app.settings().initial_capital),
        );
        requests.push(request);
    }

    info!("Running {} backtest(s) in parallel", requests.len());
    let context = app.engine_context()?;
    let pb = ProgressBar::new(requests.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let results = Backtester::new(&context).run_batch(&requests, Some(&pb));
    pb.finish_and_clear();

    let mut failures = 0;
    let outcomes: Vec<_> = results
        .into_iter()
        .enumerate()
        .map(|(index, result)| match result {
            Ok(result) => BatchOutcome::Ok(result),
            Err(err) => {
                failures += 1;
                warn!("Backtest {} failed: {}", index, err);
                BatchOutcome::Failed {
                    category: err.category(),
                    error: err.to_string(),
                }
            }
        })
        .collect();

    info!(
        "Batch finished: {} succeeded, {} failed",
        outcomes.len() - failures,
        failures
    );
    print_json(&outcomes)
}
