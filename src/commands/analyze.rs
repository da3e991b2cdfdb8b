use crate::analyzer::MarketAnalyzer;
use crate::commands::print_json;
use crate::context::AppContext;
use crate::data_source::Interval;
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

pub fn run(app: &AppContext, config_file: &Path, interval: Interval, limit: usize) -> Result<()> {
    let raw = fs::read_to_string(config_file)
        .with_context(|| format!("failed to read analyzer config {}", config_file.display()))?;
    let analyzer = MarketAnalyzer::from_json_str(&raw)
        .with_context(|| format!("invalid analyzer config {}", config_file.display()))?;

    let series = app.data_source()?.fetch(interval, limit)?;
    let outcome = analyzer.analyze(&series)?;
    info!(
        "Analysis over {} bar(s): {} with confidence {:.2}",
        series.len(),
        outcome.signal_type,
        outcome.confidence
    );
    print_json(&outcome)
}
