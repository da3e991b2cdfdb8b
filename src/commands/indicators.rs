use crate::commands::print_json;
use crate::context::AppContext;
use crate::data_source::Interval;
use crate::indicators::{compute_indicators, IndicatorSnapshot};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct LatestIndicators {
    timestamp: DateTime<Utc>,
    close: f64,
    bars: usize,
    indicators: IndicatorSnapshot,
}

pub fn run(app: &AppContext, interval: Interval, limit: usize) -> Result<()> {
    let source = app.data_source()?;
    let series = source.fetch(interval, limit)?;
    info!(
        "Computing indicators over {} {} bar(s) from {}",
        series.len(),
        interval,
        source.name()
    );

    let indicators = compute_indicators(&series);
    let (last, snapshot) = series
        .last()
        .zip(indicators.latest())
        .ok_or_else(|| anyhow!("no bars returned for {}", interval))?;

    print_json(&LatestIndicators {
        timestamp: last.timestamp,
        close: last.close,
        bars: series.len(),
        indicators: snapshot,
    })
}
