use crate::commands::print_json;
use crate::context::AppContext;
use crate::data_source::Interval;
use crate::prediction::predict_price;
use anyhow::Result;
use log::info;

pub fn run(app: &AppContext, interval: Interval, limit: usize, periods: usize) -> Result<()> {
    let series = app.data_source()?.fetch(interval, limit)?;
    info!(
        "Forecasting {} {} period(s) from {} bar(s)",
        periods,
        interval,
        series.len()
    );

    let prediction = predict_price(&series, periods, interval)?;
    print_json(&prediction)
}
