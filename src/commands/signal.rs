use crate::commands::print_json;
use crate::context::AppContext;
use crate::data_source::Interval;
use crate::indicators::compute_indicators;
use crate::signals::generate_market_signal;
use anyhow::Result;
use log::info;

pub fn run(app: &AppContext, interval: Interval, limit: usize) -> Result<()> {
    let series = app.data_source()?.fetch(interval, limit)?;
    let indicators = compute_indicators(&series);

    let signal = generate_market_signal(&series, &indicators);
    match &signal {
        Some(signal) => info!(
            "{} signal at {:.2}: {}",
            signal.signal_type, signal.price, signal.reason
        ),
        None => info!("No signal on the latest {} bar", interval),
    }
    print_json(&signal)
}
