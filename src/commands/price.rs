use crate::commands::print_json;
use crate::context::AppContext;
use anyhow::Result;
use log::info;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct CurrentPrice<'a> {
    symbol: &'a str,
    price: f64,
}

pub fn run(app: &AppContext) -> Result<()> {
    let source = app.data_source()?;
    let price = source.current_price()?;
    info!("Current price from {}: {:.2}", source.name(), price);
    print_json(&CurrentPrice {
        symbol: &app.settings().market_symbol,
        price,
    })
}
