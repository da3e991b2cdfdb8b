use crate::commands::print_json;
use crate::context::AppContext;
use crate::models::TradeSide;
use crate::paper_trade::execute_paper_trade;
use anyhow::Result;

pub fn run(app: &AppContext, side: TradeSide, quantity: f64, price: Option<f64>) -> Result<()> {
    let context = app.engine_context()?;
    let trade = execute_paper_trade(&context, side, quantity, price)?;
    print_json(&trade)
}
