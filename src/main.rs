use anyhow::Result;
use btc_engine::{
    commands::{
        analyze, backtest, backtest_batch, indicators, paper_trade, predict, price, signal,
    },
    context::AppContext,
    data_source::Interval,
    models::TradeSide,
};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "btc-engine")]
#[command(about = "Bitcoin indicators, signals, forecasts and strategy backtests")]
struct Cli {
    /// Read bars from a local JSON or CSV snapshot instead of the market APIs
    #[arg(long = "data-file", value_name = "PATH", global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one strategy over a date range of daily bars
    Backtest {
        /// Strategy parameters as JSON, e.g. '{"strategy_type":"rsi"}'
        #[arg(long, default_value = "{}")]
        parameters: String,
        /// First day of the window (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last day of the window (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Starting equity (defaults to INITIAL_CAPITAL)
        #[arg(long)]
        capital: Option<f64>,
    },
    /// Run every backtest described in a JSON file in parallel
    BacktestBatch {
        /// JSON array of {parameters, start_date, end_date, initial_capital}
        #[arg(value_name = "PATH")]
        file: PathBuf,
    },
    /// Latest values of the indicator battery
    Indicators {
        #[arg(long, default_value = "1d")]
        interval: Interval,
        #[arg(long, default_value_t = 250)]
        limit: usize,
    },
    /// Buy/sell signal for the latest bar
    Signal {
        #[arg(long, default_value = "1h")]
        interval: Interval,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Naive linear price forecast
    Predict {
        #[arg(long, default_value = "1h")]
        interval: Interval,
        #[arg(long, default_value_t = 500)]
        limit: usize,
        /// Number of future bars to forecast
        #[arg(long, default_value_t = 24)]
        periods: usize,
    },
    /// Current BTC price (Binance ticker, CoinGecko as fallback)
    Price,
    /// Simulate a fill without touching an exchange
    PaperTrade {
        /// BUY or SELL
        #[arg(long)]
        side: TradeSide,
        /// Amount of BTC
        #[arg(long)]
        quantity: f64,
        /// Fill price; the current price is used when omitted
        #[arg(long)]
        price: Option<f64>,
    },
    /// Combine configured indicators through weighted rules
    Analyze {
        /// Analyzer configuration JSON file
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
        #[arg(long, default_value = "1h")]
        interval: Interval,
        #[arg(long, default_value_t = 250)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let Cli { data_file, command } = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let app_context = AppContext::initialize(data_file)?;

    info!("Starting btc-engine. Not financial advice. Use at your own risk.");

    match command {
        Commands::Backtest {
            parameters,
            start,
            end,
            capital,
        } => backtest::run(&app_context, &parameters, &start, &end, capital)?,
        Commands::BacktestBatch { file } => backtest_batch::run(&app_context, &file)?,
        Commands::Indicators { interval, limit } => {
            indicators::run(&app_context, interval, limit)?
        }
        Commands::Signal { interval, limit } => signal::run(&app_context, interval, limit)?,
        Commands::Predict {
            interval,
            limit,
            periods,
        } => predict::run(&app_context, interval, limit, periods)?,
        Commands::Price => price::run(&app_context)?,
        Commands::PaperTrade {
            side,
            quantity,
            price,
        } => paper_trade::run(&app_context, side, quantity, price)?,
        Commands::Analyze {
            config,
            interval,
            limit,
        } => analyze::run(&app_context, &config, interval, limit)?,
    }

    Ok(())
}
