use crate::config::EngineSettings;
use crate::data_source::{finalize_bars, HistoricalDataSource, Interval};
use crate::error::{EngineError, EngineResult};
use crate::models::{Bar, Series};
use crate::retry::retry_request;
use chrono::{TimeZone, Utc};
use log::{debug, warn};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

pub const BINANCE_MAX_LIMIT: usize = 1000;
const COINGECKO_SPREAD: f64 = 0.005;

fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> EngineResult<T> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .map_err(|error| EngineError::DataSource(format!("request to {} failed: {}", url, error)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(EngineError::DataSource(format!(
            "{} responded with {}: {}",
            url, status, body
        )));
    }

    response.json::<T>().map_err(|error| {
        EngineError::DataSource(format!("invalid JSON from {}: {}", url, error))
    })
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => text.parse().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

/// Convert Binance kline rows (`[openTime, "open", "high", "low", "close", "volume", ...]`) into bars.
pub fn parse_klines(rows: &[Value]) -> Vec<Bar> {
    rows.iter()
        .filter_map(|row| {
            let fields = row.as_array()?;
            if fields.len() < 6 {
                return None;
            }
            let timestamp = Utc.timestamp_millis_opt(fields[0].as_i64()?).single()?;
            Some(Bar {
                timestamp,
                open: value_as_f64(&fields[1])?,
                high: value_as_f64(&fields[2])?,
                low: value_as_f64(&fields[3])?,
                close: value_as_f64(&fields[4])?,
                volume: value_as_f64(&fields[5])?,
            })
        })
        .collect()
}

fn positive_price(source: &str, price: Option<f64>) -> EngineResult<f64> {
    match price {
        Some(price) if price.is_finite() && price > 0.0 => Ok(price),
        Some(price) => Err(EngineError::DataSource(format!(
            "{} returned an unusable price {}",
            source, price
        ))),
        None => Err(EngineError::DataSource(format!(
            "{} response has no price",
            source
        ))),
    }
}

/// Last price from a Binance `/api/v3/ticker/24hr` payload.
pub fn parse_ticker_price(ticker: &Value) -> EngineResult<f64> {
    positive_price("binance", ticker.get("lastPrice").and_then(value_as_f64))
}

/// USD price of bitcoin from a CoinGecko `simple/price` payload.
pub fn parse_simple_price(payload: &Value) -> EngineResult<f64> {
    positive_price(
        "coingecko",
        payload
            .get("bitcoin")
            .and_then(|coin| coin.get("usd"))
            .and_then(value_as_f64),
    )
}

/// Binance spot klines.
pub struct BinanceClient {
    client: Client,
    base_url: String,
    symbol: String,
    max_attempts: u32,
}

impl BinanceClient {
    pub fn new(client: Client, settings: &EngineSettings) -> Self {
        Self {
            client,
            base_url: settings.binance_base_url.clone(),
            symbol: settings.market_symbol.clone(),
            max_attempts: settings.http_max_attempts,
        }
    }

    fn request_klines(&self, interval: Interval, limit: usize) -> EngineResult<Vec<Value>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", self.symbol.clone()),
            ("interval", interval.as_str().to_string()),
            ("limit", limit.min(BINANCE_MAX_LIMIT).to_string()),
        ];
        retry_request!(
            format!("Binance klines {} {}", self.symbol, interval),
            self.max_attempts,
            get_json::<Vec<Value>>(&self.client, &url, &query)
        )
    }
}

impl HistoricalDataSource for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    fn fetch(&self, interval: Interval, limit: usize) -> EngineResult<Series> {
        let rows = self.request_klines(interval, limit)?;
        let bars = parse_klines(&rows);
        if bars.len() != rows.len() {
            warn!(
                "Dropped {} malformed Binance kline row(s)",
                rows.len() - bars.len()
            );
        }
        finalize_bars(self.name(), bars, limit)
    }

    fn current_price(&self) -> EngineResult<f64> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let query = [("symbol", self.symbol.clone())];
        let ticker: Value = retry_request!(
            format!("Binance ticker {}", self.symbol),
            self.max_attempts,
            get_json::<Value>(&self.client, &url, &query)
        )?;
        parse_ticker_price(&ticker)
    }
}

#[derive(Debug, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, f64)>,
}

/// History window CoinGecko is asked for at a given interval.
pub fn coingecko_days(interval: Interval) -> u32 {
    match interval {
        Interval::OneMinute
        | Interval::ThreeMinutes
        | Interval::FiveMinutes
        | Interval::FifteenMinutes
        | Interval::ThirtyMinutes => 1,
        Interval::OneHour | Interval::TwoHours | Interval::FourHours => 7,
        Interval::SixHours | Interval::EightHours | Interval::TwelveHours | Interval::OneDay => 30,
        Interval::ThreeDays | Interval::OneWeek | Interval::OneMonth => 90,
    }
}

/// Synthesize bars from a CoinGecko price series, keeping the last `limit` points.
pub fn market_chart_to_bars(chart: &MarketChart, limit: usize) -> Vec<Bar> {
    let start = chart.prices.len().saturating_sub(limit);
    chart.prices[start..]
        .iter()
        .enumerate()
        .filter_map(|(offset, (timestamp_ms, price))| {
            let timestamp = Utc.timestamp_millis_opt(*timestamp_ms as i64).single()?;
            let volume = chart
                .total_volumes
                .get(start + offset)
                .map(|(_, volume)| *volume)
                .unwrap_or(0.0);
            Some(Bar {
                timestamp,
                open: *price,
                high: price * (1.0 + COINGECKO_SPREAD),
                low: price * (1.0 - COINGECKO_SPREAD),
                close: *price,
                volume,
            })
        })
        .collect()
}

/// CoinGecko market chart, used as a coarse fallback.
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
}

impl CoinGeckoClient {
    pub fn new(client: Client, settings: &EngineSettings) -> Self {
        Self {
            client,
            base_url: settings.coingecko_base_url.clone(),
            max_attempts: settings.http_max_attempts,
        }
    }
}

impl HistoricalDataSource for CoinGeckoClient {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn fetch(&self, interval: Interval, limit: usize) -> EngineResult<Series> {
        let url = format!("{}/coins/bitcoin/market_chart", self.base_url);
        let days = coingecko_days(interval);
        let query = [
            ("vs_currency", "usd".to_string()),
            ("days", days.to_string()),
        ];
        debug!("Requesting {} day(s) of CoinGecko history for {}", days, interval);
        let chart: MarketChart = retry_request!(
            format!("CoinGecko market chart ({}d)", days),
            self.max_attempts,
            get_json::<MarketChart>(&self.client, &url, &query)
        )?;
        finalize_bars(self.name(), market_chart_to_bars(&chart, limit), limit)
    }

    fn current_price(&self) -> EngineResult<f64> {
        let url = format!("{}/simple/price", self.base_url);
        let query = [
            ("ids", "bitcoin".to_string()),
            ("vs_currencies", "usd".to_string()),
        ];
        let payload: Value = retry_request!(
            "CoinGecko simple price".to_string(),
            self.max_attempts,
            get_json::<Value>(&self.client, &url, &query)
        )?;
        parse_simple_price(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_encoded_klines() {
        let rows = vec![
            json!([1700000000000i64, "35000.1", "35500.0", "34900.5", "35200.0", "123.4", 1700086399999i64]),
            json!(["bad"]),
        ];
        let bars = parse_klines(&rows);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp_ms(), 1_700_000_000_000);
        assert_eq!(bars[0].open, 35000.1);
        assert_eq!(bars[0].volume, 123.4);
    }

    #[test]
    fn reads_prices_from_ticker_and_simple_price() {
        let ticker = json!({"symbol": "BTCUSDT", "lastPrice": "64123.50", "volume": "10.0"});
        assert_eq!(parse_ticker_price(&ticker).unwrap(), 64123.5);

        let simple = json!({"bitcoin": {"usd": 63990.0, "usd_24h_change": -1.2}});
        assert_eq!(parse_simple_price(&simple).unwrap(), 63990.0);
    }

    #[test]
    fn missing_or_zero_price_is_a_data_source_error() {
        assert!(matches!(
            parse_ticker_price(&json!({"code": -1121, "msg": "Invalid symbol."})),
            Err(EngineError::DataSource(_))
        ));
        assert!(matches!(
            parse_simple_price(&json!({"bitcoin": {"usd": 0}})),
            Err(EngineError::DataSource(_))
        ));
    }

    #[test]
    fn coingecko_days_follow_interval_buckets() {
        assert_eq!(coingecko_days(Interval::FifteenMinutes), 1);
        assert_eq!(coingecko_days(Interval::FourHours), 7);
        assert_eq!(coingecko_days(Interval::OneDay), 30);
        assert_eq!(coingecko_days(Interval::OneWeek), 90);
    }

    #[test]
    fn market_chart_bars_keep_latest_points_with_spread() {
        let chart: MarketChart = serde_json::from_value(json!({
            "prices": [[1700000000000.0, 100.0], [1700003600000.0, 110.0], [1700007200000.0, 120.0]],
            "total_volumes": [[1700000000000.0, 1.0], [1700003600000.0, 2.0], [1700007200000.0, 3.0]]
        }))
        .unwrap();
        let bars = market_chart_to_bars(&chart, 2);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 110.0);
        assert_eq!(bars[0].volume, 2.0);
        assert!((bars[1].high - 120.6).abs() < 1e-9);
        assert!((bars[1].low - 119.4).abs() < 1e-9);
    }
}
