use crate::error::{EngineError, EngineResult};
use crate::param_utils::{finite_param, normalize_parameter_map, param_in_range_or_default, ParameterMap};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

pub const DEFAULT_RISK_PER_TRADE: f64 = 0.02;
pub const DEFAULT_RSI_OVERBOUGHT: f64 = 70.0;
pub const DEFAULT_RSI_OVERSOLD: f64 = 30.0;
pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    MaCrossover,
    Rsi,
    Macd,
}

impl StrategyKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ma_crossover" => Some(Self::MaCrossover),
            "rsi" => Some(Self::Rsi),
            "macd" => Some(Self::Macd),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaCrossover => "ma_crossover",
            Self::Rsi => "rsi",
            Self::Macd => "macd",
        }
    }
}

/// How recorded equity treats an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquityMode {
    /// Equity moves only when a trade closes
    #[default]
    Realized,
    /// Equity includes the unrealized P&L of the open position at each close
    MarkToMarket,
}

impl EquityMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "realized" => Some(Self::Realized),
            "mark_to_market" | "mtm" => Some(Self::MarkToMarket),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Realized => "realized",
            Self::MarkToMarket => "mark_to_market",
        }
    }
}

/// Strategy configuration. Built from partial user input and never fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyParameters {
    pub strategy_type: StrategyKind,
    pub risk_per_trade: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub equity_mode: EquityMode,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            strategy_type: StrategyKind::MaCrossover,
            risk_per_trade: DEFAULT_RISK_PER_TRADE,
            rsi_overbought: DEFAULT_RSI_OVERBOUGHT,
            rsi_oversold: DEFAULT_RSI_OVERSOLD,
            equity_mode: EquityMode::Realized,
        }
    }
}

impl StrategyParameters {
    /// Parse a JSON parameter blob; anything unusable falls back to defaults.
    pub fn from_json_str(blob: &str) -> Self {
        match serde_json::from_str::<Value>(blob) {
            Ok(value) => Self::from_value(&value),
            Err(error) => {
                warn!(
                    "Unparseable strategy parameters ({}); using defaults",
                    error
                );
                Self::default()
            }
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(object) => {
                let raw: HashMap<String, Value> = object
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                Self::from_parameter_map(&normalize_parameter_map(raw))
            }
            other => {
                warn!(
                    "Strategy parameters must be a JSON object (got {}); using defaults",
                    other
                );
                Self::default()
            }
        }
    }

    pub fn from_parameter_map(parameters: &ParameterMap) -> Self {
        let defaults = Self::default();

        let strategy_type = match parameters.text.get("strategy_type") {
            Some(raw) => StrategyKind::parse(raw).unwrap_or_else(|| {
                warn!(
                    "Unknown strategy_type `{}`; falling back to {}",
                    raw,
                    defaults.strategy_type.as_str()
                );
                defaults.strategy_type
            }),
            None => {
                info!(
                    "No strategy_type given; using {}",
                    defaults.strategy_type.as_str()
                );
                defaults.strategy_type
            }
        };

        let risk_per_trade = match finite_param(&parameters.numbers, "risk_per_trade") {
            Some(value) if value > 0.0 && value <= 1.0 => value,
            Some(value) => {
                warn!(
                    "risk_per_trade {} must be within (0, 1]; using {}",
                    value, defaults.risk_per_trade
                );
                defaults.risk_per_trade
            }
            None => defaults.risk_per_trade,
        };

        let mut rsi_overbought = param_in_range_or_default(
            &parameters.numbers,
            "rsi_overbought",
            defaults.rsi_overbought,
            0.0,
            100.0,
        );
        let mut rsi_oversold = param_in_range_or_default(
            &parameters.numbers,
            "rsi_oversold",
            defaults.rsi_oversold,
            0.0,
            100.0,
        );
        if rsi_oversold >= rsi_overbought {
            warn!(
                "rsi_oversold {} must be below rsi_overbought {}; using {}/{}",
                rsi_oversold, rsi_overbought, defaults.rsi_oversold, defaults.rsi_overbought
            );
            rsi_overbought = defaults.rsi_overbought;
            rsi_oversold = defaults.rsi_oversold;
        }

        let equity_mode = match parameters.text.get("equity_mode") {
            Some(raw) => EquityMode::parse(raw).unwrap_or_else(|| {
                warn!("Unknown equity_mode `{}`; using realized", raw);
                defaults.equity_mode
            }),
            None => defaults.equity_mode,
        };

        Self {
            strategy_type,
            risk_per_trade,
            rsi_overbought,
            rsi_oversold,
            equity_mode,
        }
    }
}

pub const DEFAULT_BINANCE_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_MARKET_SYMBOL: &str = "BTCUSDT";

/// Operator settings for data sources and runs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub binance_base_url: String,
    pub coingecko_base_url: String,
    pub market_symbol: String,
    pub http_timeout: Duration,
    pub http_max_attempts: u32,
    pub initial_capital: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binance_base_url: DEFAULT_BINANCE_BASE_URL.to_string(),
            coingecko_base_url: DEFAULT_COINGECKO_BASE_URL.to_string(),
            market_symbol: DEFAULT_MARKET_SYMBOL.to_string(),
            http_timeout: Duration::from_secs(10),
            http_max_attempts: 3,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> EngineResult<Self> {
        let settings: HashMap<String, String> = env::vars().collect();
        Self::from_settings_map(&settings)
    }

    pub fn from_settings_map(settings: &HashMap<String, String>) -> EngineResult<Self> {
        let defaults = Self::default();
        let timeout_secs = setting_f64(
            settings,
            "HTTP_TIMEOUT_SECS",
            defaults.http_timeout.as_secs_f64(),
            Some(0.1),
            None,
        )?;

        Ok(Self {
            binance_base_url: setting_string(settings, "BINANCE_BASE_URL")
                .unwrap_or(defaults.binance_base_url),
            coingecko_base_url: setting_string(settings, "COINGECKO_BASE_URL")
                .unwrap_or(defaults.coingecko_base_url),
            market_symbol: setting_string(settings, "MARKET_SYMBOL")
                .map(|symbol| symbol.to_uppercase())
                .unwrap_or(defaults.market_symbol),
            http_timeout: Duration::from_secs_f64(timeout_secs),
            http_max_attempts: setting_u32(
                settings,
                "HTTP_MAX_ATTEMPTS",
                defaults.http_max_attempts,
                1,
            )?,
            initial_capital: setting_f64(
                settings,
                "INITIAL_CAPITAL",
                defaults.initial_capital,
                Some(f64::MIN_POSITIVE),
                None,
            )?,
        })
    }
}

fn setting_string(settings: &HashMap<String, String>, key: &str) -> Option<String> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.trim_end_matches('/').to_string())
}

fn setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    default: f64,
    min: Option<f64>,
    max: Option<f64>,
) -> EngineResult<f64> {
    let Some(raw) = setting_string(settings, key) else {
        return Ok(default);
    };
    let value = raw.parse::<f64>().map_err(|_| {
        EngineError::Configuration(format!("Setting {} must be a number (value: {})", key, raw))
    })?;
    if !value.is_finite() {
        return Err(EngineError::Configuration(format!(
            "Setting {} must be finite (value: {})",
            key, raw
        )));
    }
    if let Some(min_value) = min {
        if value < min_value {
            return Err(EngineError::Configuration(format!(
                "Setting {} must be >= {} (value: {})",
                key, min_value, raw
            )));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(EngineError::Configuration(format!(
                "Setting {} must be <= {} (value: {})",
                key, max_value, raw
            )));
        }
    }
    Ok(value)
}

fn setting_u32(
    settings: &HashMap<String, String>,
    key: &str,
    default: u32,
    min: u32,
) -> EngineResult<u32> {
    let Some(raw) = setting_string(settings, key) else {
        return Ok(default);
    };
    let value = raw.parse::<u32>().map_err(|_| {
        EngineError::Configuration(format!(
            "Setting {} must be an integer (value: {})",
            key, raw
        ))
    })?;
    if value < min {
        return Err(EngineError::Configuration(format!(
            "Setting {} must be >= {} (value: {})",
            key, min, raw
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_strategy_type_defaults_to_ma_crossover() {
        let params = StrategyParameters::from_json_str(r#"{"risk_per_trade": 0.05}"#);
        assert_eq!(params.strategy_type, StrategyKind::MaCrossover);
        assert_eq!(params.risk_per_trade, 0.05);
    }

    #[test]
    fn unparseable_blob_uses_all_defaults() {
        let params = StrategyParameters::from_json_str("{not json");
        assert_eq!(params, StrategyParameters::default());
        let params = StrategyParameters::from_json_str("[1, 2]");
        assert_eq!(params, StrategyParameters::default());
    }

    #[test]
    fn unknown_strategy_type_falls_back() {
        let params = StrategyParameters::from_json_str(r#"{"strategy_type": "martingale"}"#);
        assert_eq!(params.strategy_type, StrategyKind::MaCrossover);
    }

    #[test]
    fn reads_rsi_thresholds_and_equity_mode() {
        let params = StrategyParameters::from_json_str(
            r#"{"strategy_type": "RSI", "rsi_overbought": "80", "rsi_oversold": 20, "equity_mode": "mark_to_market"}"#,
        );
        assert_eq!(params.strategy_type, StrategyKind::Rsi);
        assert_eq!(params.rsi_overbought, 80.0);
        assert_eq!(params.rsi_oversold, 20.0);
        assert_eq!(params.equity_mode, EquityMode::MarkToMarket);
    }

    #[test]
    fn inverted_rsi_thresholds_reset_to_defaults() {
        let params =
            StrategyParameters::from_json_str(r#"{"rsi_overbought": 20, "rsi_oversold": 60}"#);
        assert_eq!(params.rsi_overbought, DEFAULT_RSI_OVERBOUGHT);
        assert_eq!(params.rsi_oversold, DEFAULT_RSI_OVERSOLD);
    }

    #[test]
    fn out_of_range_risk_uses_default() {
        for blob in [r#"{"risk_per_trade": 0}"#, r#"{"risk_per_trade": 2.5}"#] {
            let params = StrategyParameters::from_json_str(blob);
            assert_eq!(params.risk_per_trade, DEFAULT_RISK_PER_TRADE);
        }
    }

    #[test]
    fn settings_map_overrides_defaults() {
        let mut settings = HashMap::new();
        settings.insert("MARKET_SYMBOL".to_string(), "ethusdt".to_string());
        settings.insert("HTTP_TIMEOUT_SECS".to_string(), "2.5".to_string());
        settings.insert("BINANCE_BASE_URL".to_string(), "http://localhost:9000/".to_string());
        let parsed = EngineSettings::from_settings_map(&settings).unwrap();
        assert_eq!(parsed.market_symbol, "ETHUSDT");
        assert_eq!(parsed.http_timeout, Duration::from_millis(2500));
        assert_eq!(parsed.binance_base_url, "http://localhost:9000");
        assert_eq!(parsed.initial_capital, DEFAULT_INITIAL_CAPITAL);
    }

    #[test]
    fn malformed_settings_are_errors() {
        let mut settings = HashMap::new();
        settings.insert("HTTP_MAX_ATTEMPTS".to_string(), "zero".to_string());
        assert!(matches!(
            EngineSettings::from_settings_map(&settings),
            Err(EngineError::Configuration(_))
        ));
    }
}
