use crate::condition::{Condition, SignalMap, SignalValue};
use crate::error::{EngineError, EngineResult};
use crate::indicators::{
    calculate_atr, calculate_bollinger_bands, calculate_ema, calculate_macd, calculate_rsi,
    calculate_sma,
};
use crate::models::{Series, SignalAction};
use crate::param_utils::{get_param_f64, get_usize_param_min, normalize_parameter_map};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

pub const DEFAULT_CONFLUENCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCategory {
    Trend,
    Momentum,
    Volatility,
}

impl IndicatorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            IndicatorCategory::Trend => "trend",
            IndicatorCategory::Momentum => "momentum",
            IndicatorCategory::Volatility => "volatility",
        }
    }
}

/// Latest value of one configured indicator plus its BUY/SELL/HOLD reading.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReading {
    pub value: f64,
    pub extras: Vec<(&'static str, f64)>,
    pub interpretation: SignalAction,
}

type IndicatorFn = fn(&Series, &HashMap<String, f64>) -> IndicatorReading;

/// Registry entry resolving an indicator name to its computation.
pub struct IndicatorSpec {
    pub name: &'static str,
    pub category: IndicatorCategory,
    pub extra_keys: &'static [&'static str],
    compute: IndicatorFn,
}

impl fmt::Debug for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorSpec")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

impl IndicatorSpec {
    fn value_key(&self) -> String {
        format!("{}_{}", self.category.as_str(), self.name)
    }

    fn signal_key(&self) -> String {
        format!("signal_{}", self.value_key())
    }
}

pub static INDICATOR_REGISTRY: &[IndicatorSpec] = &[
    IndicatorSpec {
        name: "rsi",
        category: IndicatorCategory::Momentum,
        extra_keys: &[],
        compute: rsi_reading,
    },
    IndicatorSpec {
        name: "macd",
        category: IndicatorCategory::Trend,
        extra_keys: &["signal", "histogram"],
        compute: macd_reading,
    },
    IndicatorSpec {
        name: "sma",
        category: IndicatorCategory::Trend,
        extra_keys: &[],
        compute: sma_reading,
    },
    IndicatorSpec {
        name: "ema",
        category: IndicatorCategory::Trend,
        extra_keys: &[],
        compute: ema_reading,
    },
    IndicatorSpec {
        name: "bollinger",
        category: IndicatorCategory::Volatility,
        extra_keys: &["upper", "lower"],
        compute: bollinger_reading,
    },
    IndicatorSpec {
        name: "atr",
        category: IndicatorCategory::Volatility,
        extra_keys: &[],
        compute: atr_reading,
    },
];

pub fn lookup_indicator(name: &str) -> EngineResult<&'static IndicatorSpec> {
    let normalized = name.trim().to_ascii_lowercase();
    INDICATOR_REGISTRY
        .iter()
        .find(|spec| spec.name == normalized)
        .ok_or_else(|| EngineError::UnknownIndicator(name.to_string()))
}

fn last_or_zero(values: &[f64]) -> f64 {
    values.last().copied().unwrap_or(0.0)
}

fn last_close(series: &Series) -> f64 {
    series.last().map(|bar| bar.close).unwrap_or(0.0)
}

fn rsi_reading(series: &Series, params: &HashMap<String, f64>) -> IndicatorReading {
    let period = get_usize_param_min(params, "window", 14, 1);
    let value = last_or_zero(&calculate_rsi(&series.closes(), period));
    let interpretation = if value > get_param_f64(params, "overbought", 70.0) {
        SignalAction::Sell
    } else if value < get_param_f64(params, "oversold", 30.0) {
        SignalAction::Buy
    } else {
        SignalAction::Hold
    };
    IndicatorReading {
        value,
        extras: Vec::new(),
        interpretation,
    }
}

fn macd_reading(series: &Series, params: &HashMap<String, f64>) -> IndicatorReading {
    let (line, signal, histogram) = calculate_macd(
        &series.closes(),
        get_usize_param_min(params, "window_fast", 12, 1),
        get_usize_param_min(params, "window_slow", 26, 1),
        get_usize_param_min(params, "window_sign", 9, 1),
    );
    let value = last_or_zero(&line);
    let signal_value = last_or_zero(&signal);
    let interpretation = if value > signal_value && value > 0.0 {
        SignalAction::Buy
    } else if value < signal_value && value < 0.0 {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    };
    IndicatorReading {
        value,
        extras: vec![("signal", signal_value), ("histogram", last_or_zero(&histogram))],
        interpretation,
    }
}

fn price_versus_average(close: f64, average: f64) -> SignalAction {
    if average == 0.0 {
        SignalAction::Hold
    } else if close > average {
        SignalAction::Buy
    } else if close < average {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    }
}

fn sma_reading(series: &Series, params: &HashMap<String, f64>) -> IndicatorReading {
    let window = get_usize_param_min(params, "window", 20, 1);
    let value = last_or_zero(&calculate_sma(&series.closes(), window));
    IndicatorReading {
        value,
        extras: Vec::new(),
        interpretation: price_versus_average(last_close(series), value),
    }
}

fn ema_reading(series: &Series, params: &HashMap<String, f64>) -> IndicatorReading {
    let window = get_usize_param_min(params, "window", 20, 1);
    let value = last_or_zero(&calculate_ema(&series.closes(), window));
    IndicatorReading {
        value,
        extras: Vec::new(),
        interpretation: price_versus_average(last_close(series), value),
    }
}

/// Value is %B: where the close sits between the bands (0 = lower, 1 = upper).
fn bollinger_reading(series: &Series, params: &HashMap<String, f64>) -> IndicatorReading {
    let window = get_usize_param_min(params, "window", 20, 2);
    let deviations = get_param_f64(params, "window_dev", 2.0);
    let (upper, _, lower) = calculate_bollinger_bands(&series.closes(), window, deviations);
    let upper = last_or_zero(&upper);
    let lower = last_or_zero(&lower);
    let close = last_close(series);

    let width = upper - lower;
    let percent_b = if width > 0.0 {
        (close - lower) / width
    } else {
        0.5
    };
    let interpretation = if width <= 0.0 {
        SignalAction::Hold
    } else if close > upper {
        SignalAction::Sell
    } else if close < lower {
        SignalAction::Buy
    } else {
        SignalAction::Hold
    };
    IndicatorReading {
        value: percent_b,
        extras: vec![("upper", upper), ("lower", lower)],
        interpretation,
    }
}

fn atr_reading(series: &Series, params: &HashMap<String, f64>) -> IndicatorReading {
    let window = get_usize_param_min(params, "window", 14, 1);
    let value = last_or_zero(&calculate_atr(
        &series.highs(),
        &series.lows(),
        &series.closes(),
        window,
    ));
    IndicatorReading {
        value,
        extras: Vec::new(),
        interpretation: SignalAction::Hold,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    pub name: String,
    #[serde(flatten)]
    pub params: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub condition: String,
    pub signal: String,
    #[serde(default = "default_rule_weight")]
    pub weight: f64,
}

fn default_rule_weight() -> f64 {
    1.0
}

fn default_confluence_threshold() -> f64 {
    DEFAULT_CONFLUENCE_THRESHOLD
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub technical_indicators: Vec<IndicatorConfig>,
    #[serde(default)]
    pub signal_combination_rules: Vec<RuleConfig>,
    #[serde(default = "default_confluence_threshold")]
    pub confluence_threshold: f64,
}

#[derive(Debug)]
struct ConfiguredIndicator {
    spec: &'static IndicatorSpec,
    params: HashMap<String, f64>,
}

#[derive(Debug)]
struct CombinationRule {
    condition: Condition,
    signal: SignalAction,
    weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub signal_type: SignalAction,
    pub confidence: f64,
    pub reason: String,
    pub raw_signals: BTreeMap<String, SignalValue>,
}

/// Weighted rule combination over a configured set of indicators.
#[derive(Debug)]
pub struct MarketAnalyzer {
    indicators: Vec<ConfiguredIndicator>,
    rules: Vec<CombinationRule>,
    confluence_threshold: f64,
}

impl MarketAnalyzer {
    pub fn from_json_str(blob: &str) -> EngineResult<Self> {
        let config: AnalyzerConfig = serde_json::from_str(blob)?;
        Self::from_config(config)
    }

    /// Resolve indicators and parse every rule condition up front.
    pub fn from_config(config: AnalyzerConfig) -> EngineResult<Self> {
        let mut indicators = Vec::with_capacity(config.technical_indicators.len());
        for indicator in config.technical_indicators {
            let spec = lookup_indicator(&indicator.name)?;
            let params = normalize_parameter_map(indicator.params).numbers;
            indicators.push(ConfiguredIndicator { spec, params });
        }

        let mut rules = Vec::with_capacity(config.signal_combination_rules.len());
        for rule in config.signal_combination_rules {
            if !rule.weight.is_finite() || rule.weight < 0.0 {
                return Err(EngineError::Configuration(format!(
                    "rule `{}` has invalid weight {}",
                    rule.condition, rule.weight
                )));
            }
            rules.push(CombinationRule {
                condition: Condition::parse(&rule.condition)?,
                signal: rule.signal.parse()?,
                weight: rule.weight,
            });
        }

        if !config.confluence_threshold.is_finite()
            || !(0.0..=1.0).contains(&config.confluence_threshold)
        {
            return Err(EngineError::Configuration(format!(
                "confluence_threshold must be within [0, 1] (value: {})",
                config.confluence_threshold
            )));
        }

        let analyzer = Self {
            indicators,
            rules,
            confluence_threshold: config.confluence_threshold,
        };
        analyzer.warn_on_unknown_signals();
        Ok(analyzer)
    }

    /// Every signal key the configured indicators produce.
    pub fn signal_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        for indicator in &self.indicators {
            let value_key = indicator.spec.value_key();
            for extra in indicator.spec.extra_keys {
                names.insert(format!("{}_{}", value_key, extra));
            }
            names.insert(indicator.spec.signal_key());
            names.insert(value_key);
        }
        names
    }

    fn warn_on_unknown_signals(&self) {
        let known = self.signal_names();
        for rule in &self.rules {
            for name in rule.condition.signal_names() {
                if !known.contains(name) {
                    warn!(
                        "Rule `{}` references `{}`, which no configured indicator produces",
                        rule.condition.source(),
                        name
                    );
                }
            }
        }
    }

    pub fn compute_signals(&self, series: &Series) -> SignalMap {
        let mut signals = SignalMap::new();
        for indicator in &self.indicators {
            let reading = (indicator.spec.compute)(series, &indicator.params);
            let value_key = indicator.spec.value_key();
            for (extra, value) in &reading.extras {
                signals.insert(format!("{}_{}", value_key, extra), SignalValue::Number(*value));
            }
            signals.insert(
                indicator.spec.signal_key(),
                SignalValue::Action(reading.interpretation),
            );
            signals.insert(value_key, SignalValue::Number(reading.value));
        }
        signals
    }

    pub fn analyze(&self, series: &Series) -> EngineResult<AnalysisOutcome> {
        if series.is_empty() {
            return Err(EngineError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let signals = self.compute_signals(series);
        let (signal_type, confidence, reason) = self.combine(&signals);
        Ok(AnalysisOutcome {
            signal_type,
            confidence,
            reason,
            raw_signals: signals.into_iter().collect(),
        })
    }

    fn combine(&self, signals: &SignalMap) -> (SignalAction, f64, String) {
        let mut weighted: Vec<(SignalAction, f64)> = Vec::new();
        let mut reasons = Vec::new();

        for rule in &self.rules {
            if !rule.condition.evaluate(signals) {
                continue;
            }
            debug!("Rule `{}` matched", rule.condition.source());
            match weighted.iter_mut().find(|(signal, _)| *signal == rule.signal) {
                Some((_, total)) => *total += rule.weight,
                None => weighted.push((rule.signal, rule.weight)),
            }
            reasons.push(format!(
                "rule '{}' -> {} ({})",
                rule.condition.source(),
                rule.signal,
                rule.weight
            ));
        }

        if weighted.is_empty() {
            return (
                SignalAction::Hold,
                0.0,
                "No combination rule matched".to_string(),
            );
        }

        let mut winner = weighted[0];
        for candidate in weighted.iter().skip(1) {
            if candidate.1 > winner.1 {
                winner = *candidate;
            }
        }
        let total_weight: f64 = weighted.iter().map(|(_, weight)| weight).sum();
        let confidence = if total_weight > 0.0 {
            winner.1 / total_weight
        } else {
            0.0
        };
        let reason = reasons.join(", ");

        if confidence < self.confluence_threshold {
            return (
                SignalAction::Hold,
                confidence,
                format!(
                    "{} (confidence {:.2} below confluence threshold {:.2})",
                    reason, confidence, self.confluence_threshold
                ),
            );
        }

        (winner.0, confidence, reason)
    }
}
