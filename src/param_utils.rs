use log::warn;
use serde_json::Value;
use std::collections::HashMap;

/// Parameters split into numeric and textual values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap {
    pub numbers: HashMap<String, f64>,
    pub text: HashMap<String, String>,
}

/// Normalize a raw JSON object into numeric and text parameters, skipping unusable values.
pub fn normalize_parameter_map(raw: HashMap<String, Value>) -> ParameterMap {
    let mut cleaned = ParameterMap::default();

    for (key, value) in raw.into_iter() {
        if let Some(num) = value.as_f64() {
            if num.is_finite() {
                cleaned.numbers.insert(key, num);
            } else {
                warn!(
                    "Skipping parameter `{}` due to non-finite numeric value {}",
                    key, value
                );
            }
            continue;
        }

        if let Some(text) = value.as_str() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                warn!("Skipping parameter `{}` due to empty string value", key);
                continue;
            }
            match trimmed.parse::<f64>() {
                Ok(parsed) if parsed.is_finite() => {
                    cleaned.numbers.insert(key, parsed);
                }
                Ok(parsed) => {
                    warn!(
                        "Skipping parameter `{}` due to non-finite parsed value {}",
                        key, parsed
                    );
                }
                Err(_) => {
                    cleaned.text.insert(key, trimmed.to_string());
                }
            }
            continue;
        }

        if let Some(boolean) = value.as_bool() {
            cleaned
                .numbers
                .insert(key, if boolean { 1.0 } else { 0.0 });
            continue;
        }

        if value.is_null() {
            warn!("Skipping parameter `{}` due to null value", key);
        } else {
            warn!(
                "Skipping parameter `{}` due to unsupported composite value {}",
                key, value
            );
        }
    }

    cleaned
}

/// Extract a parameter as usize with a default value
pub fn get_param_usize(params: &HashMap<String, f64>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as usize)
        .unwrap_or(default)
}

/// Extract a parameter as f64 with a default value
pub fn get_param_f64(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Extract a parameter as usize with a minimum value
pub fn get_usize_param_min(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
    min: usize,
) -> usize {
    get_param_usize(params, key, default).max(min)
}

/// Get a finite parameter value, returns None if not found or not finite
pub fn finite_param(params: &HashMap<String, f64>, key: &str) -> Option<f64> {
    params.get(key).copied().filter(|v| v.is_finite())
}

/// Accept a value only inside `[min, max]`, otherwise warn and return the default
pub fn param_in_range_or_default(
    params: &HashMap<String, f64>,
    key: &str,
    default: f64,
    min: f64,
    max: f64,
) -> f64 {
    match finite_param(params, key) {
        Some(value) if value >= min && value <= max => value,
        Some(value) => {
            warn!(
                "Parameter `{}` = {} outside [{}, {}]; using default {}",
                key, value, min, max, default
            );
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_numbers_strings_and_booleans() {
        let raw: HashMap<String, Value> = serde_json::from_value(json!({
            "risk_per_trade": "0.05",
            "rsi_oversold": 25,
            "flag": true,
            "strategy_type": "rsi",
            "nested": {"a": 1},
            "missing": null
        }))
        .unwrap();
        let map = normalize_parameter_map(raw);
        assert_eq!(map.numbers.get("risk_per_trade"), Some(&0.05));
        assert_eq!(map.numbers.get("rsi_oversold"), Some(&25.0));
        assert_eq!(map.numbers.get("flag"), Some(&1.0));
        assert_eq!(map.text.get("strategy_type").map(String::as_str), Some("rsi"));
        assert!(!map.numbers.contains_key("nested"));
        assert!(!map.numbers.contains_key("missing"));
    }

    #[test]
    fn range_check_falls_back_to_default() {
        let mut params = HashMap::new();
        params.insert("risk".to_string(), 1.5);
        assert_eq!(param_in_range_or_default(&params, "risk", 0.02, 0.0, 1.0), 0.02);
        params.insert("risk".to_string(), 0.1);
        assert_eq!(param_in_range_or_default(&params, "risk", 0.02, 0.0, 1.0), 0.1);
    }

    #[test]
    fn usize_params_round_and_respect_minimum() {
        let mut params = HashMap::new();
        params.insert("window".to_string(), 13.6);
        assert_eq!(get_param_usize(&params, "window", 5), 14);
        params.insert("window".to_string(), -3.0);
        assert_eq!(get_usize_param_min(&params, "window", 5, 2), 5);
        assert_eq!(get_usize_param_min(&params, "other", 1, 2), 2);
    }
}
