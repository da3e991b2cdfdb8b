use crate::models::Series;
use serde::Serialize;
use statrs::statistics::Statistics;

pub const SMA_SHORT_PERIOD: usize = 20;
pub const SMA_MEDIUM_PERIOD: usize = 50;
pub const SMA_LONG_PERIOD: usize = 200;
pub const EMA_FAST_PERIOD: usize = 12;
pub const EMA_SLOW_PERIOD: usize = 26;
pub const MACD_SIGNAL_PERIOD: usize = 9;
pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD_DEV: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;

/// Bars of history needed before every indicator in the set holds a real value.
pub const WARMUP_BARS: usize = SMA_LONG_PERIOD;

pub const RSI_PLACEHOLDER: f64 = 50.0;
const RSI_LOSS_FLOOR: f64 = 1e-6;

pub const INDICATOR_NAMES: [&str; 13] = [
    "sma_20",
    "sma_50",
    "sma_200",
    "ema_12",
    "ema_26",
    "macd",
    "macd_signal",
    "macd_histogram",
    "rsi",
    "bollinger_upper",
    "bollinger_middle",
    "bollinger_lower",
    "atr",
];

pub fn calculate_sma(prices: &[f64], period: usize) -> Vec<f64> {
    let mut sma_values = vec![0.0; prices.len()];
    if period == 0 || prices.len() < period {
        return sma_values;
    }

    for i in (period - 1)..prices.len() {
        let window = &prices[i + 1 - period..=i];
        sma_values[i] = window.iter().sum::<f64>() / period as f64;
    }

    sma_values
}

pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_values = Vec::with_capacity(prices.len());
    ema_values.push(prices[0]);

    for i in 1..prices.len() {
        let ema = (prices[i] * multiplier) + (ema_values[i - 1] * (1.0 - multiplier));
        ema_values.push(ema);
    }

    ema_values
}

pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = calculate_ema(prices, fast_period);
    let slow_ema = calculate_ema(prices, slow_period);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(fast, slow)| fast - slow)
        .collect();

    let signal_line = calculate_ema(&macd_line, signal_period);

    let histogram = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(macd, signal)| macd - signal)
        .collect();

    (macd_line, signal_line, histogram)
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return RSI_PLACEHOLDER;
    }
    let avg_loss = if avg_loss == 0.0 {
        RSI_LOSS_FLOOR
    } else {
        avg_loss
    };
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// RSI over simple rolling means of gains and losses (no Wilder smoothing).
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<f64> {
    let mut rsi_values = vec![RSI_PLACEHOLDER; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return rsi_values;
    }

    for i in period..prices.len() {
        let mut sum_gain = 0.0;
        let mut sum_loss = 0.0;
        for j in (i + 1 - period)..=i {
            let delta = prices[j] - prices[j - 1];
            if delta > 0.0 {
                sum_gain += delta;
            } else {
                sum_loss -= delta;
            }
        }
        rsi_values[i] = rsi_from_avgs(sum_gain / period as f64, sum_loss / period as f64);
    }

    rsi_values
}

/// Sample standard deviation over a trailing window, 0 before the window fills.
pub fn calculate_rolling_std(prices: &[f64], period: usize) -> Vec<f64> {
    let mut std_values = vec![0.0; prices.len()];
    if period < 2 || prices.len() < period {
        return std_values;
    }

    for i in (period - 1)..prices.len() {
        let std_dev = prices[i + 1 - period..=i].iter().std_dev();
        std_values[i] = if std_dev.is_finite() { std_dev } else { 0.0 };
    }

    std_values
}

pub fn calculate_bollinger_bands(
    prices: &[f64],
    period: usize,
    std_dev: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = calculate_sma(prices, period);
    let rolling_std = calculate_rolling_std(prices, period);

    let upper = middle
        .iter()
        .zip(rolling_std.iter())
        .map(|(mean, sd)| mean + std_dev * sd)
        .collect();
    let lower = middle
        .iter()
        .zip(rolling_std.iter())
        .map(|(mean, sd)| mean - std_dev * sd)
        .collect();

    (upper, middle, lower)
}

/// True range; the first bar has no previous close and uses high - low.
pub fn calculate_true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let n = highs.len().min(lows.len()).min(closes.len());
    let mut tr_values = Vec::with_capacity(n);
    for i in 0..n {
        let range = highs[i] - lows[i];
        if i == 0 {
            tr_values.push(range);
            continue;
        }
        let prev_close = closes[i - 1];
        tr_values.push(
            range
                .max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs()),
        );
    }
    tr_values
}

pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let tr_values = calculate_true_range(highs, lows, closes);
    calculate_sma(&tr_values, period)
}

/// Index-aligned indicator battery for one series.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndicatorSet {
    pub sma_20: Vec<f64>,
    pub sma_50: Vec<f64>,
    pub sma_200: Vec<f64>,
    pub ema_12: Vec<f64>,
    pub ema_26: Vec<f64>,
    pub macd: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub macd_histogram: Vec<f64>,
    pub rsi: Vec<f64>,
    pub bollinger_upper: Vec<f64>,
    pub bollinger_middle: Vec<f64>,
    pub bollinger_lower: Vec<f64>,
    pub atr: Vec<f64>,
}

/// Every indicator value at one bar index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub sma_20: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    pub ema_12: f64,
    pub ema_26: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub rsi: f64,
    pub bollinger_upper: f64,
    pub bollinger_middle: f64,
    pub bollinger_lower: f64,
    pub atr: f64,
}

impl IndicatorSet {
    pub fn len(&self) -> usize {
        self.sma_20.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sma_20.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        let values = match name {
            "sma_20" => &self.sma_20,
            "sma_50" => &self.sma_50,
            "sma_200" => &self.sma_200,
            "ema_12" => &self.ema_12,
            "ema_26" => &self.ema_26,
            "macd" => &self.macd,
            "macd_signal" => &self.macd_signal,
            "macd_histogram" => &self.macd_histogram,
            "rsi" => &self.rsi,
            "bollinger_upper" => &self.bollinger_upper,
            "bollinger_middle" => &self.bollinger_middle,
            "bollinger_lower" => &self.bollinger_lower,
            "atr" => &self.atr,
            _ => return None,
        };
        Some(values.as_slice())
    }

    pub fn snapshot(&self, index: usize) -> Option<IndicatorSnapshot> {
        if index >= self.len() {
            return None;
        }
        Some(IndicatorSnapshot {
            sma_20: self.sma_20[index],
            sma_50: self.sma_50[index],
            sma_200: self.sma_200[index],
            ema_12: self.ema_12[index],
            ema_26: self.ema_26[index],
            macd: self.macd[index],
            macd_signal: self.macd_signal[index],
            macd_histogram: self.macd_histogram[index],
            rsi: self.rsi[index],
            bollinger_upper: self.bollinger_upper[index],
            bollinger_middle: self.bollinger_middle[index],
            bollinger_lower: self.bollinger_lower[index],
            atr: self.atr[index],
        })
    }

    pub fn latest(&self) -> Option<IndicatorSnapshot> {
        self.len().checked_sub(1).and_then(|index| self.snapshot(index))
    }
}

pub fn compute_indicators(series: &Series) -> IndicatorSet {
    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();

    let (macd, macd_signal, macd_histogram) = calculate_macd(
        &closes,
        EMA_FAST_PERIOD,
        EMA_SLOW_PERIOD,
        MACD_SIGNAL_PERIOD,
    );
    let (bollinger_upper, bollinger_middle, bollinger_lower) =
        calculate_bollinger_bands(&closes, BOLLINGER_PERIOD, BOLLINGER_STD_DEV);

    IndicatorSet {
        sma_20: calculate_sma(&closes, SMA_SHORT_PERIOD),
        sma_50: calculate_sma(&closes, SMA_MEDIUM_PERIOD),
        sma_200: calculate_sma(&closes, SMA_LONG_PERIOD),
        ema_12: calculate_ema(&closes, EMA_FAST_PERIOD),
        ema_26: calculate_ema(&closes, EMA_SLOW_PERIOD),
        macd,
        macd_signal,
        macd_histogram,
        rsi: calculate_rsi(&closes, RSI_PERIOD),
        bollinger_upper,
        bollinger_middle,
        bollinger_lower,
        atr: calculate_atr(&highs, &lows, &closes, ATR_PERIOD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_uses_placeholder_until_window_fills() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sma = calculate_sma(&prices, 3);
        assert_eq!(sma, vec![0.0, 0.0, 2.0, 3.0, 4.0]);
        assert_eq!(calculate_sma(&prices, 10), vec![0.0; 5]);
    }

    #[test]
    fn ema_is_seeded_with_first_price() {
        let prices = [10.0, 11.0, 12.0];
        let ema = calculate_ema(&prices, 3);
        assert_eq!(ema[0], 10.0);
        assert!((ema[1] - 10.5).abs() < 1e-12);
        assert!((ema[2] - 11.25).abs() < 1e-12);
        assert!(calculate_ema(&[], 3).is_empty());
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64).sin() * 5.0).collect();
        let (line, signal, histogram) = calculate_macd(&prices, 12, 26, 9);
        assert_eq!(line[0], 0.0);
        for i in 0..prices.len() {
            assert!((histogram[i] - (line[i] - signal[i])).abs() < 1e-12);
        }
    }

    #[test]
    fn rsi_is_neutral_on_flat_prices() {
        let prices = vec![100.0; 30];
        assert!(calculate_rsi(&prices, 14).iter().all(|v| *v == 50.0));
    }

    #[test]
    fn rsi_uses_simple_rolling_means() {
        let mut prices = vec![100.0];
        for i in 1..=15 {
            let step = if i % 2 == 0 { -1.0 } else { 2.0 };
            prices.push(prices[i - 1] + step);
        }
        let rsi = calculate_rsi(&prices, 14);
        assert_eq!(rsi[13], 50.0);
        // Window 1..=14: seven +2 moves and seven -1 moves.
        let expected = 100.0 - 100.0 / (1.0 + 14.0 / 7.0);
        assert!((rsi[14] - expected).abs() < 1e-9);
    }

    #[test]
    fn rsi_saturates_when_only_gains() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rsi = calculate_rsi(&prices, 14);
        assert!(rsi[14] > 99.99 && rsi[14] <= 100.0);
    }

    #[test]
    fn bollinger_uses_sample_standard_deviation() {
        let prices = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (upper, middle, lower) = calculate_bollinger_bands(&prices, 8, 2.0);
        let sample_sd = (32.0_f64 / 7.0).sqrt();
        assert!((middle[7] - 5.0).abs() < 1e-12);
        assert!((upper[7] - (5.0 + 2.0 * sample_sd)).abs() < 1e-9);
        assert!((lower[7] - (5.0 - 2.0 * sample_sd)).abs() < 1e-9);
        assert_eq!(upper[6], 0.0);
        assert_eq!(lower[0], 0.0);
    }

    #[test]
    fn atr_first_true_range_is_high_minus_low() {
        let highs = [11.0, 12.0, 13.0];
        let lows = [9.0, 10.0, 12.5];
        let closes = [10.0, 11.0, 13.0];
        let tr = calculate_true_range(&highs, &lows, &closes);
        assert_eq!(tr, vec![2.0, 2.0, 2.0]);
        let atr = calculate_atr(&highs, &lows, &closes, 2);
        assert_eq!(atr, vec![0.0, 2.0, 2.0]);
    }

    #[test]
    fn indicator_set_lookup_matches_fields() {
        let set = IndicatorSet {
            rsi: vec![42.0],
            ..Default::default()
        };
        assert_eq!(set.get("rsi"), Some(&[42.0][..]));
        assert!(set.get("vwap").is_none());
    }
}
