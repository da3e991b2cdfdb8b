use crate::indicators::IndicatorSet;
use crate::models::{MarketSignal, Series, SignalAction};

pub const SIGNAL_CONFIDENCE: f64 = 0.75;
pub const SIGNAL_RSI_OVERSOLD: f64 = 30.0;
pub const SIGNAL_RSI_OVERBOUGHT: f64 = 70.0;

/// Interpret the latest bar. The MACD rule overrides the RSI direction; reasons accumulate.
pub fn generate_market_signal(series: &Series, indicators: &IndicatorSet) -> Option<MarketSignal> {
    let bar = series.last()?;
    let latest = indicators.latest()?;

    let mut action = None;
    let mut reasons = Vec::new();

    if latest.rsi < SIGNAL_RSI_OVERSOLD {
        action = Some(SignalAction::Buy);
        reasons.push("RSI oversold");
    } else if latest.rsi > SIGNAL_RSI_OVERBOUGHT {
        action = Some(SignalAction::Sell);
        reasons.push("RSI overbought");
    }

    if latest.macd > latest.macd_signal && latest.macd > 0.0 {
        action = Some(SignalAction::Buy);
        reasons.push("MACD bullish crossover");
    } else if latest.macd < latest.macd_signal && latest.macd < 0.0 {
        action = Some(SignalAction::Sell);
        reasons.push("MACD bearish crossover");
    }

    action.map(|signal_type| MarketSignal {
        timestamp: bar.timestamp,
        signal_type,
        price: bar.close,
        confidence: SIGNAL_CONFIDENCE,
        reason: reasons.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute_indicators;
    use crate::models::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> Series {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Bar {
                timestamp: start + Duration::hours(i as i64),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 1.0,
            })
            .collect();
        Series::new(bars).unwrap()
    }

    #[test]
    fn flat_market_has_no_signal() {
        let data = series(&[100.0; 60]);
        let indicators = compute_indicators(&data);
        assert!(generate_market_signal(&data, &indicators).is_none());
    }

    #[test]
    fn steady_rally_is_overbought_but_macd_bullish() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let data = series(&closes);
        let indicators = compute_indicators(&data);
        let signal = generate_market_signal(&data, &indicators).unwrap();
        assert_eq!(signal.signal_type, SignalAction::Buy);
        assert_eq!(signal.reason, "RSI overbought, MACD bullish crossover");
        assert_eq!(signal.price, 159.0);
        assert_eq!(signal.confidence, SIGNAL_CONFIDENCE);
    }

    #[test]
    fn steady_decline_is_a_sell() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let data = series(&closes);
        let indicators = compute_indicators(&data);
        let signal = generate_market_signal(&data, &indicators).unwrap();
        assert_eq!(signal.signal_type, SignalAction::Sell);
        assert_eq!(signal.reason, "RSI oversold, MACD bearish crossover");
    }
}
