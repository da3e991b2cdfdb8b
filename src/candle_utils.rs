use crate::error::{EngineError, EngineResult};
use crate::models::Bar;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::debug;
use std::ops::Range;

/// Sorts bars ascending by timestamp and drops later duplicates of the same timestamp.
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let before = bars.len();
    bars.dedup_by(|later, earlier| later.timestamp == earlier.timestamp);
    if bars.len() != before {
        debug!(
            "Dropped {} bar(s) with duplicate timestamps",
            before - bars.len()
        );
    }
    bars
}

/// Checks ordering and OHLCV invariants for a bar sequence.
pub fn validate_bars(bars: &[Bar]) -> EngineResult<()> {
    for (index, bar) in bars.iter().enumerate() {
        validate_bar(index, bar)?;
        if index > 0 && bars[index - 1].timestamp >= bar.timestamp {
            return Err(EngineError::InvalidData(format!(
                "bar {} at {} is not after the previous bar",
                index, bar.timestamp
            )));
        }
    }
    Ok(())
}

fn validate_bar(index: usize, bar: &Bar) -> EngineResult<()> {
    let prices = [bar.open, bar.high, bar.low, bar.close];
    if prices.iter().any(|price| !price.is_finite() || *price <= 0.0) {
        return Err(EngineError::InvalidData(format!(
            "bar {} at {} has a non-positive price",
            index, bar.timestamp
        )));
    }
    if !bar.volume.is_finite() || bar.volume < 0.0 {
        return Err(EngineError::InvalidData(format!(
            "bar {} at {} has a negative volume",
            index, bar.timestamp
        )));
    }
    if bar.high < bar.open.max(bar.close).max(bar.low) || bar.low > bar.open.min(bar.close) {
        return Err(EngineError::InvalidData(format!(
            "bar {} at {} has high/low outside its open/close",
            index, bar.timestamp
        )));
    }
    Ok(())
}

/// First instant of `start` through the last millisecond of `end`, both UTC.
pub fn day_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let lower = start.and_time(chrono::NaiveTime::MIN).and_utc();
    let upper = (end + Duration::days(1)).and_time(chrono::NaiveTime::MIN).and_utc()
        - Duration::milliseconds(1);
    (lower, upper)
}

/// Index range of bars whose timestamps fall within `[start, end]` (inclusive days).
pub fn window_range(bars: &[Bar], start: NaiveDate, end: NaiveDate) -> Range<usize> {
    let (lower, upper) = day_bounds(start, end);
    let first = bars.partition_point(|bar| bar.timestamp < lower);
    let last = bars.partition_point(|bar| bar.timestamp <= upper);
    first..last.max(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn normalize_sorts_and_dedupes() {
        let bars = vec![bar(3, 103.0), bar(1, 101.0), bar(3, 999.0), bar(2, 102.0)];
        let normalized = normalize_bars(bars);
        let closes: Vec<f64> = normalized.iter().map(|b| b.close).collect();
        assert_eq!(closes.len(), 3);
        assert_eq!(closes[0], 101.0);
        assert_eq!(closes[1], 102.0);
    }

    #[test]
    fn validate_rejects_out_of_order_bars() {
        let bars = vec![bar(2, 100.0), bar(1, 100.0)];
        assert!(matches!(
            validate_bars(&bars),
            Err(EngineError::InvalidData(_))
        ));
    }

    #[test]
    fn validate_rejects_high_below_close() {
        let mut broken = bar(1, 100.0);
        broken.high = 99.5;
        assert!(validate_bars(&[broken]).is_err());
    }

    #[test]
    fn window_range_is_inclusive_of_end_day() {
        let mut bars: Vec<Bar> = (1..=10).map(|d| bar(d, 100.0 + d as f64)).collect();
        bars[9].timestamp = Utc.with_ymd_and_hms(2024, 1, 10, 23, 0, 0).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(window_range(&bars, start, end), 2..10);
    }

    #[test]
    fn window_range_empty_when_outside_data() {
        let bars: Vec<Bar> = (1..=5).map(|d| bar(d, 100.0)).collect();
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        assert!(window_range(&bars, start, end).is_empty());
    }
}
