use crate::candle_utils::normalize_bars;
use crate::error::{EngineError, EngineResult};
use crate::models::{Bar, Series};
use chrono::{Duration, TimeZone, Utc};
use log::{debug, warn};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kline interval accepted by the market data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
    ThreeDays,
    OneWeek,
    OneMonth,
}

impl Interval {
    pub const ALL: [Interval; 15] = [
        Interval::OneMinute,
        Interval::ThreeMinutes,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::FourHours,
        Interval::SixHours,
        Interval::EightHours,
        Interval::TwelveHours,
        Interval::OneDay,
        Interval::ThreeDays,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::SixHours => "6h",
            Interval::EightHours => "8h",
            Interval::TwelveHours => "12h",
            Interval::OneDay => "1d",
            Interval::ThreeDays => "3d",
            Interval::OneWeek => "1w",
            Interval::OneMonth => "1M",
        }
    }

    /// Nominal bar length (a month counts as 30 days).
    pub fn duration(self) -> Duration {
        match self {
            Interval::OneMinute => Duration::minutes(1),
            Interval::ThreeMinutes => Duration::minutes(3),
            Interval::FiveMinutes => Duration::minutes(5),
            Interval::FifteenMinutes => Duration::minutes(15),
            Interval::ThirtyMinutes => Duration::minutes(30),
            Interval::OneHour => Duration::hours(1),
            Interval::TwoHours => Duration::hours(2),
            Interval::FourHours => Duration::hours(4),
            Interval::SixHours => Duration::hours(6),
            Interval::EightHours => Duration::hours(8),
            Interval::TwelveHours => Duration::hours(12),
            Interval::OneDay => Duration::days(1),
            Interval::ThreeDays => Duration::days(3),
            Interval::OneWeek => Duration::weeks(1),
            Interval::OneMonth => Duration::days(30),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == trimmed)
            .ok_or_else(|| EngineError::InvalidRequest(format!("unsupported interval '{}'", s)))
    }
}

/// Provider of ordered historical bars.
pub trait HistoricalDataSource: Send + Sync {
    fn name(&self) -> &str;

    /// The most recent `limit` bars at `interval`, ascending. Never returns an empty series.
    fn fetch(&self, interval: Interval, limit: usize) -> EngineResult<Series>;

    /// Latest traded price. Defaults to the close of the newest one-minute bar.
    fn current_price(&self) -> EngineResult<f64> {
        let series = self.fetch(Interval::OneMinute, 1)?;
        series.last().map(|bar| bar.close).ok_or_else(|| {
            EngineError::DataSource(format!("{} returned no price", self.name()))
        })
    }
}

/// Normalize raw bars into a validated, non-empty series.
pub fn finalize_bars(source: &str, bars: Vec<Bar>, limit: usize) -> EngineResult<Series> {
    let normalized = normalize_bars(bars);
    if normalized.is_empty() {
        return Err(EngineError::DataSource(format!(
            "{} returned no bars",
            source
        )));
    }
    let series = Series::new(normalized)?.tail(limit);
    debug!("{} returned {} bar(s)", source, series.len());
    Ok(series)
}

/// In-memory bars, mostly for tests and embedding callers.
#[derive(Debug, Clone)]
pub struct StaticDataSource {
    series: Series,
}

impl StaticDataSource {
    pub fn new(series: Series) -> Self {
        Self { series }
    }

    pub fn from_bars(bars: Vec<Bar>) -> EngineResult<Self> {
        Ok(Self::new(Series::new(normalize_bars(bars))?))
    }
}

impl HistoricalDataSource for StaticDataSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(&self, _interval: Interval, limit: usize) -> EngineResult<Series> {
        if self.series.is_empty() || limit == 0 {
            return Err(EngineError::DataSource(
                "static source holds no bars".to_string(),
            ));
        }
        Ok(self.series.tail(limit))
    }
}

#[derive(Debug, Deserialize)]
struct CsvBarRecord {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Local snapshot of bars as a JSON array or CSV (`timestamp,open,high,low,close,volume`).
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
}

impl FileDataSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_bars(&self) -> EngineResult<Vec<Bar>> {
        let is_csv = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        if is_csv {
            self.load_csv()
        } else {
            let raw = fs::read_to_string(&self.path).map_err(|error| {
                EngineError::DataSource(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    error
                ))
            })?;
            serde_json::from_str(&raw).map_err(|error| {
                EngineError::DataSource(format!(
                    "failed to parse bars from {}: {}",
                    self.path.display(),
                    error
                ))
            })
        }
    }

    fn load_csv(&self) -> EngineResult<Vec<Bar>> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|error| {
            EngineError::DataSource(format!("failed to open {}: {}", self.path.display(), error))
        })?;

        let mut bars = Vec::new();
        for (line, record) in reader.deserialize::<CsvBarRecord>().enumerate() {
            let record = record.map_err(|error| {
                EngineError::DataSource(format!(
                    "bad CSV record {} in {}: {}",
                    line + 1,
                    self.path.display(),
                    error
                ))
            })?;
            let Some(timestamp) = Utc.timestamp_millis_opt(record.timestamp).single() else {
                warn!(
                    "Skipping CSV record {} with out-of-range timestamp {}",
                    line + 1,
                    record.timestamp
                );
                continue;
            };
            bars.push(Bar {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }
        Ok(bars)
    }
}

impl HistoricalDataSource for FileDataSource {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch(&self, interval: Interval, limit: usize) -> EngineResult<Series> {
        debug!(
            "Loading {} bars ({}) from {}",
            limit,
            interval,
            self.path.display()
        );
        finalize_bars(self.name(), self.load_bars()?, limit)
    }
}

/// Primary source with a secondary used only when the primary fails.
pub struct FallbackDataSource {
    primary: Box<dyn HistoricalDataSource>,
    secondary: Box<dyn HistoricalDataSource>,
}

impl FallbackDataSource {
    pub fn new(
        primary: Box<dyn HistoricalDataSource>,
        secondary: Box<dyn HistoricalDataSource>,
    ) -> Self {
        Self { primary, secondary }
    }
}

impl HistoricalDataSource for FallbackDataSource {
    fn name(&self) -> &str {
        "fallback"
    }

    fn fetch(&self, interval: Interval, limit: usize) -> EngineResult<Series> {
        let primary_error = match self.primary.fetch(interval, limit) {
            Ok(series) => return Ok(series),
            Err(error) => error,
        };
        warn!(
            "{} fetch failed ({}); trying {}",
            self.primary.name(),
            primary_error,
            self.secondary.name()
        );
        self.secondary
            .fetch(interval, limit)
            .map_err(|secondary_error| {
                EngineError::DataSource(format!(
                    "Failed to fetch Bitcoin data from all sources ({}: {}; {}: {})",
                    self.primary.name(),
                    primary_error,
                    self.secondary.name(),
                    secondary_error
                ))
            })
    }

    fn current_price(&self) -> EngineResult<f64> {
        let primary_error = match self.primary.current_price() {
            Ok(price) => return Ok(price),
            Err(error) => error,
        };
        warn!(
            "{} price lookup failed ({}); trying {}",
            self.primary.name(),
            primary_error,
            self.secondary.name()
        );
        self.secondary.current_price().map_err(|secondary_error| {
            EngineError::DataSource(format!(
                "Failed to fetch Bitcoin price from all sources ({}: {}; {}: {})",
                self.primary.name(),
                primary_error,
                self.secondary.name(),
                secondary_error
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bars(count: usize) -> Vec<Bar> {
        (0..count)
            .map(|i| Bar {
                timestamp: Utc.timestamp_millis_opt(1_700_000_000_000 + i as i64 * 86_400_000)
                    .unwrap(),
                open: 100.0 + i as f64,
                high: 102.0 + i as f64,
                low: 99.0 + i as f64,
                close: 101.0 + i as f64,
                volume: 5.0,
            })
            .collect()
    }

    struct FailingSource {
        calls: AtomicUsize,
    }

    impl HistoricalDataSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn fetch(&self, _interval: Interval, _limit: usize) -> EngineResult<Series> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::DataSource("boom".to_string()))
        }
    }

    #[test]
    fn interval_round_trips_through_strings() {
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::OneDay);
        assert_eq!("1M".parse::<Interval>().unwrap(), Interval::OneMonth);
        assert!("2d".parse::<Interval>().is_err());
        assert_eq!(Interval::FourHours.duration(), Duration::hours(4));
    }

    #[test]
    fn static_source_returns_latest_bars() {
        let source = StaticDataSource::from_bars(bars(10)).unwrap();
        let series = source.fetch(Interval::OneDay, 3).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.last().unwrap().close, 110.0);
    }

    #[test]
    fn fallback_uses_secondary_after_primary_failure() {
        let source = FallbackDataSource::new(
            Box::new(FailingSource {
                calls: AtomicUsize::new(0),
            }),
            Box::new(StaticDataSource::from_bars(bars(5)).unwrap()),
        );
        assert_eq!(source.fetch(Interval::OneDay, 10).unwrap().len(), 5);
    }

    #[test]
    fn current_price_defaults_to_latest_close() {
        let source = StaticDataSource::from_bars(bars(6)).unwrap();
        assert_eq!(source.current_price().unwrap(), 106.0);
    }

    #[test]
    fn fallback_price_uses_secondary_then_fails_without_default() {
        let source = FallbackDataSource::new(
            Box::new(FailingSource {
                calls: AtomicUsize::new(0),
            }),
            Box::new(StaticDataSource::from_bars(bars(3)).unwrap()),
        );
        assert_eq!(source.current_price().unwrap(), 103.0);

        let dead = FallbackDataSource::new(
            Box::new(FailingSource {
                calls: AtomicUsize::new(0),
            }),
            Box::new(FailingSource {
                calls: AtomicUsize::new(0),
            }),
        );
        let error = dead.current_price().unwrap_err();
        assert!(matches!(error, EngineError::DataSource(_)));
        assert!(error.to_string().contains("price from all sources"));
    }

    #[test]
    fn fallback_reports_both_failures() {
        let source = FallbackDataSource::new(
            Box::new(FailingSource {
                calls: AtomicUsize::new(0),
            }),
            Box::new(FailingSource {
                calls: AtomicUsize::new(0),
            }),
        );
        let error = source.fetch(Interval::OneDay, 10).unwrap_err();
        assert!(matches!(error, EngineError::DataSource(_)));
        assert!(error.to_string().contains("all sources"));
    }

    #[test]
    fn file_source_reads_json_snapshot() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let payload = serde_json::to_string(&bars(4)).unwrap();
        file.write_all(payload.as_bytes()).unwrap();

        let series = FileDataSource::new(file.path())
            .fetch(Interval::OneDay, 100)
            .unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.first().unwrap().timestamp_ms(), 1_700_000_000_000);
    }

    #[test]
    fn file_source_reads_csv_snapshot() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        writeln!(file, "1700086400000,101,103,100,102,1.5").unwrap();
        writeln!(file, "1700000000000,100,102,99,101,2").unwrap();
        file.flush().unwrap();

        let series = FileDataSource::new(file.path())
            .fetch(Interval::OneDay, 100)
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().unwrap().close, 101.0);
    }

    #[test]
    fn empty_file_is_a_data_source_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"[]").unwrap();
        let error = FileDataSource::new(file.path())
            .fetch(Interval::OneDay, 10)
            .unwrap_err();
        assert!(matches!(error, EngineError::DataSource(_)));
    }
}
