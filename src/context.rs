use crate::binance::{BinanceClient, CoinGeckoClient};
use crate::config::EngineSettings;
use crate::data_source::{FallbackDataSource, FileDataSource, HistoricalDataSource};
use crate::http_client::build_blocking_client;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Time source for the core. Injected so runs are reproducible in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Explicit dependencies of a backtest: time source and data source.
#[derive(Clone)]
pub struct EngineContext {
    clock: Arc<dyn Clock>,
    data_source: Arc<dyn HistoricalDataSource>,
}

impl EngineContext {
    pub fn new(clock: Arc<dyn Clock>, data_source: Arc<dyn HistoricalDataSource>) -> Self {
        Self { clock, data_source }
    }

    pub fn with_system_clock(data_source: Arc<dyn HistoricalDataSource>) -> Self {
        Self::new(Arc::new(SystemClock), data_source)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn data_source(&self) -> &dyn HistoricalDataSource {
        self.data_source.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Process-level state for CLI commands.
#[derive(Debug, Clone)]
pub struct AppContext {
    settings: EngineSettings,
    data_file: Option<PathBuf>,
}

impl AppContext {
    pub fn initialize(data_file: Option<PathBuf>) -> Result<Self> {
        let settings = EngineSettings::from_env().context("invalid engine settings")?;
        Ok(Self::with_settings(settings, data_file))
    }

    pub fn with_settings(settings: EngineSettings, data_file: Option<PathBuf>) -> Self {
        Self {
            settings,
            data_file,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    /// Local snapshot when a data file is configured, otherwise Binance with CoinGecko fallback.
    pub fn data_source(&self) -> Result<Arc<dyn HistoricalDataSource>> {
        if let Some(path) = self.data_file() {
            info!("Using local market data snapshot {}", path.display());
            return Ok(Arc::new(FileDataSource::new(path)));
        }

        let client = build_blocking_client(Some(self.settings.http_timeout))?;
        let binance = BinanceClient::new(client.clone(), &self.settings);
        let coingecko = CoinGeckoClient::new(client, &self.settings);
        Ok(Arc::new(FallbackDataSource::new(
            Box::new(binance),
            Box::new(coingecko),
        )))
    }

    pub fn engine_context(&self) -> Result<EngineContext> {
        Ok(EngineContext::with_system_clock(self.data_source()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_is_stable() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn data_file_selects_file_source() {
        let app = AppContext::with_settings(
            EngineSettings::default(),
            Some(PathBuf::from("bars.json")),
        );
        let source = app.data_source().unwrap();
        assert_eq!(source.name(), "file");
    }
}
