use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the backtesting core and its collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No bars in the requested window
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Upstream fetch failed entirely
    #[error("data source error: {0}")]
    DataSource(String),

    /// Ledger invariant violated (opening while open, closing while flat)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Bars that break ordering or price invariants
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Caller supplied a malformed request (dates, ranges)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("insufficient data: need {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("cannot parse condition `{condition}`: {message}")]
    ConditionParse { condition: String, message: String },

    /// Operator settings that cannot be used
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("computation error: {0}")]
    Computation(String),
}

impl EngineError {
    pub fn condition_parse(condition: &str, message: impl Into<String>) -> Self {
        EngineError::ConditionParse {
            condition: condition.to_string(),
            message: message.into(),
        }
    }

    /// Stable category label for callers that route errors.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::DataUnavailable(_)
            | EngineError::InvalidData(_)
            | EngineError::InsufficientData { .. } => "market_data",
            EngineError::DataSource(_) => "data_source",
            EngineError::InvalidState(_) => "internal",
            EngineError::InvalidRequest(_) => "request",
            EngineError::UnknownIndicator(_)
            | EngineError::ConditionParse { .. }
            | EngineError::Configuration(_) => "config",
            EngineError::Computation(_) => "runtime",
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::Configuration(format!("invalid JSON: {}", error))
    }
}
