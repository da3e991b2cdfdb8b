use crate::error::{EngineError, EngineResult};
use std::time::Duration;

const USER_AGENT: &str = concat!("btc-engine/", env!("CARGO_PKG_VERSION"));

pub fn build_blocking_client(timeout: Option<Duration>) -> EngineResult<reqwest::blocking::Client> {
    let mut builder = reqwest::blocking::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|error| {
        EngineError::Configuration(format!("failed to build HTTP client: {}", error))
    })
}
