/// Retry a blocking fallible operation up to `$max_attempts` times with a linear back-off.
macro_rules! retry_request {
    ($context:expr, $max_attempts:expr, $operation:expr) => {{
        const RETRY_DELAY_MILLIS: u64 = 500;

        let context_value: String = $context.into();
        let max_attempts: u32 = $max_attempts;
        let max_attempts = max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            match $operation {
                Ok(value) => break Ok(value),
                Err(err) if attempt >= max_attempts => break Err(err),
                Err(err) => {
                    let delay = RETRY_DELAY_MILLIS * u64::from(attempt);
                    log::warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {}ms.",
                        attempt,
                        max_attempts,
                        context_value,
                        err,
                        delay
                    );
                    std::thread::sleep(std::time::Duration::from_millis(delay));
                    attempt += 1;
                }
            }
        }
    }};
}

pub(crate) use retry_request;

#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use std::cell::Cell;

    #[test]
    fn retries_until_success() {
        let calls = Cell::new(0);
        let result: Result<u32, EngineError> = retry_request!("flaky call", 3, {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(EngineError::DataSource("transient".to_string()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), EngineError> = retry_request!("dead call", 1, {
            calls.set(calls.get() + 1);
            Err(EngineError::DataSource("down".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
