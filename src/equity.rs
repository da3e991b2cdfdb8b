use crate::error::{EngineError, EngineResult};
use crate::models::EquityPoint;
use chrono::{DateTime, Utc};

/// Account equity per bar, in chronological insertion order.
#[derive(Debug, Default, Clone)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, equity: f64) -> EngineResult<()> {
        if let Some(last) = self.points.last() {
            if timestamp <= last.timestamp {
                return Err(EngineError::InvalidState(format!(
                    "equity at {} recorded after {}",
                    timestamp, last.timestamp
                )));
            }
        }
        self.points.push(EquityPoint { timestamp, equity });
        Ok(())
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn last_equity(&self) -> Option<f64> {
        self.points.last().map(|point| point.equity)
    }

    pub fn into_points(self) -> Vec<EquityPoint> {
        self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn records_in_order() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut curve = EquityCurve::new();
        curve.record(start, 10_000.0).unwrap();
        curve.record(start + Duration::days(1), 10_050.0).unwrap();
        assert_eq!(curve.points().len(), 2);
        assert_eq!(curve.last_equity(), Some(10_050.0));
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut curve = EquityCurve::new();
        curve.record(start, 1.0).unwrap();
        assert!(matches!(
            curve.record(start, 2.0),
            Err(EngineError::InvalidState(_))
        ));
    }
}
