use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::models::{PaperTrade, PaperTradeStatus, TradeSide};
use log::info;
use uuid::Uuid;

/// Fill `quantity` BTC at `price`, or at the data source's current price when none is given.
/// The fill is stamped with the context clock.
pub fn execute_paper_trade(
    context: &EngineContext,
    side: TradeSide,
    quantity: f64,
    price: Option<f64>,
) -> EngineResult<PaperTrade> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(EngineError::InvalidRequest(format!(
            "quantity must be positive (value: {})",
            quantity
        )));
    }

    let price = match price {
        Some(price) if price.is_finite() && price > 0.0 => price,
        Some(price) => {
            return Err(EngineError::InvalidRequest(format!(
                "price must be positive (value: {})",
                price
            )))
        }
        None => context.data_source().current_price()?,
    };

    let trade = PaperTrade {
        id: Uuid::new_v4().to_string(),
        trade_type: side,
        quantity,
        price,
        value: price * quantity,
        timestamp: context.now(),
        status: PaperTradeStatus::Executed,
    };
    info!(
        "Paper {} of {} BTC at {:.2} (value {:.2})",
        trade.trade_type, trade.quantity, trade.price, trade.value
    );
    Ok(trade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FixedClock;
    use crate::data_source::StaticDataSource;
    use crate::models::Bar;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn context() -> EngineContext {
        let bars = (0..3)
            .map(|i| Bar {
                timestamp: noon() - Duration::minutes(3 - i),
                open: 60_000.0,
                high: 60_500.0,
                low: 59_500.0,
                close: 60_000.0 + 100.0 * i as f64,
                volume: 1.0,
            })
            .collect();
        EngineContext::new(
            Arc::new(FixedClock(noon())),
            Arc::new(StaticDataSource::from_bars(bars).unwrap()),
        )
    }

    #[test]
    fn fills_at_explicit_price() {
        let trade = execute_paper_trade(&context(), TradeSide::Sell, 0.5, Some(50_000.0)).unwrap();
        assert_eq!(trade.trade_type, TradeSide::Sell);
        assert_eq!(trade.price, 50_000.0);
        assert_eq!(trade.value, 25_000.0);
        assert_eq!(trade.status, PaperTradeStatus::Executed);
        assert_eq!(trade.timestamp, noon());
    }

    #[test]
    fn fills_at_current_price_when_none_given() {
        let trade = execute_paper_trade(&context(), TradeSide::Buy, 0.25, None).unwrap();
        assert_eq!(trade.price, 60_200.0);
        assert_eq!(trade.value, 15_050.0);
    }

    #[test]
    fn rejects_non_positive_quantity_and_price() {
        assert!(matches!(
            execute_paper_trade(&context(), TradeSide::Buy, 0.0, None),
            Err(EngineError::InvalidRequest(_))
        ));
        assert!(matches!(
            execute_paper_trade(&context(), TradeSide::Buy, 1.0, Some(-5.0)),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn serializes_with_uppercase_enums_and_millisecond_timestamp() {
        let trade = execute_paper_trade(&context(), TradeSide::Buy, 1.0, Some(10.0)).unwrap();
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["trade_type"], "BUY");
        assert_eq!(json["status"], "EXECUTED");
        assert_eq!(json["timestamp"], noon().timestamp_millis());
    }

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("buy".parse::<TradeSide>().unwrap(), TradeSide::Buy);
        assert_eq!(" SELL ".parse::<TradeSide>().unwrap(), TradeSide::Sell);
        assert!("hold".parse::<TradeSide>().is_err());
    }
}
