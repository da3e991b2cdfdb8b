use crate::models::{EquityPoint, PerformanceMetrics, Trade};
use statrs::statistics::Statistics;

/// Reported profit factor when there are winning trades but no losing ones.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;
const PERIODS_PER_YEAR: f64 = 365.0;
const RISK_FREE_RATE: f64 = 0.02;

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Aggregate statistics for a finished run. Zero trades yields all-zero metrics.
    pub fn calculate_performance(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
    ) -> PerformanceMetrics {
        if trades.is_empty() {
            return PerformanceMetrics::default();
        }

        let total_trades = trades.len();
        let winning_pnls: Vec<f64> = trades
            .iter()
            .map(|trade| trade.pnl)
            .filter(|pnl| *pnl > 0.0)
            .collect();
        // Break-even trades count as losing.
        let losing_pnls: Vec<f64> = trades
            .iter()
            .map(|trade| trade.pnl)
            .filter(|pnl| *pnl <= 0.0)
            .collect();

        let final_equity = equity_curve
            .last()
            .map(|point| point.equity)
            .unwrap_or_else(|| initial_capital + trades.iter().map(|t| t.pnl).sum::<f64>());
        let total_return = final_equity - initial_capital;
        let total_return_pct = if initial_capital > 0.0 {
            total_return / initial_capital * 100.0
        } else {
            0.0
        };

        let gross_profit: f64 = winning_pnls.iter().sum();
        let gross_loss: f64 = losing_pnls.iter().sum();

        let (max_drawdown, max_drawdown_pct) = Self::calculate_max_drawdown(equity_curve);
        let pnl_percents: Vec<f64> = trades.iter().map(|trade| trade.pnl_percent).collect();

        PerformanceMetrics {
            total_return,
            total_return_pct,
            total_trades,
            winning_trades: winning_pnls.len(),
            losing_trades: losing_pnls.len(),
            win_rate: winning_pnls.len() as f64 / total_trades as f64 * 100.0,
            largest_win: winning_pnls.iter().copied().fold(0.0, f64::max),
            largest_loss: losing_pnls.iter().copied().fold(0.0, f64::min),
            average_win: Self::average(&winning_pnls),
            average_loss: Self::average(&losing_pnls),
            average_trade_pnl_percent: Self::average(&pnl_percents),
            profit_factor: Self::calculate_profit_factor(gross_profit, gross_loss),
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio: Self::calculate_sharpe_ratio(equity_curve),
        }
    }

    fn average(values: &[f64]) -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    /// Gross profit over absolute gross loss. Without losses a profitable run reports
    /// [`PROFIT_FACTOR_CAP`] instead of infinity.
    pub fn calculate_profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
        let gross_loss = gross_loss.abs();
        if gross_loss == 0.0 {
            return if gross_profit > 0.0 {
                PROFIT_FACTOR_CAP
            } else {
                0.0
            };
        }
        gross_profit / gross_loss
    }

    /// Absolute range of equity (max - min) and the deepest drop below the running peak, in percent.
    pub fn calculate_max_drawdown(equity_curve: &[EquityPoint]) -> (f64, f64) {
        if equity_curve.is_empty() {
            return (0.0, 0.0);
        }

        let mut highest = f64::NEG_INFINITY;
        let mut lowest = f64::INFINITY;
        let mut running_peak = f64::NEG_INFINITY;
        let mut deepest = 0.0_f64;

        for point in equity_curve {
            highest = highest.max(point.equity);
            lowest = lowest.min(point.equity);
            running_peak = running_peak.max(point.equity);
            if running_peak > 0.0 {
                deepest = deepest.min((point.equity - running_peak) / running_peak);
            }
        }

        (highest - lowest, deepest * 100.0)
    }

    pub fn calculate_sharpe_ratio(equity_curve: &[EquityPoint]) -> f64 {
        if equity_curve.len() < 3 {
            return 0.0;
        }

        let returns: Vec<f64> = equity_curve
            .windows(2)
            .map(|window| {
                let prev_value = window[0].equity;
                if prev_value > 0.0 {
                    (window[1].equity - prev_value) / prev_value
                } else {
                    0.0
                }
            })
            .collect();

        let mean_return = returns.iter().mean();
        let std_dev = returns.iter().std_dev();

        if !std_dev.is_finite() || std_dev == 0.0 {
            return 0.0;
        }

        // Crypto trades every day of the year
        let annualized_return = mean_return * PERIODS_PER_YEAR;
        let annualized_volatility = std_dev * PERIODS_PER_YEAR.sqrt();

        (annualized_return - RISK_FREE_RATE) / annualized_volatility
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(offset)
    }

    fn trade(pnl: f64) -> Trade {
        Trade {
            entry_time: day(0),
            entry_price: 100.0,
            exit_time: day(1),
            exit_price: 100.0 + pnl,
            size: 1.0,
            direction: Direction::Long,
            pnl,
            pnl_percent: pnl,
        }
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, equity)| EquityPoint {
                timestamp: day(i as i64),
                equity: *equity,
            })
            .collect()
    }

    #[test]
    fn zero_trades_yield_zero_metrics() {
        let metrics = PerformanceCalculator::calculate_performance(
            &[],
            &curve(&[10_000.0, 10_000.0]),
            10_000.0,
        );
        assert_eq!(metrics, PerformanceMetrics::default());
    }

    #[test]
    fn mixes_winners_and_losers() {
        let trades = vec![trade(100.0), trade(-25.0), trade(50.0), trade(0.0)];
        let equity = curve(&[10_000.0, 10_100.0, 10_075.0, 10_125.0, 10_125.0]);
        let metrics = PerformanceCalculator::calculate_performance(&trades, &equity, 10_000.0);

        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 2);
        assert!((metrics.win_rate - 50.0).abs() < 1e-12);
        assert!((metrics.total_return - 125.0).abs() < 1e-9);
        assert!((metrics.total_return_pct - 1.25).abs() < 1e-9);
        assert_eq!(metrics.largest_win, 100.0);
        assert_eq!(metrics.largest_loss, -25.0);
        assert!((metrics.average_win - 75.0).abs() < 1e-12);
        assert!((metrics.average_loss + 12.5).abs() < 1e-12);
        assert!((metrics.profit_factor - 6.0).abs() < 1e-12);
        assert!((metrics.max_drawdown - 125.0).abs() < 1e-9);
        assert!(metrics.max_drawdown_pct < 0.0);
    }

    #[test]
    fn profit_factor_without_losses_is_capped_positive() {
        assert_eq!(
            PerformanceCalculator::calculate_profit_factor(250.0, 0.0),
            PROFIT_FACTOR_CAP
        );
        assert_eq!(PerformanceCalculator::calculate_profit_factor(0.0, 0.0), 0.0);
        assert_eq!(PerformanceCalculator::calculate_profit_factor(0.0, -40.0), 0.0);
    }

    #[test]
    fn large_profit_factor_is_not_clamped() {
        let trades = vec![trade(500.0), trade(-1.0)];
        let equity = curve(&[10_000.0, 10_500.0, 10_499.0]);
        let metrics = PerformanceCalculator::calculate_performance(&trades, &equity, 10_000.0);
        assert_eq!(metrics.profit_factor, 500.0);
        assert_eq!(
            PerformanceCalculator::calculate_profit_factor(1e-3, -1e-12),
            1e-3 / 1e-12
        );
    }

    #[test]
    fn drawdown_percent_tracks_running_peak() {
        let (absolute, percent) =
            PerformanceCalculator::calculate_max_drawdown(&curve(&[100.0, 120.0, 90.0, 130.0]));
        assert!((absolute - 40.0).abs() < 1e-12);
        assert!((percent + 25.0).abs() < 1e-9);
    }

    #[test]
    fn flat_curve_has_no_drawdown_or_sharpe() {
        let flat = curve(&[500.0; 10]);
        assert_eq!(PerformanceCalculator::calculate_max_drawdown(&flat), (0.0, 0.0));
        assert_eq!(PerformanceCalculator::calculate_sharpe_ratio(&flat), 0.0);
    }
}
