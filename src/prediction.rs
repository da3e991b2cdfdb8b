use crate::data_source::Interval;
use crate::error::{EngineError, EngineResult};
use crate::models::{PricePrediction, Series};
use log::debug;
use ndarray::{s, Array1, Array2, Axis};

/// Closes per regression window.
pub const LOOKBACK: usize = 30;
pub const DEFAULT_PREDICTION_PERIODS: usize = 24;
const RIDGE: f64 = 1e-10;
const FALLBACK_RIDGE: f64 = 1e-6;

/// Maps values onto [0, 1] using the observed range.
#[derive(Debug, Clone, Copy)]
struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    fn fit(values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            min,
            range: max - min,
        }
    }

    fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.range
    }

    fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.range + self.min
    }
}

/// Ordinary least squares with an intercept, solved through the normal equations.
#[derive(Debug, Clone)]
struct LinearModel {
    intercept: f64,
    coefficients: Array1<f64>,
}

impl LinearModel {
    fn fit(x: &Array2<f64>, y: &Array1<f64>) -> EngineResult<Self> {
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(EngineError::Computation(format!(
                "regression needs matching non-empty samples (rows: {}, targets: {})",
                x.nrows(),
                y.len()
            )));
        }

        let ones = Array2::ones((x.nrows(), 1));
        let design = ndarray::concatenate(Axis(1), &[ones.view(), x.view()])
            .map_err(|e| EngineError::Computation(e.to_string()))?;
        let xt = design.t();
        let xtx = xt.dot(&design);
        let xty = xt.dot(y);

        let beta = match cholesky_solve(&xtx, &xty, RIDGE) {
            Some(beta) => beta,
            None => {
                debug!("Normal equations near singular; retrying with a stronger ridge");
                cholesky_solve(&xtx, &xty, FALLBACK_RIDGE).ok_or_else(|| {
                    EngineError::Computation("normal equations are not positive definite".into())
                })?
            }
        };

        Ok(Self {
            intercept: beta[0],
            coefficients: beta.slice(s![1..]).to_owned(),
        })
    }

    fn predict_one(&self, features: &Array1<f64>) -> f64 {
        self.intercept + self.coefficients.dot(features)
    }
}

/// Solves `(A + ridge·I) x = b` for symmetric `A`; `None` when a pivot is not positive.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>, ridge: f64) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            if i == j {
                sum += ridge;
            }
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // Forward substitution: L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }

    // Back substitution: L' x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    if x.iter().all(|value| value.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Naive autoregressive forecast of the next `periods` closes.
///
/// Closes are min-max scaled, a linear model maps each window of
/// [`LOOKBACK`] closes to the following close, and the forecast rolls
/// forward by feeding each prediction back into the window. Confidence
/// decays linearly per step with a floor of 0.5.
pub fn predict_price(
    series: &Series,
    periods: usize,
    interval: Interval,
) -> EngineResult<PricePrediction> {
    let closes = series.closes();
    if closes.len() <= LOOKBACK {
        return Err(EngineError::InsufficientData {
            required: LOOKBACK + 1,
            available: closes.len(),
        });
    }
    let last_bar = series.last().ok_or(EngineError::InsufficientData {
        required: LOOKBACK + 1,
        available: 0,
    })?;
    let last_price = last_bar.close;

    let step = interval.duration().num_milliseconds();
    let timestamps: Vec<i64> = (1..=periods as i64)
        .map(|k| last_bar.timestamp_ms() + k * step)
        .collect();
    let confidence: Vec<f64> = (1..=periods)
        .map(|k| (0.95 - 0.015 * k as f64).max(0.5))
        .collect();

    let scaler = MinMaxScaler::fit(&closes);
    if scaler.range <= f64::EPSILON {
        return Ok(PricePrediction {
            timestamps,
            predictions: vec![last_price; periods],
            confidence,
            last_price,
        });
    }

    let scaled: Vec<f64> = closes.iter().map(|close| scaler.transform(*close)).collect();
    let samples = scaled.len() - LOOKBACK;
    let mut x = Array2::<f64>::zeros((samples, LOOKBACK));
    let mut y = Array1::<f64>::zeros(samples);
    for row in 0..samples {
        for col in 0..LOOKBACK {
            x[[row, col]] = scaled[row + col];
        }
        y[row] = scaled[row + LOOKBACK];
    }

    let model = LinearModel::fit(&x, &y)?;
    debug!(
        "Fitted forecast model on {} window(s), intercept {:.6}",
        samples, model.intercept
    );

    let mut window = Array1::from(scaled[scaled.len() - LOOKBACK..].to_vec());
    let mut predictions = Vec::with_capacity(periods);
    for _ in 0..periods {
        let next = model.predict_one(&window);
        predictions.push(scaler.inverse(next));
        for i in 0..LOOKBACK - 1 {
            window[i] = window[i + 1];
        }
        window[LOOKBACK - 1] = next;
    }

    Ok(PricePrediction {
        timestamps,
        predictions,
        confidence,
        last_price,
    })
}
