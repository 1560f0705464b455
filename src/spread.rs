//! Spread construction and Z-score standardization.

use crate::error::BacktestError;

/// If the standard deviation of a window is within this distance of zero,
/// the Z-score for that window is defined to be 0 rather than dividing by a
/// near-zero number.
const ZERO_STD_EPS: f64 = 1e-12;

/// Builds the cointegration spread `s[i] = y[i] - alpha - beta * x[i]`.
pub fn build_spread(y: &[f64], x: &[f64], alpha: f64, beta: f64) -> Vec<f64> {
    y.iter().zip(x.iter()).map(|(&yi, &xi)| yi - alpha - beta * xi).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation with `ddof = 1`. Returns 0 for fewer than 2
/// samples.
fn sample_stdev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Z-score of the full spread against its own sample mean and stdev. Useful
/// as a whole-sample diagnostic view; the simulation kernel consumes
/// [`rolling_z_score`] instead.
pub fn static_z_score(spread: &[f64]) -> Vec<f64> {
    let m = mean(spread);
    let std = sample_stdev(spread);
    if std < ZERO_STD_EPS {
        return vec![0.0; spread.len()];
    }
    spread.iter().map(|&s| (s - m) / std).collect()
}

/// Rolling Z-score of `spread[i]` against the trailing window
/// `spread[i-window+1 ..= i]`. Bars before the first full window are left as
/// `None`. Implemented as a direct windowed recomputation rather than an
/// online (Welford) update: O(n * window) but simple to audit bar by bar.
pub fn rolling_z_score(spread: &[f64], window: usize) -> Result<Vec<Option<f64>>, BacktestError> {
    if window < 2 {
        return Err(BacktestError::InvalidInput(
            "rolling Z-score window must be at least 2".to_string(),
        ));
    }
    let n = spread.len();
    let mut out = vec![None; n];
    for i in (window - 1)..n {
        let win = &spread[i + 1 - window..=i];
        let m = mean(win);
        let std = sample_stdev(win);
        out[i] = Some(if std < ZERO_STD_EPS { 0.0 } else { (win[win.len() - 1] - m) / std });
    }
    Ok(out)
}
