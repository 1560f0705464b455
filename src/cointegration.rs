//! Engle-Granger two-step cointegration test: OLS hedge-ratio fit followed by
//! an augmented Dickey-Fuller test on the regression residuals.

use nalgebra::{DMatrix, DVector};

use crate::error::BacktestError;

/// MacKinnon (1991) cointegration critical values for a two-variable system.
/// These are more conservative than plain ADF critical values because the
/// residuals being tested are themselves estimated, not observed.
#[derive(Debug, Clone, Copy)]
pub struct CriticalValues {
    pub one_pct: f64,
    pub five_pct: f64,
    pub ten_pct: f64,
}

pub const COINTEGRATION_CRITICAL_VALUES_2VAR: CriticalValues = CriticalValues {
    one_pct: -3.90,
    five_pct: -3.34,
    ten_pct: -3.04,
};

/// Result of fitting Y = alpha + beta * X + u by ordinary least squares.
#[derive(Debug, Clone)]
pub struct OlsResult {
    pub alpha: f64,
    pub beta: f64,
    pub residuals: Vec<f64>,
    pub r_squared: f64,
}

/// Full Engle-Granger test output.
#[derive(Debug, Clone)]
pub struct CointegrationResult {
    pub alpha: f64,
    pub beta: f64,
    pub residuals: Vec<f64>,
    pub r_squared: f64,
    pub adf_statistic: f64,
    pub p_value: f64,
    pub critical_values: CriticalValues,
    pub is_cointegrated: bool,
}

/// Fits `y = alpha + beta * x + u` via QR decomposition of the design matrix
/// `[1, x]`. QR is preferred over solving the normal equations directly:
/// price levels are large-magnitude and weakly correlated with the constant
/// column, which worsens the conditioning of `X^T X`.
pub fn ols_regress(y: &[f64], x: &[f64]) -> Result<OlsResult, BacktestError> {
    if y.len() != x.len() {
        return Err(BacktestError::InvalidInput(format!(
            "length mismatch in OLS regression: y={}, x={}",
            y.len(),
            x.len()
        )));
    }
    let n = y.len();
    if n < 3 {
        return Err(BacktestError::InvalidInput(
            "at least 3 observations are required for OLS regression".to_string(),
        ));
    }
    if y.iter().chain(x.iter()).any(|v| !v.is_finite()) {
        return Err(BacktestError::InvalidInput(
            "non-finite value in OLS regression input".to_string(),
        ));
    }

    let design = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { x[r] });
    let target = DVector::from_row_slice(y);

    let qr = design.clone().qr();
    let coeffs = qr.solve(&target).ok_or_else(|| {
        BacktestError::Degenerate(
            "singular design matrix in OLS regression (zero-variance independent series)"
                .to_string(),
        )
    })?;

    let alpha = coeffs[0];
    let beta = coeffs[1];

    let residuals: Vec<f64> = (0..n).map(|i| y[i] - alpha - beta * x[i]).collect();

    let y_mean = y.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let r_squared = if ss_tot.abs() < 1e-15 { 0.0 } else { 1.0 - ss_res / ss_tot };

    Ok(OlsResult { alpha, beta, residuals, r_squared })
}

/// Solves an ordinary least-squares regression with no intercept column via
/// the normal equations, returning coefficients, residual sum of squares and
/// the standard error of each coefficient. The auxiliary ADF regression has
/// few columns and differenced, already-stationary-ish inputs, so explicit
/// matrix inversion is numerically safe here (unlike the price-level fit
/// above, which needs QR).
fn ols_no_intercept(design: &DMatrix<f64>, target: &DVector<f64>) -> Option<(DVector<f64>, f64, DVector<f64>)> {
    let xtx = design.transpose() * design;
    let xtx_inv = xtx.clone().try_inverse()?;
    let xty = design.transpose() * target;
    let coeffs = &xtx_inv * &xty;

    let fitted = design * &coeffs;
    let residuals = target - fitted;
    let rss: f64 = residuals.iter().map(|r| r * r).sum();

    let n_obs = design.nrows();
    let k = design.ncols();
    let dof = (n_obs - k).max(1);
    let sigma2 = rss / dof as f64;

    let se: DVector<f64> = DVector::from_iterator(
        k,
        (0..k).map(|i| (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt()),
    );

    Some((coeffs, rss, se))
}

/// Builds the ADF auxiliary regression for a given number of lagged
/// difference terms: `delta_y[t] = gamma * y[t-1] + sum_i delta_i *
/// delta_y[t-i] + eps`, fit without a constant since the cointegration
/// residuals are zero-mean by construction.
fn adf_regression(levels: &[f64], lags: usize) -> Option<(f64, f64, f64)> {
    let n = levels.len();
    let diffs: Vec<f64> = levels.windows(2).map(|w| w[1] - w[0]).collect();

    // t indexes into `levels`; valid range requires levels[t-1] and
    // diffs[t-1-i] for i in 0..lags to exist.
    let start = lags + 1;
    if start >= n {
        return None;
    }
    let n_obs = n - start;
    if n_obs < lags + 2 {
        return None;
    }

    let ncols = 1 + lags;
    let mut design = DMatrix::zeros(n_obs, ncols);
    let mut target = DVector::zeros(n_obs);

    for (row, t) in (start..n).enumerate() {
        target[row] = diffs[t - 1];
        design[(row, 0)] = levels[t - 1];
        for i in 1..=lags {
            design[(row, i)] = diffs[t - 1 - i];
        }
    }

    let (coeffs, rss, se) = ols_no_intercept(&design, &target)?;
    let gamma = coeffs[0];
    let gamma_se = se[0];
    if gamma_se <= 0.0 || !gamma_se.is_finite() {
        return None;
    }
    let t_stat = gamma / gamma_se;

    let k = ncols as f64;
    let rss_per_obs = (rss / n_obs as f64).max(1e-300);
    let aic = n_obs as f64 * rss_per_obs.ln() + 2.0 * k;

    Some((t_stat, aic, gamma))
}

/// Runs the augmented Dickey-Fuller test on `levels` with automatic lag
/// selection by AIC, searching lag orders 0..=max_lag (the statsmodels
/// default heuristic `12 * (n/100)^0.25`, capped so small samples still
/// leave enough degrees of freedom).
pub fn adf_test_statistic(levels: &[f64]) -> Result<f64, BacktestError> {
    let n = levels.len();
    if n < 10 {
        return Err(BacktestError::InvalidInput(
            "at least 10 observations are required for the ADF test".to_string(),
        ));
    }

    let heuristic_max = (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize;
    let max_lag = heuristic_max.min(n / 3).max(0);

    let mut best: Option<(f64, f64)> = None; // (t_stat, aic)
    for lags in 0..=max_lag {
        if let Some((t_stat, aic, _gamma)) = adf_regression(levels, lags) {
            if best.map(|(_, best_aic)| aic < best_aic).unwrap_or(true) {
                best = Some((t_stat, aic));
            }
        }
    }

    best.map(|(t_stat, _)| t_stat).ok_or_else(|| {
        BacktestError::Degenerate(
            "ADF regression is singular for all candidate lag orders".to_string(),
        )
    })
}

/// Piecewise-linear approximation of the Engle-Granger cointegration
/// p-value from the MacKinnon critical-value bands. Informational only; the
/// cointegration decision itself uses the 5% critical value directly.
pub fn approximate_cointegration_pvalue(t_stat: f64, cv: &CriticalValues) -> f64 {
    if t_stat <= cv.one_pct {
        (0.001 + (t_stat - cv.one_pct) * 0.001).max(0.001)
    } else if t_stat <= cv.five_pct {
        let position = (cv.one_pct - t_stat) / (cv.one_pct - cv.five_pct);
        0.01 + position * 0.04
    } else if t_stat <= cv.ten_pct {
        let position = (cv.five_pct - t_stat) / (cv.five_pct - cv.ten_pct);
        0.05 + position * 0.05
    } else if t_stat <= 0.0 {
        let position = (cv.ten_pct - t_stat) / cv.ten_pct.abs();
        (0.10 + position * 0.40).min(0.5)
    } else {
        (0.5 + t_stat * 0.1).min(0.99)
    }
}

/// Runs the full Engle-Granger two-step test: OLS hedge-ratio fit, then ADF
/// on the residuals, classified against the two-variable MacKinnon critical
/// values.
pub fn engle_granger_test(y: &[f64], x: &[f64]) -> Result<CointegrationResult, BacktestError> {
    if y.len() < 20 {
        return Err(BacktestError::InvalidInput(
            "at least 20 observations are required for the Engle-Granger test".to_string(),
        ));
    }

    let ols = ols_regress(y, x)?;
    let adf_statistic = adf_test_statistic(&ols.residuals)?;
    let cv = &COINTEGRATION_CRITICAL_VALUES_2VAR;
    let p_value = approximate_cointegration_pvalue(adf_statistic, cv);
    let is_cointegrated = adf_statistic < cv.five_pct;

    Ok(CointegrationResult {
        alpha: ols.alpha,
        beta: ols.beta,
        residuals: ols.residuals,
        r_squared: ols.r_squared,
        adf_statistic,
        p_value,
        critical_values: *cv,
        is_cointegrated,
    })
}
