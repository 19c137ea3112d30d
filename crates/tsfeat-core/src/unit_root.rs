//! Augmented Dickey-Fuller unit-root test.
//!
//! H0: the series has a unit root (non-stationary).
//! H1: the series is stationary.
//!
//! The test regresses Δx_t on x_{t-1}, lagged differences and the chosen
//! deterministic terms. The statistic is the t-value of the x_{t-1}
//! coefficient. P-values use the MacKinnon (1994) approximation and critical
//! values the MacKinnon (2010) response surface.

use crate::error::{FeatureError, Result};
use crate::series::is_constant;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;

/// 95% standard normal quantile used by the t-stat lag search.
const TSTAT_STOP: f64 = 1.644_853_626_951_472_2;

/// Deterministic terms included in the test regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdfRegression {
    /// No constant, no trend.
    NoConstant,
    /// Constant only.
    #[default]
    Constant,
    /// Constant and linear trend.
    ConstantTrend,
}

impl AdfRegression {
    fn n_trend(self) -> usize {
        match self {
            AdfRegression::NoConstant => 0,
            AdfRegression::Constant => 1,
            AdfRegression::ConstantTrend => 2,
        }
    }

    /// Short code: `n`, `c` or `ct`.
    pub fn as_str(self) -> &'static str {
        match self {
            AdfRegression::NoConstant => "n",
            AdfRegression::Constant => "c",
            AdfRegression::ConstantTrend => "ct",
        }
    }
}

/// Lag-length selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoLag {
    /// Minimise the Akaike information criterion.
    #[default]
    Aic,
    /// Minimise the Bayesian information criterion.
    Bic,
    /// Start at the maximum lag and drop lags until the last one has |t| >= 1.645.
    TStat,
    /// Use the maximum lag as given.
    Fixed,
}

/// ADF test configuration.
#[derive(Debug, Clone, Default)]
pub struct AdfOptions {
    pub regression: AdfRegression,
    /// Maximum number of lagged differences. Defaults to `ceil(12 * (n/100)^(1/4))`.
    pub max_lag: Option<usize>,
    pub autolag: AutoLag,
}

/// Critical values of the test statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalValues {
    pub one_pct: f64,
    pub five_pct: f64,
    pub ten_pct: f64,
}

impl fmt::Display for CriticalValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{'1%': {:?}, '5%': {:?}, '10%': {:?}}}",
            self.one_pct, self.five_pct, self.ten_pct
        )
    }
}

/// ADF test result.
#[derive(Debug, Clone, PartialEq)]
pub struct AdfResult {
    /// t-value of the lagged level coefficient
    pub statistic: f64,
    /// MacKinnon approximate p-value
    pub p_value: f64,
    /// Number of lagged differences in the final regression
    pub used_lag: usize,
    /// Observations in the final regression
    pub n_obs: usize,
    pub critical_values: CriticalValues,
    /// Best information criterion (or |t| for `TStat`); `None` for `Fixed`
    pub ic_best: Option<f64>,
}

/// Run the Augmented Dickey-Fuller test on a series without gaps.
pub fn adf_test(values: &[f64], options: &AdfOptions) -> Result<AdfResult> {
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(FeatureError::NonFinite(format!(
            "ADF input contains {} at position {}",
            values[pos], pos
        )));
    }

    let nobs = values.len();
    if nobs == 0 {
        return Err(FeatureError::InsufficientData { needed: 1, got: 0 });
    }
    if is_constant(values) {
        return Err(FeatureError::InvalidInput(
            "ADF input is constant".to_string(),
        ));
    }

    let n_trend = options.regression.n_trend();
    let needed = 2 * (n_trend + 1);
    if nobs < needed {
        return Err(FeatureError::InsufficientData { needed, got: nobs });
    }
    let lag_cap = nobs / 2 - n_trend - 1;

    let max_lag = match options.max_lag {
        Some(lag) if lag > lag_cap => {
            return Err(FeatureError::InvalidParameter {
                param: "max_lag".to_string(),
                value: lag.to_string(),
                reason: format!(
                    "must be at most {} for {} observations with regression '{}'",
                    lag_cap,
                    nobs,
                    options.regression.as_str()
                ),
            });
        }
        Some(lag) => lag,
        None => default_max_lag(nobs).min(lag_cap),
    };

    let xdiff: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let (used_lag, ic_best) = match options.autolag {
        AutoLag::Fixed => (max_lag, None),
        method => {
            let (lag, ic) = select_lag(values, &xdiff, max_lag, options.regression, method)?;
            (lag, Some(ic))
        }
    };

    let (x, y) = design(values, &xdiff, used_lag, used_lag, options.regression);
    let n_obs = x.nrows();
    if n_obs <= x.ncols() {
        return Err(FeatureError::InsufficientData {
            needed: x.ncols() + 1,
            got: n_obs,
        });
    }

    let fit = ols(&x, &y)?;
    let statistic = fit.t_value(0);
    let p_value = mackinnon_p(statistic, options.regression)?;
    let critical_values = mackinnon_crit(options.regression, n_obs);

    tracing::debug!(
        regression = options.regression.as_str(),
        max_lag,
        used_lag,
        n_obs,
        statistic,
        p_value,
        "ADF test"
    );

    Ok(AdfResult {
        statistic,
        p_value,
        used_lag,
        n_obs,
        critical_values,
        ic_best,
    })
}

/// Schwert's rule of thumb: `ceil(12 * (n/100)^(1/4))`.
pub fn default_max_lag(nobs: usize) -> usize {
    (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize
}

/// Pick a lag on the common sample defined by `max_lag`.
fn select_lag(
    values: &[f64],
    xdiff: &[f64],
    max_lag: usize,
    regression: AdfRegression,
    method: AutoLag,
) -> Result<(usize, f64)> {
    match method {
        AutoLag::TStat => {
            let mut best = (0, 0.0);
            for lag in (0..=max_lag).rev() {
                let (x, y) = design(values, xdiff, max_lag, lag, regression);
                let fit = ols(&x, &y)?;
                let t = fit.t_value(x.ncols() - 1 - regression.n_trend()).abs();
                best = (lag, t);
                if t >= TSTAT_STOP {
                    break;
                }
            }
            Ok(best)
        }
        _ => {
            let mut best: Option<(usize, f64)> = None;
            for lag in 0..=max_lag {
                let (x, y) = design(values, xdiff, max_lag, lag, regression);
                let fit = ols(&x, &y)?;
                let k = x.ncols() as f64;
                let penalty = match method {
                    AutoLag::Bic => (x.nrows() as f64).ln() * k,
                    _ => 2.0 * k,
                };
                let ic = -2.0 * fit.llf + penalty;
                if best.map_or(true, |(_, b)| ic < b) {
                    best = Some((lag, ic));
                }
            }
            best.ok_or_else(|| FeatureError::ComputationError("no lag candidates".to_string()))
        }
    }
}

/// Build the regression for `n_lags` lagged differences on the sample that
/// starts after `sample_lag` differences.
///
/// Columns: `[x_{t-1}, Δx_{t-1} .. Δx_{t-n_lags}, const?, trend?]`.
fn design(
    values: &[f64],
    xdiff: &[f64],
    sample_lag: usize,
    n_lags: usize,
    regression: AdfRegression,
) -> (DMatrix<f64>, DVector<f64>) {
    let rows = xdiff.len().saturating_sub(sample_lag);
    let cols = 1 + n_lags + regression.n_trend();

    let x = DMatrix::from_fn(rows, cols, |r, c| {
        let t = sample_lag + r;
        if c == 0 {
            values[t]
        } else if c <= n_lags {
            xdiff[t - c]
        } else if c == n_lags + 1 {
            1.0
        } else {
            (r + 1) as f64
        }
    });
    let y = DVector::from_fn(rows, |r, _| xdiff[sample_lag + r]);
    (x, y)
}

struct OlsFit {
    beta: DVector<f64>,
    xtx_inv: DMatrix<f64>,
    sigma2: f64,
    llf: f64,
}

impl OlsFit {
    fn t_value(&self, i: usize) -> f64 {
        self.beta[i] / (self.sigma2 * self.xtx_inv[(i, i)]).sqrt()
    }
}

fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit> {
    let n = x.nrows();
    let k = x.ncols();

    // Minimum-norm least squares; rank-deficient designs still fit.
    let svd = x.clone().svd(true, true);
    let tol = f64::EPSILON * n.max(k) as f64 * svd.singular_values.max();
    let pinv = svd
        .pseudo_inverse(tol)
        .map_err(|e| FeatureError::ComputationError(format!("ADF design SVD: {}", e)))?;
    let beta = &pinv * y;
    let xtx_inv = &pinv * pinv.transpose();

    let residuals = y - x * &beta;
    let ssr = residuals.dot(&residuals);
    let nf = n as f64;
    let llf = -nf / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / nf).ln() + 1.0);
    let sigma2 = ssr / n.saturating_sub(k) as f64;

    Ok(OlsFit {
        beta,
        xtx_inv,
        sigma2,
        llf,
    })
}

struct PValueSurface {
    max: f64,
    min: f64,
    star: f64,
    small: [f64; 3],
    large: [f64; 4],
}

fn p_value_surface(regression: AdfRegression) -> PValueSurface {
    match regression {
        AdfRegression::NoConstant => PValueSurface {
            max: 1.51,
            min: -17.83,
            star: -1.04,
            small: [0.6344, 1.2378, 0.032496],
            large: [0.4797, 0.93557, -0.06999, 0.033066],
        },
        AdfRegression::Constant => PValueSurface {
            max: 2.74,
            min: -18.83,
            star: -1.61,
            small: [2.1659, 1.4412, 0.038269],
            large: [1.7339, 0.93202, -0.12745, -0.010368],
        },
        AdfRegression::ConstantTrend => PValueSurface {
            max: 0.7,
            min: -16.18,
            star: -2.89,
            small: [3.2512, 1.6047, 0.049588],
            large: [2.5261, 0.61654, -0.37956, -0.060285],
        },
    }
}

/// Evaluate `c[0] + c[1] x + c[2] x^2 + ...`.
fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// MacKinnon (1994) approximate p-value for a single-series ADF statistic.
pub fn mackinnon_p(statistic: f64, regression: AdfRegression) -> Result<f64> {
    let surface = p_value_surface(regression);
    if statistic > surface.max {
        return Ok(1.0);
    }
    if statistic < surface.min {
        return Ok(0.0);
    }

    let z = if statistic <= surface.star {
        polyval(&surface.small, statistic)
    } else {
        polyval(&surface.large, statistic)
    };

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| FeatureError::ComputationError(format!("normal distribution: {}", e)))?;
    Ok(normal.cdf(z))
}

/// MacKinnon (2010) critical values at 1%, 5% and 10% for `nobs` observations.
pub fn mackinnon_crit(regression: AdfRegression, nobs: usize) -> CriticalValues {
    let table: [[f64; 4]; 3] = match regression {
        AdfRegression::NoConstant => [
            [-2.56574, -2.2358, -3.627, 0.0],
            [-1.94100, -0.2686, -3.365, 31.223],
            [-1.61682, 0.2656, -2.714, 25.364],
        ],
        AdfRegression::Constant => [
            [-3.43035, -6.5393, -16.786, -79.433],
            [-2.86154, -2.8903, -4.234, -40.040],
            [-2.56677, -1.5384, -2.809, 0.0],
        ],
        AdfRegression::ConstantTrend => [
            [-3.95877, -9.0531, -28.428, -134.155],
            [-3.41049, -4.3904, -9.036, -45.374],
            [-3.12705, -2.5856, -3.925, -22.380],
        ],
    };

    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one_pct: polyval(&table[0], inv),
        five_pct: polyval(&table[1], inv),
        ten_pct: polyval(&table[2], inv),
    }
}
