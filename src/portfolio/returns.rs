//! # Return Estimation
//!
//! $$
//! r_{t,i} = \frac{P_{t,i}}{P_{t-1,i}} - 1, \qquad
//! \mu^{a} = 252\,\bar r, \qquad \Sigma^{a} = 252\,\hat\Sigma
//! $$
//!
//! Daily simple returns, their sample moments and the annualized view used by every
//! optimizer, sweep and simulation in the crate.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use tracing::debug;

use super::data::PriceMatrix;
use crate::error::PortfolioError;
use crate::error::Result;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple period returns of every column; the first row is dropped.
pub fn simple_returns(prices: ArrayView2<f64>) -> Array2<f64> {
  let rows = prices.nrows();
  if rows < 2 {
    return Array2::zeros((0, prices.ncols()));
  }

  let prev = prices.slice(ndarray::s![..rows - 1, ..]);
  let next = prices.slice(ndarray::s![1.., ..]);
  &next / &prev - 1.0
}

/// Sample mean of a slice.
pub(crate) fn mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().sum::<f64>() / xs.len() as f64
  }
}

/// Sample covariance (ddof = 1) of two equally long slices.
pub(crate) fn covariance(x: &[f64], y: &[f64]) -> f64 {
  let n = x.len().min(y.len());
  if n < 2 {
    return 0.0;
  }

  let mx = mean(&x[..n]);
  let my = mean(&y[..n]);
  let acc: f64 = x
    .iter()
    .zip(y.iter())
    .map(|(a, b)| (a - mx) * (b - my))
    .sum();
  acc / (n - 1) as f64
}

/// Daily return statistics of a price matrix.
#[derive(Clone, Debug)]
pub struct ReturnStats {
  /// Asset identifiers, in column order.
  pub tickers: Vec<String>,
  /// Mean daily simple return per asset.
  pub mean: Array1<f64>,
  /// Daily sample covariance matrix.
  pub cov: Array2<f64>,
  /// Number of return periods the moments were estimated on.
  pub periods: usize,
}

impl ReturnStats {
  /// Estimate daily moments from a price matrix.
  pub fn from_prices(prices: &PriceMatrix) -> Result<Self> {
    let returns = simple_returns(prices.prices().view());
    Self::from_returns(prices.tickers().to_vec(), returns.view())
  }

  /// Estimate daily moments from a periods x assets return matrix.
  pub fn from_returns(tickers: Vec<String>, returns: ArrayView2<f64>) -> Result<Self> {
    let periods = returns.nrows();
    if periods < 2 {
      return Err(PortfolioError::InsufficientData {
        required: 2,
        found: periods,
      });
    }
    if tickers.len() != returns.ncols() {
      return Err(PortfolioError::InvalidInput(format!(
        "{} tickers given for {} return columns",
        tickers.len(),
        returns.ncols()
      )));
    }

    let mean = returns
      .mean_axis(Axis(0))
      .ok_or(PortfolioError::InsufficientData {
        required: 2,
        found: 0,
      })?;
    let cov = returns
      .t()
      .cov(1.0)
      .map_err(|e| PortfolioError::InvalidInput(e.to_string()))?;

    debug!(assets = tickers.len(), periods, "estimated daily return moments");

    Ok(Self {
      tickers,
      mean,
      cov,
      periods,
    })
  }

  /// Annualized expected returns and covariance.
  pub fn annualized(&self) -> AnnualizedStats {
    AnnualizedStats {
      tickers: self.tickers.clone(),
      mu: &self.mean * TRADING_DAYS_PER_YEAR,
      cov: &self.cov * TRADING_DAYS_PER_YEAR,
    }
  }
}

/// Annualized inputs of every optimizer: expected returns and covariance.
#[derive(Clone, Debug)]
pub struct AnnualizedStats {
  /// Asset identifiers, in column order.
  pub tickers: Vec<String>,
  /// Annual expected return per asset, historical or CAPM.
  pub mu: Array1<f64>,
  /// Annualized covariance matrix.
  pub cov: Array2<f64>,
}

impl AnnualizedStats {
  /// Build annualized inputs directly, e.g. from an external model.
  pub fn new(tickers: Vec<String>, mu: Array1<f64>, cov: Array2<f64>) -> Result<Self> {
    let n = tickers.len();
    if mu.len() != n || cov.dim() != (n, n) {
      return Err(PortfolioError::InvalidInput(format!(
        "expected {n} returns and a {n}x{n} covariance, got {} and {:?}",
        mu.len(),
        cov.dim()
      )));
    }
    Ok(Self { tickers, mu, cov })
  }

  /// Replace the expected returns, keeping the historical covariance.
  pub fn with_expected_returns(&self, mu: Array1<f64>) -> Result<Self> {
    Self::new(self.tickers.clone(), mu, self.cov.clone())
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  /// Annualized volatility of each asset on its own.
  pub fn asset_volatilities(&self) -> Array1<f64> {
    self.cov.diag().mapv(|v| v.max(0.0).sqrt())
  }

  /// Annualized return of a weight vector.
  pub fn portfolio_return(&self, w: &[f64]) -> f64 {
    self.mu.iter().zip(w.iter()).map(|(m, w)| m * w).sum()
  }

  /// Covariance-weighted vector `Σw`.
  pub fn sigma_w(&self, w: &[f64]) -> Array1<f64> {
    self
      .cov
      .rows()
      .into_iter()
      .map(|row| row.iter().zip(w.iter()).map(|(c, w)| c * w).sum())
      .collect()
  }

  /// Annualized volatility `sqrt(w' Σ w)`.
  pub fn portfolio_volatility(&self, w: &[f64]) -> f64 {
    let sigma_w = self.sigma_w(w);
    let var: f64 = w.iter().zip(sigma_w.iter()).map(|(a, b)| a * b).sum();
    var.max(0.0).sqrt()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;
  use crate::portfolio::data::tests::business_days;

  #[test]
  fn simple_returns_drop_first_row() {
    let prices = array![[100.0, 50.0], [110.0, 45.0], [99.0, 45.0]];
    let r = simple_returns(prices.view());

    assert_eq!(r.dim(), (2, 2));
    assert_relative_eq!(r[[0, 0]], 0.1, epsilon = 1e-12);
    assert_relative_eq!(r[[0, 1]], -0.1, epsilon = 1e-12);
    assert_relative_eq!(r[[1, 0]], -0.1, epsilon = 1e-12);
    assert_relative_eq!(r[[1, 1]], 0.0, epsilon = 1e-12);
  }

  #[test]
  fn moments_match_manual_computation() {
    let returns = array![[0.01, 0.02], [0.03, -0.01], [-0.02, 0.00]];
    let stats =
      ReturnStats::from_returns(vec!["A".into(), "B".into()], returns.view()).unwrap();

    let a = [0.01, 0.03, -0.02];
    let b = [0.02, -0.01, 0.00];
    assert_relative_eq!(stats.mean[0], mean(&a), epsilon = 1e-15);
    assert_relative_eq!(stats.cov[[0, 0]], covariance(&a, &a), epsilon = 1e-15);
    assert_relative_eq!(stats.cov[[0, 1]], covariance(&a, &b), epsilon = 1e-15);
    assert_relative_eq!(stats.cov[[1, 0]], stats.cov[[0, 1]], epsilon = 1e-15);
  }

  #[test]
  fn too_few_periods_is_insufficient_data() {
    let returns = array![[0.01, 0.02]];
    let err = ReturnStats::from_returns(vec!["A".into(), "B".into()], returns.view()).unwrap_err();
    assert!(matches!(
      err,
      PortfolioError::InsufficientData {
        required: 2,
        found: 1
      }
    ));
  }

  #[test]
  fn annualization_scales_mean_cov_and_vol() {
    let prices = Array2::from_shape_fn((60, 2), |(r, c)| {
      let wiggle = if r % 2 == 0 { 1.0 } else { -1.0 };
      100.0 + r as f64 * (c + 1) as f64 * 0.5 + wiggle
    });
    let m = PriceMatrix::new(business_days(60), vec!["A".into(), "B".into()], prices).unwrap();
    let daily = ReturnStats::from_prices(&m).unwrap();
    let annual = daily.annualized();

    assert_eq!(daily.periods, 59);
    for i in 0..2 {
      assert_relative_eq!(annual.mu[i], daily.mean[i] * 252.0, epsilon = 1e-12);
      assert_relative_eq!(
        annual.asset_volatilities()[i],
        daily.cov[[i, i]].sqrt() * 252.0_f64.sqrt(),
        epsilon = 1e-12
      );
    }
  }

  #[test]
  fn portfolio_moments_use_covariance() {
    let stats = AnnualizedStats::new(
      vec!["A".into(), "B".into()],
      array![0.1, 0.2],
      array![[0.04, 0.0], [0.0, 0.09]],
    )
    .unwrap();
    let w = [0.5, 0.5];

    assert_relative_eq!(stats.portfolio_return(&w), 0.15, epsilon = 1e-12);
    assert_relative_eq!(
      stats.portfolio_volatility(&w),
      (0.25 * 0.04 + 0.25 * 0.09_f64).sqrt(),
      epsilon = 1e-12
    );
  }
}
