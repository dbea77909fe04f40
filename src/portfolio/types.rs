//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Result containers shared by the optimizers, the frontier sweep and the simulator.

use super::returns::AnnualizedStats;

/// Output of a portfolio optimization run.
#[derive(Clone, Debug, Default)]
pub struct PortfolioResult {
  /// Asset identifiers, aligned with `weights`.
  pub tickers: Vec<String>,
  /// Final portfolio weights.
  pub weights: Vec<f64>,
  /// Annualized expected portfolio return.
  pub expected_return: f64,
  /// Annualized portfolio volatility.
  pub volatility: f64,
  /// Sharpe ratio `(expected_return - risk_free) / volatility`, NaN for a zero-volatility portfolio.
  pub sharpe: f64,
  /// Per-asset return contribution `w_i * mu_i`.
  pub contrib_return: Vec<f64>,
  /// Per-asset variance budget `w_i * (Σw)_i`.
  pub contrib_var: Vec<f64>,
  /// Annualized stand-alone volatility of each asset.
  pub individual_volatilities: Vec<f64>,
}

/// One row of [`PortfolioResult::allocations`].
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation<'a> {
  pub ticker: &'a str,
  pub weight: f64,
  pub contrib_return: f64,
  pub contrib_var: f64,
}

impl PortfolioResult {
  /// Evaluate a weight vector against annualized inputs.
  pub(crate) fn evaluate(stats: &AnnualizedStats, weights: Vec<f64>, risk_free: f64) -> Self {
    let expected_return = stats.portfolio_return(&weights);
    let volatility = stats.portfolio_volatility(&weights);
    let sigma_w = stats.sigma_w(&weights);

    let contrib_return = weights
      .iter()
      .zip(stats.mu.iter())
      .map(|(w, m)| w * m)
      .collect();
    let contrib_var = weights
      .iter()
      .zip(sigma_w.iter())
      .map(|(w, s)| w * s)
      .collect();

    Self {
      tickers: stats.tickers.clone(),
      sharpe: sharpe_ratio(expected_return, volatility, risk_free),
      weights,
      expected_return,
      volatility,
      contrib_return,
      contrib_var,
      individual_volatilities: stats.asset_volatilities().to_vec(),
    }
  }

  /// Per-asset weight and contributions, in ticker order.
  pub fn allocations(&self) -> impl Iterator<Item = Allocation<'_>> + '_ {
    self
      .tickers
      .iter()
      .enumerate()
      .map(move |(i, ticker)| Allocation {
        ticker,
        weight: self.weights[i],
        contrib_return: self.contrib_return[i],
        contrib_var: self.contrib_var[i],
      })
  }

  /// Weight held in `ticker`, if present.
  pub fn weight_of(&self, ticker: &str) -> Option<f64> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.weights[i])
  }
}

/// Sharpe ratio of an optimized portfolio. A zero-volatility portfolio has no defined ratio.
pub fn sharpe_ratio(expected_return: f64, volatility: f64, risk_free: f64) -> f64 {
  if volatility == 0.0 {
    f64::NAN
  } else {
    (expected_return - risk_free) / volatility
  }
}

/// Minimum-variance portfolio for one target return on the frontier.
#[derive(Clone, Debug)]
pub struct FrontierPoint {
  pub target_return: f64,
  pub volatility: f64,
  pub weights: Vec<f64>,
}

/// Stand-alone risk and return of a single asset.
#[derive(Clone, Debug)]
pub struct AssetPoint {
  pub ticker: String,
  pub expected_return: f64,
  pub volatility: f64,
}

/// Swept frontier plus the assets it was built from.
#[derive(Clone, Debug, Default)]
pub struct EfficientFrontier {
  /// Feasible points ordered by increasing target return.
  pub points: Vec<FrontierPoint>,
  /// Unoptimized reference points, one per asset.
  pub assets: Vec<AssetPoint>,
  /// Number of grid points requested.
  pub requested: usize,
}
