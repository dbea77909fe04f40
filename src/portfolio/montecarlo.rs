//! # Monte Carlo Portfolios
//!
//! $$
//! \mathbf{w}^{(k)} \sim \operatorname{Dir}(1,\dots,1), \qquad
//! S^{(k)} = \frac{\mathbf{w}^{(k)\top}\mu - r_f}{\sqrt{\mathbf{w}^{(k)\top}\Sigma\mathbf{w}^{(k)}}}
//! $$
//!
//! Random long-only portfolios that trace the attainable risk/return cloud.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Dirichlet;
use rand_distr::Distribution;
use rayon::prelude::*;
use tracing::info;

use super::returns::AnnualizedStats;
use crate::error::PortfolioError;
use crate::error::Result;

/// Configuration for [`run_monte_carlo`].
#[derive(Clone, Debug)]
pub struct MonteCarloConfig {
  /// Number of random portfolios.
  pub n_portfolios: usize,
  /// Seed of the weight sampler.
  pub seed: u64,
}

impl Default for MonteCarloConfig {
  fn default() -> Self {
    Self {
      n_portfolios: 5000,
      seed: 42,
    }
  }
}

/// Risk and return of one sampled portfolio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulatedPortfolio {
  /// Annualized return `w' mu`.
  pub expected_return: f64,
  /// Annualized volatility `sqrt(w' Σ w)`.
  pub volatility: f64,
  /// `(expected_return - risk_free) / volatility`, or 0 for a zero-volatility portfolio.
  pub sharpe: f64,
}

/// Sampled portfolio cloud and its extremes.
#[derive(Clone, Debug)]
pub struct MonteCarloResult {
  /// Portfolios in draw order.
  pub portfolios: Vec<SimulatedPortfolio>,
  /// First portfolio with the highest Sharpe ratio.
  pub best_sharpe: SimulatedPortfolio,
  /// First portfolio with the lowest volatility.
  pub min_vol: SimulatedPortfolio,
  /// Number of sampled portfolios.
  pub count: usize,
}

/// Sharpe ratio of a sampled portfolio; zero volatility maps to 0.
pub fn simulated_sharpe(expected_return: f64, volatility: f64, risk_free: f64) -> f64 {
  if volatility > 0.0 {
    (expected_return - risk_free) / volatility
  } else {
    0.0
  }
}

/// Draw `cfg.n_portfolios` Dirichlet weight vectors and evaluate each against `stats`.
///
/// All draws come from one seeded generator in trial order before the portfolios are
/// evaluated in parallel, so the output depends only on the inputs and the seed.
pub fn run_monte_carlo(
  stats: &AnnualizedStats,
  cfg: &MonteCarloConfig,
  risk_free: f64,
) -> Result<MonteCarloResult> {
  let n = stats.n_assets();
  if n < 2 {
    return Err(PortfolioError::InsufficientAssets { found: n });
  }
  if cfg.n_portfolios == 0 {
    return Err(PortfolioError::InvalidInput(
      "at least one Monte Carlo portfolio is required".to_string(),
    ));
  }

  let dirichlet = Dirichlet::new_with_size(1.0, n)
    .map_err(|e| PortfolioError::InvalidInput(format!("invalid Dirichlet sampler: {e:?}")))?;
  let mut rng = StdRng::seed_from_u64(cfg.seed);
  let draws: Vec<Vec<f64>> = (0..cfg.n_portfolios)
    .map(|_| dirichlet.sample(&mut rng))
    .collect();

  let portfolios: Vec<SimulatedPortfolio> = draws
    .par_iter()
    .map(|w| {
      let expected_return = stats.portfolio_return(w);
      let volatility = stats.portfolio_volatility(w);
      SimulatedPortfolio {
        expected_return,
        volatility,
        sharpe: simulated_sharpe(expected_return, volatility, risk_free),
      }
    })
    .collect();

  let mut best_sharpe = portfolios[0];
  let mut min_vol = portfolios[0];
  for p in &portfolios[1..] {
    if p.sharpe > best_sharpe.sharpe {
      best_sharpe = *p;
    }
    if p.volatility < min_vol.volatility {
      min_vol = *p;
    }
  }

  info!(
    count = portfolios.len(),
    seed = cfg.seed,
    best_sharpe = best_sharpe.sharpe,
    min_vol = min_vol.volatility,
    "simulated random portfolios"
  );

  Ok(MonteCarloResult {
    count: portfolios.len(),
    portfolios,
    best_sharpe,
    min_vol,
  })
}
