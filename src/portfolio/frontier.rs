//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(r^\*) = \min_{\mathbf{w}\in\Delta,\ \mathbf{w}^\top\mu=r^\*} \sqrt{\mathbf{w}^\top\Sigma\mathbf{w}},
//! \qquad r^\* \in \operatorname{linspace}(\min_i \mu_i, \max_i \mu_i)
//! $$
//!
//! Minimum-variance sweep over a grid of target returns.
//!
//! The grid spans the individual asset returns rather than the attainable range above the
//! global minimum-variance portfolio, so the lower (dominated) branch is included and targets
//! the solver cannot meet are dropped from the output.

use rayon::prelude::*;
use tracing::debug;
use tracing::info;

use super::optimizers::SolverConfig;
use super::optimizers::optimize_target_return;
use super::returns::AnnualizedStats;
use super::types::AssetPoint;
use super::types::EfficientFrontier;
use super::types::FrontierPoint;
use crate::error::PortfolioError;
use crate::error::Result;

/// `n` evenly spaced values from `lo` to `hi`, both included.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
  match n {
    0 => Vec::new(),
    1 => vec![lo],
    _ => {
      let step = (hi - lo) / (n - 1) as f64;
      (0..n)
        .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
        .collect()
    }
  }
}

/// Sweep `n_points` target returns between the lowest and highest asset return.
pub fn efficient_frontier(
  stats: &AnnualizedStats,
  n_points: usize,
  risk_free: f64,
  cfg: &SolverConfig,
) -> Result<EfficientFrontier> {
  let lo = stats.mu.iter().cloned().fold(f64::INFINITY, f64::min);
  let hi = stats.mu.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

  frontier_on_grid(stats, &linspace(lo, hi, n_points), risk_free, cfg)
}

/// Minimum-variance portfolio for every target in `targets`.
///
/// Targets are solved independently in parallel; a target whose solve fails is left out,
/// so the result may be shorter than the grid but keeps the grid order.
pub fn frontier_on_grid(
  stats: &AnnualizedStats,
  targets: &[f64],
  risk_free: f64,
  cfg: &SolverConfig,
) -> Result<EfficientFrontier> {
  let n = stats.n_assets();
  if n < 2 {
    return Err(PortfolioError::InsufficientAssets { found: n });
  }

  let points: Vec<FrontierPoint> = targets
    .par_iter()
    .filter_map(
      |&target| match optimize_target_return(stats, target, risk_free, cfg) {
        Ok(res) => Some(FrontierPoint {
          target_return: target,
          volatility: res.volatility,
          weights: res.weights,
        }),
        Err(e) => {
          debug!(target, error = %e, "dropping frontier point");
          None
        }
      },
    )
    .collect();

  let vols = stats.asset_volatilities();
  let assets = stats
    .tickers
    .iter()
    .enumerate()
    .map(|(i, t)| AssetPoint {
      ticker: t.clone(),
      expected_return: stats.mu[i],
      volatility: vols[i],
    })
    .collect();

  info!(
    requested = targets.len(),
    solved = points.len(),
    "swept efficient frontier"
  );

  Ok(EfficientFrontier {
    points,
    assets,
    requested: targets.len(),
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;
  use crate::portfolio::data::tests::synthetic_prices;
  use crate::portfolio::optimizers::optimize_min_variance;
  use crate::portfolio::returns::ReturnStats;

  fn stats() -> AnnualizedStats {
    AnnualizedStats::new(
      vec!["A".into(), "B".into(), "C".into()],
      array![0.06, 0.1, 0.14],
      array![[0.02, 0.004, 0.0], [0.004, 0.06, 0.01], [0.0, 0.01, 0.12]],
    )
    .unwrap()
  }

  #[test]
  fn linspace_includes_both_ends() {
    assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    assert_eq!(linspace(0.3, 0.9, 1), vec![0.3]);
    assert!(linspace(0.3, 0.9, 0).is_empty());
  }

  #[test]
  fn frontier_targets_are_ordered_and_bounded() {
    let f = efficient_frontier(&stats(), 15, 0.0, &SolverConfig::default()).unwrap();

    assert!(!f.points.is_empty());
    assert!(f.points.len() <= 15);
    assert!(f
      .points
      .windows(2)
      .all(|w| w[0].target_return <= w[1].target_return));
    for p in &f.points {
      let sum: f64 = p.weights.iter().sum();
      assert!((sum - 1.0).abs() < 1e-6);
      assert!(p.target_return >= 0.06 - 1e-12 && p.target_return <= 0.14 + 1e-12);
    }
  }

  #[test]
  fn frontier_never_beats_global_minimum_variance() {
    let s = stats();
    let cfg = SolverConfig::default();
    let gmv = optimize_min_variance(&s, 0.0, &cfg).unwrap();
    let f = efficient_frontier(&s, 10, 0.0, &cfg).unwrap();

    for p in &f.points {
      assert!(p.volatility >= gmv.volatility - 1e-6);
    }
  }

  #[test]
  fn frontier_reports_individual_assets() {
    let prices = synthetic_prices(200, &[0.0004, 0.0007], &[0.01, 0.018]);
    let s = ReturnStats::from_prices(&prices).unwrap().annualized();
    let f = efficient_frontier(&s, 8, 0.0, &SolverConfig::default()).unwrap();

    assert_eq!(f.assets.len(), 2);
    for (i, a) in f.assets.iter().enumerate() {
      assert_eq!(a.ticker, s.tickers[i]);
      assert_relative_eq!(a.expected_return, s.mu[i], epsilon = 1e-15);
      assert_relative_eq!(a.volatility, s.cov[[i, i]].sqrt(), epsilon = 1e-15);
    }
  }

  #[test]
  fn unreachable_targets_are_dropped_in_order() {
    let grid = [-0.5, 0.07, 0.1, 0.13, 0.9];
    let f = frontier_on_grid(&stats(), &grid, 0.0, &SolverConfig::default()).unwrap();

    assert_eq!(f.requested, 5);
    assert_eq!(f.points.len(), 3);
    let targets: Vec<f64> = f.points.iter().map(|p| p.target_return).collect();
    assert_eq!(targets, vec![0.07, 0.1, 0.13]);
  }

  #[test]
  fn failed_solves_still_return_a_frontier() {
    let cfg = SolverConfig {
      max_iters: 1,
      ..SolverConfig::default()
    };
    let f = efficient_frontier(&stats(), 6, 0.0, &cfg).unwrap();

    assert!(f.points.len() < 6);
    assert!(
      f.points
        .windows(2)
        .all(|w| w[0].target_return <= w[1].target_return)
    );
    assert_eq!(f.assets.len(), 3);
  }

  #[test]
  fn empty_grid_yields_empty_frontier() {
    let f = efficient_frontier(&stats(), 0, 0.0, &SolverConfig::default()).unwrap();
    assert!(f.points.is_empty());
    assert_eq!(f.assets.len(), 3);
  }
}
