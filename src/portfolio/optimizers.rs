//! # Portfolio Optimizers
//!
//! $$
//! \max_{\mathbf{w}\in\Delta} \frac{\mathbf{w}^\top\mu-r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! \qquad
//! \min_{\mathbf{w}\in\Delta,\ \mathbf{w}^\top\mu=r^\*} \sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}
//! $$
//!
//! Long-only, fully invested mean-variance solvers.
//!
//! Weights live on the simplex $\Delta$ through a softmax map, so $\sum w_i = 1$ and
//! $0 \le w_i \le 1$ hold for every iterate. The return equality is enforced with an
//! augmented Lagrangian outer loop whose subproblems are solved by L-BFGS with analytic
//! gradients. Every solve starts from the uniform portfolio.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::State;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use tracing::debug;

use super::returns::AnnualizedStats;
use super::types::PortfolioResult;
use crate::error::PortfolioError;
use crate::error::Result;

/// Tolerance on `sum(w) = 1` and `w_i >= 0` accepted for a solution.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Iteration budgets and tolerances of the constrained solver.
#[derive(Clone, Debug)]
pub struct SolverConfig {
  /// L-BFGS iterations allowed per subproblem.
  pub max_iters: u64,
  /// Augmented Lagrangian updates allowed for the return constraint.
  pub max_outer_iters: usize,
  /// Accepted residual of `w' mu = target`.
  pub eq_tolerance: f64,
  /// Gradient norm at which a subproblem is converged.
  pub grad_tolerance: f64,
  /// Cost change at which a subproblem is converged.
  pub cost_tolerance: f64,
  /// Initial quadratic penalty on the return residual.
  pub initial_penalty: f64,
  /// L-BFGS history length.
  pub memory: usize,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_iters: 500,
      max_outer_iters: 20,
      eq_tolerance: 1e-6,
      grad_tolerance: 1e-10,
      cost_tolerance: 1e-12,
      initial_penalty: 10.0,
      memory: 10,
    }
  }
}

pub(crate) fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  exps.iter().map(|&e| e / sum).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Pull a gradient in weight space back through the softmax: `w_j (g_j - w'g)`.
fn softmax_pullback(w: &[f64], g: &[f64]) -> Vec<f64> {
  let wg = dot(w, g);
  w.iter().zip(g.iter()).map(|(wj, gj)| wj * (gj - wg)).collect()
}

#[derive(Clone, Copy, Debug)]
enum Objective {
  /// Negative Sharpe ratio, infinite at zero volatility.
  MaxSharpe { risk_free: f64 },
  /// Portfolio volatility.
  MinVolatility,
  /// Volatility plus augmented Lagrangian terms for `w' mu = target`.
  TargetReturn {
    target: f64,
    multiplier: f64,
    penalty: f64,
  },
}

#[derive(Clone)]
struct WeightProblem {
  mu: Vec<f64>,
  cov: Vec<Vec<f64>>,
  objective: Objective,
}

struct Moments {
  w: Vec<f64>,
  sigma_w: Vec<f64>,
  ret: f64,
  vol: f64,
}

impl WeightProblem {
  fn new(stats: &AnnualizedStats, objective: Objective) -> Self {
    Self {
      mu: stats.mu.to_vec(),
      cov: stats.cov.rows().into_iter().map(|r| r.to_vec()).collect(),
      objective,
    }
  }

  fn moments(&self, x: &[f64]) -> Moments {
    let w = softmax(x);
    let sigma_w: Vec<f64> = self.cov.iter().map(|row| dot(row, &w)).collect();
    let ret = dot(&w, &self.mu);
    let vol = dot(&w, &sigma_w).max(0.0).sqrt();
    Moments {
      w,
      sigma_w,
      ret,
      vol,
    }
  }
}

impl CostFunction for WeightProblem {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let m = self.moments(x);

    Ok(match self.objective {
      Objective::MaxSharpe { risk_free } => {
        if m.vol == 0.0 {
          f64::INFINITY
        } else {
          -(m.ret - risk_free) / m.vol
        }
      }
      Objective::MinVolatility => m.vol,
      Objective::TargetReturn {
        target,
        multiplier,
        penalty,
      } => {
        let h = m.ret - target;
        m.vol + multiplier * h + 0.5 * penalty * h * h
      }
    })
  }
}

impl Gradient for WeightProblem {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
    let m = self.moments(x);
    let n = m.w.len();

    // d vol / d w = Σw / vol
    let dvol: Vec<f64> = if m.vol > 0.0 {
      m.sigma_w.iter().map(|s| s / m.vol).collect()
    } else {
      vec![0.0; n]
    };

    let g_w: Vec<f64> = match self.objective {
      Objective::MaxSharpe { risk_free } => {
        if m.vol == 0.0 {
          vec![0.0; n]
        } else {
          let excess = m.ret - risk_free;
          (0..n)
            .map(|i| -(self.mu[i] / m.vol - excess * dvol[i] / (m.vol * m.vol)))
            .collect()
        }
      }
      Objective::MinVolatility => dvol,
      Objective::TargetReturn {
        target,
        multiplier,
        penalty,
      } => {
        let scale = multiplier + penalty * (m.ret - target);
        (0..n).map(|i| dvol[i] + scale * self.mu[i]).collect()
      }
    };

    Ok(softmax_pullback(&m.w, &g_w))
  }
}

/// Solve one unconstrained subproblem in softmax coordinates.
fn run_lbfgs(problem: WeightProblem, x0: Vec<f64>, cfg: &SolverConfig) -> Result<Vec<f64>> {
  let linesearch = MoreThuenteLineSearch::new();
  let solver = LBFGS::new(linesearch, cfg.memory)
    .with_tolerance_grad(cfg.grad_tolerance)?
    .with_tolerance_cost(cfg.cost_tolerance)?;

  let res = Executor::new(problem, solver)
    .configure(|state| state.param(x0).max_iters(cfg.max_iters))
    .run()?;

  let state = res.state();
  match state.get_termination_status() {
    TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
      return Err(PortfolioError::OptimizationFailed(format!(
        "iteration limit of {} reached",
        cfg.max_iters
      )));
    }
    TerminationStatus::NotTerminated => {
      return Err(PortfolioError::OptimizationFailed(
        "solver stopped without terminating".to_string(),
      ));
    }
    TerminationStatus::Terminated(reason) => {
      debug!(iters = state.get_iter(), cost = state.get_best_cost(), ?reason, "subproblem solved");
    }
  }

  let x = state
    .get_best_param()
    .cloned()
    .ok_or_else(|| PortfolioError::OptimizationFailed("solver returned no parameters".into()))?;

  if !state.get_best_cost().is_finite() {
    return Err(PortfolioError::OptimizationFailed(
      "objective is not finite at the solution".to_string(),
    ));
  }

  Ok(x)
}

fn check_assets(stats: &AnnualizedStats) -> Result<usize> {
  let n = stats.n_assets();
  if n < 2 {
    return Err(PortfolioError::InsufficientAssets { found: n });
  }
  Ok(n)
}

/// Validate the solved weights and evaluate them.
fn finish(stats: &AnnualizedStats, x: &[f64], risk_free: f64) -> Result<PortfolioResult> {
  let weights = softmax(x);
  let sum: f64 = weights.iter().sum();

  if (sum - 1.0).abs() > WEIGHT_TOLERANCE || weights.iter().any(|&w| w < -WEIGHT_TOLERANCE) {
    return Err(PortfolioError::OptimizationFailed(format!(
      "weights violate the simplex constraints (sum = {sum})"
    )));
  }

  Ok(PortfolioResult::evaluate(stats, weights, risk_free))
}

/// Long-only portfolio with the highest Sharpe ratio.
pub fn optimize_max_sharpe(
  stats: &AnnualizedStats,
  risk_free: f64,
  cfg: &SolverConfig,
) -> Result<PortfolioResult> {
  let n = check_assets(stats)?;
  debug!(assets = n, risk_free, "maximizing Sharpe ratio");

  let problem = WeightProblem::new(stats, Objective::MaxSharpe { risk_free });
  let x = run_lbfgs(problem, vec![0.0; n], cfg)?;

  finish(stats, &x, risk_free)
}

/// Long-only portfolio with the lowest volatility, regardless of return.
pub fn optimize_min_variance(
  stats: &AnnualizedStats,
  risk_free: f64,
  cfg: &SolverConfig,
) -> Result<PortfolioResult> {
  let n = check_assets(stats)?;
  debug!(assets = n, "minimizing volatility");

  let problem = WeightProblem::new(stats, Objective::MinVolatility);
  let x = run_lbfgs(problem, vec![0.0; n], cfg)?;

  finish(stats, &x, risk_free)
}

/// Long-only portfolio with the lowest volatility among those returning exactly `target`.
pub fn optimize_target_return(
  stats: &AnnualizedStats,
  target: f64,
  risk_free: f64,
  cfg: &SolverConfig,
) -> Result<PortfolioResult> {
  let n = check_assets(stats)?;

  let lo = stats.mu.iter().cloned().fold(f64::INFINITY, f64::min);
  let hi = stats.mu.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  if target < lo - cfg.eq_tolerance || target > hi + cfg.eq_tolerance {
    return Err(PortfolioError::OptimizationFailed(format!(
      "target return {target} outside attainable range [{lo}, {hi}]"
    )));
  }

  let mut x = vec![0.0; n];
  let mut multiplier = 0.0;
  let mut penalty = cfg.initial_penalty;
  let mut last_residual = f64::INFINITY;
  let mut residual = f64::INFINITY;

  for outer in 0..cfg.max_outer_iters {
    let problem = WeightProblem::new(
      stats,
      Objective::TargetReturn {
        target,
        multiplier,
        penalty,
      },
    );
    x = run_lbfgs(problem, x, cfg)?;

    let h = stats.portfolio_return(&softmax(&x)) - target;
    residual = h.abs();
    debug!(outer, target, residual, penalty, "return constraint update");

    if residual <= cfg.eq_tolerance {
      return finish(stats, &x, risk_free);
    }

    multiplier += penalty * h;
    if residual > 0.25 * last_residual {
      penalty = (penalty * 10.0).min(1e10);
    }
    last_residual = residual;
  }

  Err(PortfolioError::OptimizationFailed(format!(
    "return constraint residual {residual:.3e} above tolerance after {} updates",
    cfg.max_outer_iters
  )))
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;
  use crate::portfolio::data::tests::synthetic_prices;
  use crate::portfolio::returns::ReturnStats;

  fn three_asset_stats() -> AnnualizedStats {
    AnnualizedStats::new(
      vec!["A".into(), "B".into(), "C".into()],
      array![0.08, 0.1, 0.12],
      array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.02], [0.0, 0.02, 0.16]],
    )
    .unwrap()
  }

  fn assert_valid_weights(res: &PortfolioResult, n: usize) {
    assert_eq!(res.weights.len(), n);
    let sum: f64 = res.weights.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6, "weights sum to {sum}");
    assert!(res.weights.iter().all(|&w| w >= 0.0 && w <= 1.0));
  }

  #[test]
  fn softmax_pullback_matches_finite_differences() {
    let stats = three_asset_stats();
    let problem = WeightProblem::new(
      &stats,
      Objective::TargetReturn {
        target: 0.1,
        multiplier: 0.3,
        penalty: 10.0,
      },
    );
    let x = vec![0.2, -0.4, 0.1];
    let g = problem.gradient(&x).unwrap();
    let eps = 1e-6;

    for i in 0..3 {
      let mut xp = x.clone();
      let mut xm = x.clone();
      xp[i] += eps;
      xm[i] -= eps;
      let fd = (problem.cost(&xp).unwrap() - problem.cost(&xm).unwrap()) / (2.0 * eps);
      assert_relative_eq!(g[i], fd, epsilon = 1e-7);
    }
  }

  #[test]
  fn max_sharpe_weights_are_valid() {
    let res = optimize_max_sharpe(&three_asset_stats(), 0.02, &SolverConfig::default()).unwrap();
    assert_valid_weights(&res, 3);
    assert!(res.sharpe > 0.0);
  }

  #[test]
  fn max_sharpe_beats_uniform_portfolio() {
    let stats = three_asset_stats();
    let res = optimize_max_sharpe(&stats, 0.02, &SolverConfig::default()).unwrap();
    let uniform = PortfolioResult::evaluate(&stats, vec![1.0 / 3.0; 3], 0.02);
    assert!(res.sharpe >= uniform.sharpe - 1e-9);
  }

  #[test]
  fn dominant_asset_attracts_the_weight() {
    let stats = AnnualizedStats::new(
      vec!["WIN".into(), "B".into(), "C".into()],
      array![0.30, 0.05, 0.05],
      array![[0.01, 0.0, 0.0], [0.0, 0.09, 0.01], [0.0, 0.01, 0.09]],
    )
    .unwrap();

    let res = optimize_max_sharpe(&stats, 0.0, &SolverConfig::default()).unwrap();
    assert_valid_weights(&res, 3);
    assert!(res.weight_of("WIN").unwrap() > 0.9, "weights: {:?}", res.weights);
  }

  #[test]
  fn sharpe_round_trips_from_reported_fields() {
    let rf = 0.03;
    let res = optimize_max_sharpe(&three_asset_stats(), rf, &SolverConfig::default()).unwrap();
    assert_eq!(res.sharpe, (res.expected_return - rf) / res.volatility);
  }

  #[test]
  fn target_return_is_met_with_minimal_risk() {
    let stats = three_asset_stats();
    let cfg = SolverConfig::default();
    let res = optimize_target_return(&stats, 0.1, 0.0, &cfg).unwrap();
    let gmv = optimize_min_variance(&stats, 0.0, &cfg).unwrap();

    assert_valid_weights(&res, 3);
    assert!((res.expected_return - 0.1).abs() <= 1e-6);
    assert!(res.volatility >= gmv.volatility - 1e-9);

    let uniform = PortfolioResult::evaluate(&stats, vec![1.0 / 3.0; 3], 0.0);
    assert!((uniform.expected_return - 0.1).abs() < 1e-12);
    assert!(res.volatility <= uniform.volatility + 1e-9);
  }

  #[test]
  fn unattainable_target_fails() {
    let err = optimize_target_return(&three_asset_stats(), 0.5, 0.0, &SolverConfig::default())
      .unwrap_err();
    assert!(matches!(err, PortfolioError::OptimizationFailed(_)));
  }

  #[test]
  fn single_asset_is_rejected() {
    let stats = AnnualizedStats::new(vec!["A".into()], array![0.1], array![[0.04]]).unwrap();
    let err = optimize_max_sharpe(&stats, 0.0, &SolverConfig::default()).unwrap_err();
    assert!(matches!(err, PortfolioError::InsufficientAssets { found: 1 }));
  }

  #[test]
  fn tiny_iteration_budget_reports_failure() {
    let cfg = SolverConfig {
      max_iters: 1,
      ..SolverConfig::default()
    };
    let err = optimize_max_sharpe(&three_asset_stats(), 0.02, &cfg).unwrap_err();
    assert!(matches!(err, PortfolioError::OptimizationFailed(_)));
  }

  #[test]
  fn synthetic_three_asset_history_with_positive_drift() {
    let prices = synthetic_prices(252, &[0.0008, 0.0005, 0.0011], &[0.012, 0.009, 0.015]);
    let stats = ReturnStats::from_prices(&prices).unwrap().annualized();
    let res = optimize_max_sharpe(&stats, 0.0, &SolverConfig::default()).unwrap();

    assert_valid_weights(&res, 3);
    assert!(res.expected_return > 0.0);
    for (i, vol) in res.individual_volatilities.iter().enumerate() {
      assert_relative_eq!(*vol, stats.cov[[i, i]].sqrt(), epsilon = 1e-12);
    }
  }
}
