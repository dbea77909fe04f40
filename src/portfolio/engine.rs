//! # Portfolio Engine
//!
//! $$
//! P \to (\mu, \Sigma) \xrightarrow{\text{CAPM}} (\mu^{\text{CAPM}}, \Sigma) \to
//! \{\mathbf{w}^\*_{\text{Sharpe}}, \mathbf{w}^\*_{\text{GMV}}, \text{frontier}, \text{cloud}\}
//! $$
//!
//! High-level orchestration of the estimation, optimization and simulation steps.

use tracing::info;
use tracing::warn;

use super::capm::CapmResult;
use super::capm::estimate_capm;
use super::data::PriceMatrix;
use super::data::PriceSeries;
use super::frontier::efficient_frontier;
use super::montecarlo::MonteCarloConfig;
use super::montecarlo::MonteCarloResult;
use super::montecarlo::run_monte_carlo;
use super::optimizers::SolverConfig;
use super::optimizers::optimize_max_sharpe;
use super::optimizers::optimize_min_variance;
use super::optimizers::optimize_target_return;
use super::returns::AnnualizedStats;
use super::returns::ReturnStats;
use super::types::EfficientFrontier;
use super::types::PortfolioResult;
use crate::error::Result;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Annual risk-free rate used in Sharpe computations and CAPM.
  pub risk_free: f64,
  /// Number of target returns swept on the frontier.
  pub frontier_points: usize,
  /// Random portfolio cloud settings.
  pub monte_carlo: MonteCarloConfig,
  /// Constrained solver budgets and tolerances.
  pub solver: SolverConfig,
  /// Replace historical means by CAPM expected returns when a benchmark is supplied.
  pub use_capm: bool,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      risk_free: 0.0,
      frontier_points: 30,
      monte_carlo: MonteCarloConfig::default(),
      solver: SolverConfig::default(),
      use_capm: true,
    }
  }
}

/// Everything computed for one request.
#[derive(Clone, Debug)]
pub struct PortfolioAnalysis {
  /// Annualized inputs the portfolios were optimized on.
  pub stats: AnnualizedStats,
  /// CAPM estimates, when they replaced the historical means.
  pub capm: Option<CapmResult>,
  /// Highest Sharpe ratio portfolio.
  pub max_sharpe: PortfolioResult,
  /// Global minimum-variance portfolio.
  pub min_variance: PortfolioResult,
  pub frontier: EfficientFrontier,
  pub monte_carlo: MonteCarloResult,
}

/// Single entry-point engine for the portfolio workflow.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Annualized optimizer inputs, with CAPM expected returns when enabled and a benchmark is given.
  pub fn inputs(
    &self,
    prices: &PriceMatrix,
    benchmark: Option<&PriceSeries>,
  ) -> Result<(AnnualizedStats, Option<CapmResult>)> {
    let stats = ReturnStats::from_prices(prices)?.annualized();

    match benchmark {
      Some(bench) if self.config.use_capm => {
        let capm = estimate_capm(prices, bench, self.config.risk_free)?;
        Ok((capm.apply_to(&stats)?, Some(capm)))
      }
      Some(_) => {
        warn!("benchmark supplied but CAPM is disabled, using historical means");
        Ok((stats, None))
      }
      None => Ok((stats, None)),
    }
  }

  /// Maximum-Sharpe portfolio.
  pub fn optimize(&self, stats: &AnnualizedStats) -> Result<PortfolioResult> {
    optimize_max_sharpe(stats, self.config.risk_free, &self.config.solver)
  }

  /// Global minimum-variance portfolio.
  pub fn min_variance(&self, stats: &AnnualizedStats) -> Result<PortfolioResult> {
    optimize_min_variance(stats, self.config.risk_free, &self.config.solver)
  }

  /// Minimum-variance portfolio at a target annual return.
  pub fn target_return(&self, stats: &AnnualizedStats, target: f64) -> Result<PortfolioResult> {
    optimize_target_return(stats, target, self.config.risk_free, &self.config.solver)
  }

  /// Efficient frontier with the configured number of points.
  pub fn frontier(&self, stats: &AnnualizedStats) -> Result<EfficientFrontier> {
    efficient_frontier(
      stats,
      self.config.frontier_points,
      self.config.risk_free,
      &self.config.solver,
    )
  }

  /// Random portfolio cloud.
  pub fn simulate(&self, stats: &AnnualizedStats) -> Result<MonteCarloResult> {
    run_monte_carlo(stats, &self.config.monte_carlo, self.config.risk_free)
  }

  /// Run the full pipeline on one price matrix.
  pub fn analyze(
    &self,
    prices: &PriceMatrix,
    benchmark: Option<&PriceSeries>,
  ) -> Result<PortfolioAnalysis> {
    let (stats, capm) = self.inputs(prices, benchmark)?;

    let max_sharpe = self.optimize(&stats)?;
    let min_variance = self.min_variance(&stats)?;
    let frontier = self.frontier(&stats)?;
    let monte_carlo = self.simulate(&stats)?;

    info!(
      assets = stats.n_assets(),
      rows = prices.n_rows(),
      capm = capm.is_some(),
      expected_return = max_sharpe.expected_return,
      volatility = max_sharpe.volatility,
      sharpe = max_sharpe.sharpe,
      "portfolio analysis complete"
    );

    Ok(PortfolioAnalysis {
      stats,
      capm,
      max_sharpe,
      min_variance,
      frontier,
      monte_carlo,
    })
  }
}
