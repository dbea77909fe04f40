//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}, \qquad \mu_p = \mathbf{w}^\top \mu
//! $$
//!
//! Mean-variance estimation, long-only optimization, efficient frontiers, CAPM and random
//! portfolio clouds.

pub mod capm;
pub mod data;
pub mod engine;
pub mod frontier;
pub mod montecarlo;
pub mod optimizers;
pub mod returns;
pub mod types;

pub use capm::CapmResult;
pub use capm::capm_expected_return;
pub use capm::estimate_capm;
pub use data::PriceMatrix;
pub use data::PriceSeries;
pub use engine::PortfolioAnalysis;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use frontier::efficient_frontier;
pub use frontier::frontier_on_grid;
pub use montecarlo::MonteCarloConfig;
pub use montecarlo::MonteCarloResult;
pub use montecarlo::SimulatedPortfolio;
pub use montecarlo::run_monte_carlo;
pub use optimizers::SolverConfig;
pub use optimizers::optimize_max_sharpe;
pub use optimizers::optimize_min_variance;
pub use optimizers::optimize_target_return;
pub use returns::AnnualizedStats;
pub use returns::ReturnStats;
pub use returns::TRADING_DAYS_PER_YEAR;
pub use returns::simple_returns;
pub use types::Allocation;
pub use types::AssetPoint;
pub use types::EfficientFrontier;
pub use types::FrontierPoint;
pub use types::PortfolioResult;
