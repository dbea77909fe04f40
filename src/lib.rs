//! # markowitz-rs
//!
//! $$
//! \mathbf{w}^\* = \arg\max_{\mathbf{w}\in\Delta} \frac{\mathbf{w}^\top\mu - r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Long-only Markowitz portfolio optimization with CAPM expected returns, efficient frontier
//! sweeps and Monte Carlo portfolio clouds.

pub mod error;
pub mod portfolio;
pub mod providers;

pub use error::PortfolioError;
pub use error::Result;
pub use portfolio::PortfolioAnalysis;
pub use portfolio::PortfolioEngine;
pub use portfolio::PortfolioEngineConfig;
pub use portfolio::PriceMatrix;
pub use portfolio::PriceSeries;
