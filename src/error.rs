//! # Error
//!
//! $$
//! \text{request} \to \text{Result}\langle T, \text{PortfolioError} \rangle
//! $$
//!
//! Every failure is terminal for the current request and is surfaced to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortfolioError {
  #[error("Insufficient data: need at least {required} observations, found {found}")]
  InsufficientData { required: usize, found: usize },

  #[error("Insufficient assets: need at least 2 valid assets, found {found}")]
  InsufficientAssets { found: usize },

  #[error("Insufficient overlap: {common} common dates between assets and benchmark, need at least {required}")]
  InsufficientOverlap { common: usize, required: usize },

  #[error("Optimization failed: {0}")]
  OptimizationFailed(String),

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("I/O error: {0}")]
  Io(String),
}

impl From<argmin::core::Error> for PortfolioError {
  fn from(e: argmin::core::Error) -> Self {
    PortfolioError::OptimizationFailed(e.to_string())
  }
}

impl From<csv::Error> for PortfolioError {
  fn from(e: csv::Error) -> Self {
    PortfolioError::Io(e.to_string())
  }
}

impl From<std::io::Error> for PortfolioError {
  fn from(e: std::io::Error) -> Self {
    PortfolioError::Io(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, PortfolioError>;
