//! # CAPM
//!
//! $$
//! \beta_i = \frac{\operatorname{Cov}(r_i, r_m)}{\operatorname{Var}(r_m)}, \qquad
//! \mathbb E[R_i] = r_f + \beta_i\,(\mathbb E[R_m] - r_f)
//! $$
//!
//! Betas against a market benchmark and the security-market-line expected returns that
//! replace historical means in the optimizers.

use std::collections::HashMap;

use chrono::NaiveDate;
use ndarray::Array1;
use tracing::debug;
use tracing::info;

use super::data::PriceMatrix;
use super::data::PriceSeries;
use super::returns::AnnualizedStats;
use super::returns::TRADING_DAYS_PER_YEAR;
use super::returns::covariance;
use super::returns::mean;
use super::returns::simple_returns;
use crate::error::PortfolioError;
use crate::error::Result;

/// Minimum number of dates shared by the assets and the benchmark.
pub const MIN_COMMON_DATES: usize = 30;

/// Betas and CAPM expected returns, in ticker order.
#[derive(Clone, Debug)]
pub struct CapmResult {
  /// Asset identifiers, aligned with `betas` and `expected_returns`.
  pub tickers: Vec<String>,
  /// `Cov(r_i, r_m) / Var(r_m)` over the common dates.
  pub betas: Array1<f64>,
  /// Annualized CAPM expected return per asset.
  pub expected_returns: Array1<f64>,
  /// Annualized mean benchmark return.
  pub market_return: f64,
  /// Annual risk-free rate used on the security market line.
  pub risk_free: f64,
  /// Number of return dates the betas were estimated on.
  pub common_dates: usize,
}

impl CapmResult {
  pub fn beta(&self, ticker: &str) -> Option<f64> {
    self.index_of(ticker).map(|i| self.betas[i])
  }

  pub fn expected_return(&self, ticker: &str) -> Option<f64> {
    self.index_of(ticker).map(|i| self.expected_returns[i])
  }

  fn index_of(&self, ticker: &str) -> Option<usize> {
    self.tickers.iter().position(|t| t == ticker)
  }

  /// Replace the expected returns of `stats` with the CAPM ones, keeping its covariance.
  pub fn apply_to(&self, stats: &AnnualizedStats) -> Result<AnnualizedStats> {
    let mu = stats
      .tickers
      .iter()
      .map(|t| {
        self.expected_return(t).ok_or_else(|| {
          PortfolioError::InvalidInput(format!("no CAPM expected return for {t}"))
        })
      })
      .collect::<Result<Vec<f64>>>()?;

    stats.with_expected_returns(Array1::from(mu))
  }
}

/// Daily simple returns of a single series keyed by the later date of each period.
fn dated_returns(dates: &[NaiveDate], prices: &Array1<f64>) -> Vec<(NaiveDate, f64)> {
  prices
    .windows(2)
    .into_iter()
    .zip(dates.iter().skip(1))
    .map(|(w, d)| (*d, w[1] / w[0] - 1.0))
    .collect()
}

/// Security market line: `r_f + beta (R_m - r_f)`.
pub fn capm_expected_return(beta: f64, risk_free: f64, market_return: f64) -> f64 {
  risk_free + beta * (market_return - risk_free)
}

/// Estimate betas of every asset against `benchmark` and their CAPM expected returns.
pub fn estimate_capm(
  prices: &PriceMatrix,
  benchmark: &PriceSeries,
  risk_free: f64,
) -> Result<CapmResult> {
  let market = dated_returns(benchmark.dates(), benchmark.prices());
  if market.len() < 2 {
    return Err(PortfolioError::InsufficientData {
      required: 2,
      found: market.len(),
    });
  }

  let market_daily: Vec<f64> = market.iter().map(|(_, r)| *r).collect();
  let market_return = mean(&market_daily) * TRADING_DAYS_PER_YEAR;

  let asset_returns = simple_returns(prices.prices().view());
  let asset_dates = &prices.dates()[1..];
  let market_by_date: HashMap<NaiveDate, f64> = market.into_iter().collect();

  let (rows, market_aligned): (Vec<usize>, Vec<f64>) = asset_dates
    .iter()
    .enumerate()
    .filter_map(|(row, d)| market_by_date.get(d).map(|r| (row, *r)))
    .unzip();

  let common = rows.len();
  debug!(
    asset_dates = asset_dates.len(),
    market_dates = market_by_date.len(),
    common,
    "aligned assets with benchmark"
  );
  if common < MIN_COMMON_DATES {
    return Err(PortfolioError::InsufficientOverlap {
      common,
      required: MIN_COMMON_DATES,
    });
  }

  let market_var = covariance(&market_aligned, &market_aligned);
  if market_var <= 0.0 {
    return Err(PortfolioError::InvalidInput(
      "benchmark returns have zero variance over the common dates".to_string(),
    ));
  }

  let betas: Array1<f64> = asset_returns
    .columns()
    .into_iter()
    .map(|col| {
      let aligned: Vec<f64> = rows.iter().map(|&r| col[r]).collect();
      covariance(&aligned, &market_aligned) / market_var
    })
    .collect();
  let expected_returns = betas.mapv(|b| capm_expected_return(b, risk_free, market_return));

  for (t, (b, er)) in prices
    .tickers()
    .iter()
    .zip(betas.iter().zip(expected_returns.iter()))
  {
    debug!(ticker = %t, beta = b, expected_return = er, "CAPM estimate");
  }
  info!(
    market_return,
    risk_free,
    common,
    "estimated CAPM expected returns"
  );

  Ok(CapmResult {
    tickers: prices.tickers().to_vec(),
    betas,
    expected_returns,
    market_return,
    risk_free,
    common_dates: common,
  })
}
