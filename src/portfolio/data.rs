//! # Portfolio Data
//!
//! $$
//! P \in \mathbb{R}_{>0}^{T \times N}, \quad T \ge 30,\ N \ge 2
//! $$
//!
//! Dated price containers consumed by the estimators, with validation and gap cleaning.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use crate::error::PortfolioError;
use crate::error::Result;

/// Minimum number of price rows a [`PriceMatrix`] must hold.
pub const MIN_PRICE_ROWS: usize = 30;
/// Minimum number of asset columns a [`PriceMatrix`] must hold.
pub const MIN_ASSETS: usize = 2;
/// Columns with fewer valid observations than this share of rows are dropped by cleaning.
pub const MIN_VALID_SHARE: f64 = 0.5;

fn check_dates(dates: &[NaiveDate]) -> Result<()> {
  if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
    return Err(PortfolioError::InvalidInput(format!(
      "dates must be strictly increasing ({} is followed by {})",
      w[0], w[1]
    )));
  }
  Ok(())
}

fn is_valid_price(p: f64) -> bool {
  p.is_finite() && p > 0.0
}

/// Immutable dates x assets matrix of positive prices.
#[derive(Clone, Debug)]
pub struct PriceMatrix {
  tickers: Vec<String>,
  dates: Vec<NaiveDate>,
  prices: Array2<f64>,
}

impl PriceMatrix {
  /// Build a matrix from clean data. `prices` has one row per date and one column per ticker.
  pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, prices: Array2<f64>) -> Result<Self> {
    let (rows, cols) = prices.dim();

    if rows != dates.len() || cols != tickers.len() {
      return Err(PortfolioError::InvalidInput(format!(
        "price matrix is {rows}x{cols} but {} dates and {} tickers were given",
        dates.len(),
        tickers.len()
      )));
    }
    if cols < MIN_ASSETS {
      return Err(PortfolioError::InsufficientAssets { found: cols });
    }
    if rows < MIN_PRICE_ROWS {
      return Err(PortfolioError::InsufficientData {
        required: MIN_PRICE_ROWS,
        found: rows,
      });
    }

    for (i, t) in tickers.iter().enumerate() {
      if tickers[..i].contains(t) {
        return Err(PortfolioError::InvalidInput(format!("duplicate ticker {t}")));
      }
    }
    check_dates(&dates)?;

    if let Some(((r, c), p)) = prices.indexed_iter().find(|(_, &p)| !is_valid_price(p)) {
      return Err(PortfolioError::InvalidInput(format!(
        "price of {} on {} must be positive and finite, got {p}",
        tickers[c], dates[r]
      )));
    }

    Ok(Self {
      tickers,
      dates,
      prices,
    })
  }

  /// Build a matrix from columns that may contain gaps.
  ///
  /// Columns with fewer than half of their observations present are dropped, remaining gaps
  /// are forward-filled and rows that still miss a value (leading gaps) are removed before
  /// the usual invariants are checked.
  pub fn from_sparse(
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
  ) -> Result<Self> {
    let n_rows = dates.len();
    if columns.len() != tickers.len() {
      return Err(PortfolioError::InvalidInput(format!(
        "{} columns given for {} tickers",
        columns.len(),
        tickers.len()
      )));
    }
    if let Some((t, _)) = tickers
      .iter()
      .zip(columns.iter())
      .find(|(_, col)| col.len() != n_rows)
    {
      return Err(PortfolioError::InvalidInput(format!(
        "column {t} does not have {n_rows} rows"
      )));
    }
    check_dates(&dates)?;

    let threshold = n_rows as f64 * MIN_VALID_SHARE;
    let mut kept_tickers = Vec::new();
    let mut kept_columns = Vec::new();

    for (ticker, col) in tickers.into_iter().zip(columns) {
      let valid = col.iter().filter(|p| p.is_some_and(is_valid_price)).count();
      if n_rows == 0 || (valid as f64) < threshold {
        debug!(ticker = %ticker, valid, rows = n_rows, "dropping sparse price column");
        continue;
      }

      let mut last = None;
      let filled: Vec<Option<f64>> = col
        .into_iter()
        .map(|p| {
          if let Some(p) = p.filter(|&p| is_valid_price(p)) {
            last = Some(p);
          }
          last
        })
        .collect();

      kept_tickers.push(ticker);
      kept_columns.push(filled);
    }

    let complete_rows: Vec<usize> = (0..n_rows)
      .filter(|&r| kept_columns.iter().all(|col| col[r].is_some()))
      .collect();

    let kept_dates = complete_rows.iter().map(|&r| dates[r]).collect();
    let prices = Array2::from_shape_fn(
      (complete_rows.len(), kept_columns.len()),
      |(r, c)| kept_columns[c][complete_rows[r]].unwrap_or(f64::NAN),
    );

    Self::new(kept_dates, kept_tickers, prices)
  }

  /// Sub-matrix holding the requested tickers in the requested order. Unknown tickers are skipped.
  pub fn select(&self, tickers: &[String]) -> Result<Self> {
    let idx: Vec<usize> = tickers
      .iter()
      .filter_map(|t| self.column_index(t))
      .collect();
    let prices = self.prices.select(ndarray::Axis(1), &idx);
    let tickers = idx.iter().map(|&i| self.tickers[i].clone()).collect();

    Self::new(self.dates.clone(), tickers, prices)
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  pub fn n_rows(&self) -> usize {
    self.dates.len()
  }

  pub fn column_index(&self, ticker: &str) -> Option<usize> {
    self.tickers.iter().position(|t| t == ticker)
  }
}

/// Single dated price series, used for the market benchmark.
#[derive(Clone, Debug)]
pub struct PriceSeries {
  dates: Vec<NaiveDate>,
  prices: Array1<f64>,
}

impl PriceSeries {
  pub fn new(dates: Vec<NaiveDate>, prices: Vec<f64>) -> Result<Self> {
    if dates.len() != prices.len() {
      return Err(PortfolioError::InvalidInput(format!(
        "{} dates given for {} prices",
        dates.len(),
        prices.len()
      )));
    }
    if prices.len() < 2 {
      return Err(PortfolioError::InsufficientData {
        required: 2,
        found: prices.len(),
      });
    }
    check_dates(&dates)?;
    if let Some((i, p)) = prices.iter().enumerate().find(|(_, &p)| !is_valid_price(p)) {
      return Err(PortfolioError::InvalidInput(format!(
        "benchmark price on {} must be positive and finite, got {p}",
        dates[i]
      )));
    }

    Ok(Self {
      dates,
      prices: Array1::from(prices),
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn prices(&self) -> &Array1<f64> {
    &self.prices
  }

  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }
}
