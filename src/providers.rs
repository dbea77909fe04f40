//! # Providers
//!
//! $$
//! \text{source} \to (P_{T\times N},\ P^{m}_{T},\ r_f)
//! $$
//!
//! Inputs of the portfolio engine: asset prices, benchmark prices and the risk-free rate.
//! The engine itself never performs I/O; everything it needs flows through these traits.

use std::fmt::Display;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::Months;
use chrono::NaiveDate;
use tracing::debug;
use tracing::warn;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::portfolio::PriceMatrix;
use crate::portfolio::PriceSeries;

/// Annual risk-free rate used when the configured provider fails.
pub const FALLBACK_RISK_FREE_RATE: f64 = 0.04;

/// History window requested from a provider, counted in calendar years back from the last date.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Lookback {
  Years(u32),
  /// Everything the source holds.
  #[default]
  Max,
}

impl Lookback {
  /// First date included when the latest observation is on `end`. `None` means no cut-off,
  /// including windows reaching past the earliest representable date.
  pub fn start_date(&self, end: NaiveDate) -> Option<NaiveDate> {
    match self {
      Lookback::Years(y) => y
        .checked_mul(12)
        .and_then(|months| end.checked_sub_months(Months::new(months))),
      Lookback::Max => None,
    }
  }
}

impl FromStr for Lookback {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim().to_ascii_lowercase();
    if s == "max" {
      return Ok(Lookback::Max);
    }

    match s.strip_suffix('y').map(str::parse::<u32>) {
      Some(Ok(years)) if years > 0 && years.checked_mul(12).is_some() => {
        Ok(Lookback::Years(years))
      }
      _ => Err(PortfolioError::InvalidInput(format!(
        "invalid period {s:?}, expected e.g. 1y, 5y or max"
      ))),
    }
  }
}

impl Display for Lookback {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Lookback::Years(y) => write!(f, "{y}y"),
      Lookback::Max => write!(f, "max"),
    }
  }
}

/// Daily closing prices for a set of tickers.
pub trait PriceProvider {
  fn prices(&self, tickers: &[String], lookback: Lookback) -> Result<PriceMatrix>;
}

/// Daily prices of the market benchmark.
pub trait BenchmarkProvider {
  fn benchmark(&self, lookback: Lookback) -> Result<PriceSeries>;
}

/// Current annualized risk-free rate as a decimal.
pub trait RiskFreeRateProvider {
  fn risk_free_rate(&self) -> Result<f64>;
}

/// Rate from `provider`, or [`FALLBACK_RISK_FREE_RATE`] when it fails or returns a non-finite value.
pub fn resolve_risk_free_rate(provider: &dyn RiskFreeRateProvider) -> f64 {
  match provider.risk_free_rate() {
    Ok(rate) if rate.is_finite() => rate,
    Ok(rate) => {
      warn!(
        rate,
        fallback = FALLBACK_RISK_FREE_RATE,
        "risk-free rate is not finite, using fallback"
      );
      FALLBACK_RISK_FREE_RATE
    }
    Err(e) => {
      warn!(error = %e, fallback = FALLBACK_RISK_FREE_RATE, "risk-free rate unavailable, using fallback");
      FALLBACK_RISK_FREE_RATE
    }
  }
}

/// Fixed risk-free rate.
#[derive(Clone, Copy, Debug)]
pub struct ConstantRate(pub f64);

impl RiskFreeRateProvider for ConstantRate {
  fn risk_free_rate(&self) -> Result<f64> {
    Ok(self.0)
  }
}

/// Wide CSV price file: a `date` column (`YYYY-MM-DD`) followed by one column per ticker.
///
/// Empty cells are gaps; they are cleaned when a [`PriceMatrix`] is built from the source.
#[derive(Clone, Debug)]
pub struct CsvPriceSource {
  dates: Vec<NaiveDate>,
  tickers: Vec<String>,
  columns: Vec<Vec<Option<f64>>>,
  benchmark: Option<String>,
}

impl CsvPriceSource {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
      .map_err(|e| PortfolioError::Io(format!("failed to open {}: {e}", path.display())))?;
    let source = Self::from_reader(file)?;
    debug!(
      path = %path.display(),
      rows = source.dates.len(),
      columns = source.tickers.len(),
      "loaded price file"
    );
    Ok(source)
  }

  pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
    let mut rdr = csv::ReaderBuilder::new()
      .has_headers(true)
      .trim(csv::Trim::All)
      .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
      return Err(PortfolioError::InvalidInput(
        "price file needs a date column and at least one ticker column".to_string(),
      ));
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut dates = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); tickers.len()];

    for (line, record) in rdr.records().enumerate() {
      let record = record?;
      let raw_date = record.get(0).unwrap_or_default();
      let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
        PortfolioError::InvalidInput(format!("row {}: invalid date {raw_date:?}: {e}", line + 1))
      })?;
      dates.push(date);

      for (c, column) in columns.iter_mut().enumerate() {
        let cell = record.get(c + 1).unwrap_or_default();
        let value = if cell.is_empty() {
          None
        } else {
          Some(cell.parse::<f64>().map_err(|e| {
            PortfolioError::InvalidInput(format!(
              "row {}: invalid price {cell:?} for {}: {e}",
              line + 1,
              tickers[c]
            ))
          })?)
        };
        column.push(value);
      }
    }

    Ok(Self {
      dates,
      tickers,
      columns,
      benchmark: None,
    })
  }

  /// Use the column named `ticker` as the market benchmark.
  pub fn with_benchmark(mut self, ticker: impl Into<String>) -> Self {
    self.benchmark = Some(ticker.into());
    self
  }

  /// Every ticker column in file order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.columns[i].as_slice())
  }

  /// Index of the first row inside the lookback window.
  fn first_row(&self, lookback: Lookback) -> usize {
    match self.dates.last().and_then(|&end| lookback.start_date(end)) {
      Some(start) => self.dates.partition_point(|d| *d < start),
      None => 0,
    }
  }
}

impl PriceProvider for CsvPriceSource {
  /// Requested columns over the lookback window. An empty request selects every column except
  /// the benchmark; unknown tickers are skipped.
  fn prices(&self, tickers: &[String], lookback: Lookback) -> Result<PriceMatrix> {
    let wanted: Vec<String> = if tickers.is_empty() {
      self
        .tickers
        .iter()
        .filter(|t| self.benchmark.as_ref() != Some(*t))
        .cloned()
        .collect()
    } else {
      tickers.to_vec()
    };

    let first = self.first_row(lookback);
    let mut names = Vec::with_capacity(wanted.len());
    let mut columns = Vec::with_capacity(wanted.len());
    for t in wanted {
      match self.column(&t) {
        Some(col) => {
          columns.push(col[first..].to_vec());
          names.push(t);
        }
        None => warn!(ticker = %t, "ticker not found in price file, skipping"),
      }
    }

    PriceMatrix::from_sparse(self.dates[first..].to_vec(), names, columns)
  }
}

impl BenchmarkProvider for CsvPriceSource {
  /// Benchmark column over the lookback window, with gaps skipped.
  fn benchmark(&self, lookback: Lookback) -> Result<PriceSeries> {
    let name = self
      .benchmark
      .as_deref()
      .ok_or_else(|| PortfolioError::InvalidInput("no benchmark column configured".to_string()))?;
    let col = self.column(name).ok_or_else(|| {
      PortfolioError::InvalidInput(format!("benchmark column {name} not found in price file"))
    })?;

    let first = self.first_row(lookback);
    let (dates, prices): (Vec<NaiveDate>, Vec<f64>) = self.dates[first..]
      .iter()
      .zip(col[first..].iter())
      .filter_map(|(d, p)| p.map(|p| (*d, p)))
      .unzip();

    PriceSeries::new(dates, prices)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use tempfile::NamedTempFile;
  use tracing_test::traced_test;

  use super::*;

  struct FailingRate;

  impl RiskFreeRateProvider for FailingRate {
    fn risk_free_rate(&self) -> Result<f64> {
      Err(PortfolioError::Io("treasury feed unreachable".to_string()))
    }
  }

  /// 60 daily rows from 2020-01-01 with columns AAA, BBB, CCC (sparse) and MKT.
  fn sample_csv() -> String {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let mut out = String::from("date,AAA,BBB,CCC,MKT\n");
    for i in 0..60 {
      let d = start + chrono::Duration::days(i);
      let a = 100.0 + i as f64;
      let b = if i == 3 { String::new() } else { format!("{}", 50.0 + 0.5 * i as f64) };
      let c = if i % 4 == 0 { "20".to_string() } else { String::new() };
      let m = 1000.0 + 2.0 * i as f64 + (i % 3) as f64;
      out.push_str(&format!("{d},{a},{b},{c},{m}\n"));
    }
    out
  }

  fn write_sample() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(sample_csv().as_bytes()).unwrap();
    file
  }

  #[test]
  fn lookback_parses_periods() {
    assert_eq!("5y".parse::<Lookback>().unwrap(), Lookback::Years(5));
    assert_eq!("10Y".parse::<Lookback>().unwrap(), Lookback::Years(10));
    assert_eq!("max".parse::<Lookback>().unwrap(), Lookback::Max);
    assert!("0y".parse::<Lookback>().is_err());
    assert!("5d".parse::<Lookback>().is_err());
    assert_eq!(Lookback::Years(2).to_string(), "2y");
  }

  #[test]
  fn lookback_counts_calendar_years() {
    let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    assert_eq!(
      Lookback::Years(2).start_date(end),
      NaiveDate::from_ymd_opt(2022, 6, 30)
    );
    assert_eq!(Lookback::Max.start_date(end), None);
    assert_eq!(Lookback::Years(u32::MAX).start_date(end), None);
    assert_eq!(Lookback::Years(400_000_000).start_date(end), None);
  }

  #[test]
  fn oversized_period_is_rejected() {
    assert!(matches!(
      "400000000y".parse::<Lookback>(),
      Err(PortfolioError::InvalidInput(_))
    ));
    assert!("357913941y".parse::<Lookback>().is_ok());
  }

  #[test]
  fn csv_source_cleans_and_excludes_benchmark() {
    let file = write_sample();
    let source = CsvPriceSource::from_path(file.path())
      .unwrap()
      .with_benchmark("MKT");

    let prices = source.prices(&[], Lookback::Max).unwrap();
    // CCC has 15 of 60 observations and is dropped; MKT is the benchmark.
    assert_eq!(prices.tickers(), &["AAA".to_string(), "BBB".to_string()]);
    assert_eq!(prices.n_rows(), 60);
    assert_eq!(prices.prices()[[3, 1]], prices.prices()[[2, 1]]);

    let bench = source.benchmark(Lookback::Max).unwrap();
    assert_eq!(bench.len(), 60);
    assert_eq!(bench.prices()[0], 1000.0);
  }

  #[test]
  fn csv_source_selects_requested_tickers() {
    let source = CsvPriceSource::from_reader(sample_csv().as_bytes()).unwrap();
    let prices = source
      .prices(
        &["BBB".to_string(), "NOPE".to_string(), "AAA".to_string()],
        Lookback::Years(1),
      )
      .unwrap();
    assert_eq!(prices.tickers(), &["BBB".to_string(), "AAA".to_string()]);
  }

  #[test]
  fn csv_source_rejects_bad_cells() {
    let bad = "date,AAA,BBB\n2020-01-01,1.0,abc\n";
    assert!(matches!(
      CsvPriceSource::from_reader(bad.as_bytes()),
      Err(PortfolioError::InvalidInput(_))
    ));

    let bad_date = "date,AAA,BBB\n01/02/2020,1.0,2.0\n";
    assert!(matches!(
      CsvPriceSource::from_reader(bad_date.as_bytes()),
      Err(PortfolioError::InvalidInput(_))
    ));
  }

  #[test]
  fn missing_benchmark_is_reported() {
    let source = CsvPriceSource::from_reader(sample_csv().as_bytes()).unwrap();
    assert!(matches!(
      source.benchmark(Lookback::Max),
      Err(PortfolioError::InvalidInput(_))
    ));
    assert!(matches!(
      CsvPriceSource::from_path("/nonexistent/prices.csv"),
      Err(PortfolioError::Io(_))
    ));
  }

  #[test]
  #[traced_test]
  fn failing_rate_provider_falls_back() {
    assert_eq!(resolve_risk_free_rate(&ConstantRate(0.035)), 0.035);
    assert_eq!(resolve_risk_free_rate(&FailingRate), FALLBACK_RISK_FREE_RATE);
    assert!(logs_contain("risk-free rate unavailable"));
  }
}
