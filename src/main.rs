use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use markowitz_rs::PortfolioAnalysis;
use markowitz_rs::PortfolioEngine;
use markowitz_rs::PortfolioEngineConfig;
use markowitz_rs::error::PortfolioError;
use markowitz_rs::portfolio::MonteCarloConfig;
use markowitz_rs::portfolio::PortfolioResult;
use markowitz_rs::providers::BenchmarkProvider;
use markowitz_rs::providers::CsvPriceSource;
use markowitz_rs::providers::Lookback;
use markowitz_rs::providers::PriceProvider;
use markowitz_rs::providers::RiskFreeRateProvider;
use markowitz_rs::providers::resolve_risk_free_rate;
use prettytable::Table;
use prettytable::row;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "markowitz")]
#[command(about = "Mean-variance portfolio optimization from a CSV of daily prices")]
struct Cli {
  /// Wide CSV with a date column followed by one price column per ticker
  #[arg(short, long)]
  prices: PathBuf,

  /// Comma-separated tickers to include (default: every non-benchmark column)
  #[arg(short, long, value_delimiter = ',')]
  tickers: Vec<String>,

  /// Column holding the market benchmark; enables CAPM expected returns
  #[arg(short, long)]
  benchmark: Option<String>,

  /// History window, e.g. 1y, 5y or max
  #[arg(long, default_value = "5y")]
  period: Lookback,

  /// Annual risk-free rate as a decimal (falls back to 4% when omitted)
  #[arg(long)]
  risk_free: Option<f64>,

  /// Number of efficient frontier points
  #[arg(long, default_value = "30")]
  points: usize,

  /// Number of Monte Carlo portfolios
  #[arg(long, default_value = "5000")]
  portfolios: usize,

  /// Monte Carlo seed
  #[arg(long, default_value = "42")]
  seed: u64,
}

/// Rate passed on the command line, if any.
struct CliRate(Option<f64>);

impl RiskFreeRateProvider for CliRate {
  fn risk_free_rate(&self) -> markowitz_rs::Result<f64> {
    self
      .0
      .ok_or_else(|| PortfolioError::InvalidInput("no --risk-free rate given".to_string()))
  }
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();

  let mut source = CsvPriceSource::from_path(&cli.prices)
    .with_context(|| format!("reading {}", cli.prices.display()))?;
  if let Some(name) = &cli.benchmark {
    source = source.with_benchmark(name.clone());
  }

  let prices = source.prices(&cli.tickers, cli.period)?;
  let benchmark = match cli.benchmark {
    Some(_) => Some(source.benchmark(cli.period)?),
    None => None,
  };
  let risk_free = resolve_risk_free_rate(&CliRate(cli.risk_free));

  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    risk_free,
    frontier_points: cli.points,
    monte_carlo: MonteCarloConfig {
      n_portfolios: cli.portfolios,
      seed: cli.seed,
    },
    ..PortfolioEngineConfig::default()
  });
  let analysis = engine
    .analyze(&prices, benchmark.as_ref())
    .context("portfolio analysis failed")?;

  print_report(&analysis, risk_free);
  Ok(())
}

fn pct(x: f64) -> String {
  format!("{:.2}%", 100.0 * x)
}

fn portfolio_table(res: &PortfolioResult) -> Table {
  let mut table = Table::new();
  table.add_row(row!["Ticker", "Weight", "Volatility", "Return contrib.", "Variance contrib."]);
  for (a, vol) in res.allocations().zip(res.individual_volatilities.iter()) {
    table.add_row(row![
      a.ticker,
      pct(a.weight),
      pct(*vol),
      pct(a.contrib_return),
      format!("{:.6}", a.contrib_var)
    ]);
  }
  table
}

fn print_report(analysis: &PortfolioAnalysis, risk_free: f64) {
  let ms = &analysis.max_sharpe;
  let gmv = &analysis.min_variance;
  let mc = &analysis.monte_carlo;

  let mut summary = Table::new();
  summary.add_row(row!["Portfolio", "Return", "Volatility", "Sharpe"]);
  summary.add_row(row![
    "Max Sharpe",
    pct(ms.expected_return),
    pct(ms.volatility),
    format!("{:.3}", ms.sharpe)
  ]);
  summary.add_row(row![
    "Min variance",
    pct(gmv.expected_return),
    pct(gmv.volatility),
    format!("{:.3}", gmv.sharpe)
  ]);
  summary.add_row(row![
    "Monte Carlo best Sharpe",
    pct(mc.best_sharpe.expected_return),
    pct(mc.best_sharpe.volatility),
    format!("{:.3}", mc.best_sharpe.sharpe)
  ]);
  summary.add_row(row![
    "Monte Carlo min vol",
    pct(mc.min_vol.expected_return),
    pct(mc.min_vol.volatility),
    format!("{:.3}", mc.min_vol.sharpe)
  ]);

  println!("Risk-free rate: {}", pct(risk_free));
  if let Some(capm) = &analysis.capm {
    println!(
      "Expected returns: CAPM (market return {}, {} common dates)",
      pct(capm.market_return),
      capm.common_dates
    );
    let mut betas = Table::new();
    betas.add_row(row!["Ticker", "Beta", "Expected return"]);
    for (i, t) in capm.tickers.iter().enumerate() {
      betas.add_row(row![
        t,
        format!("{:.3}", capm.betas[i]),
        pct(capm.expected_returns[i])
      ]);
    }
    betas.printstd();
  } else {
    println!("Expected returns: historical means");
  }

  summary.printstd();
  println!("\nMax Sharpe allocation");
  portfolio_table(ms).printstd();
  println!("\nMin variance allocation");
  portfolio_table(gmv).printstd();

  let frontier = &analysis.frontier;
  println!(
    "\nEfficient frontier ({} of {} points solved)",
    frontier.points.len(),
    frontier.requested
  );
  let mut curve = Table::new();
  curve.add_row(row!["Target return", "Volatility"]);
  for p in &frontier.points {
    curve.add_row(row![pct(p.target_return), pct(p.volatility)]);
  }
  curve.printstd();
}
