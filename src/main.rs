use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bcv_stats::config::{Config, MAX_YEARS_BACK};
use bcv_stats::fetcher::RateFetcher;
use bcv_stats::models::RateSnapshot;
use bcv_stats::period::{PeriodKey, PeriodResolver};
use bcv_stats::services::{BatchService, StatisticsService};
use bcv_stats::store::JsonStore;

#[derive(Parser)]
#[command(name = "bcv-stats")]
#[command(about = "Download and summarize BCV exchange-rate statistics", long_about = None)]
struct Cli {
    /// Directory for period documents and summaries
    #[arg(long, env)]
    data_dir: Option<PathBuf>,

    /// Base URL of the BCV site
    #[arg(long, env)]
    bcv_base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape today's USD/EUR rates from the landing page
    Rates {
        /// Output file for the rate snapshot
        #[arg(long, env = "RATES_OUTPUT")]
        output: Option<PathBuf>,
    },
    /// Download, normalize and store quarterly spreadsheets
    Scrape {
        /// Only this year (requires --quarter)
        #[arg(long, requires = "quarter")]
        year: Option<i32>,

        /// Only this quarter: I, II, III or IV (requires --year)
        #[arg(long, requires = "year")]
        quarter: Option<String>,

        /// Past years to attempt besides the current one
        #[arg(long, value_parser = clap::value_parser!(u32).range(..=MAX_YEARS_BACK as i64))]
        years_back: Option<u32>,
    },
    /// Rebuild the statistics index from stored documents
    Aggregate,
    /// Scrape, aggregate, then refresh rates
    All,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (ignore errors if not found)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bcv_stats=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(url) = cli.bcv_base_url {
        config.bcv_base_url = url;
    }
    info!("Loaded configuration: {:?}", config);

    match cli.command {
        Command::Rates { output } => {
            if let Some(output) = output {
                config.rates_output = output;
            }
            refresh_rates(&config).await?;
        }
        Command::Scrape {
            year,
            quarter,
            years_back,
        } => {
            if let Some(years_back) = years_back {
                config.years_back = years_back;
            }
            let single = match (year, quarter) {
                (Some(year), Some(quarter)) => {
                    let resolver =
                        PeriodResolver::new(&config.bcv_base_url, &config.spreadsheet_path);
                    let (key, url) = resolver.resolve_symbol(year, &quarter)?;
                    info!("Single-period run for {key}: {url}");
                    Some(key)
                }
                _ => None,
            };
            scrape(&config, single).await?;
        }
        Command::Aggregate => {
            aggregate(&config)?;
        }
        Command::All => {
            scrape(&config, None).await?;
            aggregate(&config)?;
            refresh_rates(&config).await?;
        }
    }

    Ok(())
}

async fn scrape(
    config: &Config,
    single: Option<PeriodKey>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = BatchService::new(config)?;
    let periods = match single {
        Some(key) => vec![key],
        None => service.candidates(Utc::now().date_naive()),
    };

    println!(
        "Attempting {} periods into {}",
        periods.len(),
        config.data_dir.display()
    );

    let pb = ProgressBar::new(periods.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let (summary, path) = service
        .run(&periods, |result| {
            let key = result.key();
            match (&result.archive_path, &result.error) {
                (Some(archive), _) => pb.println(format!("✅ {key}: {archive}")),
                (_, Some(error)) => pb.println(format!("❌ {key}: {error}")),
                _ => {}
            }
            pb.set_message(key.to_string());
            pb.inc(1);
        })
        .await?;
    pb.finish_and_clear();

    println!("\n{}", "=".repeat(60));
    println!("Run Summary");
    println!("{}", "=".repeat(60));
    println!("Attempted:          {}", summary.total_attempts);
    println!("Succeeded:          {}", summary.success_count);
    println!("Failed:             {}", summary.failure_count);
    println!("Summary file:       {}", path.display());
    println!("{}", "=".repeat(60));
    Ok(())
}

fn aggregate(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let service = StatisticsService::new(JsonStore::new(&config.data_dir));
    let (aggregation, path) = service.rebuild()?;

    for skipped in &aggregation.skipped {
        println!("⚠️ {skipped}");
    }
    println!(
        "✅ Statistics index built from {} documents: {}",
        aggregation.index.total_documents,
        path.display()
    );
    Ok(())
}

/// A failed scrape is still a successful run: the snapshot records the failure
async fn refresh_rates(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = RateFetcher::new(config)?;
    match fetcher.refresh(&config.rates_output).await? {
        RateSnapshot::Available(data) => println!(
            "✅ Rates updated (USD: {}, EUR: {})",
            format_rate(data.rates.usd),
            format_rate(data.rates.eur)
        ),
        RateSnapshot::Unavailable(failure) => println!("❌ Error: {}", failure.error),
    }
    Ok(())
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "n/d".to_string(), |r| format!("{r:.4}"))
}
