mod clean;
mod config;
mod error;
mod extract;
mod ident;
mod model;
mod pipeline;
mod rotation;
mod scan;
mod store;

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use motd_common::images::{ImageClient, ImageClientConfig};
use motd_common::wiki::{WikiClient, WikiClientConfig};

use config::Config;
use error::AppError;
use model::MisconceptionSet;
use rotation::{RotationScheduler, RotationStrategy};

#[derive(Parser)]
#[command(
    name = "misconceptions",
    about = "Extracts common misconceptions from their source lists and rotates one per day"
)]
struct Cli {
    /// Directory holding the collection artifact and generated images.
    /// Falls back to MISCONCEPTIONS_DATA_DIR.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the source pages and refresh the stored collection.
    Scrape,
    /// Print the record scheduled for a date.
    Today {
        /// Civil date to resolve, YYYY-MM-DD. Today when omitted.
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = StrategyArg::FullCycle)]
        strategy: StrategyArg,
    },
    /// Print the schedule for a run of days.
    Schedule {
        /// Number of days; a negative count walks backwards.
        #[arg(long, allow_hyphen_values = true)]
        days: i64,
        /// First date of the range, YYYY-MM-DD. Today when omitted.
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = StrategyArg::FullCycle)]
        strategy: StrategyArg,
    },
    /// Generate illustration images for a run of days.
    Images {
        /// Number of days; a negative count walks backwards.
        #[arg(long, allow_hyphen_values = true)]
        days: i64,
        /// First date of the range, YYYY-MM-DD. Today when omitted.
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = StrategyArg::FullCycle)]
        strategy: StrategyArg,
        /// Regenerate images that already exist on disk.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    /// Hash of the date digits; repeats are possible.
    SimpleHash,
    /// Shuffled walk covering every record before any repeat.
    FullCycle,
}

impl From<StrategyArg> for RotationStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::SimpleHash => RotationStrategy::SimpleHash,
            StrategyArg::FullCycle => RotationStrategy::FullCycle,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.data_dir.clone())?;

    match cli.command {
        Command::Scrape => cmd_scrape(&config).await?,
        Command::Today { date, strategy } => cmd_today(&config, date, strategy.into())?,
        Command::Schedule {
            days,
            start,
            strategy,
        } => cmd_schedule(&config, days, start, strategy.into())?,
        Command::Images {
            days,
            start,
            strategy,
            force,
        } => cmd_images(&config, days, start, strategy.into(), force).await?,
    }
    Ok(())
}

async fn cmd_scrape(config: &Config) -> Result<(), AppError> {
    let client = WikiClient::new(WikiClientConfig::from_env())?;
    info!(api = %client.config().api_url, "starting extraction run");

    let fresh = pipeline::run_extraction(&client, pipeline::DEFAULT_SOURCES).await;
    info!(records = fresh.len(), "extraction finished");

    let path = config.collection_path();
    let previous = store::load_or_empty(&path)?;
    let merged = pipeline::merge_records(previous.misconceptions, fresh);
    let set = MisconceptionSet::new(merged);
    store::save_collection(&path, &set)?;

    println!(
        "collection updated: {} records at {}",
        set.total_count,
        path.display()
    );
    Ok(())
}

fn cmd_today(
    config: &Config,
    date: Option<NaiveDate>,
    strategy: RotationStrategy,
) -> Result<(), AppError> {
    let set = store::load_or_empty(&config.collection_path())?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let scheduler = RotationScheduler::new(strategy);
    let index = scheduler
        .index_for_date(date, set.len())
        .ok_or(AppError::EmptyCollection)?;
    let record = &set.misconceptions[index];

    println!("{}", record.text);
    println!();
    match &record.subsection {
        Some(subsection) => println!(
            "  ({} / {}, {})",
            record.section, subsection, record.category
        ),
        None => println!("  ({}, {})", record.section, record.category),
    }
    println!("  {}", record.source);
    Ok(())
}

fn cmd_schedule(
    config: &Config,
    days: i64,
    start: Option<NaiveDate>,
    strategy: RotationStrategy,
) -> Result<(), AppError> {
    let set = store::load_or_empty(&config.collection_path())?;
    if set.is_empty() {
        return Err(AppError::EmptyCollection);
    }
    let start = start.unwrap_or_else(|| Local::now().date_naive());
    let scheduler = RotationScheduler::new(strategy);
    for day in scheduler.date_range_indices(start, days, set.len()) {
        let record = &set.misconceptions[day.index];
        println!("{}  [{:>4}]  {}", day.date, day.index, record.id);
    }
    Ok(())
}

async fn cmd_images(
    config: &Config,
    days: i64,
    start: Option<NaiveDate>,
    strategy: RotationStrategy,
    force: bool,
) -> Result<(), AppError> {
    let set = store::load_or_empty(&config.collection_path())?;
    if set.is_empty() {
        return Err(AppError::EmptyCollection);
    }

    let start = start.unwrap_or_else(|| Local::now().date_naive());
    let scheduler = RotationScheduler::new(strategy);
    let schedule = scheduler.date_range_indices(start, days, set.len());

    // A range longer than the collection revisits indices; generate
    // each one once.
    let mut seen = HashSet::new();
    let indices: Vec<usize> = schedule
        .iter()
        .map(|day| day.index)
        .filter(|index| seen.insert(*index))
        .collect();

    let client = ImageClient::new(ImageClientConfig::from_env()?)?;
    let images_dir = config.images_dir();
    std::fs::create_dir_all(&images_dir).map_err(|e| {
        AppError::Persistence(format!("failed to create {}: {e}", images_dir.display()))
    })?;

    let mut generated = 0usize;
    let mut skipped = 0usize;
    for index in indices {
        let record = &set.misconceptions[index];
        let path = config.image_path(&record.id);
        if !force && path.exists() {
            skipped += 1;
            continue;
        }
        match client.generate_png(&pipeline::image_prompt(&record.text)).await {
            Ok(bytes) => {
                std::fs::write(&path, bytes).map_err(|e| {
                    AppError::Persistence(format!("failed to write {}: {e}", path.display()))
                })?;
                info!(id = %record.id, path = %path.display(), "image saved");
                generated += 1;
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "image generation failed, skipping");
            }
        }
    }
    println!("images: {generated} generated, {skipped} already present");
    Ok(())
}
