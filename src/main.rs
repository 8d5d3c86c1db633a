mod config;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use chrono::Local;
use clap::{CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::scraper::{FileSource, WikiScraper};

/// Scrape job information and write to a spreadsheet.
#[derive(Parser)]
#[command(name = "psychjobs", version)]
struct Cli {
    /// Path to the CSV file to write
    spreadsheet: PathBuf,

    /// Comma-separated list of area codes to include (default: all)
    #[arg(short, long, value_delimiter = ',')]
    areas: Vec<String>,

    /// Parse a saved copy of the page instead of fetching it
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// One link per entry, no anchor following, single `link` column
    #[arg(long, env = "PSYCHJOBS_SINGLE_LINK")]
    single_link: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = AppConfig::load()?;

    let matches = Cli::command()
        .after_help(config.areas.help_text())
        .get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let filter = match cli.verbose {
        0 => "psychjobs=info,warn",
        1 => "psychjobs=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    if cli.single_link {
        config.parser.single_link = true;
    }

    let codes = utils::split_codes(&cli.areas);
    let today = Local::now().date_naive();

    let _t = utils::Timer::start("Job scrape");
    let stats = match cli.input {
        Some(path) => {
            Pipeline::new(config, FileSource::new(path))
                .run(&codes, &cli.spreadsheet, today)
                .await?
        }
        None => {
            let source = WikiScraper::new(&config.scraper)?;
            Pipeline::new(config, source)
                .run(&codes, &cli.spreadsheet, today)
                .await?
        }
    };

    if stats.errors > 0 {
        tracing::warn!("{} entries could not be parsed", stats.errors);
    }

    Ok(())
}
