use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod ai;
mod app;
mod config;
mod db;
mod error;
mod models;
mod normalize;
mod pipeline;
mod report;
mod sources;

use app::App;
use config::Config;
use error::Result;
use models::ProviderTag;

#[derive(Debug, Parser)]
#[command(name = "macro-scout", version, about = "Harvest macroeconomic news and analyze it with an LLM")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch every configured source and store new items
    Collect {
        /// Also run historical backfill sources
        #[arg(long)]
        backfill: bool,
    },
    /// Analyze stored items that have no analysis yet
    Analyze,
    /// Collect, then analyze
    Run {
        #[arg(long)]
        backfill: bool,
    },
    /// Write every analyzed item to a markdown report
    Report {
        #[arg(short, long, default_value = "Full_Analysis_Log.md")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let app = App::new(config).await?;

    match cli.command {
        Command::Collect { backfill } => collect(&app, backfill).await?,
        Command::Analyze => analyze(&app).await?,
        Command::Run { backfill } => {
            collect(&app, backfill).await?;
            analyze(&app).await?;
        }
        Command::Report { output } => {
            let count = app.write_report(&output).await?;
            if count == 0 {
                println!("No analyzed items yet. Run `macro-scout analyze` first.");
            } else {
                println!("Wrote {} items to {}", count, output.display());
            }
        }
    }

    Ok(())
}

async fn collect(app: &App, backfill: bool) -> Result<()> {
    let report = app.collect(backfill).await?;
    for source in &report.sources {
        if source.failed {
            println!("{:<16} failed", source.source);
        } else if source.store_errors > 0 {
            println!(
                "{:<16} {} new, {} skipped on store errors",
                source.source, source.inserted, source.store_errors
            );
        } else {
            println!("{:<16} {} new", source.source, source.inserted);
        }
    }
    println!(
        "Collected {} new items ({} sources failed)",
        report.total_new(),
        report.failed_sources().count()
    );
    Ok(())
}

async fn analyze(app: &App) -> Result<()> {
    let report = app.analyze().await?;
    println!(
        "Analyzed {} items ({} primary, {} secondary), {} still pending",
        report.count(ProviderTag::Primary) + report.count(ProviderTag::Secondary),
        report.count(ProviderTag::Primary),
        report.count(ProviderTag::Secondary),
        report.still_pending()
    );
    Ok(())
}
