// src/main.rs

//! vcwatch: VC portfolio change tracker CLI

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use vcwatch::config::Config;
use vcwatch::error::Result;
use vcwatch::fetch::FetchCoordinator;
use vcwatch::pipeline::{run_pipeline, run_status, SiteScraper};
use vcwatch::store::{ChangeTracker, Database, Maintenance, MigrationRunner, SiteStore};

#[derive(Parser, Debug)]
#[command(
    name = "vcwatch",
    version = "0.1.0",
    about = "Tracks portfolio, team, and deal changes across venture capital sites"
)]

/// CLI Arguments
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI Commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Scrape a single site (portfolio + team)
    Scrape {
        /// Site name from the config
        #[arg(long)]
        site: String,
    },
    /// Run the full pipeline: portfolios, teams, deals
    Run,
    /// Report database and configuration health
    Status,
    /// Delete old change-log entries
    Cleanup {
        /// Retention window in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config);

    let level = if cli.quiet {
        "warn".to_string()
    } else {
        config.logging.level.clone()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if matches!(cli.command, Command::Scrape { .. } | Command::Run) {
        config.validate()?;
    }

    // Ctrl-C aborts pending sleeps and in-flight fetches.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Shutdown signal received, cancelling...");
                cancel.cancel();
            }
        });
    }

    let db = Database::connect(&config.store.path).await?;

    match cli.command {
        Command::Migrate => {
            let applied = MigrationRunner::new(db.pool().clone()).run_pending().await?;
            if applied.is_empty() {
                log::info!("Schema is up to date");
            }
        }
        Command::Scrape { site } => {
            MigrationRunner::new(db.pool().clone()).run_pending().await?;
            let Some(site_config) = config.sites.iter().find(|s| s.name == site) else {
                return Err(vcwatch::error::AppError::config(format!(
                    "site '{site}' not found in config"
                )));
            };

            let coordinator = FetchCoordinator::new(&config, cancel.clone())?;
            let tracker = ChangeTracker::new(db.pool().clone(), &config.upsert);
            let sites = SiteStore::new(db.pool().clone());
            let scraper = SiteScraper::new(&coordinator, &tracker, &sites);

            let portfolio = scraper.scrape_portfolio(site_config).await?;
            log::info!(
                "Portfolio: {} extracted, {} cleaned, {} saved",
                portfolio.extracted,
                portfolio.cleaned,
                portfolio.saved
            );
            let team = scraper.scrape_team(site_config).await?;
            log::info!(
                "Team: {} extracted, {} cleaned, {} saved",
                team.extracted,
                team.cleaned,
                team.saved
            );
        }
        Command::Run => {
            MigrationRunner::new(db.pool().clone()).run_pending().await?;
            let report = run_pipeline(&config, &db, cancel.clone()).await?;
            if !report.fully_successful() {
                log::warn!("Run completed with failures ({} saved)", report.total_saved());
            }
        }
        Command::Status => run_status(&config, &db).await?,
        Command::Cleanup { days } => {
            let removed = Maintenance::new(db.pool().clone())
                .cleanup_old_changes(days)
                .await?;
            log::info!("Removed {removed} change entries older than {days} day(s)");
        }
    }

    db.close().await;
    Ok(())
}
