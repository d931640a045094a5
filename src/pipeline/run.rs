// src/pipeline/run.rs

//! Full scrape run across portfolios, teams, and deals.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::scrape::SiteScraper;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::FetchCoordinator;
use crate::store::{ChangeTracker, Database, SiteStore};

/// Per-stage counters for the run report.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: &'static str,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub records_saved: usize,
    pub elapsed_secs: f64,
}

/// Outcome of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
}

impl RunReport {
    /// True when every stage completed without source failures.
    pub fn fully_successful(&self) -> bool {
        self.stages.iter().all(|s| s.sources_failed == 0)
    }

    pub fn total_saved(&self) -> usize {
        self.stages.iter().map(|s| s.records_saved).sum()
    }
}

/// Run every stage, continuing past per-source and per-stage failures.
pub async fn run_pipeline(
    config: &Config,
    db: &Database,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let coordinator = FetchCoordinator::new(config, cancel)?;
    let tracker = ChangeTracker::new(db.pool().clone(), &config.upsert);
    let sites = SiteStore::new(db.pool().clone());
    let scraper = SiteScraper::new(&coordinator, &tracker, &sites);

    let mut report = RunReport::default();

    // Stage 1: portfolio companies
    log::info!("==== Stage 1/3: portfolio companies ====");
    let start = Instant::now();
    let mut stage = StageReport {
        name: "portfolios",
        sources_succeeded: 0,
        sources_failed: 0,
        records_saved: 0,
        elapsed_secs: 0.0,
    };
    for site in config.active_sites() {
        match scraper.scrape_portfolio(site).await {
            Ok(outcome) => {
                stage.sources_succeeded += 1;
                stage.records_saved += outcome.saved;
                log::info!(
                    "{}: {} extracted, {} cleaned, {} saved",
                    site.name,
                    outcome.extracted,
                    outcome.cleaned,
                    outcome.saved
                );
            }
            Err(error) => {
                stage.sources_failed += 1;
                log::error!("Portfolio scrape failed for {}: {}", site.name, error);
            }
        }
    }
    stage.elapsed_secs = start.elapsed().as_secs_f64();
    report.stages.push(stage);

    // Stage 2: team members
    log::info!("==== Stage 2/3: team members ====");
    let start = Instant::now();
    let mut stage = StageReport {
        name: "teams",
        sources_succeeded: 0,
        sources_failed: 0,
        records_saved: 0,
        elapsed_secs: 0.0,
    };
    for site in config.active_sites().filter(|s| s.team_url.is_some()) {
        match scraper.scrape_team(site).await {
            Ok(outcome) => {
                stage.sources_succeeded += 1;
                stage.records_saved += outcome.saved;
                log::info!(
                    "{}: {} extracted, {} cleaned, {} saved",
                    site.name,
                    outcome.extracted,
                    outcome.cleaned,
                    outcome.saved
                );
            }
            Err(error) => {
                stage.sources_failed += 1;
                log::error!("Team scrape failed for {}: {}", site.name, error);
            }
        }
    }
    stage.elapsed_secs = start.elapsed().as_secs_f64();
    report.stages.push(stage);

    // Stage 3: deals
    log::info!("==== Stage 3/3: deals ====");
    let start = Instant::now();
    let mut stage = StageReport {
        name: "deals",
        sources_succeeded: 0,
        sources_failed: 0,
        records_saved: 0,
        elapsed_secs: 0.0,
    };
    if config.deals.index_url.is_empty() {
        log::info!("No deal source configured, skipping");
    } else {
        match scraper.scrape_deals(&config.deals).await {
            Ok(outcome) => {
                stage.sources_succeeded += 1;
                stage.records_saved += outcome.saved;
                log::info!(
                    "deals: {} extracted, {} cleaned, {} saved",
                    outcome.extracted,
                    outcome.cleaned,
                    outcome.saved
                );
            }
            Err(error) => {
                stage.sources_failed += 1;
                log::error!("Deal scrape failed: {error}");
            }
        }
    }
    stage.elapsed_secs = start.elapsed().as_secs_f64();
    report.stages.push(stage);

    // Summary
    let stats = coordinator.stats();
    log::info!("==== Run summary ====");
    for stage in &report.stages {
        log::info!(
            "{}: {} succeeded, {} failed, {} saved ({:.1}s)",
            stage.name,
            stage.sources_succeeded,
            stage.sources_failed,
            stage.records_saved,
            stage.elapsed_secs
        );
    }
    log::info!(
        "Transports: http {} ({} failure(s)), browser {} ({} failure(s)), {} request(s) total",
        stats.http.state,
        stats.http.failure_count,
        stats.browser.state,
        stats.browser.failure_count,
        stats.requests
    );

    Ok(report)
}
