// src/pipeline/status.rs

//! Health and store status report.

use crate::config::Config;
use crate::error::Result;
use crate::store::{Database, Maintenance, MigrationRunner};

/// Print a health report: connectivity, migrations, store statistics.
pub async fn run_status(config: &Config, db: &Database) -> Result<()> {
    log::info!("==== vcwatch status ====");

    if db.ping().await {
        log::info!("Database: reachable ({})", config.store.path);
    } else {
        log::error!("Database: unreachable ({})", config.store.path);
        return Ok(());
    }

    match MigrationRunner::new(db.pool().clone()).executed().await {
        Ok(executed) => log::info!("Migrations applied: {}", executed.len()),
        Err(_) => {
            log::warn!("Migrations ledger missing; run 'vcwatch migrate' first");
            return Ok(());
        }
    }

    let stats = Maintenance::new(db.pool().clone()).statistics().await?;
    log::info!("Sites: {}", stats.sites);
    log::info!(
        "Companies: {} ({} updated in 24h)",
        stats.companies,
        stats.companies_updated_24h
    );
    log::info!(
        "Members: {} ({} updated in 24h)",
        stats.members,
        stats.members_updated_24h
    );
    log::info!(
        "Deals: {} ({} updated in 24h)",
        stats.deals,
        stats.deals_updated_24h
    );

    let active = config.active_sites().count();
    log::info!(
        "Configured sites: {} active of {}",
        active,
        config.sites.len()
    );
    if config.deals.index_url.is_empty() {
        log::info!("Deal source: none");
    } else {
        log::info!("Deal source: {}", config.deals.index_url);
    }

    Ok(())
}
