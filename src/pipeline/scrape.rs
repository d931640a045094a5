// src/pipeline/scrape.rs

//! Per-site acquisition, extraction, cleaning, and persistence.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::cleaning::{validate_company, validate_deal, validate_member, Cleaner};
use crate::config::{DealSourceConfig, SiteConfig};
use crate::error::Result;
use crate::extract::{DealExtractor, Extractor, PortfolioExtractor, TeamExtractor};
use crate::fetch::{FetchCoordinator, FetchRequest};
use crate::store::{ChangeTracker, SiteStore};

/// Article URLs carry their publication date as /YYYY/MM/DD/.
static ARTICLE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").expect("valid regex"));

/// Counters for one scrape stage against one source.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageOutcome {
    /// Raw records the extractor produced
    pub extracted: usize,
    /// Records that survived cleaning and validation
    pub cleaned: usize,
    /// Records successfully upserted
    pub saved: usize,
}

/// Drives the fetch → extract → clean → upsert flow for one source.
pub struct SiteScraper<'a> {
    coordinator: &'a FetchCoordinator,
    tracker: &'a ChangeTracker,
    sites: &'a SiteStore,
}

impl<'a> SiteScraper<'a> {
    pub fn new(
        coordinator: &'a FetchCoordinator,
        tracker: &'a ChangeTracker,
        sites: &'a SiteStore,
    ) -> Self {
        Self {
            coordinator,
            tracker,
            sites,
        }
    }

    /// Scrape a site's portfolio page.
    pub async fn scrape_portfolio(&self, site: &SiteConfig) -> Result<StageOutcome> {
        let page_url = Url::parse(&site.portfolio_url)?;
        let fetched = self
            .coordinator
            .fetch(FetchRequest::new(&site.portfolio_url))
            .await?;
        log::info!(
            "Fetched {} via {} ({} attempt(s), {:.1}s)",
            site.portfolio_url,
            fetched.transport,
            fetched.attempts,
            fetched.elapsed.as_secs_f64()
        );

        let raw = PortfolioExtractor::new().extract(&fetched.content, &page_url)?;
        let cleaner = Cleaner::new(Some(page_url));

        let mut companies = Vec::new();
        for record in &raw {
            match cleaner
                .clean_company(record)
                .and_then(|company| validate_company(&company).map(|()| company))
            {
                Ok(company) => companies.push(company),
                Err(error) => log::warn!("Skipping company record from {}: {}", site.name, error),
            }
        }

        let site_row = self.sites.ensure_site(&site.name, &site.url).await?;
        let saved = self.tracker.upsert_batch(site_row.id, &companies).await;
        self.sites.touch_last_scraped(site_row.id).await?;

        Ok(StageOutcome {
            extracted: raw.len(),
            cleaned: companies.len(),
            saved,
        })
    }

    /// Scrape a site's team page, if it has one.
    pub async fn scrape_team(&self, site: &SiteConfig) -> Result<StageOutcome> {
        let Some(team_url) = &site.team_url else {
            log::debug!("Site {} has no team page", site.name);
            return Ok(StageOutcome::default());
        };

        let page_url = Url::parse(team_url)?;
        // Team grids are often rendered client-side; wait for one if the
        // rendering transport ends up serving this page.
        let fetched = self
            .coordinator
            .fetch(FetchRequest::new(team_url).wait_for(".team-member"))
            .await?;
        log::info!(
            "Fetched {} via {} ({} attempt(s), {:.1}s)",
            team_url,
            fetched.transport,
            fetched.attempts,
            fetched.elapsed.as_secs_f64()
        );

        let raw = TeamExtractor::new().extract(&fetched.content, &page_url)?;
        let cleaner = Cleaner::new(Some(page_url));

        let mut members = Vec::new();
        for record in &raw {
            match cleaner
                .clean_member(record)
                .and_then(|member| validate_member(&member).map(|()| member))
            {
                Ok(member) => members.push(member),
                Err(error) => log::warn!("Skipping member record from {}: {}", site.name, error),
            }
        }

        let site_row = self.sites.ensure_site(&site.name, &site.url).await?;
        let saved = self.tracker.upsert_batch(site_row.id, &members).await;
        self.sites.touch_last_scraped(site_row.id).await?;

        Ok(StageOutcome {
            extracted: raw.len(),
            cleaned: members.len(),
            saved,
        })
    }

    /// Scrape the deal source: index page, then each recent article.
    pub async fn scrape_deals(&self, source: &DealSourceConfig) -> Result<StageOutcome> {
        let index_url = Url::parse(&source.index_url)?;
        let extractor = DealExtractor::new();

        let index = self
            .coordinator
            .fetch(FetchRequest::new(&source.index_url))
            .await?;
        let articles = extractor.article_links(&index.content, &index_url, source.max_articles)?;
        log::info!("Found {} candidate article(s)", articles.len());

        let site_name = index_url.host_str().unwrap_or("deals").to_string();
        let site_row = self.sites.ensure_site(&site_name, &source.index_url).await?;

        let mut outcome = StageOutcome::default();
        for article_url in articles {
            let fetched = match self
                .coordinator
                .fetch(FetchRequest::new(&article_url))
                .await
            {
                Ok(fetched) => fetched,
                Err(error) => {
                    log::error!("Failed to fetch article {article_url}: {error}");
                    continue;
                }
            };

            let page_url = Url::parse(&article_url)?;
            let raw = extractor.extract(&fetched.content, &page_url)?;
            outcome.extracted += raw.len();

            let article_date = ARTICLE_DATE_RE.captures(&article_url).map(|c| {
                format!(
                    "{}-{}-{}",
                    c.get(1).map_or("", |m| m.as_str()),
                    c.get(2).map_or("", |m| m.as_str()),
                    c.get(3).map_or("", |m| m.as_str())
                )
            });

            let cleaner = Cleaner::new(Some(page_url));
            let mut deals = Vec::new();
            for record in &raw {
                match cleaner
                    .clean_deal(record, article_date.as_deref())
                    .and_then(|deal| validate_deal(&deal).map(|()| deal))
                {
                    Ok(deal) => deals.push(deal),
                    Err(error) => log::warn!("Skipping deal record: {error}"),
                }
            }
            outcome.cleaned += deals.len();
            outcome.saved += self.tracker.upsert_batch(site_row.id, &deals).await;
        }

        self.sites.touch_last_scraped(site_row.id).await?;
        Ok(outcome)
    }
}
