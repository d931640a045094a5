// src/extract/team.rs

//! Team member extraction.

use scraper::Html;
use serde_json::json;
use url::Url;

use super::{first_attr, first_text, parse_selector, resolve_url, Extractor};
use crate::error::Result;
use crate::models::RawRecord;

const MEMBER_SELECTORS: &[&str] = &[
    ".team-member",
    ".member",
    ".person",
    ".profile",
    ".team-card",
    ".people-item",
    ".bio-card",
    "[data-member]",
    ".team .member",
];

const NAME_SELECTORS: &[&str] = &[
    ".member-name",
    ".person-name",
    ".name",
    "h2",
    "h3",
    "h4",
];

const TITLE_SELECTORS: &[&str] = &[
    ".member-title",
    ".title",
    ".role",
    ".position",
    ".job-title",
];

const BIO_SELECTORS: &[&str] = &[".bio", ".member-bio", ".description", "p"];

const PHOTO_SELECTORS: &[&str] = &[".photo img", ".member-photo img", ".headshot img", "img"];

const LINKEDIN_SELECTORS: &[&str] = &["a[href*='linkedin.com']"];

/// Extracts team members from a team page.
#[derive(Debug, Clone, Default)]
pub struct TeamExtractor;

impl TeamExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for TeamExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Result<Vec<RawRecord>> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for container in MEMBER_SELECTORS {
            let selector = parse_selector(container)?;
            let items: Vec<_> = document.select(&selector).collect();
            if items.is_empty() {
                continue;
            }

            log::debug!(
                "Found {} team member(s) with selector '{}'",
                items.len(),
                container
            );

            for item in items {
                let Some(name) = first_text(&item, NAME_SELECTORS) else {
                    continue;
                };

                let mut record = RawRecord::new();
                record.insert("name".into(), json!(name));
                if let Some(title) = first_text(&item, TITLE_SELECTORS) {
                    record.insert("title".into(), json!(title));
                }
                if let Some(bio) = first_text(&item, BIO_SELECTORS) {
                    record.insert("bio".into(), json!(bio));
                }
                if let Some(src) = first_attr(&item, PHOTO_SELECTORS, "src") {
                    if let Some(photo) = resolve_url(page_url, &src) {
                        record.insert("photo_url".into(), json!(photo));
                    }
                }
                if let Some(href) = first_attr(&item, LINKEDIN_SELECTORS, "href") {
                    record.insert("linkedin".into(), json!(href));
                }
                record.insert("source_url".into(), json!(page_url.to_string()));

                records.push(record);
            }
            break;
        }

        if records.is_empty() {
            log::warn!("No team members found on {page_url}");
        }
        Ok(records)
    }
}
