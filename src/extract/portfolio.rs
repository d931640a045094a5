// src/extract/portfolio.rs

//! Portfolio company extraction.

use scraper::Html;
use serde_json::json;
use url::Url;

use super::{first_attr, first_text, parse_selector, resolve_url, Extractor};
use crate::error::Result;
use crate::models::RawRecord;

/// Container selectors for portfolio items, most specific first.
const COMPANY_SELECTORS: &[&str] = &[
    ".portfolio-item",
    ".portfolio-company",
    ".company-card",
    ".portfolio-grid-item",
    ".portfolio-list-item",
    ".company-item",
    "[data-company]",
    ".portfolio .company",
    ".investment-item",
    ".fund-portfolio-item",
];

const NAME_SELECTORS: &[&str] = &[
    ".company-name",
    ".portfolio-company-name",
    ".company-title",
    ".portfolio-title",
    ".name",
    "h2",
    "h3",
    "h4",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".company-description",
    ".description",
    ".summary",
    ".company-summary",
    ".overview",
    "p",
    ".excerpt",
];

const SECTOR_SELECTORS: &[&str] = &[
    ".sector",
    ".industry",
    ".category",
    ".vertical",
    ".segment",
    ".focus-area",
    ".tag",
];

const URL_SELECTORS: &[&str] = &["a[href]", ".company-link", ".website-link"];

const LOGO_SELECTORS: &[&str] = &[".logo img", ".company-logo img", ".portfolio-logo img", "img"];

const FUNDING_SELECTORS: &[&str] = &[".funding", ".investment", ".round", ".funding-info"];

/// Extracts portfolio companies from a listing page.
#[derive(Debug, Clone, Default)]
pub struct PortfolioExtractor;

impl PortfolioExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for PortfolioExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Result<Vec<RawRecord>> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for container in COMPANY_SELECTORS {
            let selector = parse_selector(container)?;
            let items: Vec<_> = document.select(&selector).collect();
            if items.is_empty() {
                continue;
            }

            log::debug!(
                "Found {} portfolio item(s) with selector '{}'",
                items.len(),
                container
            );

            for item in items {
                let Some(name) = first_text(&item, NAME_SELECTORS) else {
                    continue;
                };

                let mut record = RawRecord::new();
                record.insert("name".into(), json!(name));
                if let Some(description) = first_text(&item, DESCRIPTION_SELECTORS) {
                    record.insert("description".into(), json!(description));
                }
                if let Some(sector) = first_text(&item, SECTOR_SELECTORS) {
                    record.insert("sector".into(), json!(sector));
                }
                if let Some(href) = first_attr(&item, URL_SELECTORS, "href") {
                    if let Some(website) = resolve_url(page_url, &href) {
                        record.insert("website".into(), json!(website));
                    }
                }
                if let Some(src) = first_attr(&item, LOGO_SELECTORS, "src") {
                    if let Some(logo) = resolve_url(page_url, &src) {
                        record.insert("logo".into(), json!(logo));
                    }
                }
                if let Some(funding) = first_text(&item, FUNDING_SELECTORS) {
                    record.insert("funding".into(), json!(funding));
                }
                record.insert("source_url".into(), json!(page_url.to_string()));

                records.push(record);
            }
            break;
        }

        if records.is_empty() {
            log::warn!("No portfolio companies found on {page_url}");
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="portfolio-item">
            <h3>Acme Robotics</h3>
            <p class="description">Warehouse automation</p>
            <span class="sector">Robotics</span>
            <a href="/companies/acme">Visit</a>
            <img src="/logos/acme.png">
          </div>
          <div class="portfolio-item">
            <h3>Globex</h3>
            <span class="sector">Fintech</span>
          </div>
          <div class="portfolio-item"><p>No name here</p></div>
        </body></html>
    "#;

    #[test]
    fn test_extracts_companies_with_fields() {
        let url = Url::parse("https://example-vc.com/portfolio").unwrap();
        let records = PortfolioExtractor::new().extract(PAGE, &url).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Acme Robotics");
        assert_eq!(records[0]["sector"], "Robotics");
        assert_eq!(records[0]["website"], "https://example-vc.com/companies/acme");
        assert_eq!(records[0]["logo"], "https://example-vc.com/logos/acme.png");
        assert_eq!(records[1]["name"], "Globex");
    }

    #[test]
    fn test_no_matching_containers_yields_empty() {
        let url = Url::parse("https://example-vc.com/portfolio").unwrap();
        let records = PortfolioExtractor::new()
            .extract("<html><body><p>nothing</p></body></html>", &url)
            .unwrap();
        assert!(records.is_empty());
    }
}
