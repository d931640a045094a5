// src/extract/mod.rs

//! Record extraction from raw page content.
//!
//! Extractors are capabilities composed by the pipeline: each one maps raw
//! HTML plus the page URL to a list of untyped [`RawRecord`]s for the
//! cleaner. Selector lists are ordered fallback chains; the first selector
//! that matches anything wins.

mod deals;
mod portfolio;
mod team;

use scraper::{ElementRef, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::RawRecord;

pub use deals::DealExtractor;
pub use portfolio::PortfolioExtractor;
pub use team::TeamExtractor;

/// Capability for turning page content into raw records.
pub trait Extractor {
    /// Parse records out of a page.
    fn extract(&self, html: &str, page_url: &Url) -> Result<Vec<RawRecord>>;
}

/// Parse a CSS selector, mapping errors to [`AppError::Selector`].
pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// First non-empty text matched by any selector in the chain.
pub(crate) fn first_text(item: &ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            item.select(&sel).find_map(|el| {
                let text: String = el.text().collect();
                let text = text.trim().to_string();
                (!text.is_empty()).then_some(text)
            })
        })
}

/// First non-empty attribute matched by any selector in the chain.
pub(crate) fn first_attr(
    item: &ElementRef<'_>,
    selectors: &[&str],
    attr: &str,
) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            item.select(&sel).find_map(|el| {
                el.value()
                    .attr(attr)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
        })
}

/// Resolve a possibly-relative URL against the page URL.
pub(crate) fn resolve_url(base: &Url, href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}
