// src/extract/deals.rs

//! Deal extraction from news roundup articles.
//!
//! Deal roundups are text-mined: the venture-deals section of an article is
//! located by its heading, then individual deal lines are matched against
//! "Company raised $X in Round from Investors" patterns.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde_json::json;
use url::Url;

use super::{parse_selector, resolve_url, Extractor};
use crate::error::Result;
use crate::models::RawRecord;

/// Section headings that introduce deal listings, tried in order.
static SECTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)venture\s+deals?\s*:?",
        r"(?i)deal\s+roundup\s*:?",
        r"(?i)funding\s+news\s*:?",
        r"(?i)investment\s+deals\s*:?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// One deal line: "Company raised/secured/closed $X in Series A from Y".
static DEAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[-•*\s]*([A-Z][A-Za-z\s&'.\-]+?)\s+(?:raised|secured|closed)\s+(\$[\d.,]+\s*[MBK]?(?:illion)?)\s+(?:in\s+)?((?:a\s+)?(?:series\s+[A-Z]|seed|pre-seed|angel))(?:\s+funding)?(?:\s+(?:from|led\s+by)\s+(.+?))?[.;]?\s*$",
    )
    .expect("valid regex")
});

static INVESTOR_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*|\s+and\s+").expect("valid regex"));

const CONTENT_SELECTORS: &[&str] = &[
    ".article-content",
    ".content",
    "article",
    ".post-content",
    "main",
    "body",
];

/// Extracts funding deals from a roundup article.
#[derive(Debug, Clone, Default)]
pub struct DealExtractor;

impl DealExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Collect candidate article links from an index page.
    ///
    /// Dated article paths (`/YYYY/...`) are kept, deduplicated in order.
    pub fn article_links(&self, html: &str, base: &Url, max: usize) -> Result<Vec<String>> {
        let document = Html::parse_document(html);
        let anchor = parse_selector("a[href]")?;

        let mut links = Vec::new();
        for element in document.select(&anchor) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if !href.contains("/20") {
                continue;
            }
            if let Some(url) = resolve_url(base, href) {
                if !links.contains(&url) {
                    links.push(url);
                }
            }
            if links.len() >= max {
                break;
            }
        }
        Ok(links)
    }

    fn article_text(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        for selector in CONTENT_SELECTORS {
            let Ok(sel) = scraper::Selector::parse(selector) else {
                continue;
            };
            if let Some(content) = document.select(&sel).next() {
                let text: Vec<&str> = content.text().collect();
                let joined = text.join("\n");
                if !joined.trim().is_empty() {
                    return joined;
                }
            }
        }
        String::new()
    }

    fn article_title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let sel = scraper::Selector::parse("title").ok()?;
        let title: String = document.select(&sel).next()?.text().collect();
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_string())
    }

    fn parse_deal_line(&self, line: &str) -> Option<(String, String, String, Option<String>)> {
        let captures = DEAL_RE.captures(line.trim())?;
        let name = captures.get(1)?.as_str().trim().to_string();
        let amount = captures.get(2)?.as_str().trim().to_string();
        let round = captures.get(3)?.as_str().trim().to_string();
        // Drop a leading article: "a Series A" -> "Series A"
        let round = round
            .strip_prefix("a ")
            .or_else(|| round.strip_prefix("A "))
            .unwrap_or(&round)
            .to_string();
        let investors = captures
            .get(4)
            .map(|m| m.as_str().trim_end_matches('.').trim().to_string())
            .filter(|s| !s.is_empty());
        Some((name, amount, round, investors))
    }
}

impl Extractor for DealExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Result<Vec<RawRecord>> {
        let text = self.article_text(html);
        if text.trim().is_empty() {
            log::warn!("No article content found on {page_url}");
            return Ok(Vec::new());
        }

        let Some(section_start) = SECTION_RES
            .iter()
            .find_map(|re| re.find(&text).map(|m| m.end()))
        else {
            log::debug!("No deal section heading in {page_url}");
            return Ok(Vec::new());
        };
        let section = &text[section_start..];

        let title = self.article_title(html);
        let mut records = Vec::new();

        for line in section.lines() {
            let Some((name, amount, round, investors)) = self.parse_deal_line(line) else {
                continue;
            };

            let (lead, others) = match investors {
                Some(investors) => {
                    let mut parts = INVESTOR_SPLIT_RE
                        .split(&investors)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string);
                    let lead = parts.next();
                    (lead, parts.collect::<Vec<_>>())
                }
                None => (None, Vec::new()),
            };

            let mut record = RawRecord::new();
            record.insert("startup_name".into(), json!(name));
            record.insert("funding_amount_description".into(), json!(amount));
            record.insert("round_type".into(), json!(round));
            if let Some(lead) = lead {
                record.insert("lead_investor".into(), json!(lead));
            }
            record.insert("other_investors".into(), json!(others));
            record.insert(
                "summary".into(),
                json!(format!("{name} raised {amount} in {round}")),
            );
            record.insert("source_article_url".into(), json!(page_url.to_string()));
            if let Some(title) = &title {
                record.insert("source_article_title".into(), json!(title));
            }

            records.push(record);
        }

        if records.is_empty() {
            log::debug!("No deals matched in {page_url}");
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"
        <html><head><title>Term Sheet - August 6 | News</title></head><body>
        <article>
          <p>Welcome to today's roundup.</p>
          <p>VENTURE DEALS:</p>
          <p>- Rocketly raised $12.5M in Series A funding from Big Fund, Side Fund and Angel Investors.</p>
          <p>- Greenish secured $3M in seed from Lone Capital.</p>
          <p>Not a deal line at all.</p>
        </article>
        </body></html>
    "#;

    #[test]
    fn test_extracts_deal_lines() {
        let url = Url::parse("https://news.example/2026/08/06/term-sheet").unwrap();
        let records = DealExtractor::new().extract(ARTICLE, &url).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["startup_name"], "Rocketly");
        assert_eq!(records[0]["funding_amount_description"], "$12.5M");
        assert_eq!(records[0]["round_type"], "Series A");
        assert_eq!(records[0]["lead_investor"], "Big Fund");
        assert_eq!(
            records[0]["other_investors"],
            serde_json::json!(["Side Fund", "Angel Investors"])
        );
        assert_eq!(records[1]["startup_name"], "Greenish");
        assert_eq!(records[1]["round_type"], "seed");
    }

    #[test]
    fn test_article_without_deal_section() {
        let url = Url::parse("https://news.example/2026/08/06/other").unwrap();
        let records = DealExtractor::new()
            .extract("<html><body><article><p>Markets up.</p></article></body></html>", &url)
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_article_links_filters_dated_paths() {
        let index = r#"
            <html><body>
              <a href="/2026/08/06/term-sheet">Today</a>
              <a href="/2026/08/05/term-sheet">Yesterday</a>
              <a href="/about">About</a>
              <a href="/2026/08/06/term-sheet">Today again</a>
            </body></html>
        "#;
        let url = Url::parse("https://news.example/section/term-sheet/").unwrap();
        let links = DealExtractor::new().article_links(index, &url, 5).unwrap();
        assert_eq!(links.len(), 2);
        assert!(links[0].ends_with("/2026/08/06/term-sheet"));
    }
}
