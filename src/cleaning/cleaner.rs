// src/cleaning/cleaner.rs

//! Normalizes raw extracted field bags into typed records.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use url::Url;

use super::fingerprint::fingerprint;
use crate::error::{AppError, Result};
use crate::models::{Company, Deal, RawRecord, TeamMember};

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static NAME_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.\-]").expect("valid regex"));

static FUNDING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([$€£¥₹]|[A-Z]{3})?\s*([\d.,]+)\s*([A-Za-z]*)").expect("valid regex"));

static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:A\s+)?([\w\s.,]+?)-based\s+").expect("valid regex"));

/// Name/title separators, tried in order: "Name, Title", "Name - Title",
/// "Name (Title)", "Name | Title".
static NAME_TITLE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(.+?),\s*(.+)$",
        r"^(.+?)\s*-\s*(.+)$",
        r"^(.+?)\s+\((.+?)\)$",
        r"^(.+?)\s*\|\s*(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

const COMPANY_SUFFIXES: &[&str] = &[
    " Inc.", " Inc", " LLC", " Corp.", " Corporation", " Ltd.", " Limited", ", Inc.", ", Inc",
    ", LLC", ", Corp.", ", Corporation", ", Ltd.", ", Limited", " S.A.", " S.L.", " B.V.",
    " GmbH", " AG",
];

const SECTOR_MAPPING: &[(&str, &str)] = &[
    ("ai", "Artificial Intelligence"),
    ("artificial intelligence", "Artificial Intelligence"),
    ("machine learning", "Artificial Intelligence"),
    ("fintech", "Financial Technology"),
    ("financial services", "Financial Technology"),
    ("payments", "Financial Technology"),
    ("insurtech", "Financial Technology"),
    ("healthtech", "Healthcare Technology"),
    ("digital health", "Healthcare Technology"),
    ("healthcare", "Healthcare"),
    ("health", "Healthcare"),
    ("biotech", "Biotechnology"),
    ("saas", "Software as a Service"),
    ("software", "Software"),
    ("cloud", "Cloud Computing"),
    ("cybersecurity", "Cybersecurity"),
    ("security", "Cybersecurity"),
    ("data analytics", "Data Analytics"),
    ("blockchain", "Blockchain"),
    ("crypto", "Cryptocurrency"),
    ("ecommerce", "E-commerce"),
    ("e-commerce", "E-commerce"),
    ("marketplace", "E-commerce"),
    ("enterprise", "Enterprise Software"),
    ("b2b", "B2B"),
    ("consumer", "Consumer"),
    ("gaming", "Gaming"),
    ("edtech", "Education Technology"),
    ("proptech", "Property Technology"),
    ("cleantech", "Clean Technology"),
    ("agtech", "Agriculture Technology"),
    ("logistics", "Logistics & Supply Chain"),
    ("mobility", "Transportation & Mobility"),
];

const TITLE_MAPPING: &[(&str, &str)] = &[
    ("general partner", "General Partner"),
    ("managing partner", "Managing Partner"),
    ("founding partner", "Founding Partner"),
    ("venture partner", "Venture Partner"),
    ("operating partner", "Operating Partner"),
    ("partner", "Partner"),
    ("principal", "Principal"),
    ("managing director", "Managing Director"),
    ("director", "Director"),
    ("vice president", "Vice President"),
    ("vp", "Vice President"),
    ("senior associate", "Senior Associate"),
    ("associate", "Associate"),
    ("senior analyst", "Senior Analyst"),
    ("analyst", "Analyst"),
    ("ceo", "Chief Executive Officer"),
    ("cfo", "Chief Financial Officer"),
    ("cto", "Chief Technology Officer"),
    ("coo", "Chief Operating Officer"),
    ("eir", "Entrepreneur in Residence"),
    ("entrepreneur in residence", "Entrepreneur in Residence"),
    ("advisor", "Advisor"),
];

const STAGE_MAPPING: &[(&str, &str)] = &[
    ("pre-seed", "Pre-Seed"),
    ("pre seed", "Pre-Seed"),
    ("preseed", "Pre-Seed"),
    ("seed", "Seed"),
    ("angel", "Angel"),
    ("series a", "Series A"),
    ("series b", "Series B"),
    ("series c", "Series C"),
    ("series d", "Series D"),
    ("series e", "Series E"),
    ("bridge", "Bridge"),
    ("growth", "Growth"),
    ("expansion", "Growth"),
    ("mezzanine", "Mezzanine"),
    ("ipo", "IPO"),
    ("acquisition", "Acquisition"),
];

const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
];

/// Investor entries too generic to keep.
const GENERIC_INVESTORS: &[&str] = &[
    "others",
    "angel investors",
    "existing investors",
    "undisclosed",
];

/// Normalizes raw records and computes their content fingerprints.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    base_url: Option<Url>,
}

impl Cleaner {
    pub fn new(base_url: Option<Url>) -> Self {
        Self { base_url }
    }

    /// Clean a raw portfolio company record.
    pub fn clean_company(&self, raw: &RawRecord) -> Result<Company> {
        let original_name = raw_str(raw, &["name"]).unwrap_or_default();
        let name = self.standardize_company_name(&original_name);
        if name.is_empty() {
            return Err(AppError::validation("company record missing name"));
        }

        let funding_text = raw_str(raw, &["funding", "funding_description"]);
        let (funding_amount, funding_currency) = funding_text
            .as_deref()
            .map(|t| self.parse_funding_amount(t))
            .unwrap_or((None, None));

        let description = raw_str(raw, &["description", "summary"])
            .and_then(|t| self.clean_text(&t, Some(500)));

        let mut location = raw_str(raw, &["location"]).and_then(|t| self.clean_text(&t, None));
        if location.is_none() {
            if let Some(desc) = &description {
                location = self.extract_location_from_summary(desc).0;
            }
        }

        let mut company = Company {
            name,
            original_name,
            sector: Some(
                self.standardize_sector(raw_str(raw, &["sector", "industry"]).as_deref()),
            ),
            funding_amount,
            funding_currency,
            funding_description: funding_text,
            funding_stage: raw_str(raw, &["round_type", "stage"])
                .and_then(|s| self.standardize_funding_stage(&s)),
            description,
            website: raw_str(raw, &["website", "url"]).and_then(|u| self.normalize_url(&u)),
            logo_url: raw_str(raw, &["logo", "logo_url"]).and_then(|u| self.normalize_url(&u)),
            location,
            source_url: raw_str(raw, &["source_url"])
                .unwrap_or_else(|| self.base_url.as_ref().map(Url::to_string).unwrap_or_default()),
            scraped_at: Some(Utc::now()),
            content_hash: String::new(),
        };
        company.content_hash = fingerprint(&company);
        Ok(company)
    }

    /// Clean a raw team member record.
    pub fn clean_member(&self, raw: &RawRecord) -> Result<TeamMember> {
        let full_name = raw_str(raw, &["name"]).unwrap_or_default();
        let (name, embedded_title) = self.extract_name_and_title(&full_name);
        let Some(name) = name else {
            return Err(AppError::validation("member record missing name"));
        };

        let title = embedded_title
            .or_else(|| raw_str(raw, &["title"]))
            .map(|t| self.standardize_title(&t))
            .filter(|t| !t.is_empty());

        let (first_name, last_name) = self.parse_name(&name);

        let mut member = TeamMember {
            name,
            first_name: Some(first_name).filter(|s| !s.is_empty()),
            last_name: Some(last_name).filter(|s| !s.is_empty()),
            title,
            bio: raw_str(raw, &["bio", "description"]).and_then(|t| self.clean_text(&t, Some(1000))),
            photo_url: raw_str(raw, &["photo_url", "image_url"])
                .and_then(|u| self.normalize_url(&u)),
            linkedin_url: raw_str(raw, &["linkedin", "linkedin_url"])
                .and_then(|u| self.validate_linkedin_url(&u)),
            email: raw_str(raw, &["email"]).and_then(|t| self.clean_text(&t, None)),
            source_url: raw_str(raw, &["source_url"])
                .unwrap_or_else(|| self.base_url.as_ref().map(Url::to_string).unwrap_or_default()),
            scraped_at: Some(Utc::now()),
            content_hash: String::new(),
        };
        member.content_hash = fingerprint(&member);
        Ok(member)
    }

    /// Clean a raw deal record extracted from an article.
    pub fn clean_deal(&self, raw: &RawRecord, article_date: Option<&str>) -> Result<Deal> {
        let startup_name = raw_str(raw, &["startup_name"])
            .and_then(|t| self.clean_text(&t, None))
            .ok_or_else(|| AppError::validation("deal record missing startup name"))?;

        let funding_text = raw_str(raw, &["funding_amount_description", "funding"]);
        let (funding_amount, funding_currency) = funding_text
            .as_deref()
            .map(|t| self.parse_funding_amount(t))
            .unwrap_or((None, None));

        let other_investors = raw
            .get("other_investors")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .filter_map(|inv| self.clean_text(inv, None))
                    .filter(|inv| !GENERIC_INVESTORS.contains(&inv.to_lowercase().as_str()))
                    .collect()
            })
            .unwrap_or_default();

        let mut summary = raw_str(raw, &["summary"]).unwrap_or_default();
        let mut location = raw_str(raw, &["location"]);
        if location.is_none() && !summary.is_empty() {
            let (found, remainder) = self.extract_location_from_summary(&summary);
            location = found;
            summary = remainder;
        }

        let mut deal = Deal {
            startup_name,
            company_website: raw_str(raw, &["company_website"])
                .and_then(|u| self.normalize_url(&u)),
            funding_amount,
            funding_currency,
            funding_amount_description: funding_text,
            round_type: raw_str(raw, &["round_type"])
                .and_then(|s| self.standardize_funding_stage(&s)),
            lead_investor: raw_str(raw, &["lead_investor"])
                .and_then(|t| self.clean_text(&t, None)),
            other_investors,
            location: location.and_then(|l| self.clean_text(&l, None)),
            summary: self.clean_text(&summary, Some(250)),
            source_article_url: raw_str(raw, &["source_article_url"]).unwrap_or_default(),
            source_article_title: raw_str(raw, &["source_article_title"])
                .and_then(|t| self.clean_text(&t, None)),
            article_publication_date: article_date.map(|d| d.trim().to_string()),
            scraped_at: Some(Utc::now()),
            content_hash: String::new(),
        };
        deal.content_hash = fingerprint(&deal);
        Ok(deal)
    }

    /// Collapse whitespace, decode common entities, optionally truncate.
    pub fn clean_text(&self, text: &str, max_length: Option<usize>) -> Option<String> {
        let mut text = WHITESPACE_RE.replace_all(text.trim(), " ").to_string();
        for (entity, plain) in [
            ("&nbsp;", " "),
            ("&amp;", "&"),
            ("&lt;", "<"),
            ("&gt;", ">"),
            ("&quot;", "\""),
            ("&#x27;", "'"),
        ] {
            text = text.replace(entity, plain);
        }

        if let Some(max) = max_length {
            if text.chars().count() > max {
                let truncated: String = text.chars().take(max).collect();
                text = format!("{}...", truncated.trim_end());
            }
        }

        let text = text.trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    /// Remove common corporate suffixes and stray punctuation.
    pub fn standardize_company_name(&self, name: &str) -> String {
        let Some(mut name) = self.clean_text(name, None) else {
            return String::new();
        };

        for suffix in COMPANY_SUFFIXES {
            if let Some(stripped) = name.strip_suffix(suffix) {
                name = stripped.to_string();
            }
        }

        NAME_STRIP_RE.replace_all(&name, "").trim().to_string()
    }

    /// Map to a standard sector category.
    pub fn standardize_sector(&self, sector: Option<&str>) -> String {
        let Some(cleaned) = sector.and_then(|s| self.clean_text(s, None)) else {
            return "Uncategorized".to_string();
        };
        let mut cleaned = cleaned.to_lowercase();

        // Multiple sectors: keep the first
        if cleaned.contains(['/', ',', '&']) {
            if let Some(first) = cleaned.split(['/', ',', '&']).next() {
                cleaned = first.trim().to_string();
            }
        }

        if let Some((_, mapped)) = SECTOR_MAPPING.iter().find(|(key, _)| *key == cleaned) {
            return mapped.to_string();
        }
        if let Some((_, mapped)) = SECTOR_MAPPING
            .iter()
            .find(|(key, _)| cleaned.contains(key) || key.contains(cleaned.as_str()))
        {
            return mapped.to_string();
        }

        if cleaned.is_empty() {
            "Uncategorized".to_string()
        } else {
            title_case(&cleaned)
        }
    }

    /// Standardize a job title.
    pub fn standardize_title(&self, title: &str) -> String {
        let Some(cleaned) = self.clean_text(title, None) else {
            return String::new();
        };
        let lower = cleaned.to_lowercase();

        if let Some((_, mapped)) = TITLE_MAPPING.iter().find(|(key, _)| *key == lower) {
            return mapped.to_string();
        }
        if let Some((_, mapped)) = TITLE_MAPPING
            .iter()
            .find(|(key, _)| lower.contains(key) || key.contains(lower.as_str()))
        {
            return mapped.to_string();
        }

        title_case(&cleaned)
    }

    /// Split a full name into first and last components.
    pub fn parse_name(&self, full_name: &str) -> (String, String) {
        let Some(full_name) = self.clean_text(full_name, None) else {
            return (String::new(), String::new());
        };

        let parts: Vec<&str> = full_name.split_whitespace().collect();
        match parts.as_slice() {
            [] => (String::new(), String::new()),
            [only] => ((*only).to_string(), String::new()),
            [first, rest @ ..] => ((*first).to_string(), rest.join(" ")),
        }
    }

    /// Separate a name from an embedded title ("Jane Doe, Partner").
    pub fn extract_name_and_title(&self, full_name: &str) -> (Option<String>, Option<String>) {
        let trimmed = full_name.trim();
        if trimmed.is_empty() {
            return (None, None);
        }

        for pattern in NAME_TITLE_RES.iter() {
            if let Some(captures) = pattern.captures(trimmed) {
                let name = captures.get(1).and_then(|m| self.clean_text(m.as_str(), None));
                let title = captures.get(2).and_then(|m| self.clean_text(m.as_str(), None));
                return (name, title);
            }
        }

        (self.clean_text(trimmed, None), None)
    }

    /// Convert relative URLs to absolute and normalize.
    pub fn normalize_url(&self, url: &str) -> Option<String> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return Url::parse(url).ok().map(|u| u.to_string());
        }

        if let Some(base) = &self.base_url {
            return base.join(url).ok().map(|u| u.to_string());
        }

        // Schemeless absolute URL
        Url::parse(&format!("https://{url}")).ok().map(|u| u.to_string())
    }

    /// Validate and canonicalize a LinkedIn profile URL.
    pub fn validate_linkedin_url(&self, url: &str) -> Option<String> {
        let url = url.trim();
        if !url.to_lowercase().contains("linkedin.com") {
            return None;
        }

        let with_scheme = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };

        let parsed = Url::parse(&with_scheme).ok()?;
        let host = parsed.host_str()?;
        let canonical = format!("{}://{}{}", parsed.scheme(), host, parsed.path());
        Some(canonical.trim_end_matches('/').to_string())
    }

    /// Parse funding text like "$10M" or "€15.5 million" into amount and
    /// currency. Parenthesized conversions keep the first amount.
    pub fn parse_funding_amount(&self, amount: &str) -> (Option<f64>, Option<String>) {
        let amount = amount.trim();
        let amount = amount.split('(').next().unwrap_or(amount).trim();

        let Some(captures) = FUNDING_RE.captures(amount) else {
            log::debug!("Could not parse funding amount: {amount}");
            return (None, None);
        };

        let currency = captures
            .get(1)
            .map(|m| m.as_str())
            .and_then(|symbol| {
                if symbol.len() == 3 {
                    Some(symbol.to_uppercase())
                } else {
                    CURRENCY_SYMBOLS
                        .iter()
                        .find(|(s, _)| *s == symbol)
                        .map(|(_, code)| (*code).to_string())
                }
            })
            .unwrap_or_else(|| "USD".to_string());

        let digits = captures
            .get(2)
            .map(|m| m.as_str().replace(',', ""))
            .unwrap_or_default();
        let Ok(mut value) = digits.parse::<f64>() else {
            log::warn!("Could not convert amount '{digits}' in '{amount}'");
            return (None, None);
        };

        let multiplier = captures
            .get(3)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();
        if multiplier.starts_with('m') {
            value *= 1_000_000.0;
        } else if multiplier.starts_with('b') {
            value *= 1_000_000_000.0;
        } else if multiplier.starts_with('k') || multiplier == "thousand" {
            value *= 1_000.0;
        }

        (Some(value), Some(currency))
    }

    /// Standardize a funding stage name.
    pub fn standardize_funding_stage(&self, stage: &str) -> Option<String> {
        let cleaned = self.clean_text(stage, None)?;
        let lower = cleaned.to_lowercase();
        let mapped = STAGE_MAPPING
            .iter()
            .find(|(key, _)| *key == lower)
            .map(|(_, value)| (*value).to_string())
            .unwrap_or_else(|| title_case(&cleaned));
        Some(mapped)
    }

    /// Extract a leading "City-based" location phrase from a summary,
    /// returning the location and the remaining text.
    pub fn extract_location_from_summary(&self, summary: &str) -> (Option<String>, String) {
        let Some(captures) = LOCATION_RE.captures(summary) else {
            return (None, summary.to_string());
        };

        let location = captures
            .get(1)
            .map(|m| m.as_str().trim().trim_end_matches(',').to_string());

        let mut remainder = LOCATION_RE.replace(summary, "").trim().to_string();
        if let Some(first) = remainder.chars().next() {
            remainder = first.to_uppercase().collect::<String>() + &remainder[first.len_utf8()..];
        }

        (location, remainder)
    }
}

/// First non-empty string value among `keys`.
fn raw_str(raw: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
