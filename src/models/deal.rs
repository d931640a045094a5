// src/models/deal.rs

//! Funding deal record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{NaturalKey, TrackedRecord};

/// A cleaned funding deal extracted from a news article.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Deal {
    /// Startup raising the round
    pub startup_name: String,

    /// Startup website
    pub company_website: Option<String>,

    /// Parsed funding amount in major currency units
    pub funding_amount: Option<f64>,

    /// ISO currency code for the funding amount
    pub funding_currency: Option<String>,

    /// Funding text as it appeared in the article
    pub funding_amount_description: Option<String>,

    /// Standardized round type
    pub round_type: Option<String>,

    /// Lead investor name
    pub lead_investor: Option<String>,

    /// Other named investors (generic entries filtered out)
    pub other_investors: Vec<String>,

    /// Startup location
    pub location: Option<String>,

    /// One-line deal summary
    pub summary: Option<String>,

    /// Article the deal was extracted from (part of the natural key)
    pub source_article_url: String,

    /// Article headline
    pub source_article_title: Option<String>,

    /// Article publication date, verbatim
    pub article_publication_date: Option<String>,

    /// When the record was scraped (volatile, excluded from the fingerprint)
    pub scraped_at: Option<DateTime<Utc>>,

    /// Content fingerprint
    pub content_hash: String,
}

impl TrackedRecord for Deal {
    const TABLE: &'static str = "deals";
    const CHANGES_TABLE: &'static str = "deal_changes";
    const ENTITY_COLUMN: &'static str = "deal_id";
    const KIND: &'static str = "deal";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::scoped(&self.source_article_url, &self.startup_name)
    }

    fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn display_name(&self) -> &str {
        &self.startup_name
    }
}
