// src/models/company.rs

//! Portfolio company record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{NaturalKey, TrackedRecord};

/// A cleaned portfolio company.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Company {
    /// Standardized company name (natural key within a site)
    pub name: String,

    /// Name as it appeared on the page
    pub original_name: String,

    /// Standardized sector
    pub sector: Option<String>,

    /// Parsed funding amount in major currency units
    pub funding_amount: Option<f64>,

    /// ISO currency code for the funding amount
    pub funding_currency: Option<String>,

    /// Funding text as it appeared on the page
    pub funding_description: Option<String>,

    /// Standardized funding stage
    pub funding_stage: Option<String>,

    /// Cleaned description
    pub description: Option<String>,

    /// Company website
    pub website: Option<String>,

    /// Logo image URL
    pub logo_url: Option<String>,

    /// Headquarters location
    pub location: Option<String>,

    /// Page the record was extracted from
    pub source_url: String,

    /// When the record was scraped (volatile, excluded from the fingerprint)
    pub scraped_at: Option<DateTime<Utc>>,

    /// Content fingerprint
    pub content_hash: String,
}

impl TrackedRecord for Company {
    const TABLE: &'static str = "portfolio_companies";
    const CHANGES_TABLE: &'static str = "company_changes";
    const ENTITY_COLUMN: &'static str = "company_id";
    const KIND: &'static str = "company";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::name(&self.name)
    }

    fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}
