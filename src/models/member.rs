// src/models/member.rs

//! Team member record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{NaturalKey, TrackedRecord};

/// A cleaned team member.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TeamMember {
    /// Full name (natural key within a site)
    pub name: String,

    /// First name component
    pub first_name: Option<String>,

    /// Last name component
    pub last_name: Option<String>,

    /// Standardized job title
    pub title: Option<String>,

    /// Cleaned biography
    pub bio: Option<String>,

    /// Photo image URL
    pub photo_url: Option<String>,

    /// Validated LinkedIn profile URL
    pub linkedin_url: Option<String>,

    /// Contact email
    pub email: Option<String>,

    /// Page the record was extracted from
    pub source_url: String,

    /// When the record was scraped (volatile, excluded from the fingerprint)
    pub scraped_at: Option<DateTime<Utc>>,

    /// Content fingerprint
    pub content_hash: String,
}

impl TrackedRecord for TeamMember {
    const TABLE: &'static str = "team_members";
    const CHANGES_TABLE: &'static str = "member_changes";
    const ENTITY_COLUMN: &'static str = "member_id";
    const KIND: &'static str = "member";

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
