// src/models/site.rs

//! Site row as stored in the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scraped source site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Database row id
    pub id: i64,

    /// Display name
    pub name: String,

    /// Site root URL (unique)
    pub url: String,

    /// When the site was last scraped, if ever
    pub last_scraped_at: Option<DateTime<Utc>>,

    /// When the row was created
    pub created_at: DateTime<Utc>,
}
