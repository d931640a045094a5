// src/models/record.rs

//! Record abstractions shared by every persisted kind.

use std::collections::BTreeMap;

use serde_json::Value;

/// Untyped field bag produced by an extractor, consumed by the cleaner.
pub type RawRecord = BTreeMap<String, Value>;

/// Fields excluded from fingerprints and diffs.
///
/// These change on every run without the record itself changing.
pub const VOLATILE_FIELDS: &[&str] = &["content_hash", "scraped_at"];

/// Natural key of a record within one site.
///
/// Companies and members are keyed by name alone; deals are keyed by
/// `(source_article_url, startup_name)` via the scope component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    /// Primary component (the entity name)
    pub name: String,
    /// Scoping component; empty for kinds keyed by name alone
    pub scope: String,
}

impl NaturalKey {
    /// Key by name alone.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: String::new(),
        }
    }

    /// Key by a scope plus a name.
    pub fn scoped(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
        }
    }
}

/// A cleaned record the upsert protocol can persist uniformly.
///
/// Implementations supply their table names and the significant-field map
/// used for fingerprinting and field-level diffs.
pub trait TrackedRecord: Clone + Send + Sync + serde::Serialize {
    /// Table holding stored rows of this kind.
    const TABLE: &'static str;
    /// Append-only change-log table for this kind.
    const CHANGES_TABLE: &'static str;
    /// Column in the change-log table referencing the entity row.
    const ENTITY_COLUMN: &'static str;
    /// Human-readable kind label for logs.
    const KIND: &'static str;

    /// Natural key within a site.
    fn natural_key(&self) -> NaturalKey;

    /// Content fingerprint over the significant fields.
    fn content_hash(&self) -> &str;

    /// Display name for logs.
    fn display_name(&self) -> &str;

    /// Significant fields in canonical (sorted) order.
    ///
    /// Two records with identical significant fields always produce the
    /// identical map, regardless of construction order; volatile metadata
    /// is excluded.
    fn significant_fields(&self) -> BTreeMap<String, Value> {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        let mut fields = BTreeMap::new();
        if let Value::Object(map) = value {
            for (key, field) in map {
                if VOLATILE_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                fields.insert(key, field);
            }
        }
        fields
    }
}
