// src/store/upsert.rs

//! Find-or-create upsert protocol with content-hash change tracking.
//!
//! Every record kind goes through the same transactional shape: look up the
//! stored row by natural key, then insert, refresh `last_seen_at`, or update
//! plus append one field-level diff to the kind's change log. The lookup and
//! write run in one transaction so concurrent upserts of the same natural
//! key serialize instead of losing updates.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use crate::config::UpsertConfig;
use crate::error::Result;
use crate::models::TrackedRecord;

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sight: row created, no change entry
    Inserted,
    /// Identical content: only `last_seen_at` refreshed
    Unchanged,
    /// Content changed: row updated, diff appended to the change log
    Updated,
}

/// One field's before/after values inside a change entry.
#[derive(Debug, Serialize)]
struct FieldChange {
    old: Value,
    new: Value,
}

/// Applies the upsert protocol for every tracked record kind.
pub struct ChangeTracker {
    pool: SqlitePool,
    batch_size: usize,
    max_concurrent: usize,
}

impl ChangeTracker {
    pub fn new(pool: SqlitePool, config: &UpsertConfig) -> Self {
        Self {
            pool,
            batch_size: config.batch_size.max(1),
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Upsert one record for a site.
    ///
    /// Idempotent: re-running with identical content is a pure no-op apart
    /// from `last_seen_at`, and produces no additional change entries.
    /// A conflict with a concurrent writer of the same natural key is
    /// resolved by one retry against the now-committed row.
    pub async fn upsert<R: TrackedRecord>(
        &self,
        site_id: i64,
        record: &R,
    ) -> Result<UpsertOutcome> {
        match self.upsert_once(site_id, record).await {
            Err(error) if is_write_conflict(&error) => {
                log::debug!(
                    "Upsert conflict for {} '{}', retrying once",
                    R::KIND,
                    record.display_name()
                );
                self.upsert_once(site_id, record).await
            }
            other => other,
        }
    }

    async fn upsert_once<R: TrackedRecord>(
        &self,
        site_id: i64,
        record: &R,
    ) -> Result<UpsertOutcome> {
        let key = record.natural_key();
        let fields = record.significant_fields();
        let data = serde_json::to_string(&fields)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(&format!(
            "SELECT id, content_hash, data FROM {} \
             WHERE site_id = $1 AND key_scope = $2 AND natural_key = $3",
            R::TABLE
        ))
        .bind(site_id)
        .bind(&key.scope)
        .bind(&key.name)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            None => {
                sqlx::query(&format!(
                    "INSERT INTO {} \
                     (site_id, natural_key, key_scope, data, content_hash, \
                      first_seen_at, last_seen_at, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $6, $6, $6)",
                    R::TABLE
                ))
                .bind(site_id)
                .bind(&key.name)
                .bind(&key.scope)
                .bind(&data)
                .bind(record.content_hash())
                .bind(&now)
                .execute(&mut *tx)
                .await?;

                log::info!("Created new {}: {}", R::KIND, record.display_name());
                UpsertOutcome::Inserted
            }
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                let stored_hash: String = row.try_get("content_hash")?;

                if stored_hash == record.content_hash() {
                    sqlx::query(&format!(
                        "UPDATE {} SET last_seen_at = $1 WHERE id = $2",
                        R::TABLE
                    ))
                    .bind(&now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;

                    log::debug!("Unchanged {}: {}", R::KIND, record.display_name());
                    UpsertOutcome::Unchanged
                } else {
                    sqlx::query(&format!(
                        "UPDATE {} \
                         SET data = $1, content_hash = $2, last_seen_at = $3, updated_at = $3 \
                         WHERE id = $4",
                        R::TABLE
                    ))
                    .bind(&data)
                    .bind(record.content_hash())
                    .bind(&now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;

                    let stored_data: String = row.try_get("data")?;
                    let stored_fields: BTreeMap<String, Value> =
                        serde_json::from_str(&stored_data).unwrap_or_default();
                    let diff = field_diff(&stored_fields, &fields);

                    sqlx::query(&format!(
                        "INSERT INTO {} ({}, changes, previous_hash, new_hash, changed_at) \
                         VALUES ($1, $2, $3, $4, $5)",
                        R::CHANGES_TABLE,
                        R::ENTITY_COLUMN
                    ))
                    .bind(id)
                    .bind(serde_json::to_string(&diff)?)
                    .bind(&stored_hash)
                    .bind(record.content_hash())
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;

                    log::info!(
                        "Updated {} {} ({} field(s) changed)",
                        R::KIND,
                        record.display_name(),
                        diff.len()
                    );
                    UpsertOutcome::Updated
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Upsert a batch of records with bounded concurrency.
    ///
    /// Records are processed in fixed-size batches; per-record failures are
    /// logged and excluded from the returned success count without aborting
    /// sibling items.
    pub async fn upsert_batch<R: TrackedRecord>(&self, site_id: i64, records: &[R]) -> usize {
        let mut success = 0usize;

        for batch in records.chunks(self.batch_size) {
            let mut outcomes = stream::iter(batch)
                .map(|record| async move { (record, self.upsert(site_id, record).await) })
                .buffer_unordered(self.max_concurrent);

            while let Some((record, result)) = outcomes.next().await {
                match result {
                    Ok(_) => success += 1,
                    Err(error) => {
                        log::error!(
                            "Failed to upsert {} '{}': {}",
                            R::KIND,
                            record.display_name(),
                            error
                        );
                    }
                }
            }
        }

        log::info!(
            "Successfully processed {}/{} {} record(s)",
            success,
            records.len(),
            R::KIND
        );
        success
    }

    /// Change entries recorded for a record kind.
    pub async fn change_count<R: TrackedRecord>(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", R::CHANGES_TABLE))
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

/// Same-key writers racing through the read-then-write window surface as a
/// unique violation (both inserted) or a lock upgrade failure (both
/// updating); either way the retry sees the committed row.
fn is_write_conflict(error: &crate::error::AppError) -> bool {
    match error {
        crate::error::AppError::Database(sqlx::Error::Database(db)) => {
            db.is_unique_violation() || db.message().contains("locked")
        }
        _ => false,
    }
}

/// Every field whose value differs between the stored and incoming maps.
fn field_diff(
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
) -> BTreeMap<String, FieldChange> {
    let mut diff = BTreeMap::new();
    for key in old.keys().chain(new.keys()) {
        if diff.contains_key(key) {
            continue;
        }
        let old_value = old.get(key).cloned().unwrap_or(Value::Null);
        let new_value = new.get(key).cloned().unwrap_or(Value::Null);
        if old_value != new_value {
            diff.insert(
                key.clone(),
                FieldChange {
                    old: old_value,
                    new: new_value,
                },
            );
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::fingerprint;
    use crate::models::{Company, Deal};
    use crate::store::{Database, MigrationRunner, SiteStore};

    async fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upsert.db");
        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        MigrationRunner::new(db.pool().clone())
            .run_pending()
            .await
            .unwrap();
        (db, dir)
    }

    async fn test_site(db: &Database) -> i64 {
        SiteStore::new(db.pool().clone())
            .ensure_site("Acme VC", "https://acme.vc")
            .await
            .unwrap()
            .id
    }

    fn tracker(db: &Database) -> ChangeTracker {
        ChangeTracker::new(
            db.pool().clone(),
            &crate::config::UpsertConfig {
                batch_size: 50,
                max_concurrent: 4,
            },
        )
    }

    fn company(name: &str, sector: &str) -> Company {
        let mut company = Company {
            name: name.to_string(),
            sector: Some(sector.to_string()),
            ..Company::default()
        };
        company.content_hash = fingerprint(&company);
        company
    }

    #[tokio::test]
    async fn test_first_upsert_inserts_without_change_entry() {
        let (db, _dir) = test_db().await;
        let site_id = test_site(&db).await;
        let tracker = tracker(&db);

        let outcome = tracker.upsert(site_id, &company("Acme", "AI")).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(tracker.change_count::<Company>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_identical_reupsert_is_a_noop_on_content() {
        let (db, _dir) = test_db().await;
        let site_id = test_site(&db).await;
        let tracker = tracker(&db);
        let record = company("Acme", "AI");

        tracker.upsert(site_id, &record).await.unwrap();
        let outcome = tracker.upsert(site_id, &record).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(tracker.change_count::<Company>().await.unwrap(), 0);

        let stored_hash: String = sqlx::query_scalar(
            "SELECT content_hash FROM portfolio_companies WHERE natural_key = 'Acme'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(stored_hash, record.content_hash);
    }

    #[tokio::test]
    async fn test_changed_content_records_field_diff() {
        let (db, _dir) = test_db().await;
        let site_id = test_site(&db).await;
        let tracker = tracker(&db);

        tracker.upsert(site_id, &company("Acme", "AI")).await.unwrap();
        let outcome = tracker
            .upsert(site_id, &company("Acme", "Fintech"))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(tracker.change_count::<Company>().await.unwrap(), 1);

        let changes: String =
            sqlx::query_scalar("SELECT changes FROM company_changes LIMIT 1")
                .fetch_one(db.pool())
                .await
                .unwrap();
        let diff: serde_json::Value = serde_json::from_str(&changes).unwrap();
        assert_eq!(diff["sector"]["old"], "AI");
        assert_eq!(diff["sector"]["new"], "Fintech");
        assert!(diff.get("name").is_none());
    }

    #[tokio::test]
    async fn test_upsert_idempotence_across_transitions() {
        let (db, _dir) = test_db().await;
        let site_id = test_site(&db).await;
        let tracker = tracker(&db);

        // insert, update, then identical re-run: exactly one change entry
        tracker.upsert(site_id, &company("Acme", "AI")).await.unwrap();
        let updated = company("Acme", "Fintech");
        tracker.upsert(site_id, &updated).await.unwrap();
        tracker.upsert(site_id, &updated).await.unwrap();

        assert_eq!(tracker.change_count::<Company>().await.unwrap(), 1);
        let stored_hash: String = sqlx::query_scalar(
            "SELECT content_hash FROM portfolio_companies WHERE natural_key = 'Acme'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(stored_hash, updated.content_hash);
    }

    #[tokio::test]
    async fn test_batch_partial_failure_keeps_siblings() {
        let (db, _dir) = test_db().await;
        let site_id = test_site(&db).await;
        let tracker = tracker(&db);

        // The empty name violates the natural_key CHECK constraint.
        let records = vec![
            company("Alpha", "AI"),
            company("", "Broken"),
            company("Gamma", "Fintech"),
        ];
        let saved = tracker.upsert_batch(site_id, &records).await;
        assert_eq!(saved, 2);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM portfolio_companies")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_batch_noop_updates_still_count_as_success() {
        let (db, _dir) = test_db().await;
        let site_id = test_site(&db).await;
        let tracker = tracker(&db);
        let records = vec![company("Alpha", "AI"), company("Beta", "Fintech")];

        assert_eq!(tracker.upsert_batch(site_id, &records).await, 2);
        assert_eq!(tracker.upsert_batch(site_id, &records).await, 2);
        assert_eq!(tracker.change_count::<Company>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_key_in_batch_serializes() {
        let (db, _dir) = test_db().await;
        let site_id = test_site(&db).await;
        let tracker = tracker(&db);

        let records = vec![company("Acme", "AI"), company("Acme", "AI")];
        let saved = tracker.upsert_batch(site_id, &records).await;
        assert_eq!(saved, 2);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM portfolio_companies")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_deals_key_on_article_and_startup() {
        let (db, _dir) = test_db().await;
        let site_id = test_site(&db).await;
        let tracker = tracker(&db);

        let mut deal = Deal {
            startup_name: "Rocketly".into(),
            source_article_url: "https://news.example/a1".into(),
            ..Deal::default()
        };
        deal.content_hash = fingerprint(&deal);

        let mut same_name_other_article = deal.clone();
        same_name_other_article.source_article_url = "https://news.example/a2".into();
        same_name_other_article.content_hash = fingerprint(&same_name_other_article);

        tracker.upsert(site_id, &deal).await.unwrap();
        let outcome = tracker
            .upsert(site_id, &same_name_other_article)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_field_diff_covers_added_removed_and_changed() {
        let mut old = BTreeMap::new();
        old.insert("kept".to_string(), serde_json::json!("same"));
        old.insert("changed".to_string(), serde_json::json!("before"));
        old.insert("removed".to_string(), serde_json::json!("gone"));

        let mut new = BTreeMap::new();
        new.insert("kept".to_string(), serde_json::json!("same"));
        new.insert("changed".to_string(), serde_json::json!("after"));
        new.insert("added".to_string(), serde_json::json!("fresh"));

        let diff = field_diff(&old, &new);
        assert_eq!(diff.len(), 3);
        assert!(diff.contains_key("changed"));
        assert!(diff.contains_key("removed"));
        assert!(diff.contains_key("added"));
        assert!(!diff.contains_key("kept"));
    }
}
