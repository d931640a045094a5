// src/store/maintenance.rs

//! Store maintenance and reporting queries.

use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::TrackedRecord;

/// A change-log entry read back for reporting.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub entity_id: i64,
    pub changes: String,
    pub previous_hash: String,
    pub new_hash: String,
    pub changed_at: String,
}

/// Row counts and recent-activity figures for the status report.
#[derive(Debug, Clone, Default)]
pub struct StoreStatistics {
    pub sites: i64,
    pub companies: i64,
    pub members: i64,
    pub deals: i64,
    pub companies_updated_24h: i64,
    pub members_updated_24h: i64,
    pub deals_updated_24h: i64,
}

/// Maintenance operations over the change logs and entity tables.
pub struct Maintenance {
    pool: SqlitePool,
}

impl Maintenance {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Change entries for a record kind within the given window.
    pub async fn recent_changes<R: TrackedRecord>(
        &self,
        window: Duration,
        limit: i64,
    ) -> Result<Vec<ChangeEntry>> {
        let cutoff = (Utc::now() - window).to_rfc3339();
        let rows = sqlx::query(&format!(
            "SELECT {}, changes, previous_hash, new_hash, changed_at FROM {} \
             WHERE changed_at >= $1 ORDER BY changed_at DESC LIMIT $2",
            R::ENTITY_COLUMN,
            R::CHANGES_TABLE
        ))
        .bind(&cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ChangeEntry {
                    entity_id: row.try_get(R::ENTITY_COLUMN)?,
                    changes: row.try_get("changes")?,
                    previous_hash: row.try_get("previous_hash")?,
                    new_hash: row.try_get("new_hash")?,
                    changed_at: row.try_get("changed_at")?,
                })
            })
            .collect()
    }

    /// Delete change entries older than `days` from every change log.
    ///
    /// Returns the total number of rows removed.
    pub async fn cleanup_old_changes(&self, days: i64) -> Result<u64> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let mut removed = 0u64;

        for table in ["company_changes", "member_changes", "deal_changes"] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE changed_at < $1"))
                .bind(&cutoff)
                .execute(&self.pool)
                .await?;
            let rows = result.rows_affected();
            if rows > 0 {
                log::info!("Cleaned up {rows} old change(s) from {table}");
            }
            removed += rows;
        }

        Ok(removed)
    }

    /// Row counts plus last-24h update activity.
    pub async fn statistics(&self) -> Result<StoreStatistics> {
        let cutoff = (Utc::now() - Duration::hours(24)).to_rfc3339();

        Ok(StoreStatistics {
            sites: self.count("SELECT COUNT(*) FROM sites", None).await?,
            companies: self
                .count("SELECT COUNT(*) FROM portfolio_companies", None)
                .await?,
            members: self.count("SELECT COUNT(*) FROM team_members", None).await?,
            deals: self.count("SELECT COUNT(*) FROM deals", None).await?,
            companies_updated_24h: self
                .count(
                    "SELECT COUNT(*) FROM portfolio_companies WHERE updated_at >= $1",
                    Some(&cutoff),
                )
                .await?,
            members_updated_24h: self
                .count(
                    "SELECT COUNT(*) FROM team_members WHERE updated_at >= $1",
                    Some(&cutoff),
                )
                .await?,
            deals_updated_24h: self
                .count(
                    "SELECT COUNT(*) FROM deals WHERE updated_at >= $1",
                    Some(&cutoff),
                )
                .await?,
        })
    }

    async fn count(&self, sql: &str, bind: Option<&str>) -> Result<i64> {
        let mut query = sqlx::query_scalar(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        Ok(query.fetch_one(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::fingerprint;
    use crate::models::Company;
    use crate::store::{ChangeTracker, Database, MigrationRunner, SiteStore};

    async fn seeded_db() -> (Database, i64, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maint.db");
        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        MigrationRunner::new(db.pool().clone())
            .run_pending()
            .await
            .unwrap();
        let site_id = SiteStore::new(db.pool().clone())
            .ensure_site("Acme VC", "https://acme.vc")
            .await
            .unwrap()
            .id;
        (db, site_id, dir)
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
    async fn test_recent_changes_and_statistics() {
        let (db, site_id, _dir) = seeded_db().await;
        let tracker = ChangeTracker::new(db.pool().clone(), &crate::config::UpsertConfig::default());

        tracker.upsert(site_id, &company("Acme", "AI")).await.unwrap();
        tracker
            .upsert(site_id, &company("Acme", "Fintech"))
            .await
            .unwrap();

        let maintenance = Maintenance::new(db.pool().clone());
        let changes = maintenance
            .recent_changes::<Company>(Duration::hours(24), 10)
            .await
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].changes.contains("sector"));

        let stats = maintenance.statistics().await.unwrap();
        assert_eq!(stats.sites, 1);
        assert_eq!(stats.companies, 1);
        assert_eq!(stats.companies_updated_24h, 1);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_changes() {
        let (db, site_id, _dir) = seeded_db().await;
        let tracker = ChangeTracker::new(db.pool().clone(), &crate::config::UpsertConfig::default());
        tracker.upsert(site_id, &company("Acme", "AI")).await.unwrap();
        tracker
            .upsert(site_id, &company("Acme", "Fintech"))
            .await
            .unwrap();

        let maintenance = Maintenance::new(db.pool().clone());
        let removed = maintenance.cleanup_old_changes(30).await.unwrap();
        assert_eq!(removed, 0);
        assert_eq!(
            maintenance
                .recent_changes::<Company>(Duration::hours(24), 10)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
