// src/store/sites.rs

//! Site rows: find-or-create and bookkeeping.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::{AppError, Result};
use crate::models::Site;

/// Repository for site rows.
pub struct SiteStore {
    pool: SqlitePool,
}

impl SiteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Return the site with the given URL, creating it if necessary.
    pub async fn ensure_site(&self, name: &str, url: &str) -> Result<Site> {
        if let Some(row) = sqlx::query("SELECT * FROM sites WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
        {
            let site = Self::row_to_site(&row)?;
            log::debug!("Site already exists: {} ({})", site.name, site.url);
            return Ok(site);
        }

        let now = Utc::now();
        let result = sqlx::query("INSERT INTO sites (name, url, created_at) VALUES ($1, $2, $3)")
            .bind(name)
            .bind(url)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        log::info!("Created new site: {name} ({url})");
        Ok(Site {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            url: url.to_string(),
            last_scraped_at: None,
            created_at: now,
        })
    }

    /// Refresh the site's last-scraped timestamp.
    pub async fn touch_last_scraped(&self, site_id: i64) -> Result<()> {
        sqlx::query("UPDATE sites SET last_scraped_at = $1 WHERE id = $2")
            .bind(Utc::now().to_rfc3339())
            .bind(site_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_site(row: &sqlx::sqlite::SqliteRow) -> Result<Site> {
        let created_at: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| AppError::validation(format!("bad created_at: {e}")))?
            .with_timezone(&Utc);

        let last_scraped_at: Option<String> = row.try_get("last_scraped_at")?;
        let last_scraped_at = last_scraped_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(Site {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            last_scraped_at,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Database, MigrationRunner};

    async fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.db");
        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        MigrationRunner::new(db.pool().clone())
            .run_pending()
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn test_ensure_site_is_find_or_create() {
        let (db, _dir) = test_db().await;
        let store = SiteStore::new(db.pool().clone());

        let first = store.ensure_site("Acme VC", "https://acme.vc").await.unwrap();
        let second = store.ensure_site("Acme VC", "https://acme.vc").await.unwrap();
        assert_eq!(first.id, second.id);

        let other = store.ensure_site("Other VC", "https://other.vc").await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_touch_last_scraped() {
        let (db, _dir) = test_db().await;
        let store = SiteStore::new(db.pool().clone());
        let site = store.ensure_site("Acme VC", "https://acme.vc").await.unwrap();
        assert!(site.last_scraped_at.is_none());

        store.touch_last_scraped(site.id).await.unwrap();
        let refreshed = store.ensure_site("Acme VC", "https://acme.vc").await.unwrap();
        assert!(refreshed.last_scraped_at.is_some());
    }
}
