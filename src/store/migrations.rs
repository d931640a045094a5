// src/store/migrations.rs

//! Embedded schema migrations with an execution ledger.
//!
//! Applied migration filenames are recorded in the `migrations` table;
//! `run_pending` applies only the delta, in filename order.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::error::{AppError, Result};

/// Ordered migrations, embedded at compile time.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_create_sites.sql",
        r#"
        CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            url TEXT NOT NULL UNIQUE,
            last_scraped_at TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "002_create_portfolio_companies.sql",
        r#"
        CREATE TABLE IF NOT EXISTS portfolio_companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id),
            natural_key TEXT NOT NULL CHECK (natural_key <> ''),
            key_scope TEXT NOT NULL DEFAULT '',
            data TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (site_id, key_scope, natural_key)
        );
        CREATE TABLE IF NOT EXISTS company_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL REFERENCES portfolio_companies(id),
            changes TEXT NOT NULL,
            previous_hash TEXT NOT NULL,
            new_hash TEXT NOT NULL,
            changed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_company_changes_changed_at
            ON company_changes (changed_at);
        "#,
    ),
    (
        "003_create_team_members.sql",
        r#"
        CREATE TABLE IF NOT EXISTS team_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id),
            natural_key TEXT NOT NULL CHECK (natural_key <> ''),
            key_scope TEXT NOT NULL DEFAULT '',
            data TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (site_id, key_scope, natural_key)
        );
        CREATE TABLE IF NOT EXISTS member_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER NOT NULL REFERENCES team_members(id),
            changes TEXT NOT NULL,
            previous_hash TEXT NOT NULL,
            new_hash TEXT NOT NULL,
            changed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_member_changes_changed_at
            ON member_changes (changed_at);
        "#,
    ),
    (
        "004_create_deals.sql",
        r#"
        CREATE TABLE IF NOT EXISTS deals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id),
            natural_key TEXT NOT NULL CHECK (natural_key <> ''),
            key_scope TEXT NOT NULL DEFAULT '',
            data TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (site_id, key_scope, natural_key)
        );
        CREATE TABLE IF NOT EXISTS deal_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deal_id INTEGER NOT NULL REFERENCES deals(id),
            changes TEXT NOT NULL,
            previous_hash TEXT NOT NULL,
            new_hash TEXT NOT NULL,
            changed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_deal_changes_changed_at
            ON deal_changes (changed_at);
        "#,
    ),
];

/// Applies pending migrations in order.
pub struct MigrationRunner {
    pool: SqlitePool,
}

impl MigrationRunner {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply every migration not yet recorded in the ledger.
    ///
    /// Returns the filenames applied by this run.
    pub async fn run_pending(&self) -> Result<Vec<String>> {
        self.ensure_ledger().await?;
        let executed = self.executed().await?;

        let mut applied = Vec::new();
        for (filename, sql) in MIGRATIONS {
            if executed.contains(*filename) {
                continue;
            }
            log::info!("Executing migration: {filename}");
            self.execute(filename, sql).await?;
            applied.push((*filename).to_string());
        }

        if applied.is_empty() {
            log::debug!("No pending migrations");
        } else {
            log::info!("Applied {} migration(s)", applied.len());
        }
        Ok(applied)
    }

    /// Filenames already applied, in execution order.
    pub async fn executed(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT filename FROM migrations ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("filename").map_err(Into::into))
            .collect()
    }

    async fn ensure_ledger(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL UNIQUE,
                executed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn execute(&self, filename: &str, sql: &str) -> Result<()> {
        for statement in sql.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::migration(filename, e))?;
        }

        sqlx::query("INSERT INTO migrations (filename, executed_at) VALUES ($1, $2)")
            .bind(filename)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
