// src/store/db.rs
//! SQLite store: processed/rejected article rows, run records, retention.
//!
//! The `processed_articles` table doubles as the deduplication store: its
//! url and fingerprint columns are loaded into a `DedupIndex` at the start
//! of every batch. Rejected rows are kept for reporting only and never feed
//! the index, so a once-rejected URL gets another chance if it reappears
//! in better shape.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashSet;
use std::path::Path;

use crate::store::{PipelineRunRecord, ProcessedRecord, RejectedRecord};
use crate::validate::DedupIndex;

pub struct Store {
    pool: SqlitePool,
}

/// Raw `pipeline_runs` row, exposed for reporting and tests.
#[derive(Debug, FromRow)]
pub struct StoredRun {
    pub id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub fetched: i64,
    pub validated: i64,
    pub stored: i64,
    pub topic_positive: i64,
    pub duration_ms: Option<i64>,
    pub status: String,
    pub error_message: Option<String>,
}

impl Store {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("opening sqlite store at {}", path.display()))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store for tests. One connection only: each `:memory:`
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("opening in-memory sqlite store")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_articles (
                url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                domain TEXT NOT NULL,
                domain_category TEXT NOT NULL,
                language TEXT NOT NULL,
                source_country TEXT NOT NULL,
                processed_at TEXT NOT NULL,
                source_feed_id TEXT NOT NULL,
                extraction_method TEXT NOT NULL,
                is_topic_relevant INTEGER NOT NULL,
                topic TEXT,
                fingerprint TEXT NOT NULL,
                storage_file TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_processed_fingerprint ON processed_articles(fingerprint);
            CREATE INDEX IF NOT EXISTS idx_processed_domain ON processed_articles(domain);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating processed_articles")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rejected_articles (
                url TEXT PRIMARY KEY,
                title TEXT,
                domain TEXT,
                domain_category TEXT,
                language TEXT,
                source_country TEXT,
                processed_at TEXT NOT NULL,
                source_feed_id TEXT,
                extraction_method TEXT,
                rejection_reason TEXT NOT NULL,
                storage_file TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating rejected_articles")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipeline_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                fetched INTEGER NOT NULL DEFAULT 0,
                validated INTEGER NOT NULL DEFAULT 0,
                stored INTEGER NOT NULL DEFAULT 0,
                topic_positive INTEGER NOT NULL DEFAULT 0,
                duration_ms INTEGER,
                status TEXT NOT NULL,
                error_message TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating pipeline_runs")?;

        Ok(())
    }

    /// Loads every accepted URL and fingerprint for cross-run dedup.
    pub async fn dedup_index(&self) -> Result<DedupIndex> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT url, fingerprint FROM processed_articles")
                .fetch_all(&self.pool)
                .await
                .context("loading dedup index")?;
        let mut urls = HashSet::with_capacity(rows.len());
        let mut fingerprints = HashSet::with_capacity(rows.len());
        for (url, fingerprint) in rows {
            urls.insert(url);
            fingerprints.insert(fingerprint);
        }
        Ok(DedupIndex::new(urls, fingerprints))
    }

    /// Returns false when the URL was already present (treated as
    /// already-processed, not an error).
    pub async fn insert_processed(&self, rec: &ProcessedRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_articles (
                url, title, domain, domain_category, language, source_country,
                processed_at, source_feed_id, extraction_method,
                is_topic_relevant, topic, fingerprint, storage_file, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(&rec.url)
        .bind(&rec.title)
        .bind(&rec.domain)
        .bind(&rec.domain_category)
        .bind(&rec.language)
        .bind(&rec.source_country)
        .bind(rec.processed_at.to_rfc3339())
        .bind(&rec.source_feed_id)
        .bind(&rec.extraction_method)
        .bind(rec.is_topic_relevant)
        .bind(&rec.topic)
        .bind(&rec.fingerprint)
        .bind(&rec.storage_file)
        .bind(rec.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("inserting processed article")?;
        Ok(result.rows_affected() > 0)
    }

    /// A re-rejected URL keeps one row with the latest reason.
    pub async fn insert_rejected(&self, rec: &RejectedRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rejected_articles (
                url, title, domain, domain_category, language, source_country,
                processed_at, source_feed_id, extraction_method,
                rejection_reason, storage_file, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                rejection_reason = excluded.rejection_reason,
                storage_file = excluded.storage_file,
                processed_at = excluded.processed_at
            "#,
        )
        .bind(&rec.url)
        .bind(&rec.title)
        .bind(&rec.domain)
        .bind(&rec.domain_category)
        .bind(&rec.language)
        .bind(&rec.source_country)
        .bind(rec.processed_at.to_rfc3339())
        .bind(&rec.source_feed_id)
        .bind(&rec.extraction_method)
        .bind(&rec.rejection_reason)
        .bind(&rec.storage_file)
        .bind(rec.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("inserting rejected article")?;
        Ok(())
    }

    pub async fn start_run(&self, started_at: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query("INSERT INTO pipeline_runs (started_at, status) VALUES (?, 'in-progress')")
            .bind(started_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("opening run record")?;
        Ok(result.last_insert_rowid())
    }

    pub async fn complete_run(&self, record: &PipelineRunRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE pipeline_runs SET
                completed_at = ?, fetched = ?, validated = ?, stored = ?,
                topic_positive = ?, duration_ms = ?, status = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(record.completed_at.map(|t| t.to_rfc3339()))
        .bind(record.fetched as i64)
        .bind(record.validated as i64)
        .bind(record.stored as i64)
        .bind(record.topic_positive as i64)
        .bind(record.duration.as_millis() as i64)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(record.id)
        .execute(&self.pool)
        .await
        .context("closing run record")?;
        Ok(())
    }

    pub async fn fetch_run(&self, id: i64) -> Result<Option<StoredRun>> {
        sqlx::query_as::<_, StoredRun>(
            r#"
            SELECT id, started_at, completed_at, fetched, validated, stored,
                   topic_positive, duration_ms, status, error_message
            FROM pipeline_runs WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("reading run record")
    }

    /// Drops article and run rows older than the retention window. Returns
    /// how many rows went away.
    pub async fn cleanup_old_records(&self, retention_days: u32) -> Result<u64> {
        let cutoff = (Utc::now() - ChronoDuration::days(retention_days as i64)).to_rfc3339();
        let mut removed = 0u64;
        for sql in [
            "DELETE FROM processed_articles WHERE created_at < ?",
            "DELETE FROM rejected_articles WHERE created_at < ?",
            "DELETE FROM pipeline_runs WHERE started_at < ?",
        ] {
            removed += sqlx::query(sql)
                .bind(&cutoff)
                .execute(&self.pool)
                .await
                .context("retention cleanup")?
                .rows_affected();
        }
        Ok(removed)
    }

    pub async fn processed_count(&self) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_articles")
            .fetch_one(&self.pool)
            .await
            .context("counting processed articles")?;
        Ok(n)
    }

    pub async fn rejected_reason(&self, url: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT rejection_reason FROM rejected_articles WHERE url = ?")
                .bind(url)
                .fetch_optional(&self.pool)
                .await
                .context("reading rejection reason")?;
        Ok(row.map(|(reason,)| reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed(url: &str, fingerprint: &str, created_at: DateTime<Utc>) -> ProcessedRecord {
        ProcessedRecord {
            url: url.to_string(),
            title: "Title".to_string(),
            domain: "example.com".to_string(),
            domain_category: "Other".to_string(),
            language: "en".to_string(),
            source_country: "US".to_string(),
            processed_at: created_at,
            source_feed_id: "gdelt".to_string(),
            extraction_method: "density".to_string(),
            is_topic_relevant: true,
            topic: Some("AI Technology and Infrastructure".to_string()),
            fingerprint: fingerprint.to_string(),
            storage_file: None,
            created_at,
        }
    }

    fn rejected(url: &str, reason: &str) -> RejectedRecord {
        RejectedRecord {
            url: url.to_string(),
            title: Some("Title".to_string()),
            domain: Some("example.com".to_string()),
            domain_category: None,
            language: None,
            source_country: None,
            processed_at: Utc::now(),
            source_feed_id: Some("gdelt".to_string()),
            extraction_method: None,
            rejection_reason: reason.to_string(),
            storage_file: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_processed_url_is_skipped_not_errored() {
        let store = Store::in_memory().await.unwrap();
        let rec = processed("https://example.com/a", "f1", Utc::now());
        assert!(store.insert_processed(&rec).await.unwrap());
        assert!(!store.insert_processed(&rec).await.unwrap());
        assert_eq!(store.processed_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dedup_index_reflects_accepted_rows_only() {
        let store = Store::in_memory().await.unwrap();
        store
            .insert_processed(&processed("https://example.com/a", "f1", Utc::now()))
            .await
            .unwrap();
        store
            .insert_rejected(&rejected("https://example.com/r", "too short"))
            .await
            .unwrap();

        let index = store.dedup_index().await.unwrap();
        assert!(index.contains_url("https://example.com/a"));
        assert!(index.contains_fingerprint("f1"));
        assert!(!index.contains_url("https://example.com/r"));
    }

    #[tokio::test]
    async fn re_rejection_keeps_latest_reason() {
        let store = Store::in_memory().await.unwrap();
        store
            .insert_rejected(&rejected("https://example.com/r", "too short"))
            .await
            .unwrap();
        store
            .insert_rejected(&rejected("https://example.com/r", "duplicate url"))
            .await
            .unwrap();
        assert_eq!(
            store.rejected_reason("https://example.com/r").await.unwrap(),
            Some("duplicate url".to_string())
        );
    }

    #[tokio::test]
    async fn run_record_lifecycle() {
        let store = Store::in_memory().await.unwrap();
        let started = Utc::now();
        let id = store.start_run(started).await.unwrap();

        let open = store.fetch_run(id).await.unwrap().unwrap();
        assert_eq!(open.status, "in-progress");

        let record = PipelineRunRecord {
            id,
            started_at: started,
            completed_at: Some(Utc::now()),
            fetched: 10,
            validated: 7,
            stored: 7,
            topic_positive: 4,
            duration: std::time::Duration::from_millis(1_234),
            status: crate::store::RunStatus::Success,
            error_message: None,
            rejections: Default::default(),
        };
        store.complete_run(&record).await.unwrap();

        let closed = store.fetch_run(id).await.unwrap().unwrap();
        assert_eq!(closed.status, "success");
        assert_eq!(closed.fetched, 10);
        assert_eq!(closed.topic_positive, 4);
        assert_eq!(closed.duration_ms, Some(1_234));
        assert!(closed.completed_at.is_some());
    }

    #[tokio::test]
    async fn retention_drops_only_expired_rows() {
        let store = Store::in_memory().await.unwrap();
        let old = Utc::now() - ChronoDuration::days(40);
        store
            .insert_processed(&processed("https://example.com/old", "f-old", old))
            .await
            .unwrap();
        store
            .insert_processed(&processed("https://example.com/new", "f-new", Utc::now()))
            .await
            .unwrap();

        let removed = store.cleanup_old_records(30).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.processed_count().await.unwrap(), 1);
        let index = store.dedup_index().await.unwrap();
        assert!(index.contains_url("https://example.com/new"));
        assert!(!index.contains_url("https://example.com/old"));
    }
}
