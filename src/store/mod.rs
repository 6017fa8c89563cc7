// src/store/mod.rs
//! Durable persistence: SQLite rows for article/run records, JSON payload
//! documents for stored article bodies.

pub mod db;
pub mod files;

pub use db::Store;
pub use files::{write_article_document, write_rejected_document};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Final disposition of one orchestrator pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run summary, persisted to `pipeline_runs` and returned to the caller.
#[derive(Debug, Clone)]
pub struct PipelineRunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub fetched: u32,
    pub validated: u32,
    pub stored: u32,
    pub topic_positive: u32,
    pub duration: Duration,
    pub status: RunStatus,
    pub error_message: Option<String>,
    /// Rejection counts keyed by reason code. Reported, not persisted.
    pub rejections: HashMap<&'static str, u32>,
}

/// Row shape for `processed_articles`.
#[derive(Debug, Clone)]
pub struct ProcessedRecord {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub domain_category: String,
    pub language: String,
    pub source_country: String,
    pub processed_at: DateTime<Utc>,
    pub source_feed_id: String,
    pub extraction_method: String,
    pub is_topic_relevant: bool,
    pub topic: Option<String>,
    pub fingerprint: String,
    pub storage_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row shape for `rejected_articles`. Fields the pipeline never got to
/// fill stay `None`.
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub domain_category: Option<String>,
    pub language: Option<String>,
    pub source_country: Option<String>,
    pub processed_at: DateTime<Utc>,
    pub source_feed_id: Option<String>,
    pub extraction_method: Option<String>,
    pub rejection_reason: String,
    pub storage_file: Option<String>,
    pub created_at: DateTime<Utc>,
}
