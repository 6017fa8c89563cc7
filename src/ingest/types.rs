// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// One article the discovery feed proposes for processing. `content` is
/// usually `Remote`; fixtures and pre-rendered feeds inline the page.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct CandidateRecord {
    pub url: String,
    pub title: String,
    /// When the feed first saw the article.
    pub seen_at: Option<DateTime<Utc>>,
    pub domain: String,
    pub language: Option<String>,
    pub source_country: Option<String>,
    pub content: ContentRef,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub enum ContentRef {
    /// Page HTML supplied with the record.
    Inline(String),
    /// Page must be downloaded from the record's URL.
    Remote,
}

/// Recency window for feed queries, inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn ending_now(span: std::time::Duration) -> Self {
        let end = Utc::now();
        let span = ChronoDuration::from_std(span).unwrap_or_else(|_| ChronoDuration::hours(2));
        Self {
            start: end - span,
            end,
        }
    }
}

#[async_trait::async_trait]
pub trait DiscoveryFeed {
    /// Candidate articles for one source domain within the window.
    async fn discover(&self, domain: &str, window: TimeWindow) -> Result<Vec<CandidateRecord>>;
    fn name(&self) -> &'static str;
}

/// An article after extraction, mutable until the validator accepts it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArticleDraft {
    pub url: String,
    pub title: String,
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
    pub domain: String,
    pub language: String,
    pub source_country: String,
    pub domain_category: String,
    pub extraction_method: String,
    pub feed: String,
}
