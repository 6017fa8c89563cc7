// src/ingest/providers/gdelt.rs
use crate::config::PipelineConfig;
use crate::domains;
use crate::ingest::types::{CandidateRecord, ContentRef, DiscoveryFeed, TimeWindow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ArtList {
    #[serde(default)]
    articles: Vec<ArtListEntry>,
}

#[derive(Debug, Deserialize)]
struct ArtListEntry {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    seendate: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    sourcecountry: String,
}

/// GDELT DOC 2.0 article-list client; one query per source domain.
pub struct GdeltFeed {
    client: reqwest::Client,
    base_url: String,
    max_records: u32,
    language_hint: Option<String>,
}

impl GdeltFeed {
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            client,
            base_url: cfg.feed_base_url.clone(),
            max_records: cfg.max_records,
            language_hint: cfg.language_hint.clone(),
        })
    }
}

/// Feed timestamps: `20240101T120000Z` in records, `20240101120000` in
/// query bounds.
fn parse_seen_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|dt| dt.and_utc())
}

fn format_bound(t: DateTime<Utc>) -> String {
    t.format("%Y%m%d%H%M%S").to_string()
}

/// Parse an article-list response body into candidates. Entries missing
/// url, title, or seendate are dropped.
pub fn parse_artlist(raw: &str) -> Result<Vec<CandidateRecord>> {
    let list: ArtList = serde_json::from_str(raw).context("parsing article-list json")?;
    let mut out = Vec::with_capacity(list.articles.len());
    for entry in list.articles {
        if entry.url.is_empty() || entry.title.is_empty() || entry.seendate.is_empty() {
            continue;
        }
        let domain = if entry.domain.is_empty() {
            domains::domain_of_url(&entry.url).unwrap_or_default()
        } else {
            domains::normalize_domain(&entry.domain)
        };
        out.push(CandidateRecord {
            url: entry.url,
            title: entry.title,
            seen_at: parse_seen_date(&entry.seendate),
            domain,
            language: Some(entry.language).filter(|l| !l.is_empty()),
            source_country: Some(entry.sourcecountry).filter(|c| !c.is_empty()),
            content: ContentRef::Remote,
        });
    }
    Ok(out)
}

#[async_trait]
impl DiscoveryFeed for GdeltFeed {
    async fn discover(&self, domain: &str, window: TimeWindow) -> Result<Vec<CandidateRecord>> {
        let mut query = format!("domain:{domain}");
        if let Some(hint) = &self.language_hint {
            query.push_str(" sourcelang:");
            query.push_str(hint);
        }
        let max_records = self.max_records.to_string();
        let start = format_bound(window.start);
        let end = format_bound(window.end);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("query", query.as_str()),
                ("mode", "artlist"),
                ("format", "json"),
                ("maxrecords", max_records.as_str()),
                ("startdatetime", start.as_str()),
                ("enddatetime", end.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("querying feed for {domain}"))?
            .error_for_status()
            .with_context(|| format!("feed status for {domain}"))?;
        let raw = response.text().await.context("reading feed response")?;
        let candidates = parse_artlist(&raw)?;
        debug!(domain, count = candidates.len(), "feed query complete");
        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "gdelt"
    }
}
