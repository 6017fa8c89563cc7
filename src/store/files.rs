// src/store/files.rs
//! JSON payload documents for stored articles.
//!
//! The SQLite row keeps metadata only; the full text plus classification
//! lands in one JSON document per article, referenced from the row's
//! storage_file column. Rejected drafts get the same treatment under a
//! `rejected/` subdirectory, with the reason in place of a classification.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::classify::ClassificationResult;
use crate::error::RejectionReason;
use crate::ingest::types::ArticleDraft;
use crate::validate::Article;

#[derive(Serialize)]
struct ArticleDocument<'a> {
    #[serde(flatten)]
    article: &'a Article,
    classification: &'a ClassificationResult,
    run_id: i64,
    stored_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct RejectedDocument<'a> {
    #[serde(flatten)]
    draft: &'a ArticleDraft,
    rejection_reason: String,
    run_id: i64,
    stored_at: DateTime<Utc>,
}

/// Writes one article document under `dir` and returns its path. The write
/// goes through a temp file and rename so readers never see a partial
/// document.
pub fn write_article_document(
    dir: &Path,
    article: &Article,
    classification: &ClassificationResult,
    run_id: i64,
) -> Result<PathBuf> {
    let stored_at = Utc::now();
    let doc = ArticleDocument {
        article,
        classification,
        run_id,
        stored_at,
    };
    publish_document(dir, &article.fingerprint, stored_at, &doc)
}

/// Document for a rejected draft. Named by URL hash: rejected drafts carry
/// no body fingerprint.
pub fn write_rejected_document(
    dir: &Path,
    draft: &ArticleDraft,
    reason: &RejectionReason,
    run_id: i64,
) -> Result<PathBuf> {
    let stored_at = Utc::now();
    let doc = RejectedDocument {
        draft,
        rejection_reason: reason.to_string(),
        run_id,
        stored_at,
    };
    let name_hash = crate::validate::fingerprint(&draft.url);
    publish_document(dir, &name_hash, stored_at, &doc)
}

fn publish_document<T: Serialize>(
    dir: &Path,
    name_hash: &str,
    stored_at: DateTime<Utc>,
    doc: &T,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating article directory {}", dir.display()))?;
    let short = &name_hash[..name_hash.len().min(12)];
    let path = dir.join(format!("{}_{short}.json", stored_at.format("%Y%m%dT%H%M%S")));

    let json = serde_json::to_string_pretty(doc).context("serializing article document")?;
    let tmp = path.with_extension("json.tmp");
    let mut f =
        fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(json.as_bytes()).context("writing article document")?;
    fs::rename(&tmp, &path).context("publishing article document")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Judgment;

    #[test]
    fn document_lands_complete_with_no_temp_left() {
        let dir = tempfile::tempdir().unwrap();
        let article = Article {
            url: "https://example.com/story".to_string(),
            title: "Story".to_string(),
            text: "Body text.".to_string(),
            fingerprint: "abcdef0123456789abcdef0123456789".to_string(),
            published_at: Utc::now(),
            domain: "example.com".to_string(),
            language: "en".to_string(),
            source_country: "US".to_string(),
            domain_category: "Other".to_string(),
            extraction_method: "density".to_string(),
            feed: "gdelt".to_string(),
        };
        let classification = ClassificationResult {
            is_relevant: true,
            topic: Some("AI Technology and Infrastructure".to_string()),
            confidence: 0.8,
            explanation: "keyword fallback: 4 occurrences".to_string(),
            keywords: vec!["ai model".to_string()],
            method: Judgment::Fallback,
        };

        let path = write_article_document(dir.path(), &article, &classification, 7).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("_abcdef012345.json"));

        let raw = fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["url"], "https://example.com/story");
        assert_eq!(doc["classification"]["method"], "fallback");
        assert_eq!(doc["run_id"], 7);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rejected_document_carries_draft_and_reason() {
        let dir = tempfile::tempdir().unwrap();
        let draft = ArticleDraft {
            url: "https://example.com/dupe".to_string(),
            title: "Dupe".to_string(),
            text: "Body text.".to_string(),
            published_at: Some(Utc::now()),
            domain: "example.com".to_string(),
            language: "en".to_string(),
            source_country: "US".to_string(),
            domain_category: "Other".to_string(),
            extraction_method: "density".to_string(),
            feed: "gdelt".to_string(),
        };

        let path =
            write_rejected_document(dir.path(), &draft, &RejectionReason::DuplicateUrl, 3)
                .unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["url"], "https://example.com/dupe");
        assert_eq!(doc["rejection_reason"], "duplicate url");
        assert_eq!(doc["run_id"], 3);
    }
}
