// src/validate.rs
//! Validation and cross-run deduplication. Normalization runs before the
//! length gate and before fingerprinting, so length is always measured on
//! the same text the fingerprint covers.

use crate::error::RejectionReason;
use crate::ingest::types::ArticleDraft;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// An accepted article: normalized, fingerprinted, complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub text: String,
    pub fingerprint: String,
    pub published_at: DateTime<Utc>,
    pub domain: String,
    pub language: String,
    pub source_country: String,
    pub domain_category: String,
    pub extraction_method: String,
    pub feed: String,
}

/// URLs and fingerprints already accepted in earlier runs, loaded from the
/// store once per batch and extended as the batch accepts articles.
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    urls: HashSet<String>,
    fingerprints: HashSet<String>,
}

impl DedupIndex {
    pub fn new(urls: HashSet<String>, fingerprints: HashSet<String>) -> Self {
        Self { urls, fingerprints }
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Register an accepted article so later drafts in the same batch
    /// dedup against it too.
    pub fn remember(&mut self, article: &Article) {
        self.urls.insert(article.url.clone());
        self.fingerprints.insert(article.fingerprint.clone());
    }
}

/// Canonical text form: entity decode, tag strip, NFC composition, quote
/// normalization, whitespace collapse.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("valid regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out.nfc().collect();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("valid regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// SHA-256 hex over the normalized body.
pub fn fingerprint(normalized: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Accept or reject one draft. Check order: missing field, malformed URL,
/// minimum length, duplicate URL, duplicate content.
pub fn validate(
    draft: ArticleDraft,
    index: &DedupIndex,
    min_chars: usize,
) -> Result<Article, RejectionReason> {
    let title = normalize_text(&draft.title);
    let text = normalize_text(&draft.text);

    if draft.url.trim().is_empty() {
        return Err(RejectionReason::MissingField("url"));
    }
    if title.is_empty() {
        return Err(RejectionReason::MissingField("title"));
    }
    if text.is_empty() {
        return Err(RejectionReason::MissingField("text"));
    }
    let published_at = match draft.published_at {
        Some(t) => t,
        None => return Err(RejectionReason::MissingField("published_at")),
    };

    if !(draft.url.starts_with("http://") || draft.url.starts_with("https://")) {
        return Err(RejectionReason::MalformedUrl);
    }

    if text.chars().count() < min_chars {
        return Err(RejectionReason::TooShort);
    }

    if index.contains_url(&draft.url) {
        return Err(RejectionReason::DuplicateUrl);
    }
    let fingerprint = fingerprint(&text);
    if index.contains_fingerprint(&fingerprint) {
        return Err(RejectionReason::DuplicateContent);
    }

    Ok(Article {
        url: draft.url,
        title,
        text,
        fingerprint,
        published_at,
        domain: draft.domain,
        language: draft.language,
        source_country: draft.source_country,
        domain_category: draft.domain_category,
        extraction_method: draft.extraction_method,
        feed: draft.feed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(url: &str, text: &str) -> ArticleDraft {
        ArticleDraft {
            url: url.to_string(),
            title: "A headline".to_string(),
            text: text.to_string(),
            published_at: Some(Utc::now()),
            domain: "example.com".to_string(),
            language: "en".to_string(),
            source_country: "US".to_string(),
            domain_category: "Other".to_string(),
            extraction_method: "density".to_string(),
            feed: "gdelt".to_string(),
        }
    }

    fn long_text(chars: usize) -> String {
        "ai policy news ".chars().cycle().take(chars).collect()
    }

    #[test]
    fn normalization_decodes_strips_and_collapses() {
        let raw = "  Caf\u{0065}\u{0301}   opening &amp; <b>more</b>\n\nnews “today” ";
        let got = normalize_text(raw);
        assert_eq!(got, "Caf\u{e9} opening & more news \"today\"");
    }

    #[test]
    fn fingerprint_is_stable_across_formatting() {
        let a = fingerprint(&normalize_text("Same   story\n here"));
        let b = fingerprint(&normalize_text("Same story here"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint("different"));
    }

    #[test]
    fn rejects_in_documented_order() {
        let index = DedupIndex::default();

        let mut d = draft("https://example.com/a", &long_text(800));
        d.title = "  ".to_string();
        assert_eq!(
            validate(d, &index, 700).unwrap_err(),
            RejectionReason::MissingField("title")
        );

        let mut d = draft("https://example.com/a", &long_text(800));
        d.published_at = None;
        assert_eq!(
            validate(d, &index, 700).unwrap_err(),
            RejectionReason::MissingField("published_at")
        );

        let d = draft("ftp://example.com/a", &long_text(800));
        assert_eq!(validate(d, &index, 700).unwrap_err(), RejectionReason::MalformedUrl);

        let d = draft("https://example.com/a", &long_text(650));
        assert_eq!(validate(d, &index, 700).unwrap_err(), RejectionReason::TooShort);
    }

    #[test]
    fn length_is_measured_after_normalization() {
        // Markup inflates the raw length; the measured body stays short.
        let padded = format!("<div>{}</div>{}", long_text(650), "&nbsp;".repeat(40));
        let d = draft("https://example.com/a", &padded);
        assert_eq!(
            validate(d, &DedupIndex::default(), 700).unwrap_err(),
            RejectionReason::TooShort
        );
    }

    #[test]
    fn duplicate_url_then_duplicate_content() {
        let mut index = DedupIndex::default();
        let accepted = validate(draft("https://example.com/a", &long_text(800)), &index, 700)
            .expect("first accept");
        index.remember(&accepted);

        assert_eq!(
            validate(draft("https://example.com/a", &long_text(800)), &index, 700).unwrap_err(),
            RejectionReason::DuplicateUrl
        );
        // Same body under a different URL: caught by fingerprint.
        assert_eq!(
            validate(draft("https://mirror.net/b", &long_text(800)), &index, 700).unwrap_err(),
            RejectionReason::DuplicateContent
        );
    }

    #[test]
    fn acceptance_normalizes_fields() {
        let mut d = draft("https://example.com/long", &format!("<p>{}</p>", long_text(900)));
        d.title = "Model   launch &amp; review".to_string();
        let article = validate(d, &DedupIndex::default(), 700).expect("accepted");
        assert_eq!(article.title, "Model launch & review");
        assert!(!article.text.contains('<'));
        assert_eq!(article.fingerprint.len(), 64);
    }
}
