// tests/ingest_blacklist.rs
// Failure tracking through whole ingestion batches: a source that keeps
// serving unusable pages gets blacklisted and stops being queried, and
// the blacklist survives a restart via the state file.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use ai_news_pipeline::config::PipelineConfig;
use ai_news_pipeline::extract::ExtractionChain;
use ai_news_pipeline::failures::SourceFailureTracker;
use ai_news_pipeline::ingest::fetch_batch;
use ai_news_pipeline::ingest::types::{CandidateRecord, ContentRef, DiscoveryFeed, TimeWindow};

/// Serves one pre-scripted candidate list per `discover` call and records
/// which domains were actually queried.
struct SequenceFeed {
    batches: Mutex<VecDeque<Vec<CandidateRecord>>>,
    queried: Mutex<Vec<String>>,
}

impl SequenceFeed {
    fn new(batches: Vec<Vec<CandidateRecord>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            queried: Mutex::new(Vec::new()),
        }
    }

    fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscoveryFeed for SequenceFeed {
    async fn discover(&self, domain: &str, _window: TimeWindow) -> Result<Vec<CandidateRecord>> {
        self.queried.lock().unwrap().push(domain.to_string());
        Ok(self
            .batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "sequence"
    }
}

fn candidate(url: &str, html: &str) -> CandidateRecord {
    CandidateRecord {
        url: url.to_string(),
        title: "Headline".to_string(),
        seen_at: Some(Utc::now()),
        domain: "flaky.com".to_string(),
        language: Some("en".to_string()),
        source_country: None,
        content: ContentRef::Inline(html.to_string()),
    }
}

fn empty_page() -> String {
    "<html><body><nav>menu</nav></body></html>".to_string()
}

fn good_page() -> String {
    "<html><body><article><p>A full report with enough body text to clear the \
     extraction minimum comfortably in one strategy pass.</p></article></body></html>"
        .to_string()
}

fn config_at(dir: &std::path::Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::with_defaults(dir);
    cfg.source_domains = vec!["flaky.com".to_string()];
    cfg.failure_threshold = 3;
    cfg.extraction_min_chars = 40;
    cfg.domain_pacing = Duration::ZERO;
    cfg
}

/// Three batches of unusable pages cross the threshold; the fourth batch
/// does not query the source at all, and a tracker reloaded from the state
/// file still refuses it.
#[tokio::test]
async fn repeated_bad_pages_blacklist_the_source_across_batches() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_at(dir.path());
    let chain = ExtractionChain::new(cfg.extraction_min_chars, Duration::from_secs(2));
    let mut tracker = SourceFailureTracker::load(&cfg.failure_state_path, cfg.failure_threshold);

    let feed = SequenceFeed::new(vec![
        vec![candidate("https://flaky.com/a", &empty_page())],
        vec![candidate("https://flaky.com/b", &empty_page())],
        vec![candidate("https://flaky.com/c", &empty_page())],
    ]);

    for round in 1..=3u32 {
        let out = fetch_batch(&feed, &chain, &mut tracker, &cfg).await.unwrap();
        assert!(out.articles.is_empty());
        assert_eq!(tracker.failure_count("flaky.com"), round);
    }
    assert!(tracker.is_blacklisted("flaky.com"));

    let out = fetch_batch(&feed, &chain, &mut tracker, &cfg).await.unwrap();
    assert!(out.articles.is_empty());
    assert_eq!(feed.queried().len(), 3, "fourth batch must skip the source");

    tracker.flush().unwrap();
    let reloaded = SourceFailureTracker::load(&cfg.failure_state_path, cfg.failure_threshold);
    assert!(reloaded.is_blacklisted("flaky.com"));
    assert_eq!(reloaded.blacklisted_domains(), vec!["flaky.com"]);
}

/// One good page between failures resets the count, so the source never
/// reaches the threshold.
#[tokio::test]
async fn a_good_page_between_failures_keeps_the_source_alive() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_at(dir.path());
    let chain = ExtractionChain::new(cfg.extraction_min_chars, Duration::from_secs(2));
    let mut tracker = SourceFailureTracker::load(&cfg.failure_state_path, cfg.failure_threshold);

    let feed = SequenceFeed::new(vec![
        vec![candidate("https://flaky.com/a", &empty_page())],
        vec![candidate("https://flaky.com/b", &empty_page())],
        vec![candidate("https://flaky.com/c", &good_page())],
        vec![candidate("https://flaky.com/d", &empty_page())],
        vec![candidate("https://flaky.com/e", &empty_page())],
    ]);

    let mut extracted_total = 0usize;
    for _ in 0..5 {
        let out = fetch_batch(&feed, &chain, &mut tracker, &cfg).await.unwrap();
        extracted_total += out.articles.len();
    }
    assert_eq!(extracted_total, 1);
    assert!(!tracker.is_blacklisted("flaky.com"));
    assert_eq!(tracker.failure_count("flaky.com"), 2);
}
