// src/ingest/mod.rs
//! Batch ingestion: query the discovery feed per source domain, filter
//! candidates, download pages, and run the extraction chain. Produces
//! drafts for validation plus per-domain statistics.

pub mod providers;
pub mod types;

use crate::config::PipelineConfig;
use crate::domains;
use crate::error::PipelineError;
use crate::extract::{ChainOutcome, ExtractInput, ExtractionChain};
use crate::failures::SourceFailureTracker;
use crate::ingest::types::{ArticleDraft, CandidateRecord, ContentRef, DiscoveryFeed, TimeWindow};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct DomainCounters {
    pub candidates: u32,
    pub extracted: u32,
    pub failed: u32,
}

/// Per-source-domain counts for one batch.
#[derive(Debug, Default, Clone)]
pub struct DomainStats {
    counters: HashMap<String, DomainCounters>,
}

impl DomainStats {
    fn entry(&mut self, domain: &str) -> &mut DomainCounters {
        self.counters.entry(domain.to_string()).or_default()
    }

    fn candidate(&mut self, domain: &str) {
        self.entry(domain).candidates += 1;
    }

    fn extracted(&mut self, domain: &str) {
        self.entry(domain).extracted += 1;
    }

    fn failed(&mut self, domain: &str) {
        self.entry(domain).failed += 1;
    }

    pub fn get(&self, domain: &str) -> DomainCounters {
        self.counters.get(domain).copied().unwrap_or_default()
    }

    pub fn failed_domains(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .counters
            .iter()
            .filter(|(_, c)| c.failed > 0)
            .map(|(d, _)| d.as_str())
            .collect();
        out.sort_unstable();
        out
    }

    pub fn totals(&self) -> DomainCounters {
        let mut total = DomainCounters::default();
        for c in self.counters.values() {
            total.candidates += c.candidates;
            total.extracted += c.extracted;
            total.failed += c.failed;
        }
        total
    }
}

pub struct FetchOutcome {
    pub articles: Vec<ArticleDraft>,
    pub stats: DomainStats,
}

/// Feed language corrected by what we know: `.dk` hosts are Danish, known
/// feed spellings map to codes, anything else is inferred from the text.
fn resolve_language(domain: &str, feed_language: Option<&str>, text: &str) -> String {
    if domains::normalize_domain(domain).ends_with(".dk") {
        return "da".to_string();
    }
    match feed_language.map(|l| l.to_ascii_lowercase()) {
        Some(l) if matches!(l.as_str(), "en" | "eng" | "english") => "en".to_string(),
        Some(l) if matches!(l.as_str(), "da" | "dan" | "danish") => "da".to_string(),
        _ => domains::detect_language(domain, text).to_string(),
    }
}

async fn load_content(http: &reqwest::Client, candidate: &CandidateRecord) -> Result<String> {
    match &candidate.content {
        ContentRef::Inline(html) => Ok(html.clone()),
        ContentRef::Remote => {
            let response = http
                .get(&candidate.url)
                .send()
                .await
                .context("requesting page")?
                .error_for_status()
                .context("page status")?;
            response.text().await.context("reading page body")
        }
    }
}

/// One ingestion pass over all configured source domains. A feed query
/// error aborts the whole batch; per-candidate failures only drop the
/// candidate and feed the failure tracker.
pub async fn fetch_batch(
    feed: &dyn DiscoveryFeed,
    chain: &ExtractionChain,
    tracker: &mut SourceFailureTracker,
    cfg: &PipelineConfig,
) -> Result<FetchOutcome, PipelineError> {
    let window = TimeWindow::ending_now(cfg.fetch_window);
    let http = reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(cfg.request_timeout)
        .build()
        .map_err(|e| PipelineError::Fetch(anyhow::Error::new(e).context("building page client")))?;

    let mut articles: Vec<ArticleDraft> = Vec::new();
    let mut stats = DomainStats::default();
    let mut seen_urls: HashSet<String> = HashSet::new();

    for source in &cfg.source_domains {
        if tracker.is_blacklisted(source) {
            debug!(
                domain = %source,
                failures = tracker.failure_count(source),
                "skipping blacklisted source"
            );
            continue;
        }

        let candidates = feed
            .discover(source, window)
            .await
            .map_err(PipelineError::Fetch)?;
        if candidates.is_empty() {
            debug!(domain = %source, "no candidates in window");
            continue;
        }
        info!(domain = %source, count = candidates.len(), "feed returned candidates");

        let mut downloaded_any = false;
        for candidate in candidates {
            stats.candidate(source);

            if !domains::feed_language_accepted(&candidate.domain, candidate.language.as_deref()) {
                debug!(url = %candidate.url, language = ?candidate.language, "language filtered");
                continue;
            }
            let host =
                domains::domain_of_url(&candidate.url).unwrap_or_else(|| candidate.domain.clone());
            if domains::is_problematic(&host) {
                debug!(url = %candidate.url, host = %host, "problematic host");
                continue;
            }
            if !seen_urls.insert(candidate.url.clone()) {
                debug!(url = %candidate.url, "duplicate url in batch");
                continue;
            }
            if tracker.is_blacklisted(&host) {
                debug!(url = %candidate.url, host = %host, "blacklisted host");
                continue;
            }

            // Pace consecutive downloads against the same source.
            if downloaded_any && candidate.content == ContentRef::Remote {
                tokio::time::sleep(cfg.domain_pacing).await;
            }
            let html = match load_content(&http, &candidate).await {
                Ok(html) => {
                    if candidate.content == ContentRef::Remote {
                        downloaded_any = true;
                    }
                    html
                }
                Err(e) => {
                    warn!(url = %candidate.url, error = ?e, "page download failed");
                    tracker.record_failure(&host, &format!("download failed: {e}"));
                    stats.failed(source);
                    continue;
                }
            };

            let input = ExtractInput {
                url: candidate.url.clone(),
                domain: host.clone(),
                html,
            };
            match chain.run(input, tracker).await {
                ChainOutcome::Extracted { text, method } => {
                    stats.extracted(source);
                    let language = resolve_language(&host, candidate.language.as_deref(), &text);
                    let source_country = candidate
                        .source_country
                        .clone()
                        .unwrap_or_else(|| domains::infer_country(&host).to_string());
                    articles.push(ArticleDraft {
                        url: candidate.url,
                        title: candidate.title,
                        text,
                        published_at: candidate.seen_at,
                        domain: host.clone(),
                        language,
                        source_country,
                        domain_category: domains::domain_category(&host).to_string(),
                        extraction_method: method.to_string(),
                        feed: feed.name().to_string(),
                    });
                }
                ChainOutcome::Skipped => {
                    debug!(url = %candidate.url, host = %host, "extraction skipped");
                }
                ChainOutcome::Failed { attempts } => {
                    stats.failed(source);
                    debug!(url = %candidate.url, attempts = attempts.len(), "extraction failed");
                }
            }
        }
    }

    let totals = stats.totals();
    info!(
        articles = articles.len(),
        candidates = totals.candidates,
        failed = totals.failed,
        "fetch batch complete"
    );
    Ok(FetchOutcome { articles, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticFeed {
        by_domain: HashMap<String, Vec<CandidateRecord>>,
        fail_for: Option<String>,
        queried: Mutex<Vec<String>>,
    }

    impl StaticFeed {
        fn new(by_domain: HashMap<String, Vec<CandidateRecord>>) -> Self {
            Self {
                by_domain,
                fail_for: None,
                queried: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl DiscoveryFeed for StaticFeed {
        async fn discover(
            &self,
            domain: &str,
            _window: TimeWindow,
        ) -> Result<Vec<CandidateRecord>> {
            self.queried.lock().expect("queried lock").push(domain.to_string());
            if self.fail_for.as_deref() == Some(domain) {
                anyhow::bail!("feed unavailable");
            }
            Ok(self.by_domain.get(domain).cloned().unwrap_or_default())
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    fn article_html(body: &str) -> String {
        format!("<html><body><article><p>{body}</p></article></body></html>")
    }

    fn candidate(url: &str, domain: &str, language: Option<&str>, html: &str) -> CandidateRecord {
        CandidateRecord {
            url: url.to_string(),
            title: "Headline under test".to_string(),
            seen_at: Some(chrono::Utc::now()),
            domain: domain.to_string(),
            language: language.map(str::to_string),
            source_country: None,
            content: ContentRef::Inline(html.to_string()),
        }
    }

    fn test_setup(dir: &tempfile::TempDir) -> (PipelineConfig, ExtractionChain, SourceFailureTracker) {
        let cfg = PipelineConfig::with_defaults(dir.path());
        let chain = ExtractionChain::new(40, Duration::from_secs(2));
        let tracker = SourceFailureTracker::load(&cfg.failure_state_path, cfg.failure_threshold);
        (cfg, chain, tracker)
    }

    const BODY: &str =
        "The lab published its evaluation results alongside the release notes, a first for the group.";

    #[tokio::test]
    async fn filters_candidates_and_builds_drafts() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cfg, chain, mut tracker) = test_setup(&dir);
        cfg.source_domains = vec!["bbc.com".to_string()];

        let html = article_html(BODY);
        let feed = StaticFeed::new(HashMap::from([(
            "bbc.com".to_string(),
            vec![
                candidate("https://www.bbc.com/news/one", "bbc.com", Some("English"), &html),
                candidate("https://www.bbc.com/news/one", "bbc.com", Some("English"), &html),
                candidate("https://www.bbc.com/news/two", "bbc.com", Some("German"), &html),
                candidate("https://youtube.com/watch?v=x", "youtube.com", Some("English"), &html),
            ],
        )]));

        let out = fetch_batch(&feed, &chain, &mut tracker, &cfg).await.unwrap();
        assert_eq!(out.articles.len(), 1);
        let draft = &out.articles[0];
        assert_eq!(draft.url, "https://www.bbc.com/news/one");
        assert_eq!(draft.domain, "bbc.com");
        assert_eq!(draft.language, "en");
        assert_eq!(draft.domain_category, "journalism, news and media");
        assert_eq!(draft.feed, "static");
        assert!(!draft.extraction_method.is_empty());

        let counters = out.stats.get("bbc.com");
        assert_eq!(counters.candidates, 4);
        assert_eq!(counters.extracted, 1);
        assert_eq!(counters.failed, 0);
    }

    #[tokio::test]
    async fn feed_error_aborts_the_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cfg, chain, mut tracker) = test_setup(&dir);
        cfg.source_domains = vec!["ok.com".to_string(), "bad.com".to_string()];

        let html = article_html(BODY);
        let mut feed = StaticFeed::new(HashMap::from([(
            "ok.com".to_string(),
            vec![candidate("https://ok.com/a", "ok.com", Some("en"), &html)],
        )]));
        feed.fail_for = Some("bad.com".to_string());

        let err = fetch_batch(&feed, &chain, &mut tracker, &cfg).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(_)));
    }

    #[tokio::test]
    async fn blacklisted_source_is_never_queried() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cfg, chain, mut tracker) = test_setup(&dir);
        cfg.source_domains = vec!["dead.com".to_string(), "live.com".to_string()];
        for _ in 0..cfg.failure_threshold {
            tracker.record_failure("dead.com", "no text");
        }

        let feed = StaticFeed::new(HashMap::new());
        let out = fetch_batch(&feed, &chain, &mut tracker, &cfg).await.unwrap();
        assert!(out.articles.is_empty());
        assert_eq!(*feed.queried.lock().unwrap(), vec!["live.com".to_string()]);
    }

    #[tokio::test]
    async fn danish_host_forces_language_and_country() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cfg, chain, mut tracker) = test_setup(&dir);
        cfg.source_domains = vec!["dr.dk".to_string()];

        let html = article_html(BODY);
        let feed = StaticFeed::new(HashMap::from([(
            "dr.dk".to_string(),
            vec![candidate("https://www.dr.dk/nyheder/a", "dr.dk", None, &html)],
        )]));

        let out = fetch_batch(&feed, &chain, &mut tracker, &cfg).await.unwrap();
        assert_eq!(out.articles.len(), 1);
        assert_eq!(out.articles[0].language, "da");
        assert_eq!(out.articles[0].source_country, "DK");
    }

    #[tokio::test]
    async fn failed_extraction_counts_against_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cfg, chain, mut tracker) = test_setup(&dir);
        cfg.source_domains = vec!["thin.com".to_string()];

        let feed = StaticFeed::new(HashMap::from([(
            "thin.com".to_string(),
            vec![candidate(
                "https://thin.com/a",
                "thin.com",
                Some("en"),
                "<html><body><p>too thin</p></body></html>",
            )],
        )]));

        let out = fetch_batch(&feed, &chain, &mut tracker, &cfg).await.unwrap();
        assert!(out.articles.is_empty());
        let counters = out.stats.get("thin.com");
        assert_eq!(counters.failed, 1);
        assert_eq!(out.stats.failed_domains(), vec!["thin.com"]);
        assert_eq!(tracker.failure_count("thin.com"), 1);
    }

    #[test]
    fn language_resolution_order() {
        assert_eq!(resolve_language("politiken.dk", Some("English"), ""), "da");
        assert_eq!(resolve_language("bbc.com", Some("English"), ""), "en");
        assert_eq!(resolve_language("bbc.com", Some("eng"), ""), "en");
        assert_eq!(resolve_language("example.com", Some("Danish"), ""), "da");
        assert_eq!(
            resolve_language("example.com", None, "mødet er i København og Danmark"),
            "da"
        );
        assert_eq!(resolve_language("example.com", None, "plain text"), "en");
    }
}
