// src/pipeline.rs
//! Batch orchestrator: fetch, validate, classify, persist, one run record.
//!
//! Per-article failures never interrupt a batch; they become rejection rows
//! with reason "processing error". Only a discovery-feed failure aborts the
//! batch, and even then the orchestrator returns a failed run record rather
//! than an error, so the host process survives and the scheduler can retry.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::classify::{ClassificationResult, Classifier};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, RejectionReason};
use crate::extract::ExtractionChain;
use crate::failures::SourceFailureTracker;
use crate::ingest::providers::gdelt::GdeltFeed;
use crate::ingest::types::{ArticleDraft, DiscoveryFeed};
use crate::ingest::fetch_batch;
use crate::store::{
    write_article_document, write_rejected_document, PipelineRunRecord, ProcessedRecord,
    RejectedRecord, RunStatus, Store,
};
use crate::validate::{validate, Article};

pub struct Pipeline {
    cfg: PipelineConfig,
    feed: Box<dyn DiscoveryFeed>,
    chain: ExtractionChain,
    classifier: Classifier,
    store: Store,
    tracker: SourceFailureTracker,
}

impl Pipeline {
    /// Production wiring: GDELT feed, full strategy chain, configured
    /// classifier, SQLite store.
    pub async fn new(cfg: PipelineConfig) -> Result<Self, PipelineError> {
        cfg.ensure_dirs();
        let store = Store::open(&cfg.db_path)
            .await
            .map_err(PipelineError::Store)?;
        let feed = GdeltFeed::from_config(&cfg).map_err(PipelineError::Fetch)?;
        let tracker = SourceFailureTracker::load(&cfg.failure_state_path, cfg.failure_threshold);
        let chain = ExtractionChain::new(cfg.extraction_min_chars, cfg.strategy_timeout);
        let classifier = Classifier::from_config(&cfg);
        Ok(Self {
            cfg,
            feed: Box::new(feed),
            chain,
            classifier,
            store,
            tracker,
        })
    }

    pub fn with_parts(
        cfg: PipelineConfig,
        feed: Box<dyn DiscoveryFeed>,
        chain: ExtractionChain,
        classifier: Classifier,
        store: Store,
        tracker: SourceFailureTracker,
    ) -> Self {
        Self {
            cfg,
            feed,
            chain,
            classifier,
            store,
            tracker,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// One full pass. `Err` only for store-level bookkeeping failures;
    /// everything else is internalized into the returned run record.
    pub async fn run_batch(&mut self) -> Result<PipelineRunRecord, PipelineError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = self
            .store
            .start_run(started_at)
            .await
            .map_err(PipelineError::Store)?;
        let mut index = self.store.dedup_index().await.map_err(PipelineError::Store)?;

        info!(
            run_id,
            sources = self.cfg.source_domains.len(),
            provider = self.classifier.provider_name(),
            "pipeline batch started"
        );

        let outcome =
            match fetch_batch(self.feed.as_ref(), &self.chain, &mut self.tracker, &self.cfg).await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    let record = PipelineRunRecord {
                        id: run_id,
                        started_at,
                        completed_at: Some(Utc::now()),
                        fetched: 0,
                        validated: 0,
                        stored: 0,
                        topic_positive: 0,
                        duration: clock.elapsed(),
                        status: RunStatus::Failed,
                        error_message: Some(e.to_string()),
                        rejections: HashMap::new(),
                    };
                    self.store
                        .complete_run(&record)
                        .await
                        .map_err(PipelineError::Store)?;
                    self.flush_tracker();
                    warn!(run_id, error = %e, "batch failed at discovery");
                    return Ok(record);
                }
            };

        let fetched = outcome.articles.len() as u32;
        let mut validated = 0u32;
        let mut stored = 0u32;
        let mut topic_positive = 0u32;
        let mut rejections: HashMap<&'static str, u32> = HashMap::new();

        for draft in outcome.articles {
            match validate(draft.clone(), &index, self.cfg.min_article_chars) {
                Ok(article) => {
                    index.remember(&article);
                    validated += 1;
                    let classification =
                        self.classifier.classify(&article.title, &article.text).await;
                    let relevant = classification.is_relevant;
                    match self.persist_accepted(&article, &classification, run_id).await {
                        Ok(true) => {
                            stored += 1;
                            if relevant {
                                topic_positive += 1;
                            }
                        }
                        Ok(false) => {
                            debug!(url = %article.url, "row already present, skipped");
                        }
                        Err(e) => {
                            warn!(url = %article.url, error = ?e, "article persistence failed");
                            self.reject(
                                &draft,
                                &RejectionReason::ProcessingError,
                                run_id,
                                &mut rejections,
                            )
                            .await;
                        }
                    }
                }
                Err(reason) => {
                    debug!(url = %draft.url, reason = %reason, "article rejected");
                    self.reject(&draft, &reason, run_id, &mut rejections).await;
                }
            }
        }

        let processing_errors = rejections
            .get(RejectionReason::ProcessingError.code())
            .copied()
            .unwrap_or(0);
        let status = if processing_errors > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        let record = PipelineRunRecord {
            id: run_id,
            started_at,
            completed_at: Some(Utc::now()),
            fetched,
            validated,
            stored,
            topic_positive,
            duration: clock.elapsed(),
            status,
            error_message: None,
            rejections,
        };
        self.store
            .complete_run(&record)
            .await
            .map_err(PipelineError::Store)?;
        self.flush_tracker();

        info!(
            run_id,
            fetched,
            validated,
            stored,
            topic_positive,
            status = %record.status,
            duration_ms = record.duration.as_millis() as u64,
            "pipeline batch finished"
        );
        if !record.rejections.is_empty() {
            debug!(run_id, rejections = ?record.rejections, "rejection breakdown");
        }
        Ok(record)
    }

    /// Retention pass between batches; errors are logged, never fatal.
    pub async fn cleanup(&self) {
        match self.store.cleanup_old_records(self.cfg.retention_days).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, days = self.cfg.retention_days, "retention cleanup"),
            Err(e) => warn!(error = ?e, "retention cleanup failed"),
        }
    }

    async fn persist_accepted(
        &self,
        article: &Article,
        classification: &ClassificationResult,
        run_id: i64,
    ) -> anyhow::Result<bool> {
        let path =
            write_article_document(&self.cfg.articles_dir, article, classification, run_id)?;
        let now = Utc::now();
        let record = ProcessedRecord {
            url: article.url.clone(),
            title: article.title.clone(),
            domain: article.domain.clone(),
            domain_category: article.domain_category.clone(),
            language: article.language.clone(),
            source_country: article.source_country.clone(),
            processed_at: now,
            source_feed_id: article.feed.clone(),
            extraction_method: article.extraction_method.clone(),
            is_topic_relevant: classification.is_relevant,
            topic: classification.topic.clone(),
            fingerprint: article.fingerprint.clone(),
            storage_file: Some(path.display().to_string()),
            created_at: now,
        };
        self.store.insert_processed(&record).await
    }

    async fn reject(
        &self,
        draft: &ArticleDraft,
        reason: &RejectionReason,
        run_id: i64,
        rejections: &mut HashMap<&'static str, u32>,
    ) {
        *rejections.entry(reason.code()).or_insert(0) += 1;
        let rejected_dir = self.cfg.articles_dir.join("rejected");
        let storage_file = match write_rejected_document(&rejected_dir, draft, reason, run_id) {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                warn!(url = %draft.url, error = ?e, "failed to write rejected document");
                None
            }
        };
        let now = Utc::now();
        let record = RejectedRecord {
            url: draft.url.clone(),
            title: Some(draft.title.clone()).filter(|t| !t.is_empty()),
            domain: Some(draft.domain.clone()),
            domain_category: Some(draft.domain_category.clone()),
            language: Some(draft.language.clone()),
            source_country: Some(draft.source_country.clone()),
            processed_at: now,
            source_feed_id: Some(draft.feed.clone()),
            extraction_method: Some(draft.extraction_method.clone()),
            rejection_reason: reason.to_string(),
            storage_file,
            created_at: now,
        };
        if let Err(e) = self.store.insert_rejected(&record).await {
            warn!(url = %draft.url, error = ?e, "failed to record rejection");
        }
    }

    fn flush_tracker(&self) {
        if let Err(e) = self.tracker.flush() {
            warn!(error = ?e, "failed to persist source failure state");
        }
    }
}
