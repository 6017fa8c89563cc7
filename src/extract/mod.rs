// src/extract/mod.rs
//! Multi-strategy article-text extraction. Strategies are synchronous HTML
//! heuristics; the chain owns ordering, per-attempt timeouts, the minimum
//! length gate, and failure-tracker bookkeeping.

pub mod strategies;

use crate::error::StrategyError;
use crate::failures::SourceFailureTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::debug;

/// A page already downloaded and ready for extraction.
#[derive(Debug, Clone)]
pub struct ExtractInput {
    pub url: String,
    pub domain: String,
    pub html: String,
}

/// One extraction heuristic. `attempt` runs on a blocking thread; it must
/// not assume the returned text meets the minimum length (the chain gates).
pub trait ExtractStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn attempt(&self, input: &ExtractInput) -> Result<String, StrategyError>;
}

#[derive(Debug)]
pub enum ChainOutcome {
    /// Domain is blacklisted: the document was not touched.
    Skipped,
    Extracted {
        text: String,
        method: &'static str,
    },
    Failed {
        attempts: Vec<(&'static str, StrategyError)>,
    },
}

pub struct ExtractionChain {
    strategies: Vec<Arc<dyn ExtractStrategy>>,
    min_chars: usize,
    attempt_timeout: Duration,
}

impl ExtractionChain {
    /// Default strategy order: aggregator special-case, then general
    /// heuristics from fast to desperate.
    pub fn new(min_chars: usize, attempt_timeout: Duration) -> Self {
        Self::with_strategies(
            vec![
                Arc::new(strategies::AggregatorStrategy),
                Arc::new(strategies::DensityStrategy),
                Arc::new(strategies::ArticleMarkupStrategy),
                Arc::new(strategies::MetadataStrategy),
                Arc::new(strategies::ReadabilityStrategy),
                Arc::new(strategies::TagScrapeStrategy),
            ],
            min_chars,
            attempt_timeout,
        )
    }

    pub fn with_strategies(
        strategies: Vec<Arc<dyn ExtractStrategy>>,
        min_chars: usize,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            strategies,
            min_chars,
            attempt_timeout,
        }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try strategies in order until one yields enough text. Success resets
    /// the domain's failure counter; exhausting the chain records a failure.
    pub async fn run(
        &self,
        input: ExtractInput,
        tracker: &mut SourceFailureTracker,
    ) -> ChainOutcome {
        if tracker.is_blacklisted(&input.domain) {
            debug!(domain = %input.domain, "skipping blacklisted domain");
            return ChainOutcome::Skipped;
        }

        let input = Arc::new(input);
        let mut attempts: Vec<(&'static str, StrategyError)> = Vec::new();
        for strategy in &self.strategies {
            let result = self.attempt_one(strategy, &input).await;
            match result {
                Ok(text) => {
                    debug!(
                        domain = %input.domain,
                        method = strategy.name(),
                        chars = text.chars().count(),
                        "extracted article text"
                    );
                    tracker.record_success(&input.domain);
                    return ChainOutcome::Extracted {
                        text,
                        method: strategy.name(),
                    };
                }
                Err(e) => {
                    debug!(domain = %input.domain, method = strategy.name(), error = %e, "strategy failed");
                    attempts.push((strategy.name(), e));
                }
            }
        }

        tracker.record_failure(
            &input.domain,
            &format!("no text after {} strategies", attempts.len()),
        );
        ChainOutcome::Failed { attempts }
    }

    async fn attempt_one(
        &self,
        strategy: &Arc<dyn ExtractStrategy>,
        input: &Arc<ExtractInput>,
    ) -> Result<String, StrategyError> {
        let strategy = Arc::clone(strategy);
        let input = Arc::clone(input);
        // A timed-out parse keeps running on its blocking thread; we only
        // stop waiting for it.
        let joined = timeout(
            self.attempt_timeout,
            spawn_blocking(move || strategy.attempt(&input)),
        )
        .await;
        let text = match joined {
            Err(_) => return Err(StrategyError::Timeout),
            Ok(Err(join_err)) => return Err(StrategyError::Parse(join_err.to_string())),
            Ok(Ok(result)) => result?,
        };
        let text = text.trim().to_string();
        let got = text.chars().count();
        if got < self.min_chars {
            return Err(StrategyError::TooShort {
                got,
                min: self.min_chars,
            });
        }
        Ok(text)
    }
}
