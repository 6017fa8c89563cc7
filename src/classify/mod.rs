// src/classify/mod.rs
//! Topic classification: remote model first, keyword fallback always.
//!
//! Every article gets exactly one `ClassificationResult`. The result is
//! tagged with the stage that produced it: `structured` when the model
//! reply parsed as JSON, `extracted` when the fields were pattern-matched
//! out of a free-text reply, `fallback` when the local keyword engine
//! decided. Classification never errors; the fallback is total.

pub mod remote;
pub mod taxonomy;

pub use remote::{build_provider, MockProvider, ModelProvider};
pub use taxonomy::Taxonomy;

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use taxonomy::TopicScore;

/// Which stage of the pipeline produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Structured,
    Extracted,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_relevant: bool,
    /// Canonical taxonomy topic; always `Some` when relevant, `None` otherwise.
    pub topic: Option<String>,
    /// Clamped to [0, 1].
    pub confidence: f32,
    pub explanation: String,
    pub keywords: Vec<String>,
    pub method: Judgment,
}

/// Tolerant shape for the model's JSON reply; missing fields default.
#[derive(Debug, Deserialize)]
struct ModelJudgment {
    #[serde(default)]
    is_relevant: bool,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

pub struct Classifier {
    provider: Option<Arc<dyn ModelProvider>>,
    taxonomy: Taxonomy,
    excerpt_chars: usize,
    pacing: Duration,
}

impl Classifier {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            provider: remote::build_provider(cfg),
            taxonomy: Taxonomy::load(&cfg.taxonomy_path),
            excerpt_chars: cfg.classify_excerpt_chars,
            pacing: cfg.classify_pacing,
        }
    }

    pub fn with_parts(
        provider: Option<Arc<dyn ModelProvider>>,
        taxonomy: Taxonomy,
        excerpt_chars: usize,
        pacing: Duration,
    ) -> Self {
        Self {
            provider,
            taxonomy,
            excerpt_chars,
            pacing,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.as_deref().map(|p| p.name()).unwrap_or("none")
    }

    /// Classifies one article from its title and body text.
    pub async fn classify(&self, title: &str, text: &str) -> ClassificationResult {
        let haystack = format!("{title} {text}").to_lowercase();
        if let Some(provider) = &self.provider {
            let prompt = self.prompt_for(title, text);
            let response = provider.request(&prompt).await;
            // Pacing applies to every remote attempt, success or not.
            tokio::time::sleep(self.pacing).await;
            match response {
                Some(raw) => {
                    if let Some(parsed) = parse_structured(&raw) {
                        return self.finalize(parsed);
                    }
                    if let Some(extracted) = extract_judgment(&raw, &haystack, &self.taxonomy) {
                        return self.finalize(extracted);
                    }
                    debug!(
                        provider = provider.name(),
                        "model reply unusable, using keyword fallback"
                    );
                }
                None => debug!(
                    provider = provider.name(),
                    "remote classification unavailable, using keyword fallback"
                ),
            }
        }
        self.finalize(keyword_classify(&haystack, &self.taxonomy))
    }

    fn prompt_for(&self, title: &str, text: &str) -> String {
        let excerpt: String = text.chars().take(self.excerpt_chars).collect();
        let topics = self.taxonomy.topic_names().collect::<Vec<_>>().join(", ");
        format!(
            "Classify this news article for AI relevance.\n\n\
             Title: {title}\n\
             Text: {excerpt}\n\n\
             Topics: {topics}\n\n\
             Respond with one JSON object, no other text:\n\
             {{\"is_relevant\": true or false, \
             \"topic\": \"one topic from the list, or null\", \
             \"confidence\": 0.0 to 1.0, \
             \"explanation\": \"one short sentence\", \
             \"keywords\": [\"up to five matched terms\"]}}"
        )
    }

    /// Enforces the result invariants no matter which stage produced it.
    fn finalize(&self, mut result: ClassificationResult) -> ClassificationResult {
        if !result.confidence.is_finite() {
            result.confidence = 0.0;
        }
        result.confidence = result.confidence.clamp(0.0, 1.0);
        if result.is_relevant {
            let topic = result
                .topic
                .as_deref()
                .and_then(|t| self.taxonomy.canonical(t))
                .unwrap_or_else(|| self.taxonomy.default_topic())
                .to_string();
            result.topic = Some(topic);
        } else {
            result.topic = None;
        }
        result.keywords.retain(|k| !k.trim().is_empty());
        result.keywords.truncate(5);
        result
    }
}

static RE_JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Stage one: the reply contains a parseable JSON object.
fn parse_structured(raw: &str) -> Option<ClassificationResult> {
    let found = RE_JSON_OBJECT.find(raw)?;
    let judgment: ModelJudgment = serde_json::from_str(found.as_str()).ok()?;
    Some(ClassificationResult {
        is_relevant: judgment.is_relevant,
        topic: judgment.topic.filter(|t| !t.trim().is_empty()),
        confidence: judgment.confidence,
        explanation: judgment.explanation.unwrap_or_default(),
        keywords: judgment.keywords,
        method: Judgment::Structured,
    })
}

const RELEVANCE_HINTS: &[&str] = &[
    "true",
    "yes",
    "ai-related",
    "artificial intelligence",
    "primarily about ai",
];

/// Stage two: pattern-match a verdict out of a free-text reply.
fn extract_judgment(raw: &str, haystack: &str, taxonomy: &Taxonomy) -> Option<ClassificationResult> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    let is_relevant = RELEVANCE_HINTS.iter().any(|hint| lower.contains(hint));
    let topic = is_relevant.then(|| {
        taxonomy
            .topic_mentioned_in(&lower)
            .unwrap_or_else(|| taxonomy.default_topic())
            .to_string()
    });
    let glimpse: String = trimmed.chars().take(100).collect();
    Some(ClassificationResult {
        is_relevant,
        topic,
        confidence: if is_relevant { 0.8 } else { 0.7 },
        explanation: format!("extracted from unstructured model reply: {glimpse}"),
        keywords: taxonomy.matched_keywords(haystack, 5),
        method: Judgment::Extracted,
    })
}

/// Stage three: deterministic keyword scoring, always produces a result.
fn keyword_classify(haystack: &str, taxonomy: &Taxonomy) -> ClassificationResult {
    let scores = taxonomy.score(haystack);
    let mut best: Option<&TopicScore> = None;
    for score in &scores {
        if best.map(|b| score.score > b.score).unwrap_or(true) {
            best = Some(score);
        }
    }
    let Some(best) = best else {
        return ClassificationResult {
            is_relevant: false,
            topic: None,
            confidence: 0.0,
            explanation: String::new(),
            keywords: Vec::new(),
            method: Judgment::Fallback,
        };
    };
    let is_relevant = best.score >= taxonomy.min_score();
    let explanation = if is_relevant {
        format!(
            "keyword fallback: {} occurrences for {}",
            best.score, best.topic
        )
    } else {
        format!(
            "keyword fallback: {} occurrences, below minimum",
            best.score
        )
    };
    ClassificationResult {
        is_relevant,
        topic: is_relevant.then(|| best.topic.to_string()),
        confidence: (0.4 + 0.1 * best.score as f32).min(1.0),
        explanation,
        keywords: best.matched.iter().take(5).map(|s| s.to_string()).collect(),
        method: Judgment::Fallback,
    }
}
