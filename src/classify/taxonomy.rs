// src/classify/taxonomy.rs
//! Topic taxonomy loaded from TOML.
//!
//! Carries the topic names shown to the model provider and the per-topic
//! keyword lists used by the keyword fallback. A copy of the default
//! taxonomy is compiled in, so a missing or broken config file never
//! leaves the classifier without topics.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

const EMBEDDED: &str = include_str!("../../config/taxonomy.toml");

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    #[serde(default = "default_min_score")]
    min_score: u32,
    #[serde(default)]
    default_topic: Option<String>,
    #[serde(default)]
    topics: Vec<TopicSpec>,
}

fn default_min_score() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
struct TopicSpec {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// One topic's keyword hits in a scored text.
#[derive(Debug)]
pub struct TopicScore<'a> {
    pub topic: &'a str,
    pub score: u32,
    pub matched: Vec<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Taxonomy {
    topics: Vec<TopicSpec>,
    min_score: u32,
    default_topic: String,
}

impl Taxonomy {
    /// Reads the taxonomy from `path`, falling back to the embedded copy
    /// when the file is missing or does not parse.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match Self::from_toml(&raw) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = ?e, "invalid taxonomy file, using embedded default");
                    Self::embedded()
                }
            },
            Err(_) => Self::embedded(),
        }
    }

    /// The compiled-in default taxonomy.
    pub fn embedded() -> Self {
        Self::from_toml(EMBEDDED).expect("embedded taxonomy parses")
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: TaxonomyFile = toml::from_str(raw).context("parsing taxonomy TOML")?;
        let mut topics: Vec<TopicSpec> = file
            .topics
            .into_iter()
            .filter(|t| !t.name.trim().is_empty())
            .collect();
        for topic in &mut topics {
            topic.name = topic.name.trim().to_string();
            topic.keywords = topic
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
        }
        anyhow::ensure!(!topics.is_empty(), "taxonomy has no topics");
        let default_topic = match file.default_topic {
            Some(name) => {
                let name = name.trim().to_string();
                anyhow::ensure!(
                    topics.iter().any(|t| t.name == name),
                    "default_topic {name:?} is not in the topic list"
                );
                name
            }
            None => topics[topics.len() - 1].name.clone(),
        };
        Ok(Self {
            topics,
            min_score: file.min_score.max(1),
            default_topic,
        })
    }

    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|t| t.name.as_str())
    }

    pub fn default_topic(&self) -> &str {
        &self.default_topic
    }

    pub fn min_score(&self) -> u32 {
        self.min_score
    }

    /// Resolves a model-supplied topic name to the canonical spelling.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        let wanted = name.trim();
        self.topics
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(wanted))
            .map(|t| t.name.as_str())
    }

    /// First topic whose name appears verbatim in `lower` (a lowercased text).
    pub fn topic_mentioned_in(&self, lower: &str) -> Option<&str> {
        self.topics
            .iter()
            .find(|t| lower.contains(&t.name.to_lowercase()))
            .map(|t| t.name.as_str())
    }

    /// Counts keyword occurrences per topic over `lower` (a lowercased text).
    /// Repeated occurrences of the same keyword all count.
    pub fn score(&self, lower: &str) -> Vec<TopicScore<'_>> {
        self.topics
            .iter()
            .map(|topic| {
                let mut score = 0u32;
                let mut matched = Vec::new();
                for keyword in &topic.keywords {
                    let hits = lower.matches(keyword.as_str()).count() as u32;
                    if hits > 0 {
                        score += hits;
                        matched.push(keyword.as_str());
                    }
                }
                TopicScore {
                    topic: topic.name.as_str(),
                    score,
                    matched,
                }
            })
            .collect()
    }

    /// Distinct keywords from any topic present in `text`, up to `cap`.
    pub fn matched_keywords(&self, text: &str, cap: usize) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut found: Vec<String> = Vec::new();
        for topic in &self.topics {
            for keyword in &topic.keywords {
                if found.len() == cap {
                    return found;
                }
                if lower.contains(keyword.as_str()) && !found.iter().any(|f| f == keyword) {
                    found.push(keyword.clone());
                }
            }
        }
        found
    }
}
