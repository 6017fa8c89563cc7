// src/failures.rs
//! Per-source failure tracking. Repeated extraction failures blacklist a
//! domain so later batches stop fetching it; the state survives restarts
//! via a JSON file next to the database.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFailureRecord {
    pub domain: String,
    pub failures: u32,
    pub blacklisted: bool,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_reason: Option<String>,
}

impl SourceFailureRecord {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            failures: 0,
            blacklisted: false,
            last_failure_at: None,
            last_reason: None,
        }
    }
}

/// Tracks consecutive failures per domain. A success resets the counter;
/// crossing the threshold blacklists the domain permanently (the flag is
/// never cleared automatically, only by deleting the state file).
pub struct SourceFailureTracker {
    records: HashMap<String, SourceFailureRecord>,
    threshold: u32,
    path: PathBuf,
}

impl SourceFailureTracker {
    /// Load persisted state, or start empty when the file does not exist.
    /// A corrupt state file is discarded with a warning rather than
    /// aborting the pipeline.
    pub fn load(path: &Path, threshold: u32) -> Self {
        let records = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<SourceFailureRecord>>(&raw) {
                Ok(list) => list.into_iter().map(|r| (r.domain.clone(), r)).collect(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable failure state");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            records,
            threshold,
            path: path.to_path_buf(),
        }
    }

    pub fn record_failure(&mut self, domain: &str, reason: &str) {
        let domain = crate::domains::normalize_domain(domain);
        let rec = self
            .records
            .entry(domain.clone())
            .or_insert_with(|| SourceFailureRecord::new(&domain));
        rec.failures += 1;
        rec.last_failure_at = Some(Utc::now());
        rec.last_reason = Some(reason.to_string());
        if !rec.blacklisted && rec.failures >= self.threshold {
            rec.blacklisted = true;
            info!(domain = %domain, failures = rec.failures, "domain blacklisted");
        }
    }

    /// Reset the failure counter. The blacklist flag stays: a domain that
    /// already crossed the threshold is not resurrected by one good article.
    pub fn record_success(&mut self, domain: &str) {
        let domain = crate::domains::normalize_domain(domain);
        if let Some(rec) = self.records.get_mut(&domain) {
            rec.failures = 0;
        }
    }

    pub fn is_blacklisted(&self, domain: &str) -> bool {
        let domain = crate::domains::normalize_domain(domain);
        self.records
            .get(&domain)
            .map(|r| r.blacklisted)
            .unwrap_or(false)
    }

    pub fn failure_count(&self, domain: &str) -> u32 {
        let domain = crate::domains::normalize_domain(domain);
        self.records.get(&domain).map(|r| r.failures).unwrap_or(0)
    }

    pub fn blacklisted_domains(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .records
            .values()
            .filter(|r| r.blacklisted)
            .map(|r| r.domain.as_str())
            .collect();
        out.sort_unstable();
        out
    }

    /// Persist atomically: write a sibling tmp file, then rename over the
    /// target so readers never observe a half-written state.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut list: Vec<&SourceFailureRecord> = self.records.values().collect();
        list.sort_unstable_by(|a, b| a.domain.cmp(&b.domain));
        let raw = serde_json::to_string_pretty(&list)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}
