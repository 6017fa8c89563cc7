// src/error.rs
//! Error taxonomy for the batch pipeline.
//!
//! Only feed-level failures abort a batch. Everything per-article is either a
//! rejection reason (kept and reported) or a fallback path inside the stage
//! that hit it.

use thiserror::Error;

/// Batch-fatal failures. A `Fetch` error marks the run as failed; the
/// orchestrator still returns a run record so the host process survives.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upstream discovery feed unreachable or unusable.
    #[error("discovery feed failure: {0}")]
    Fetch(#[source] anyhow::Error),

    /// Store bootstrap or run-record bookkeeping failed outside per-article
    /// writes.
    #[error("store failure: {0}")]
    Store(#[source] anyhow::Error),
}

/// Why a single extraction strategy gave up on a document.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Strategy does not handle this kind of URL/page at all.
    #[error("not applicable")]
    NotApplicable,

    /// Extracted text exists but is below the extraction minimum.
    #[error("extracted text too short ({got} chars, need {min})")]
    TooShort { got: usize, min: usize },

    /// Exceeded the per-strategy time budget.
    #[error("strategy timed out")]
    Timeout,

    /// Document could not be parsed the way this strategy needs.
    #[error("parse failure: {0}")]
    Parse(String),
}

/// Why the validator refused an article. Rendered with stable reason strings
/// that end up in the rejected-articles table and the run breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    MissingField(&'static str),
    MalformedUrl,
    TooShort,
    DuplicateUrl,
    DuplicateContent,
    ProcessingError,
}

impl RejectionReason {
    /// Stable machine-facing code, used as the breakdown key.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::MissingField(_) => "missing field",
            RejectionReason::MalformedUrl => "malformed url",
            RejectionReason::TooShort => "too short",
            RejectionReason::DuplicateUrl => "duplicate url",
            RejectionReason::DuplicateContent => "duplicate content",
            RejectionReason::ProcessingError => "processing error",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::MissingField(field) => write!(f, "missing field: {field}"),
            other => f.write_str(other.code()),
        }
    }
}
