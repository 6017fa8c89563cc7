// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod classify;
pub mod config;
pub mod domains;
pub mod error;
pub mod extract;
pub mod failures;
pub mod ingest;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::classify::{ClassificationResult, Classifier, Judgment};
pub use crate::config::PipelineConfig;
pub use crate::error::{PipelineError, RejectionReason, StrategyError};
pub use crate::pipeline::Pipeline;
pub use crate::store::{PipelineRunRecord, RunStatus};
pub use crate::validate::Article;
