// src/config.rs
//! Environment-driven pipeline configuration.
//!
//! One immutable `PipelineConfig` is built at process start and passed by
//! reference into every component. No ambient env lookups after that.

use std::path::PathBuf;
use std::time::Duration;

// --- env names & floors ---
pub const ENV_STORAGE_DIR: &str = "STORAGE_DIR";
pub const ENV_DB_PATH: &str = "PIPELINE_DB_PATH";
pub const ENV_MIN_ARTICLE_CHARS: &str = "PIPELINE_MIN_ARTICLE_CHARS";
pub const ENV_EXTRACTION_MIN_CHARS: &str = "PIPELINE_EXTRACTION_MIN_CHARS";
pub const ENV_STRATEGY_TIMEOUT_SECS: &str = "PIPELINE_STRATEGY_TIMEOUT_SECS";
pub const ENV_FETCH_WINDOW_HOURS: &str = "PIPELINE_FETCH_WINDOW_HOURS";
pub const ENV_DOMAIN_PACING_MS: &str = "PIPELINE_DOMAIN_PACING_MS";
pub const ENV_CLASSIFY_PACING_MS: &str = "PIPELINE_CLASSIFY_PACING_MS";
pub const ENV_FAILURE_THRESHOLD: &str = "PIPELINE_FAILURE_THRESHOLD";
pub const ENV_INTERVAL_SECS: &str = "PIPELINE_INTERVAL_SECS";
pub const ENV_RETENTION_DAYS: &str = "PIPELINE_RETENTION_DAYS";
pub const ENV_SOURCE_DOMAINS: &str = "NEWS_SOURCE_DOMAINS";
pub const ENV_LANGUAGE_HINT: &str = "PIPELINE_LANGUAGE_HINT";
pub const ENV_GDELT_BASE_URL: &str = "PIPELINE_GDELT_BASE_URL";
pub const ENV_MAX_RECORDS: &str = "PIPELINE_MAX_RECORDS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT";
pub const ENV_AI_PROVIDER: &str = "PIPELINE_AI_PROVIDER";
pub const ENV_AI_DAILY_LIMIT: &str = "PIPELINE_AI_DAILY_LIMIT";
pub const ENV_AI_CACHE_DIR: &str = "PIPELINE_AI_CACHE_DIR";
pub const ENV_CLASSIFY_EXCERPT_CHARS: &str = "PIPELINE_CLASSIFY_EXCERPT_CHARS";
pub const ENV_TAXONOMY_CONFIG_PATH: &str = "TAXONOMY_CONFIG_PATH";

/// Upstream recency floor: the discovery feed is never queried for a window
/// narrower than this.
pub const FETCH_WINDOW_FLOOR_HOURS: u64 = 2;
/// Continuous-mode interval floor.
pub const INTERVAL_FLOOR_SECS: u64 = 900;

pub const DEFAULT_GDELT_BASE_URL: &str = "https://api.gdeltproject.org/api/v2/doc/doc";
pub const DEFAULT_TAXONOMY_CONFIG_PATH: &str = "config/taxonomy.toml";

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Which remote model backs the classifier's primary path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProviderKind {
    OpenAi,
    Claude,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Validation
    pub min_article_chars: usize,
    pub extraction_min_chars: usize,

    // Extraction / fetching
    pub strategy_timeout: Duration,
    pub fetch_window: Duration,
    pub domain_pacing: Duration,
    pub failure_threshold: u32,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub source_domains: Vec<String>,
    pub language_hint: Option<String>,
    pub feed_base_url: String,
    pub max_records: u32,

    // Classification
    pub classify_pacing: Duration,
    pub classify_excerpt_chars: usize,
    pub ai_provider: Option<AiProviderKind>,
    pub ai_daily_limit: u32,
    pub ai_cache_dir: PathBuf,
    pub taxonomy_path: PathBuf,

    // Scheduling / retention
    pub interval: Duration,
    pub retention_days: u32,

    // Storage layout
    pub storage_dir: PathBuf,
    pub db_path: PathBuf,
    pub articles_dir: PathBuf,
    pub failure_state_path: PathBuf,
}

impl PipelineConfig {
    /// Read the full configuration from the environment, applying defaults,
    /// floors, and clamps. Call once at startup.
    pub fn from_env() -> Self {
        let storage_dir = std::env::var(ENV_STORAGE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let db_path = std::env::var(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| storage_dir.join("pipeline.db"));
        let articles_dir = storage_dir.join("articles");
        let failure_state_path = storage_dir.join("source_failures.json");

        let window_hours =
            parse_u64_env(ENV_FETCH_WINDOW_HOURS, FETCH_WINDOW_FLOOR_HOURS).max(FETCH_WINDOW_FLOOR_HOURS);
        let interval_secs = parse_u64_env(ENV_INTERVAL_SECS, 7_200).max(INTERVAL_FLOOR_SECS);

        let ai_provider = resolve_ai_provider();

        Self {
            min_article_chars: parse_usize_env(ENV_MIN_ARTICLE_CHARS, 700).max(1),
            extraction_min_chars: parse_usize_env(ENV_EXTRACTION_MIN_CHARS, 200).max(1),

            strategy_timeout: Duration::from_secs(parse_u64_env(ENV_STRATEGY_TIMEOUT_SECS, 10).max(1)),
            fetch_window: Duration::from_secs(window_hours * 3_600),
            domain_pacing: Duration::from_millis(parse_u64_env(ENV_DOMAIN_PACING_MS, 1_000)),
            failure_threshold: parse_u32_env(ENV_FAILURE_THRESHOLD, 5).max(1),
            request_timeout: Duration::from_secs(parse_u64_env(ENV_REQUEST_TIMEOUT_SECS, 10).max(1)),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            source_domains: parse_source_domains(std::env::var(ENV_SOURCE_DOMAINS).ok()),
            language_hint: std::env::var(ENV_LANGUAGE_HINT)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            feed_base_url: std::env::var(ENV_GDELT_BASE_URL)
                .unwrap_or_else(|_| DEFAULT_GDELT_BASE_URL.to_string()),
            max_records: parse_u32_env(ENV_MAX_RECORDS, 250).clamp(1, 250),

            classify_pacing: Duration::from_millis(parse_u64_env(ENV_CLASSIFY_PACING_MS, 100)),
            classify_excerpt_chars: parse_usize_env(ENV_CLASSIFY_EXCERPT_CHARS, 2_000).max(200),
            ai_provider,
            ai_daily_limit: parse_u32_env(ENV_AI_DAILY_LIMIT, 500),
            ai_cache_dir: std::env::var(ENV_AI_CACHE_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("cache/ai")),
            taxonomy_path: std::env::var(ENV_TAXONOMY_CONFIG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TAXONOMY_CONFIG_PATH)),

            interval: Duration::from_secs(interval_secs),
            retention_days: parse_u32_env(ENV_RETENTION_DAYS, 30).max(1),

            storage_dir,
            db_path,
            articles_dir,
            failure_state_path,
        }
    }

    /// Fixed defaults with all storage rooted at `storage_dir`, no env
    /// reads. The binary goes through `from_env`; embedders start here.
    pub fn with_defaults(storage_dir: impl Into<PathBuf>) -> Self {
        let storage_dir: PathBuf = storage_dir.into();
        Self {
            min_article_chars: 700,
            extraction_min_chars: 200,

            strategy_timeout: Duration::from_secs(10),
            fetch_window: Duration::from_secs(FETCH_WINDOW_FLOOR_HOURS * 3_600),
            domain_pacing: Duration::from_millis(1_000),
            failure_threshold: 5,
            request_timeout: Duration::from_secs(10),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            source_domains: crate::domains::RELIABLE_NEWS_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            language_hint: None,
            feed_base_url: DEFAULT_GDELT_BASE_URL.to_string(),
            max_records: 250,

            classify_pacing: Duration::from_millis(100),
            classify_excerpt_chars: 2_000,
            ai_provider: None,
            ai_daily_limit: 500,
            ai_cache_dir: storage_dir.join("cache").join("ai"),
            taxonomy_path: PathBuf::from(DEFAULT_TAXONOMY_CONFIG_PATH),

            interval: Duration::from_secs(7_200),
            retention_days: 30,

            db_path: storage_dir.join("pipeline.db"),
            articles_dir: storage_dir.join("articles"),
            failure_state_path: storage_dir.join("source_failures.json"),
            storage_dir,
        }
    }

    /// Ensure the storage directories exist. Best-effort, errors surface on
    /// first real write.
    pub fn ensure_dirs(&self) {
        let _ = std::fs::create_dir_all(&self.storage_dir);
        let _ = std::fs::create_dir_all(&self.articles_dir);
        let _ = std::fs::create_dir_all(&self.ai_cache_dir);
    }
}

/// Provider selection: explicit env wins, otherwise whichever API key is
/// present (OpenAI preferred, matching the upstream ordering).
fn resolve_ai_provider() -> Option<AiProviderKind> {
    if let Ok(raw) = std::env::var(ENV_AI_PROVIDER) {
        return match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(AiProviderKind::OpenAi),
            "claude" | "anthropic" => Some(AiProviderKind::Claude),
            "" | "none" | "off" => None,
            other => {
                tracing::warn!(provider = other, "unknown AI provider, disabling remote path");
                None
            }
        };
    }
    if env_nonempty("OPENAI_API_KEY") {
        Some(AiProviderKind::OpenAi)
    } else if env_nonempty("ANTHROPIC_API_KEY") {
        Some(AiProviderKind::Claude)
    } else {
        None
    }
}

fn env_nonempty(name: &str) -> bool {
    std::env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn parse_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_u32_env(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_usize_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_source_domains(raw: Option<String>) -> Vec<String> {
    match raw {
        Some(s) if !s.trim().is_empty() => {
            let mut out: Vec<String> = s
                .split(',')
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
            out.dedup();
            out
        }
        _ => crate::domains::RELIABLE_NEWS_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .collect(),
    }
}
