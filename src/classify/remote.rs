// src/classify/remote.rs
//! Remote model providers + file cache + daily call budget.
//!
//! A `ModelProvider` does one real remote call and returns the raw response
//! text, or `None` on any failure. `CachingProvider` wraps a provider with a
//! file cache keyed by request hash and a persisted per-day call counter;
//! an exhausted budget looks like a provider failure to the caller, which
//! then degrades to the keyword fallback.

use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{AiProviderKind, PipelineConfig};

const SYSTEM_PROMPT: &str =
    "You are a news topic classifier. Reply with a single JSON object and nothing else.";

/// Low-level provider: does a real remote call. Separated from the caching
/// wrapper so tests can exercise the wrapper with a deterministic inner.
pub trait ModelProvider: Send + Sync {
    fn request<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Factory: pick a provider from the config, wrapped with cache + budget.
/// `None` when no provider is configured (fallback-only operation).
pub fn build_provider(cfg: &PipelineConfig) -> Option<Arc<dyn ModelProvider>> {
    let kind = cfg.ai_provider?;
    let provider: Arc<dyn ModelProvider> = match kind {
        AiProviderKind::OpenAi => Arc::new(CachingProvider::new(
            OpenAiProvider::new(None),
            cfg.ai_cache_dir.clone(),
            cfg.ai_daily_limit,
        )),
        AiProviderKind::Claude => Arc::new(CachingProvider::new(
            ClaudeProvider::new(None),
            cfg.ai_cache_dir.clone(),
            cfg.ai_daily_limit,
        )),
    };
    Some(provider)
}

fn classifier_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("ai-news-pipeline/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(20))
        .build()
        .expect("reqwest client")
}

/// OpenAI provider (Chat Completions API). Requires `OPENAI_API_KEY`.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(model_override: Option<&str>) -> Self {
        Self {
            http: classifier_http_client(),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }
}

impl ModelProvider for OpenAiProvider {
    fn request<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return None;
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: prompt,
                    },
                ],
                temperature: 0.2,
                max_tokens: 300,
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .ok()?;
            if !resp.status().is_success() {
                debug!(status = %resp.status(), "openai classification call refused");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.trim())
                .unwrap_or("");
            if content.is_empty() {
                None
            } else {
                Some(content.to_string())
            }
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Anthropic provider (Messages API). Requires `ANTHROPIC_API_KEY`.
pub struct ClaudeProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    pub fn new(model_override: Option<&str>) -> Self {
        Self {
            http: classifier_http_client(),
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: model_override.unwrap_or("claude-3-5-haiku-20241022").to_string(),
        }
    }
}

impl ModelProvider for ClaudeProvider {
    fn request<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return None;
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                max_tokens: u32,
                system: &'a str,
                messages: Vec<Msg<'a>>,
            }
            #[derive(Deserialize)]
            struct Resp {
                content: Vec<Block>,
            }
            #[derive(Deserialize)]
            struct Block {
                #[serde(default)]
                text: String,
            }

            let req = Req {
                model: &self.model,
                max_tokens: 300,
                system: SYSTEM_PROMPT,
                messages: vec![Msg {
                    role: "user",
                    content: prompt,
                }],
            };

            let resp = self
                .http
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&req)
                .send()
                .await
                .ok()?;
            if !resp.status().is_success() {
                debug!(status = %resp.status(), "anthropic classification call refused");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            let text = body
                .content
                .iter()
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join("");
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        })
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

/// Fixed-response provider for tests and local runs.
#[derive(Clone, Default)]
pub struct MockProvider {
    pub reply: Option<String>,
}

impl ModelProvider for MockProvider {
    fn request<'a>(
        &'a self,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        let out = self.reply.clone();
        Box::pin(async move { out })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// File cache + daily budget around a real provider. Cache hits are served
/// without touching the counter; only successful real calls increment it.
pub struct CachingProvider<P: ModelProvider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

impl<P: ModelProvider> CachingProvider<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit: u32) -> Self {
        let _ = fs::create_dir_all(&cache_dir);
        let counter = Mutex::new(load_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit,
            counter,
        }
    }

    async fn request_impl(&self, prompt: &str) -> Option<String> {
        let key = cache_key(prompt);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            return Some(hit);
        }

        {
            let mut g = self.counter.lock().expect("poisoned counter");
            if g.is_expired() {
                g.reset_to_today();
                let _ = save_counter(&self.cache_dir, &g);
            }
            if g.count >= self.daily_limit {
                debug!(limit = self.daily_limit, "daily model call budget spent");
                return None;
            }
        }

        let fresh = self.inner.request(prompt).await?;
        let _ = write_cache_file(&self.cache_dir, &key, &fresh);
        {
            let mut g = self.counter.lock().expect("poisoned counter");
            g.count = g.count.saturating_add(1);
            let _ = save_counter(&self.cache_dir, &g);
        }
        Some(fresh)
    }
}

impl<P: ModelProvider> ModelProvider for CachingProvider<P> {
    fn request<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(self.request_impl(prompt))
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

// --- file cache helpers ---

fn cache_key(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    let mut out = String::with_capacity(16);
    use std::fmt::Write as _;
    for b in &digest[..8] {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<String> {
    let raw = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &str) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}

// --- daily counter helpers ---

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }

    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_counter(dir: &Path) -> io::Result<DailyCounter> {
    let raw = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_counter(dir: &Path, counter: &DailyCounter) -> io::Result<()> {
    let path = counter_path(dir);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(counter).unwrap_or_else(|_| "{}".to_string());
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: Arc<AtomicU32>,
        reply: String,
    }

    impl ModelProvider for CountingProvider {
        fn request<'a>(
            &'a self,
            _prompt: &'a str,
        ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let out = self.reply.clone();
            Box::pin(async move { Some(out) })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn counting(calls: &Arc<AtomicU32>) -> CountingProvider {
        CountingProvider {
            calls: Arc::clone(calls),
            reply: "{\"is_relevant\": true}".to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_prompts_are_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let provider = CachingProvider::new(counting(&calls), dir.path().to_path_buf(), 10);

        assert!(provider.request("same prompt").await.is_some());
        assert!(provider.request("same prompt").await.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_refuses_new_prompts_but_serves_cached() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let provider = CachingProvider::new(counting(&calls), dir.path().to_path_buf(), 1);

        assert!(provider.request("first").await.is_some());
        assert!(provider.request("second").await.is_none());
        assert!(provider.request("first").await.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn counter_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        {
            let provider = CachingProvider::new(counting(&calls), dir.path().to_path_buf(), 1);
            assert!(provider.request("first").await.is_some());
        }
        let provider = CachingProvider::new(counting(&calls), dir.path().to_path_buf(), 1);
        assert!(provider.request("second").await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inner_failure_is_not_cached_or_counted() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CachingProvider::new(
            MockProvider { reply: None },
            dir.path().to_path_buf(),
            5,
        );
        assert!(provider.request("prompt").await.is_none());
        assert!(load_counter(dir.path()).is_err());
    }
}
