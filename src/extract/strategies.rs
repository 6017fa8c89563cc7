// src/extract/strategies.rs
//! The concrete extraction heuristics, ordered in the chain from
//! special-case to general to desperate. Every strategy parses the page
//! with `scraper` and differs only in how it picks the article container.

use super::{ExtractInput, ExtractStrategy};
use crate::error::StrategyError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

fn sel(css: &'static str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn text_of(el: &ElementRef) -> String {
    let mut out = String::new();
    for piece in el.text() {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(piece);
    }
    out
}

fn paragraphs(el: &ElementRef, p: &Selector) -> Vec<String> {
    el.select(p)
        .map(|e| text_of(&e))
        .filter(|t| !t.is_empty())
        .collect()
}

fn link_chars(el: &ElementRef, a: &Selector) -> usize {
    el.select(a).map(|e| text_of(&e).chars().count()).sum()
}

/// journalisten.dk publishes overview pages where each entry is a full
/// article; the feed links to them with a `news_band_id` query parameter
/// naming the entry to read.
pub struct AggregatorStrategy;

impl ExtractStrategy for AggregatorStrategy {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    fn attempt(&self, input: &ExtractInput) -> Result<String, StrategyError> {
        let parsed = url::Url::parse(&input.url).map_err(|_| StrategyError::NotApplicable)?;
        let host_ok = parsed
            .host_str()
            .map(crate::domains::normalize_domain)
            .map(|h| h == "journalisten.dk" || h.ends_with(".journalisten.dk"))
            .unwrap_or(false);
        if !host_ok || !parsed.path().contains("nyhedsoverblik") {
            return Err(StrategyError::NotApplicable);
        }
        let band_id = parsed
            .query_pairs()
            .find(|(k, _)| k == "news_band_id")
            .map(|(_, v)| v.into_owned())
            .ok_or(StrategyError::NotApplicable)?;
        // The id lands in a CSS selector; keep it to identifier characters.
        let band_id: String = band_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if band_id.is_empty() {
            return Err(StrategyError::Parse("empty news_band_id".into()));
        }

        let doc = Html::parse_document(&input.html);
        let band_sel = Selector::parse(&format!("div#news-feed-{band_id}"))
            .map_err(|e| StrategyError::Parse(e.to_string()))?;
        let band = doc
            .select(&band_sel)
            .next()
            .ok_or_else(|| StrategyError::Parse(format!("no news-feed-{band_id} container")))?;
        let content = band
            .select(&sel("div.news-band__content"))
            .next()
            .ok_or_else(|| StrategyError::Parse("no news-band__content in container".into()))?;

        // Block-level text, dropping stray short lines (bylines, timestamps).
        let mut blocks: Vec<String> = content
            .select(&sel("h1, h2, h3, h4, p, li"))
            .map(|e| text_of(&e))
            .collect();
        if blocks.is_empty() {
            blocks = vec![text_of(&content)];
        }
        let kept: Vec<String> = blocks
            .into_iter()
            .filter(|b| b.chars().count() > 10)
            .collect();
        if kept.is_empty() {
            return Err(StrategyError::Parse("news band carries no text".into()));
        }
        Ok(kept.join("\n"))
    }
}

/// Pick the block container with the most paragraph text after discounting
/// link text, so navs and link farms lose to body copy.
pub struct DensityStrategy;

impl ExtractStrategy for DensityStrategy {
    fn name(&self) -> &'static str {
        "density"
    }

    fn attempt(&self, input: &ExtractInput) -> Result<String, StrategyError> {
        let doc = Html::parse_document(&input.html);
        let candidates = sel("article, main, section, div");
        let p = sel("p");
        let a = sel("a");

        let mut best: Option<Vec<String>> = None;
        let mut best_score = 0usize;
        for el in doc.select(&candidates) {
            let paras = paragraphs(&el, &p);
            if paras.is_empty() {
                continue;
            }
            let text_len: usize = paras.iter().map(|t| t.chars().count()).sum();
            let score = text_len.saturating_sub(link_chars(&el, &a));
            if score > best_score {
                best_score = score;
                best = Some(paras);
            }
        }
        best.map(|paras| paras.join("\n\n"))
            .ok_or(StrategyError::NotApplicable)
    }
}

const ARTICLE_CONTAINERS: &[&str] = &[
    "article",
    "[itemprop=\"articleBody\"]",
    "div.article-body",
    "div.article__body",
    "div.story-body",
    "div.entry-content",
    "div.post-content",
    "div.content__article-body",
];

/// Semantic news markup: dedicated article containers, paragraphs joined.
pub struct ArticleMarkupStrategy;

impl ExtractStrategy for ArticleMarkupStrategy {
    fn name(&self) -> &'static str {
        "article-markup"
    }

    fn attempt(&self, input: &ExtractInput) -> Result<String, StrategyError> {
        let doc = Html::parse_document(&input.html);
        let p = sel("p");
        for css in ARTICLE_CONTAINERS {
            let container = Selector::parse(css).expect("valid selector");
            for el in doc.select(&container) {
                let paras = paragraphs(&el, &p);
                let text = if paras.is_empty() {
                    text_of(&el)
                } else {
                    paras.join("\n\n")
                };
                if !text.is_empty() {
                    return Ok(text);
                }
            }
        }
        Err(StrategyError::NotApplicable)
    }
}

/// Publisher-provided metadata: JSON-LD `articleBody` first, then the meta
/// description plus the page's substantial paragraphs.
pub struct MetadataStrategy;

fn json_ld_article_body(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            if let Some(Value::String(body)) = map.get("articleBody") {
                if !body.trim().is_empty() {
                    return Some(body.trim().to_string());
                }
            }
            map.get("@graph").and_then(json_ld_article_body)
        }
        Value::Array(items) => items.iter().find_map(json_ld_article_body),
        _ => None,
    }
}

impl ExtractStrategy for MetadataStrategy {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn attempt(&self, input: &ExtractInput) -> Result<String, StrategyError> {
        let doc = Html::parse_document(&input.html);
        for script in doc.select(&sel("script[type=\"application/ld+json\"]")) {
            let raw: String = script.text().collect();
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                if let Some(body) = json_ld_article_body(&value) {
                    return Ok(body);
                }
            }
        }

        let description = doc
            .select(&sel("meta[property=\"og:description\"], meta[name=\"description\"]"))
            .find_map(|m| m.value().attr("content"))
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(StrategyError::NotApplicable)?;
        let mut parts = vec![description.to_string()];
        parts.extend(
            doc.select(&sel("p"))
                .map(|e| text_of(&e))
                .filter(|t| t.chars().count() >= 80),
        );
        Ok(parts.join("\n\n"))
    }
}

static POSITIVE_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)article|body|content|entry|hentry|main|page|post|text|blog|story")
        .expect("valid regex")
});
static NEGATIVE_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)combx|comment|contact|foot|footer|footnote|masthead|media|meta|outbrain|promo|related|scroll|shoutbox|sidebar|sponsor|shopping|tags|tool|widget|nav|menu",
    )
    .expect("valid regex")
});

/// Readability-style scoring over class/id hints, comma count, and link
/// density.
pub struct ReadabilityStrategy;

impl ExtractStrategy for ReadabilityStrategy {
    fn name(&self) -> &'static str {
        "readability"
    }

    fn attempt(&self, input: &ExtractInput) -> Result<String, StrategyError> {
        let doc = Html::parse_document(&input.html);
        let candidates = sel("div, article, section, main");
        let p = sel("p");
        let a = sel("a");

        let mut best: Option<Vec<String>> = None;
        let mut best_score = 0.0f64;
        for el in doc.select(&candidates) {
            let paras = paragraphs(&el, &p);
            if paras.is_empty() {
                continue;
            }
            let text = paras.join("\n\n");
            let chars = text.chars().count();
            if chars < 25 {
                continue;
            }

            let hints = format!(
                "{} {}",
                el.value().attr("class").unwrap_or(""),
                el.value().attr("id").unwrap_or("")
            );
            let mut score = paras.len() as f64
                + text.matches(',').count() as f64
                + (chars / 100).min(3) as f64;
            if POSITIVE_HINT.is_match(&hints) {
                score += 25.0;
            }
            if NEGATIVE_HINT.is_match(&hints) {
                score -= 25.0;
            }
            let density = (link_chars(&el, &a) as f64 / chars as f64).min(1.0);
            let score = score * (1.0 - density);
            if score > best_score {
                best_score = score;
                best = Some(paras);
            }
        }
        best.map(|paras| paras.join("\n\n"))
            .ok_or(StrategyError::NotApplicable)
    }
}

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    ".content",
    ".article-content",
    ".post-content",
    ".entry-content",
    ".story-content",
    ".news-content",
    ".text-content",
    "[role=\"main\"]",
    ".main-content",
    ".article-body",
    ".story-body",
];

/// Last resort: sweep a fixed list of content selectors, falling back to
/// the whole body. Accepts whatever it finds and lets the chain's length
/// gate decide.
pub struct TagScrapeStrategy;

impl ExtractStrategy for TagScrapeStrategy {
    fn name(&self) -> &'static str {
        "tag-scrape"
    }

    fn attempt(&self, input: &ExtractInput) -> Result<String, StrategyError> {
        let doc = Html::parse_document(&input.html);
        let mut text = String::new();
        for css in CONTENT_SELECTORS {
            let selector = Selector::parse(css).expect("valid selector");
            let joined = doc
                .select(&selector)
                .map(|e| text_of(&e))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if joined.chars().count() > 100 {
                text = joined;
                break;
            }
            if text.is_empty() {
                text = joined;
            }
        }
        if text.chars().count() <= 100 {
            if let Some(body) = doc.select(&sel("body")).next() {
                let body_text = text_of(&body);
                if body_text.chars().count() > text.chars().count() {
                    text = body_text;
                }
            }
        }
        if text.is_empty() {
            return Err(StrategyError::Parse("document has no text".into()));
        }
        Ok(text)
    }
}
