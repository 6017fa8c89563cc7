// src/domains.rs
//! Source-domain catalog: the curated outlet list the discovery feed is
//! queried for, the skip list, per-domain analytics categories, and the
//! language/country inference helpers.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Outlets the feed is queried for by default. English-language press first,
/// then the Danish media block.
pub const RELIABLE_NEWS_DOMAINS: &[&str] = &[
    "reuters.com",
    "bbc.com",
    "theguardian.com",
    "cnn.com",
    "npr.org",
    "nbcnews.com",
    "abcnews.go.com",
    "cbsnews.com",
    "msnbc.com",
    "foxnews.com",
    "latimes.com",
    "theglobeandmail.com",
    "washingtonpost.com",
    "usatoday.com",
    "nationalpost.com",
    "adweek.com",
    "adage.com",
    "thedrum.com",
    "campaignlive.com",
    "cjr.org",
    "niemanlab.org",
    "poynter.org",
    "pressgazette.co.uk",
    "creativereview.co.uk",
    "commarts.com",
    "itsnicethat.com",
    "eyeondesign.aiga.org",
    "prweek.com",
    "provokemedia.com",
    "prdaily.com",
    "variety.com",
    "hollywoodreporter.com",
    "indiewire.com",
    "deadline.com",
    "nationalgeographic.com",
    "bjp-online.com",
    "petapixel.com",
    "lensculture.com",
    "smashingmagazine.com",
    "alistapart.com",
    "uxmag.com",
    "nngroup.com",
    "theverge.com",
    "wired.com",
    "mashable.com",
    "digiday.com",
    "contentmarketinginstitute.com",
    // Danish outlets
    "journalisten.dk",
    "dr.dk",
    "tv2.dk",
    "berlingske.dk",
    "jyllands-posten.dk",
    "ekstrabladet.dk",
    "bt.dk",
    "information.dk",
    "weekendavisen.dk",
    "kristeligt-dagblad.dk",
    "kforum.dk",
    "medietrends.dk",
    "mediawatch.dk",
    "markedsforing.dk",
    "bureaubiz.dk",
    "ekkofilm.dk",
    "digitalfoto.dk",
    "soundvenue.dk",
    "ddc.dk",
    "computerworld.dk",
    "version2.dk",
    "elektronista.dk",
    "politiken.dk",
    "arbejderen.dk",
    "avisen.dk",
    "nordjyske.dk",
    "sn.dk",
    "fyens.dk",
];

/// Hosts that never carry extractable article text (video/social platforms).
pub const PROBLEMATIC_DOMAINS: &[&str] = &[
    "youtube.com",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    "tiktok.com",
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "deperu.com",
];

static DOMAIN_CATEGORIES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for d in [
        "adweek.com",
        "adage.com",
        "thedrum.com",
        "campaignlive.com",
        "markedsforing.dk",
        "bureaubiz.dk",
    ] {
        m.insert(d, "advertising and commercial");
    }
    for d in [
        "reuters.com",
        "bbc.com",
        "theguardian.com",
        "cnn.com",
        "washingtonpost.com",
        "npr.org",
        "nbcnews.com",
        "abcnews.go.com",
        "cbsnews.com",
        "msnbc.com",
        "foxnews.com",
        "usatoday.com",
        "latimes.com",
        "theglobeandmail.com",
        "nationalpost.com",
        "cjr.org",
        "niemanlab.org",
        "poynter.org",
        "pressgazette.co.uk",
        "journalisten.dk",
        "dr.dk",
        "tv2.dk",
        "berlingske.dk",
        "jyllands-posten.dk",
        "ekstrabladet.dk",
        "bt.dk",
        "information.dk",
        "weekendavisen.dk",
        "kristeligt-dagblad.dk",
        "kforum.dk",
        "medietrends.dk",
        "mediawatch.dk",
        "politiken.dk",
        "arbejderen.dk",
        "avisen.dk",
        "nordjyske.dk",
        "sn.dk",
        "fyens.dk",
    ] {
        m.insert(d, "journalism, news and media");
    }
    for d in [
        "creativereview.co.uk",
        "commarts.com",
        "itsnicethat.com",
        "eyeondesign.aiga.org",
    ] {
        m.insert(d, "graphic design and visual communication");
    }
    for d in ["prweek.com", "provokemedia.com", "prdaily.com"] {
        m.insert(d, "strategic communication and PR");
    }
    for d in [
        "variety.com",
        "hollywoodreporter.com",
        "indiewire.com",
        "deadline.com",
        "ekkofilm.dk",
    ] {
        m.insert(d, "film and TV production");
    }
    for d in [
        "nationalgeographic.com",
        "bjp-online.com",
        "petapixel.com",
        "lensculture.com",
        "digitalfoto.dk",
    ] {
        m.insert(d, "photography");
    }
    for d in ["smashingmagazine.com", "alistapart.com", "uxmag.com", "nngroup.com"] {
        m.insert(d, "web and UX design");
    }
    for d in [
        "soundvenue.dk",
        "ddc.dk",
        "theverge.com",
        "wired.com",
        "mashable.com",
        "digiday.com",
        "contentmarketinginstitute.com",
        "computerworld.dk",
        "version2.dk",
        "elektronista.dk",
    ] {
        m.insert(d, "digital media and content creation");
    }
    m
});

/// Lowercase and strip a leading `www.`; the canonical form used for
/// blacklist lookups, category lookups, and dedup keys.
pub fn normalize_domain(domain: &str) -> String {
    let d = domain.trim().to_ascii_lowercase();
    d.strip_prefix("www.").unwrap_or(&d).to_string()
}

/// Host portion of a URL, normalized. None for unparsable URLs.
pub fn domain_of_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(normalize_domain)
}

/// Coarse analytics bucket for a domain; `Other` when uncatalogued.
/// Subdomains inherit the parent's category.
pub fn domain_category(domain: &str) -> &'static str {
    let normalized = normalize_domain(domain);
    if let Some(cat) = DOMAIN_CATEGORIES.get(normalized.as_str()) {
        return cat;
    }
    for (cat_domain, cat) in DOMAIN_CATEGORIES.iter() {
        if normalized.ends_with(&format!(".{cat_domain}")) {
            return cat;
        }
    }
    "Other"
}

pub fn is_reliable(domain: &str) -> bool {
    let normalized = normalize_domain(domain);
    RELIABLE_NEWS_DOMAINS
        .iter()
        .any(|d| normalized == *d || normalized.ends_with(&format!(".{d}")))
}

pub fn is_problematic(domain: &str) -> bool {
    let normalized = normalize_domain(domain);
    PROBLEMATIC_DOMAINS.iter().any(|d| normalized.contains(d))
}

const DANISH_TOKENS: &[&str] = &[
    "danmark", "dansk", "københavn", "aarhus", "odense", "og", "er", "det", "den", "der",
];

const FEED_LANGUAGE_VARIANTS: &[&str] = &["en", "eng", "english", "da", "dan", "danish"];

/// Feed-level language gate: English and Danish only. `.dk` hosts pass
/// whatever the feed claims; a missing language is assumed English.
pub fn feed_language_accepted(domain: &str, language: Option<&str>) -> bool {
    if normalize_domain(domain).ends_with(".dk") {
        return true;
    }
    match language {
        Some(l) => FEED_LANGUAGE_VARIANTS.contains(&l.to_ascii_lowercase().as_str()),
        None => true,
    }
}

/// Language from domain first (`.dk` is always Danish), then a cheap token
/// scan of the text.
pub fn detect_language(domain: &str, text: &str) -> &'static str {
    if normalize_domain(domain).ends_with(".dk") {
        return "da";
    }
    if !text.is_empty() {
        let lower = text.to_lowercase();
        if DANISH_TOKENS
            .iter()
            .any(|w| lower.split_whitespace().any(|t| t == *w))
        {
            return "da";
        }
    }
    "en"
}

/// Country guess from the TLD. `.com`/`.org` default to US.
pub fn infer_country(domain: &str) -> &'static str {
    let d = normalize_domain(domain);
    if d.ends_with(".dk") {
        "DK"
    } else if d.ends_with(".co.uk") {
        "GB"
    } else if d.ends_with(".com") || d.ends_with(".org") {
        "US"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_domains() {
        assert_eq!(normalize_domain("WWW.Reuters.com"), "reuters.com");
        assert_eq!(normalize_domain("dr.dk"), "dr.dk");
        assert_eq!(
            domain_of_url("https://www.bbc.com/news/articles/x").as_deref(),
            Some("bbc.com")
        );
        assert_eq!(domain_of_url("not a url"), None);
    }

    #[test]
    fn category_lookup_covers_subdomains_and_unknowns() {
        assert_eq!(domain_category("reuters.com"), "journalism, news and media");
        assert_eq!(domain_category("news.reuters.com"), "journalism, news and media");
        assert_eq!(domain_category("wired.com"), "digital media and content creation");
        assert_eq!(domain_category("example.org"), "Other");
    }

    #[test]
    fn language_and_country_inference() {
        assert_eq!(detect_language("dr.dk", ""), "da");
        assert_eq!(detect_language("bbc.com", "The markets rallied today."), "en");
        assert_eq!(
            detect_language("example.com", "Regeringen i København og resten af Danmark"),
            "da"
        );
        assert_eq!(infer_country("politiken.dk"), "DK");
        assert_eq!(infer_country("pressgazette.co.uk"), "GB");
        assert_eq!(infer_country("npr.org"), "US");
        assert_eq!(infer_country("example.xyz"), "unknown");
    }

    #[test]
    fn feed_language_gate() {
        assert!(feed_language_accepted("bbc.com", Some("English")));
        assert!(feed_language_accepted("bbc.com", Some("en")));
        assert!(feed_language_accepted("berlingske.dk", Some("German")));
        assert!(feed_language_accepted("bbc.com", None));
        assert!(!feed_language_accepted("spiegel.de", Some("German")));
    }

    #[test]
    fn reliable_and_problematic_checks() {
        assert!(is_reliable("www.theguardian.com"));
        assert!(is_reliable("journalisten.dk"));
        assert!(!is_reliable("random-blog.net"));
        assert!(is_problematic("m.youtube.com"));
        assert!(!is_problematic("bbc.com"));
    }
}
