// src/core/fetchers/mod.rs

// Shared one-shot fetchers. The page fetch runs exactly once per scan and its
// output is reused by every content-dependent module; the site-facts fetch
// lives in the `site_facts` submodule.

pub mod site_facts;

use crate::core::models::PageContent;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::redirect;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// User agent presented on every outgoing request. Some sites cloak or block
/// non-browser agents entirely.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Bodies smaller than this are treated as "no content".
const MIN_HTML_BYTES: usize = 100;
/// Below this many extracted characters the next fallback extraction runs.
const MIN_EXTRACTED_CHARS: usize = 50;
/// Upper bound on extracted text handed to downstream consumers.
const EXTRACTED_TEXT_CAP: usize = 40_000;

/// Prefixes a scheme when the user typed a bare domain.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Hostname of a URL, if it parses.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(&normalize_url(url))
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Hostname used to key user reviews: every path under the same host shares
/// one review pool.
pub fn parent_host(url: &str) -> String {
    host_of(url).unwrap_or_else(|| url.trim().to_lowercase())
}

/// Builds an HTTP client that looks like a desktop browser.
///
/// `accept_invalid_certs` disables TLS verification. This is a deliberate
/// availability-over-strictness trade-off: self-signed and misconfigured
/// certificates are common on otherwise legitimate sites, and certificate
/// quality is judged separately by its own module.
pub fn browser_client(
    timeout: Duration,
    accept_invalid_certs: bool,
) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .redirect(redirect::Policy::limited(10))
        .timeout(timeout)
        .build()
}

/// Fetches the target page once and derives its visible text.
///
/// Returns empty content on any failure, non-HTML content type, or a body
/// below the minimum size threshold; downstream modules translate empty
/// content into their own no-data states.
pub async fn fetch_page(url: &str, timeout: Duration) -> PageContent {
    let target = normalize_url(url);
    info!(url = %target, "Fetching page content.");

    let client = match browser_client(timeout, true) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client for page fetch.");
            return PageContent::default();
        }
    };

    let response = match client.get(&target).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(url = %target, error = %e, "Page fetch failed.");
            return PageContent::default();
        }
    };

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
        debug!(content_type = %content_type, "Non-HTML content type, skipping extraction.");
        return PageContent::default();
    }

    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => {
            warn!(url = %target, error = %e, "Failed to read page body.");
            return PageContent::default();
        }
    };
    if body.len() < MIN_HTML_BYTES {
        debug!(bytes = body.len(), "Page body too small to analyze.");
        return PageContent::default();
    }

    // Parsing is CPU work on a potentially large document; keep it off the
    // async workers.
    let raw_html = body.clone();
    let extracted_text = tokio::task::spawn_blocking(move || extract_text(&body))
        .await
        .unwrap_or_default();

    info!(
        html_bytes = raw_html.len(),
        text_chars = extracted_text.chars().count(),
        "Page content ready."
    );
    PageContent {
        raw_html,
        extracted_text,
    }
}

/// Derives visible text from raw HTML.
///
/// Real-world markup varies wildly, so this walks a fallback chain: whole
/// document text with script/style/meta noise skipped, then block-level tag
/// concatenation, then the raw HTML itself. Downstream consumers need *some*
/// non-empty text far more than they need perfectly clean text.
pub fn extract_text(raw_html: &str) -> String {
    let document = Html::parse_document(raw_html);

    let mut text = visible_text(&document);
    if text.chars().count() < MIN_EXTRACTED_CHARS {
        debug!("Whole-document extraction too thin, trying block-level tags.");
        text = block_level_text(&document);
    }
    if text.chars().count() < MIN_EXTRACTED_CHARS {
        // Likely a JS-rendered shell; hand over the markup itself.
        debug!("Block-level extraction too thin, falling back to raw HTML.");
        text = raw_html.to_string();
    }

    truncate_chars(&text, EXTRACTED_TEXT_CAP)
}

/// Text nodes of the document, skipping non-visible containers.
fn visible_text(document: &Html) -> String {
    const SKIPPED: &[&str] = &["script", "style", "noscript", "meta", "link", "head"];

    let mut parts: Vec<&str> = Vec::new();
    for node in document.tree.nodes() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| SKIPPED.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    normalize_whitespace(&parts.join(" "))
}

/// Concatenated text of common block-level tags, the second extraction
/// fallback.
fn block_level_text(document: &Html) -> String {
    let Ok(selector) =
        Selector::parse("p, h1, h2, h3, h4, h5, h6, div, span, article, section, main")
    else {
        return String::new();
    };

    let mut parts: Vec<String> = Vec::new();
    for element in document.select(&selector) {
        let joined = element.text().collect::<Vec<_>>().join(" ");
        let cleaned = normalize_whitespace(&joined);
        if !cleaned.is_empty() {
            parts.push(cleaned);
        }
    }
    normalize_whitespace(&parts.join(" "))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        text.to_string()
    } else {
        text.chars().take(cap).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_adds_https_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn parent_host_extracts_the_hostname() {
        assert_eq!(
            parent_host("https://www.youtube.com/watch?v=abc123"),
            "www.youtube.com"
        );
        assert_eq!(parent_host("google.com/maps"), "google.com");
    }

    #[test]
    fn extraction_skips_scripts_and_styles() {
        let html = r#"
            <html><head><style>body { color: red; }</style></head>
            <body>
                <script>var tracking = "should never appear";</script>
                <p>Welcome to the storefront, browse our catalog of products
                and reviews collected over many years of operation.</p>
            </body></html>
        "#;
        let text = extract_text(html);
        assert!(text.contains("Welcome to the storefront"));
        assert!(!text.contains("should never appear"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn extraction_falls_back_to_raw_html_for_empty_shells() {
        let html = "<html><body><div id=\"app\"></div><script src=\"/bundle.js\"></script></body></html>";
        let text = extract_text(html);
        // Nothing visible to extract; the markup itself comes back.
        assert!(text.contains("bundle.js"));
    }

    #[test]
    fn extracted_text_is_capped() {
        let body = format!(
            "<html><body><p>{}</p></body></html>",
            "word ".repeat(20_000)
        );
        let text = extract_text(&body);
        assert!(text.chars().count() <= 40_000);
    }
}
