// src/core/checks/domain_pattern.rs

use crate::core::models::CheckResult;
use std::net::Ipv4Addr;
use tracing::debug;

/// TLDs disproportionately registered for phishing campaigns.
const DECEPTIVE_TLDS: &[&str] = &["xyz", "info", "top", "icu", "site", "online", "link"];

/// URL shortening services. Not malicious by themselves, but they mask the
/// real destination.
const URL_SHORTENERS: &[&str] = &[
    "bit.ly", "goo.gl", "tinyurl.com", "t.co", "is.gd", "cli.gs", "yfrog.com", "migre.me",
    "ff.im",
];

// Penalties subtracted from the perfect 1.0 baseline. Independent signals
// stack additively; the floor is 0.0.
const P_IP_ADDRESS: f64 = 0.5;
const P_DECEPTIVE_TLD: f64 = 0.3;
const P_URL_ENCODED: f64 = 0.4;
const P_TYPOSQUAT_DIGITS: f64 = 0.2;
const P_EXCESSIVE_HYPHENS: f64 = 0.2;
const P_LONG_HOSTNAME: f64 = 0.2;
const P_LONG_SUBDOMAIN: f64 = 0.2;
const P_HTTP_TOKEN: f64 = 0.4;
const P_AT_SYMBOL: f64 = 0.5;
const P_URL_SHORTENER: f64 = 0.1;

/// Analyzes the hostname for lexical phishing patterns.
///
/// Pure function of the hostname: no network access, fully deterministic.
pub fn analyze_domain_pattern(hostname: &str) -> CheckResult {
    let hostname = hostname.trim().to_lowercase();
    let mut score = 1.0;
    let mut warnings: Vec<String> = Vec::new();

    // Raw IP instead of a name hides who the operator is.
    if hostname.parse::<Ipv4Addr>().is_ok() {
        warnings.push("Hostname is an IP address (obfuscation technique).".to_string());
        score -= P_IP_ADDRESS;
    }

    // Hyphen runs are a common way to smuggle brand names into a domain.
    if hostname.matches('-').count() > 2 {
        warnings.push(
            "Excessive hyphens in domain (often used to hide brand names).".to_string(),
        );
        score -= P_EXCESSIVE_HYPHENS;
    }

    if let Some(tld) = hostname.rsplit('.').next() {
        if DECEPTIVE_TLDS.contains(&tld) {
            warnings.push(format!(
                "Uses a deceptive TLD often associated with phishing: .{tld}"
            ));
            score -= P_DECEPTIVE_TLD;
        }
    }

    // Long hostnames push the real domain out of view on mobile browsers.
    if hostname.len() > 30 {
        warnings.push("Hostname is suspiciously long (> 30 characters).".to_string());
        score -= P_LONG_HOSTNAME;
    }

    let parts: Vec<&str> = hostname.split('.').collect();
    if parts.len() > 3 && parts[..parts.len() - 2].iter().any(|p| p.len() > 15) {
        warnings.push("Contains unusually long subdomains.".to_string());
        score -= P_LONG_SUBDOMAIN;
    }

    if hostname.contains('%') {
        warnings.push("Hostname contains URL-encoded characters (obfuscation).".to_string());
        score -= P_URL_ENCODED;
    }

    // paypa1.com, g00gle.com: digits standing in for 'l' and 'o'.
    let without_com = hostname.replace(".com", "");
    if without_com.contains('0') || without_com.contains('1') {
        warnings.push(
            "Hostname contains the digits '0' or '1' (potential typosquatting of 'o'/'l')."
                .to_string(),
        );
        score -= P_TYPOSQUAT_DIGITS;
    }

    // https-secure-verify.com style: a scheme token inside the name itself.
    if hostname.contains("http") {
        warnings.push("Hostname contains an 'http'/'https' token (deceptive technique).".to_string());
        score -= P_HTTP_TOKEN;
    }

    // Browsers ignore everything before '@' in the authority part.
    if hostname.contains('@') {
        warnings.push("Hostname contains an '@' symbol (redirect obfuscation).".to_string());
        score -= P_AT_SYMBOL;
    }

    if URL_SHORTENERS.iter().any(|s| hostname.contains(s)) {
        warnings.push("Uses a URL shortening service (masks the destination).".to_string());
        score -= P_URL_SHORTENER;
    }

    debug!(
        hostname = %hostname,
        warnings = warnings.len(),
        score,
        "Domain pattern analysis finished."
    );

    let details = if warnings.is_empty() {
        vec!["Status: Domain pattern appears normal (no obvious lexical anomalies).".to_string()]
    } else {
        warnings
            .into_iter()
            .map(|w| format!("WARNING: {w}"))
            .collect()
    };
    CheckResult::scored(score, details)
}
