// src/core/checks/server_reliability.rs

use crate::core::models::{CheckResult, Redirection, SiteFacts};
use tracing::debug;

// Component weights; they sum to 1.0.
const W_IP: f64 = 0.35;
const W_LOCATION_FULL: f64 = 0.25;
const W_LOCATION_PARTIAL: f64 = 0.15;
const W_LOCATION_MINIMAL: f64 = 0.05;
const W_ISP: f64 = 0.25;
const W_REDIRECT: f64 = 0.15;
const W_REDIRECT_UNVERIFIED: f64 = 0.075;

/// Scores the hosting setup from the shared site facts.
///
/// Additive metric: resolvable address, identifiable hosting location,
/// identifiable ISP, and a verifiable redirect behavior each contribute a
/// fixed share. Sites hiding all of these tend to be throwaway
/// infrastructure.
pub fn score_server_reliability(facts: Option<&SiteFacts>) -> CheckResult {
    let Some(facts) = facts else {
        return CheckResult::error(vec![
            "Site facts unavailable - WHOIS/DNS lookups did not complete".to_string(),
        ]);
    };

    let mut details: Vec<String> = Vec::new();
    let mut total = 0.0;

    // 1. Resolvable IP address.
    let ip_score = if facts.ip_addresses.is_empty() {
        details.push("IP address: not found".to_string());
        0.0
    } else {
        if facts.ip_addresses.len() > 1 {
            details.push(format!(
                "IP address: {} addresses found (multiple)",
                facts.ip_addresses.len()
            ));
        } else {
            details.push("IP address: found".to_string());
        }
        W_IP
    };
    details.push(format!("Score: {ip_score:.2}/{W_IP:.2}"));
    total += ip_score;

    // 2. Hosting location completeness (city, region, country).
    let location_score = match &facts.geo {
        Some(geo) => {
            let components = geo.location_components();
            match components.len() {
                0 => {
                    details.push("Hosting location: unknown".to_string());
                    0.0
                }
                1 => {
                    details.push(format!(
                        "Hosting location: minimal info ({})",
                        components.join(", ")
                    ));
                    W_LOCATION_MINIMAL
                }
                2 => {
                    details.push(format!(
                        "Hosting location: partial info ({})",
                        components.join(", ")
                    ));
                    W_LOCATION_PARTIAL
                }
                _ => {
                    details.push(format!(
                        "Hosting location: full info ({})",
                        components.join(", ")
                    ));
                    W_LOCATION_FULL
                }
            }
        }
        None => {
            details.push("Hosting location: unknown".to_string());
            0.0
        }
    };
    details.push(format!("Score: {location_score:.2}/{W_LOCATION_FULL:.2}"));
    total += location_score;

    // 3. Identifiable ISP.
    let isp_score = match facts.geo.as_ref().and_then(|g| g.isp.as_deref()) {
        Some(isp) if !isp.is_empty() => {
            details.push(format!("ISP: {isp}"));
            W_ISP
        }
        _ => {
            details.push("ISP: unknown".to_string());
            0.0
        }
    };
    details.push(format!("Score: {isp_score:.2}/{W_ISP:.2}"));
    total += isp_score;

    // 4. Redirect behavior.
    let redirect_score = match &facts.redirect {
        Redirection::NoRedirect => {
            details.push("Redirection: no redirection".to_string());
            W_REDIRECT
        }
        Redirection::Chain(chain) => {
            details.push(format!(
                "Redirection: chain detected ({} redirect(s))",
                chain.len().saturating_sub(1)
            ));
            W_REDIRECT
        }
        Redirection::Unavailable => {
            details.push(
                "Redirection: unable to check completely (server may block automated requests)"
                    .to_string(),
            );
            W_REDIRECT_UNVERIFIED
        }
    };
    details.push(format!("Score: {redirect_score:.3}/{W_REDIRECT:.2}"));
    total += redirect_score;

    debug!(total, "Server reliability scoring finished.");
    CheckResult::scored((total * 100.0).round() / 100.0, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{CheckStatus, GeoInfo};
    use std::net::Ipv4Addr;

    fn full_facts() -> SiteFacts {
        SiteFacts {
            registration_date: None,
            expiration_date: None,
            ip_addresses: vec![Ipv4Addr::new(93, 184, 216, 34)],
            geo: Some(GeoInfo {
                country: Some("Germany".to_string()),
                region: Some("Hesse".to_string()),
                city: Some("Frankfurt am Main".to_string()),
                isp: Some("Example Hosting GmbH".to_string()),
            }),
            redirect: Redirection::NoRedirect,
        }
    }

    #[test]
    fn complete_facts_score_the_maximum() {
        let result = score_server_reliability(Some(&full_facts()));
        assert_eq!(result.score, Some(1.0));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn bare_facts_score_zero_but_are_included() {
        let facts = SiteFacts {
            registration_date: None,
            expiration_date: None,
            ip_addresses: Vec::new(),
            geo: None,
            redirect: Redirection::Unavailable,
        };
        let result = score_server_reliability(Some(&facts));
        // The unverified redirect check still grants its half share.
        assert_eq!(result.score, Some(0.08));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn partial_location_grants_the_partial_share() {
        let mut facts = full_facts();
        facts.geo = Some(GeoInfo {
            country: Some("Germany".to_string()),
            region: None,
            city: Some("Frankfurt am Main".to_string()),
            isp: None,
        });
        let result = score_server_reliability(Some(&facts));
        // 0.35 (ip) + 0.15 (partial location) + 0.0 (isp) + 0.15 (redirect)
        assert_eq!(result.score, Some(0.65));
    }

    #[test]
    fn redirect_chains_are_reported_with_their_hop_count() {
        let mut facts = full_facts();
        facts.redirect = Redirection::Chain(vec![
            "http://example.com/".to_string(),
            "https://example.com/".to_string(),
        ]);
        let result = score_server_reliability(Some(&facts));
        assert_eq!(result.score, Some(1.0));
        assert!(result
            .details
            .iter()
            .any(|d| d.contains("chain detected (1 redirect(s))")));
    }

    #[test]
    fn missing_site_facts_is_an_error() {
        let result = score_server_reliability(None);
        assert_eq!(result.status, CheckStatus::Error);
    }
}
