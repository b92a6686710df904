// src/core/fetchers/site_facts.rs

use crate::core::fetchers::{host_of, normalize_url, BROWSER_USER_AGENT};
use crate::core::models::{Redirection, SiteFacts};
use crate::core::services::{geo::GeoClient, whois};
use color_eyre::eyre::Result;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use reqwest::header::LOCATION;
use reqwest::redirect;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const GEO_TIMEOUT: Duration = Duration::from_secs(8);
const REDIRECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECT_HOPS: usize = 10;

/// Gathers WHOIS dates, DNS A records, geolocation of the first address, and
/// the HTTP redirect chain for the target, once per scan.
///
/// Total by design: every sub-lookup degrades to an empty/unknown value, so
/// the consuming modules decide for themselves what missing facts mean.
pub async fn fetch_site_facts(url: &str) -> SiteFacts {
    let host = host_of(url).unwrap_or_else(|| url.trim().to_lowercase());
    // Query the root domain; registries and resolvers expect it bare.
    let domain = host.strip_prefix("www.").unwrap_or(&host).to_string();
    info!(domain = %domain, "Fetching site facts.");

    let (dates, ip_addresses, redirect) = tokio::join!(
        whois::lookup_dates(&domain),
        resolve_a_records(&domain),
        follow_redirect_chain(url),
    );

    let geo = match ip_addresses.first() {
        Some(ip) => match GeoClient::new(GEO_TIMEOUT) {
            Ok(client) => client.lookup(*ip).await.ok(),
            Err(e) => {
                warn!(error = %e, "Failed to build geolocation client.");
                None
            }
        },
        None => None,
    };

    info!(
        ips = ip_addresses.len(),
        has_geo = geo.is_some(),
        has_registration = dates.registration_date.is_some(),
        "Site facts ready."
    );
    SiteFacts {
        registration_date: dates.registration_date,
        expiration_date: dates.expiration_date,
        ip_addresses,
        geo,
        redirect,
    }
}

/// IPv4 addresses the domain resolves to; empty on any lookup failure.
async fn resolve_a_records(domain: &str) -> Vec<Ipv4Addr> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    match resolver.ipv4_lookup(domain).await {
        Ok(lookup) => {
            let ips: Vec<Ipv4Addr> = lookup.iter().map(|record| record.0).collect();
            debug!(domain, count = ips.len(), "A-record lookup finished.");
            ips
        }
        Err(e) => {
            warn!(domain, error = %e, "A-record lookup failed.");
            Vec::new()
        }
    }
}

/// Follows the target's redirects and reports the visited chain.
///
/// Servers that block automated clients make the first attempt fail, so the
/// probe degrades across verify-on GET, verify-off GET, and verify-off HEAD
/// before giving up.
async fn follow_redirect_chain(url: &str) -> Redirection {
    let attempts: [(&str, bool, bool); 3] = [
        ("GET with verification", true, false),
        ("GET without verification", false, false),
        ("HEAD without verification", false, true),
    ];

    for (label, verify, head_only) in attempts {
        match walk_redirects(url, verify, head_only).await {
            Ok(chain) => {
                debug!(attempt = label, hops = chain.len(), "Redirect chain resolved.");
                return chain_outcome(chain);
            }
            Err(e) => {
                debug!(attempt = label, error = %e, "Redirect attempt failed.");
            }
        }
    }

    warn!(url, "All redirect attempts failed; server may block automated requests.");
    Redirection::Unavailable
}

/// Manually follows up to `MAX_REDIRECT_HOPS` Location headers so the full
/// chain of visited URLs is preserved.
async fn walk_redirects(url: &str, verify: bool, head_only: bool) -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .redirect(redirect::Policy::none())
        .danger_accept_invalid_certs(!verify)
        .timeout(REDIRECT_TIMEOUT)
        .build()?;

    let start = normalize_url(url);
    let mut current = Url::parse(&start)?;
    let mut chain = vec![current.to_string()];

    for _ in 0..MAX_REDIRECT_HOPS {
        let request = if head_only {
            client.head(current.clone())
        } else {
            client.get(current.clone())
        };
        let response = request.send().await?;
        if !response.status().is_redirection() {
            break;
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
        else {
            break;
        };
        // Location may be relative; resolve it against the current URL.
        current = current.join(location)?;
        chain.push(current.to_string());
    }

    Ok(chain)
}

fn chain_outcome(chain: Vec<String>) -> Redirection {
    if chain.len() <= 1 {
        Redirection::NoRedirect
    } else {
        Redirection::Chain(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entry_chain_means_no_redirection() {
        let outcome = chain_outcome(vec!["https://example.com/".to_string()]);
        assert_eq!(outcome, Redirection::NoRedirect);
    }

    #[test]
    fn multi_entry_chain_is_preserved_in_order() {
        let chain = vec![
            "http://example.com/".to_string(),
            "https://example.com/".to_string(),
            "https://www.example.com/".to_string(),
        ];
        let outcome = chain_outcome(chain.clone());
        assert_eq!(outcome, Redirection::Chain(chain));
    }
}
