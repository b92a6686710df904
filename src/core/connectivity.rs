// src/core/connectivity.rs

use crate::core::fetchers::{browser_client, normalize_url};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default budget for the reachability probe. Kept short: this check exists
/// purely to fail fast before nine modules' worth of work is committed to a
/// dead target.
pub const PRECHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Outcome of the reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachability {
    pub reachable: bool,
    /// Categorized message, empty when reachable.
    pub message: String,
}

/// Fast probe deciding whether the target is worth scanning at all.
///
/// Sends a HEAD request with browser headers and TLS verification off; on
/// method-not-allowed style answers (405/501/403) it retries as a GET. Any
/// status below 500 counts as reachable: even a 404 proves the server is
/// alive, and reachability is a necessary condition, not a safety judgment.
pub async fn check_reachable(url: &str, timeout: Duration) -> Reachability {
    let target = normalize_url(url);
    debug!(url = %target, "Running connectivity pre-check.");

    let client = match browser_client(timeout, true) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client for pre-check.");
            return unreachable(format!("Network error: {e}"));
        }
    };

    let head = client.head(&target).send().await;
    let response = match head {
        Ok(r) if matches!(r.status().as_u16(), 405 | 501 | 403) => {
            debug!(status = %r.status(), "HEAD not accepted, retrying as GET.");
            client.get(&target).send().await
        }
        other => other,
    };

    match response {
        Ok(r) if r.status().as_u16() < 500 => {
            info!(url = %target, status = %r.status(), "Target is reachable.");
            Reachability {
                reachable: true,
                message: String::new(),
            }
        }
        Ok(r) => {
            warn!(url = %target, status = %r.status(), "Target answered with a server error.");
            unreachable(format!("Server error: HTTP {}", r.status().as_u16()))
        }
        Err(e) => {
            warn!(url = %target, error = %e, "Connectivity pre-check failed.");
            unreachable(categorize_error(&e))
        }
    }
}

fn unreachable(message: String) -> Reachability {
    Reachability {
        reachable: false,
        message,
    }
}

/// Maps a transport failure onto the categories surfaced to the user.
fn categorize_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Connection timeout - website is not responding".to_string()
    } else if error.is_connect() {
        "Connection failed - website appears to be down".to_string()
    } else {
        let text = error.to_string();
        if text.to_lowercase().contains("certificate") || text.to_lowercase().contains("tls") {
            format!("TLS certificate error: {text}")
        } else {
            format!("Network error: {text}")
        }
    }
}
