// src/core/checks/reputation.rs

use crate::core::models::CheckResult;
use color_eyre::eyre::Result;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const VIRUSTOTAL_ENDPOINT: &str = "https://www.virustotal.com/api/v3/domains";
const SAFE_BROWSING_ENDPOINT: &str =
    "https://safebrowsing.googleapis.com/v4/threatMatches:find";

/// Penalty per flagging vendor. Five or more flags zero the score outright.
const PENALTY_PER_FLAG: f64 = 0.2;
const HIGH_RISK_FLAGS: u32 = 5;

/// What one reputation feed had to say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Vendors flagged the target; counts feed the penalty directly instead
    /// of being round-tripped through display text.
    Flagged { malicious: u32, suspicious: u32 },
    Clean,
    /// The feed answered but has never seen the domain.
    NotFound,
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct FeedReport {
    pub source: &'static str,
    pub outcome: FeedOutcome,
}

impl FeedReport {
    fn description(&self) -> String {
        match &self.outcome {
            FeedOutcome::Flagged {
                malicious,
                suspicious,
            } => {
                if *malicious > 0 {
                    format!("flagged as MALICIOUS by {malicious} vendor(s)")
                } else {
                    format!("flagged as SUSPICIOUS by {suspicious} vendor(s)")
                }
            }
            FeedOutcome::Clean => "clean".to_string(),
            FeedOutcome::NotFound => "domain not found in database".to_string(),
            FeedOutcome::Unavailable(reason) => reason.clone(),
        }
    }

    fn flags(&self) -> u32 {
        match &self.outcome {
            FeedOutcome::Flagged {
                malicious,
                suspicious,
            } => malicious + suspicious,
            _ => 0,
        }
    }

    fn answered(&self) -> bool {
        !matches!(self.outcome, FeedOutcome::Unavailable(_))
    }
}

/// Consults both reputation feeds in parallel and combines their verdicts.
///
/// The feeds are independent: one failing never blocks the other. Keys come
/// from `TRUSTSCAN_VT_API_KEY` and `TRUSTSCAN_GSB_API_KEY`.
pub async fn run(hostname: &str, full_url: &str, timeout: Duration) -> Result<CheckResult> {
    let http = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout.min(Duration::from_secs(10)))
        .build()?;
    let vt_key = std::env::var("TRUSTSCAN_VT_API_KEY").ok().filter(|k| !k.is_empty());
    let gsb_key = std::env::var("TRUSTSCAN_GSB_API_KEY").ok().filter(|k| !k.is_empty());

    let (vt, gsb) = tokio::join!(
        query_virustotal(&http, vt_key.as_deref(), hostname),
        query_safe_browsing(&http, gsb_key.as_deref(), full_url),
    );
    Ok(combine_feeds(&vt, &gsb))
}

/// Folds the two feed reports into the module result.
pub fn combine_feeds(vt: &FeedReport, gsb: &FeedReport) -> CheckResult {
    let mut details = vec![
        format!("{}: {}", vt.source, vt.description()),
        format!("{}: {}", gsb.source, gsb.description()),
    ];

    // Unknown must not move the score in either direction.
    if !vt.answered() && !gsb.answered() {
        debug!("Both reputation feeds unavailable, abstaining.");
        details.push("No data available - reputation feeds unreachable".to_string());
        details.push("Module excluded from final score calculation".to_string());
        return CheckResult::no_data(details);
    }

    let total_flags = vt.flags() + gsb.flags();
    let score = (1.0 - f64::from(total_flags) * PENALTY_PER_FLAG).max(0.0);

    if total_flags >= HIGH_RISK_FLAGS {
        details.push(format!(
            "Verdict: HIGH RISK - flagged by {total_flags} sources (score 0.0)"
        ));
    } else if total_flags > 0 {
        details.push(format!(
            "Verdict: WARNING - flagged by {total_flags} source(s) (score {score:.1})"
        ));
    } else {
        details.push("Verdict: clean - no threats detected".to_string());
    }

    info!(total_flags, score, "Reputation scoring finished.");
    CheckResult::scored(score, details)
}

/// VirusTotal v3 domain report: vendor counts from `last_analysis_stats`.
async fn query_virustotal(
    http: &reqwest::Client,
    api_key: Option<&str>,
    hostname: &str,
) -> FeedReport {
    let source = "VirusTotal";
    let Some(api_key) = api_key else {
        return FeedReport {
            source,
            outcome: FeedOutcome::Unavailable("API key not configured".to_string()),
        };
    };

    let url = format!("{VIRUSTOTAL_ENDPOINT}/{hostname}");
    let response = match http.get(&url).header("x-apikey", api_key).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(source, error = %e, "Reputation feed request failed.");
            return FeedReport {
                source,
                outcome: FeedOutcome::Unavailable("connection error".to_string()),
            };
        }
    };

    match response.status().as_u16() {
        200 => {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let stats = body.pointer("/data/attributes/last_analysis_stats");
            let malicious = stats
                .and_then(|s| s.get("malicious"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            let suspicious = stats
                .and_then(|s| s.get("suspicious"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            debug!(source, malicious, suspicious, "Feed answered.");
            let outcome = if malicious + suspicious > 0 {
                FeedOutcome::Flagged {
                    malicious,
                    suspicious,
                }
            } else {
                FeedOutcome::Clean
            };
            FeedReport { source, outcome }
        }
        404 => FeedReport {
            source,
            outcome: FeedOutcome::NotFound,
        },
        status => FeedReport {
            source,
            outcome: FeedOutcome::Unavailable(format!("API error (status {status})")),
        },
    }
}

/// Google Safe Browsing v4 threat-match lookup for the full URL.
async fn query_safe_browsing(
    http: &reqwest::Client,
    api_key: Option<&str>,
    full_url: &str,
) -> FeedReport {
    let source = "Google Safe Browsing";
    let Some(api_key) = api_key else {
        return FeedReport {
            source,
            outcome: FeedOutcome::Unavailable("API key not configured".to_string()),
        };
    };

    let payload = json!({
        "client": {"clientId": "trustscan", "clientVersion": env!("CARGO_PKG_VERSION")},
        "threatInfo": {
            "threatTypes": [
                "MALWARE",
                "SOCIAL_ENGINEERING",
                "UNWANTED_SOFTWARE",
                "POTENTIALLY_HARMFUL_APPLICATION",
            ],
            "platformTypes": ["ANY_PLATFORM"],
            "threatEntryTypes": ["URL"],
            "threatEntries": [{"url": full_url}],
        },
    });

    let response = match http
        .post(format!("{SAFE_BROWSING_ENDPOINT}?key={api_key}"))
        .json(&payload)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(source, error = %e, "Reputation feed request failed.");
            return FeedReport {
                source,
                outcome: FeedOutcome::Unavailable("connection error".to_string()),
            };
        }
    };

    if !response.status().is_success() {
        let status = response.status().as_u16();
        return FeedReport {
            source,
            outcome: FeedOutcome::Unavailable(format!("API error (status {status})")),
        };
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let has_match = body
        .get("matches")
        .and_then(Value::as_array)
        .is_some_and(|m| !m.is_empty());
    if has_match {
        debug!(source, "Feed flagged the URL.");
        // A Safe Browsing hit is high-confidence; it counts as one
        // malicious vendor.
        FeedReport {
            source,
            outcome: FeedOutcome::Flagged {
                malicious: 1,
                suspicious: 0,
            },
        }
    } else {
        FeedReport {
            source,
            outcome: FeedOutcome::Clean,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CheckStatus;

    fn report(source: &'static str, outcome: FeedOutcome) -> FeedReport {
        FeedReport { source, outcome }
    }

    #[test]
    fn clean_feeds_score_perfect() {
        let result = combine_feeds(
            &report("VirusTotal", FeedOutcome::Clean),
            &report("Google Safe Browsing", FeedOutcome::Clean),
        );
        assert_eq!(result.score, Some(1.0));
        assert!(result.details.iter().any(|d| d.contains("clean - no threats")));
    }

    #[test]
    fn each_flag_costs_a_fifth() {
        let result = combine_feeds(
            &report(
                "VirusTotal",
                FeedOutcome::Flagged {
                    malicious: 2,
                    suspicious: 1,
                },
            ),
            &report("Google Safe Browsing", FeedOutcome::Clean),
        );
        assert!((result.score.unwrap() - 0.4).abs() < 1e-9);
        assert!(result.details.iter().any(|d| d.contains("WARNING")));
    }

    #[test]
    fn five_or_more_flags_zero_the_score() {
        let result = combine_feeds(
            &report(
                "VirusTotal",
                FeedOutcome::Flagged {
                    malicious: 7,
                    suspicious: 0,
                },
            ),
            &report(
                "Google Safe Browsing",
                FeedOutcome::Flagged {
                    malicious: 1,
                    suspicious: 0,
                },
            ),
        );
        assert_eq!(result.score, Some(0.0));
        assert!(result.details.iter().any(|d| d.contains("HIGH RISK")));
    }

    #[test]
    fn not_found_counts_as_an_answer_and_stays_clean() {
        let result = combine_feeds(
            &report("VirusTotal", FeedOutcome::NotFound),
            &report(
                "Google Safe Browsing",
                FeedOutcome::Unavailable("API key not configured".to_string()),
            ),
        );
        assert_eq!(result.score, Some(1.0));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn both_feeds_down_means_no_data() {
        let result = combine_feeds(
            &report(
                "VirusTotal",
                FeedOutcome::Unavailable("connection error".to_string()),
            ),
            &report(
                "Google Safe Browsing",
                FeedOutcome::Unavailable("API error (status 500)".to_string()),
            ),
        );
        assert_eq!(result.status, CheckStatus::NoData);
        assert_eq!(result.score, None);
    }

    #[test]
    fn one_working_feed_is_enough_to_score() {
        let result = combine_feeds(
            &report(
                "VirusTotal",
                FeedOutcome::Unavailable("connection error".to_string()),
            ),
            &report(
                "Google Safe Browsing",
                FeedOutcome::Flagged {
                    malicious: 1,
                    suspicious: 0,
                },
            ),
        );
        assert!((result.score.unwrap() - 0.8).abs() < 1e-9);
    }
}
