// src/core/models.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use strum::{Display, EnumIter};

/// Placeholder used whenever a details list would otherwise be presented empty.
pub const NO_DETAILS_PLACEHOLDER: &str = "Status: No data available";

// --- Check Identity ---

/// The fixed set of check modules. Every scan dispatches exactly these nine;
/// the variant doubles as the key in every per-module map of the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum CheckName {
    #[strum(serialize = "Certificate details")]
    Certificate,
    #[strum(serialize = "Protocol security")]
    ProtocolSecurity,
    #[strum(serialize = "Domain pattern")]
    DomainPattern,
    #[strum(serialize = "HTML content and behavior")]
    HtmlHeuristic,
    #[strum(serialize = "Reputation databases")]
    ReputationDatabase,
    #[strum(serialize = "Server reliability")]
    ServerReliability,
    #[strum(serialize = "Domain age")]
    DomainAge,
    #[strum(serialize = "AI content analysis")]
    AiContentAnalysis,
    #[strum(serialize = "User reviews")]
    UserReview,
}

// --- Check Results ---

/// Outcome classification carried explicitly on every result. Status is never
/// inferred from the wording of the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    /// The module produced an opinion; `score` is `Some` and participates in
    /// the weighted aggregate.
    Ok,
    /// The module deliberately abstained (no reviews yet, empty page text,
    /// rate-limited classifier). Excluded from aggregation.
    NoData,
    /// The module failed after exhausting its retries. Excluded from
    /// aggregation, shown distinctly from no-data.
    Error,
}

/// Output of one check module: a sub-score in [0.0, 1.0] (or none), the
/// explicit status, and human-readable detail lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub score: Option<f64>,
    pub status: CheckStatus,
    pub details: Vec<String>,
}

impl CheckResult {
    /// A scored result. The score is clamped into [0.0, 1.0] defensively so
    /// no module can push the aggregate out of range.
    pub fn scored(score: f64, details: Vec<String>) -> Self {
        Self {
            score: Some(score.clamp(0.0, 1.0)),
            status: CheckStatus::Ok,
            details,
        }
    }

    /// A deliberate abstention. Carries no score so the aggregator excludes
    /// the module instead of treating it as zero.
    pub fn no_data(details: Vec<String>) -> Self {
        Self {
            score: None,
            status: CheckStatus::NoData,
            details,
        }
    }

    /// A failure result, synthesized by the orchestrator when a module
    /// exhausts its retries or by a module that cannot obtain its inputs.
    pub fn error(details: Vec<String>) -> Self {
        Self {
            score: None,
            status: CheckStatus::Error,
            details,
        }
    }

    /// Details for presentation; never empty.
    pub fn presentable_details(&self) -> Vec<String> {
        if self.details.is_empty() {
            vec![NO_DETAILS_PLACEHOLDER.to_string()]
        } else {
            self.details.clone()
        }
    }
}

/// One module's result as stored by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutcome {
    pub name: CheckName,
    pub result: CheckResult,
}

// --- Aggregated Report ---

/// Why a module is (or is not) part of the weighted aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exclusion {
    Included,
    Error,
    NoData,
}

/// Presentation bands for the final 0-5 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustBand {
    Unreachable,
    PotentiallyUnsafe,
    UseWithCaution,
    CanBeTrusted,
}

impl TrustBand {
    pub fn from_final_score(score: Option<f64>) -> Self {
        match score {
            None => TrustBand::Unreachable,
            Some(s) if s < 3.0 => TrustBand::PotentiallyUnsafe,
            Some(s) if s <= 4.0 => TrustBand::UseWithCaution,
            Some(_) => TrustBand::CanBeTrusted,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrustBand::Unreachable => "CANNOT CONNECT",
            TrustBand::PotentiallyUnsafe => "POTENTIALLY UNSAFE",
            TrustBand::UseWithCaution => "USE WITH CAUTION",
            TrustBand::CanBeTrusted => "CAN BE TRUSTED",
        }
    }
}

/// Final output of a scan, immutable once returned.
///
/// `final_score` is `None` only for unreachable targets, which is distinct
/// from a genuine 0.0 verdict. Displayed sub-scores are on a 0-10 scale with
/// excluded modules shown as 0.0 and flagged in `excluded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub final_score: Option<f64>,
    pub component_scores: BTreeMap<CheckName, f64>,
    pub details: BTreeMap<CheckName, Vec<String>>,
    pub excluded: BTreeMap<CheckName, Exclusion>,
    /// Set only when the connectivity pre-check failed; no module ran.
    pub connection_error: Option<String>,
}

impl ScanReport {
    /// Report for a target that failed the connectivity pre-check.
    pub fn unreachable(message: String) -> Self {
        Self {
            final_score: None,
            component_scores: BTreeMap::new(),
            details: BTreeMap::new(),
            excluded: BTreeMap::new(),
            connection_error: Some(message),
        }
    }

    pub fn band(&self) -> TrustBand {
        TrustBand::from_final_score(self.final_score)
    }
}

/// A completed scan: the aggregated report plus any screenshot artifacts.
/// Screenshots are a pure side channel and never influence the score.
#[derive(Debug, Clone)]
pub struct ScanVerdict {
    pub report: ScanReport,
    pub screenshots: Vec<ScreenshotArtifact>,
}

// --- Shared Fetch Types ---

/// Page content fetched once per scan and shared read-only by the
/// HTML-heuristic and AI modules.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub raw_html: String,
    pub extracted_text: String,
}

impl PageContent {
    pub fn is_empty(&self) -> bool {
        self.raw_html.is_empty() && self.extracted_text.is_empty()
    }
}

/// Geolocation facts for a hosting IP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub isp: Option<String>,
}

impl GeoInfo {
    /// City/region/country components that are actually present, in that
    /// order. Drives the location-completeness scoring.
    pub fn location_components(&self) -> Vec<&str> {
        [&self.city, &self.region, &self.country]
            .into_iter()
            .filter_map(|c| c.as_deref())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Result of following the target's HTTP redirects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Redirection {
    NoRedirect,
    /// Every URL visited, starting URL included.
    Chain(Vec<String>),
    /// All attempts failed; the server may block automated requests.
    Unavailable,
}

/// Auxiliary facts about the target, fetched once per scan and shared
/// read-only by the domain-age and server-reliability modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteFacts {
    pub registration_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub ip_addresses: Vec<Ipv4Addr>,
    pub geo: Option<GeoInfo>,
    pub redirect: Redirection,
}

// --- Collaborator Types ---

/// One user review of a URL, owned by the review-store collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Rating on the 0-10 scale used by the review UI.
    pub score: u8,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
}

/// One captured screenshot, reported beside the scan result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    pub label: String,
    pub path: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scored_results_are_clamped() {
        assert_eq!(CheckResult::scored(1.7, Vec::new()).score, Some(1.0));
        assert_eq!(CheckResult::scored(-0.3, Vec::new()).score, Some(0.0));
        assert_eq!(CheckResult::scored(0.42, Vec::new()).score, Some(0.42));
    }

    #[test]
    fn no_data_carries_no_score() {
        let result = CheckResult::no_data(vec!["No reviews yet".into()]);
        assert_eq!(result.score, None);
        assert_eq!(result.status, CheckStatus::NoData);
    }

    #[test]
    fn empty_details_get_a_placeholder() {
        let result = CheckResult::scored(0.5, Vec::new());
        assert_eq!(result.presentable_details(), vec![NO_DETAILS_PLACEHOLDER]);
    }

    #[test]
    fn trust_bands_match_the_thresholds() {
        assert_eq!(TrustBand::from_final_score(None), TrustBand::Unreachable);
        assert_eq!(
            TrustBand::from_final_score(Some(2.99)),
            TrustBand::PotentiallyUnsafe
        );
        assert_eq!(
            TrustBand::from_final_score(Some(3.0)),
            TrustBand::UseWithCaution
        );
        assert_eq!(
            TrustBand::from_final_score(Some(4.0)),
            TrustBand::UseWithCaution
        );
        assert_eq!(
            TrustBand::from_final_score(Some(4.01)),
            TrustBand::CanBeTrusted
        );
    }
}
