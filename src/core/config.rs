// src/core/config.rs

use crate::core::models::CheckName;
use std::time::Duration;

/// Per-module weights applied by the verdict aggregator. The sum is
/// arbitrary; it is normalized at aggregation time by the total weight of
/// the modules that actually produced a score.
pub static SCORE_WEIGHTS: &[(CheckName, f64)] = &[
    (CheckName::Certificate, 0.6),
    (CheckName::ServerReliability, 0.8),
    (CheckName::DomainAge, 1.0),
    (CheckName::DomainPattern, 0.8),
    (CheckName::HtmlHeuristic, 0.7),
    (CheckName::ProtocolSecurity, 0.8),
    (CheckName::AiContentAnalysis, 1.5),
    (CheckName::ReputationDatabase, 2.0),
    (CheckName::UserReview, 0.1),
];

/// Weight for a single module.
pub fn weight_for(name: CheckName) -> f64 {
    SCORE_WEIGHTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, w)| *w)
        .unwrap_or(0.0)
}

/// User-tunable knobs for one scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Budget for a single module attempt. The hard per-module ceiling is
    /// `timeout * (retry_count + 1)`.
    pub timeout: Duration,
    /// Additional attempts after the first, with exponential backoff.
    pub retry_count: u32,
    /// Whether to run the best-effort screenshot side channel.
    pub screenshot_enabled: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_count: 3,
            screenshot_enabled: true,
        }
    }
}

impl ScanOptions {
    /// Hard ceiling for one module including all of its retries.
    pub fn module_budget(&self) -> Duration {
        self.timeout * (self.retry_count + 1)
    }
}
