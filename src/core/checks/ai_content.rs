// src/core/checks/ai_content.rs

use crate::core::models::{CheckResult, PageContent};
use crate::core::services::classifier::{ClassifierClient, ClassifyOutcome, ContentClassification};
use color_eyre::eyre::Result;
use std::time::Duration;
use tracing::{debug, info};

/// Maximum severity on the classifier's rubric.
const MAX_SEVERITY: f64 = 4.0;
/// Severity at which a category is called out as a notable risk.
const NOTABLE_SEVERITY: f64 = 2.0;
/// Score ceiling applied when brand impersonation is detected, regardless of
/// how clean the content otherwise looks.
const IMPERSONATION_CAP: f64 = 0.2;

/// Text passed through unchanged up to this many characters.
const PASSTHROUGH_CHARS: usize = 5000;
const TRUNCATE_HEAD_CHARS: usize = 3000;
const TRUNCATE_TAIL_CHARS: usize = 2000;

/// Phrases that reveal the fetched text is a bot wall, not the site itself.
/// Classifying a CAPTCHA page would judge the wall, not the site.
const BLOCK_SIGNATURES: &[(&str, &[&str])] = &[
    (
        "cloudflare",
        &[
            "cloudflare",
            "cf-ray",
            "checking your browser",
            "attention required!",
        ],
    ),
    (
        "recaptcha",
        &["recaptcha", "g-recaptcha", "verify you are human"],
    ),
    ("hcaptcha", &["hcaptcha", "are you a human"]),
    (
        "captcha",
        &["captcha", "please complete the security check"],
    ),
    (
        "access denied",
        &["access denied", "you don't have permission to access"],
    ),
    (
        "bot protection",
        &["bot protection", "client blocked", "checking the browser before accessing"],
    ),
];

/// Runs the AI content analysis over the shared page text.
///
/// Empty text, bot walls, and rate-limited keys all abstain; only an
/// unclassifiable service fault degrades to an included neutral score.
pub async fn run(url: &str, page: &PageContent, timeout: Duration) -> Result<CheckResult> {
    let text = page.extracted_text.trim();
    if text.is_empty() {
        debug!("No extracted text, abstaining from AI analysis.");
        return Ok(CheckResult::no_data(vec![
            "No data available - unable to extract website content".to_string(),
        ]));
    }

    if let Some(reason) = detect_block_signature(text) {
        info!(reason, "Page text is a bot wall, abstaining from AI analysis.");
        return Ok(CheckResult::no_data(vec![format!(
            "No data available - page is behind a bot wall ({reason})"
        )]));
    }

    let client = ClassifierClient::from_env(timeout)?;
    match client.classify(url, &truncate_for_model(text)).await {
        ClassifyOutcome::Classified(classification) => Ok(score_classification(&classification)),
        ClassifyOutcome::RateLimited => Ok(CheckResult::no_data(vec![
            "No data available - AI service rate limited".to_string(),
        ])),
        ClassifyOutcome::Unavailable(message) => Ok(CheckResult::scored(
            0.5,
            vec![
                "AI analysis status: unable to analyze (service unavailable)".to_string(),
                format!("Reason: {message}"),
            ],
        )),
    }
}

/// First block-wall vendor whose signature appears in the text.
fn detect_block_signature(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    for (reason, phrases) in BLOCK_SIGNATURES {
        if phrases.iter().any(|phrase| lower.contains(phrase)) {
            return Some(reason);
        }
    }
    None
}

/// Keeps short texts intact; long ones keep their head and tail, which is
/// where titles, warnings, and footers live.
fn truncate_for_model(text: &str) -> String {
    let total = text.chars().count();
    if total <= PASSTHROUGH_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(TRUNCATE_HEAD_CHARS).collect();
    let tail: String = text
        .chars()
        .skip(total - TRUNCATE_TAIL_CHARS)
        .collect();
    format!("{head}...{tail}")
}

/// Converts the classifier's severity scores into the module sub-score.
///
/// Each category contributes its inverted severity; the mean is normalized
/// to [0.0, 1.0]. Detected brand impersonation caps the result low no
/// matter what: a pixel-perfect clone of a bank is dangerous precisely
/// because its content looks clean.
fn score_classification(classification: &ContentClassification) -> CheckResult {
    let scores = &classification.scores;
    let categories = [
        ("Sexual", scores.sexual),
        ("Violence", scores.violence),
        ("Hate", scores.hate),
        ("Self-harm", scores.self_harm),
    ];

    let safe_sum: f64 = categories
        .iter()
        .map(|(_, severity)| (MAX_SEVERITY - severity.clamp(0.0, MAX_SEVERITY)).max(0.0))
        .sum();
    let mut safety = safe_sum / categories.len() as f64 / MAX_SEVERITY;

    let mut details: Vec<String> = Vec::new();

    let notable: Vec<String> = categories
        .iter()
        .filter(|(_, severity)| *severity >= NOTABLE_SEVERITY)
        .map(|(label, severity)| format!("{label} ({severity:.0})"))
        .collect();
    if !notable.is_empty() {
        details.push(format!(
            "Notable risks (level >= {NOTABLE_SEVERITY:.0}): {}",
            notable.join(", ")
        ));
    } else if safety < 1.0 {
        details.push("Content status: minor flags detected".to_string());
    } else {
        details.push("Content status: safe content".to_string());
    }

    let brand = classification.impersonated_brand.trim();
    if !brand.is_empty()
        && !["none", "n/a", "unknown", "null"].contains(&brand.to_lowercase().as_str())
    {
        safety = safety.min(IMPERSONATION_CAP);
        details.push(format!(
            "CRITICAL: potential impersonation of brand '{brand}'"
        ));
    }

    if !classification.content_summary.is_empty() {
        details.push(format!("Summary: {}", classification.content_summary));
    }
    if !classification.reasoning.is_empty() {
        details.push(format!("AI analysis: {}", classification.reasoning));
    }
    if !classification.content_keywords.is_empty() {
        let keywords: Vec<&str> = classification
            .content_keywords
            .iter()
            .take(5)
            .map(String::as_str)
            .collect();
        details.push(format!("Keywords: {}", keywords.join(", ")));
    }
    if !classification.alternative_recommendations.is_empty() {
        let names: Vec<&str> = classification
            .alternative_recommendations
            .iter()
            .map(|alt| alt.name.as_str())
            .collect();
        details.push(format!("Alternatives: {}", names.join(", ")));
    }

    CheckResult::scored((safety * 100.0).round() / 100.0, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::classifier::CategoryScores;

    fn classification(
        sexual: f64,
        violence: f64,
        hate: f64,
        self_harm: f64,
        brand: &str,
    ) -> ContentClassification {
        ContentClassification {
            scores: CategoryScores {
                sexual,
                violence,
                hate,
                self_harm,
            },
            impersonated_brand: brand.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn benign_content_scores_perfect() {
        let result = score_classification(&classification(0.0, 0.0, 0.0, 0.0, "N/A"));
        assert_eq!(result.score, Some(1.0));
        assert!(result.details[0].contains("safe content"));
    }

    #[test]
    fn severe_content_in_every_category_scores_zero() {
        let result = score_classification(&classification(4.0, 4.0, 4.0, 4.0, "N/A"));
        assert_eq!(result.score, Some(0.0));
        assert!(result.details[0].contains("Notable risks"));
    }

    #[test]
    fn moderate_flags_reduce_the_score_proportionally() {
        // Mean inverted severity: (2 + 4 + 4 + 4) / 4 / 4 = 0.875
        let result = score_classification(&classification(2.0, 0.0, 0.0, 0.0, "N/A"));
        assert_eq!(result.score, Some(0.88));
        assert!(result.details[0].contains("Sexual (2)"));
    }

    #[test]
    fn impersonation_caps_even_clean_content() {
        let result = score_classification(&classification(0.0, 0.0, 0.0, 0.0, "PayPal"));
        assert_eq!(result.score, Some(0.2));
        assert!(result.details.iter().any(|d| d.contains("PayPal")));
    }

    #[test]
    fn placeholder_brand_values_do_not_cap() {
        for brand in ["none", "N/A", "Unknown", "null", ""] {
            let result = score_classification(&classification(0.0, 0.0, 0.0, 0.0, brand));
            assert_eq!(result.score, Some(1.0), "brand {brand:?} capped the score");
        }
    }

    #[test]
    fn out_of_range_severities_are_clamped() {
        let result = score_classification(&classification(9.0, -3.0, 0.0, 0.0, "N/A"));
        // 9 clamps to 4 (fully unsafe), -3 clamps to 0 (fully safe).
        assert_eq!(result.score, Some(0.75));
    }

    #[test]
    fn short_text_passes_through_unchanged() {
        let text = "a".repeat(4000);
        assert_eq!(truncate_for_model(&text), text);
    }

    #[test]
    fn long_text_keeps_head_and_tail() {
        let text = format!("{}{}", "h".repeat(6000), "t".repeat(2000));
        let truncated = truncate_for_model(&text);
        assert_eq!(truncated.chars().count(), 3000 + 3 + 2000);
        assert!(truncated.starts_with("hhh"));
        assert!(truncated.ends_with("ttt"));
    }

    #[test]
    fn bot_wall_signatures_are_detected() {
        assert_eq!(
            detect_block_signature("Checking your browser before accessing the site"),
            Some("cloudflare")
        );
        assert_eq!(
            detect_block_signature("Please solve this CAPTCHA to continue"),
            Some("captcha")
        );
        assert_eq!(detect_block_signature("Fresh garden vegetables for sale"), None);
    }
}
