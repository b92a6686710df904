// src/core/verdict.rs

use crate::core::config::SCORE_WEIGHTS;
use crate::core::models::{CheckName, CheckResult, CheckStatus, Exclusion, ScanReport};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Combines the raw module results into the final report.
///
/// Modules that abstained or failed are excluded from both the weighted sum
/// and the weight denominator: a module with no opinion must not drag the
/// score toward zero, and removing it only shifts the denominator. With
/// every module excluded the final score degenerates to 0.0, which stays
/// distinguishable from a genuine zero verdict through the `excluded` map.
pub fn aggregate(outcomes: &BTreeMap<CheckName, CheckResult>) -> ScanReport {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut component_scores: BTreeMap<CheckName, f64> = BTreeMap::new();
    let mut details: BTreeMap<CheckName, Vec<String>> = BTreeMap::new();
    let mut excluded: BTreeMap<CheckName, Exclusion> = BTreeMap::new();

    for (name, weight) in SCORE_WEIGHTS {
        let Some(result) = outcomes.get(name) else {
            // The orchestrator always delivers all nine; a hole means its
            // task result was lost entirely.
            debug!(module = %name, "No outcome delivered, treating as error.");
            component_scores.insert(*name, 0.0);
            details.insert(*name, vec!["Error: no result delivered".to_string()]);
            excluded.insert(*name, Exclusion::Error);
            continue;
        };

        details.insert(*name, result.presentable_details());

        match (result.status, result.score) {
            (CheckStatus::Ok, Some(score)) => {
                let score = score.clamp(0.0, 1.0);
                weighted_sum += score * weight;
                total_weight += weight;
                component_scores.insert(*name, round1(score * 10.0));
                excluded.insert(*name, Exclusion::Included);
            }
            (CheckStatus::NoData, _) | (CheckStatus::Ok, None) => {
                debug!(module = %name, "Excluding module (no data).");
                component_scores.insert(*name, 0.0);
                excluded.insert(*name, Exclusion::NoData);
            }
            (CheckStatus::Error, _) => {
                debug!(module = %name, "Excluding module (error).");
                component_scores.insert(*name, 0.0);
                excluded.insert(*name, Exclusion::Error);
            }
        }
    }

    let final_score = if total_weight > 0.0 {
        round2(weighted_sum / total_weight * 5.0)
    } else {
        0.0
    };

    info!(
        final_score,
        included = excluded.values().filter(|e| **e == Exclusion::Included).count(),
        "Verdict aggregated."
    );
    ScanReport {
        final_score: Some(final_score),
        component_scores,
        details,
        excluded,
        connection_error: None,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
