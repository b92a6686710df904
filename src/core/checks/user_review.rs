// src/core/checks/user_review.rs

use crate::core::models::{CheckResult, Review};
use std::collections::BTreeMap;
use tracing::debug;

/// Scores a site from its collected user reviews.
///
/// The score is the mean of the individual 0-10 ratings, normalized to
/// [0.0, 1.0]. A site with no reviews yet abstains: newly listed sites must
/// not be punished for being unknown.
pub fn score_reviews(reviews: &[Review]) -> CheckResult {
    if reviews.is_empty() {
        debug!("No reviews recorded, abstaining.");
        return CheckResult::no_data(vec![
            "No user reviews yet".to_string(),
            "Module excluded from final score calculation".to_string(),
        ]);
    }

    let sum: u32 = reviews.iter().map(|r| u32::from(r.score.min(10))).sum();
    let mean = f64::from(sum) / reviews.len() as f64;
    let score = mean / 10.0;

    // Rating distribution, highest rating first.
    let mut distribution: BTreeMap<u8, usize> = BTreeMap::new();
    for review in reviews {
        *distribution.entry(review.score.min(10)).or_default() += 1;
    }
    let details = distribution
        .iter()
        .rev()
        .map(|(rating, count)| format!("Rated {rating}: by {count} user(s)"))
        .collect();

    debug!(count = reviews.len(), mean, "User review scoring finished.");
    CheckResult::scored(score, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CheckStatus;
    use chrono::Utc;

    fn review(user: &str, score: u8) -> Review {
        Review {
            score,
            comment: String::new(),
            timestamp: Utc::now(),
            user_id: user.to_string(),
        }
    }

    #[test]
    fn zero_reviews_abstain_instead_of_scoring_zero() {
        let result = score_reviews(&[]);
        assert_eq!(result.score, None);
        assert_eq!(result.status, CheckStatus::NoData);
    }

    #[test]
    fn score_is_the_normalized_mean() {
        let reviews = vec![review("a", 8), review("b", 6), review("c", 10)];
        let result = score_reviews(&reviews);
        assert!((result.score.unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn distribution_lists_highest_rating_first() {
        let reviews = vec![review("a", 3), review("b", 9), review("c", 9)];
        let result = score_reviews(&reviews);
        assert_eq!(result.details[0], "Rated 9: by 2 user(s)");
        assert_eq!(result.details[1], "Rated 3: by 1 user(s)");
    }

    #[test]
    fn out_of_range_ratings_are_capped() {
        let reviews = vec![review("a", 250)];
        let result = score_reviews(&reviews);
        assert_eq!(result.score, Some(1.0));
    }
}
