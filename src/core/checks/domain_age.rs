// src/core/checks/domain_age.rs

use crate::core::models::{CheckResult, SiteFacts};
use chrono::{NaiveDate, Utc};
use tracing::debug;

const DAYS_PER_YEAR: f64 = 365.25;

/// Scores the target by the age of its domain registration.
///
/// Phishing domains are overwhelmingly young, so the score is proportional
/// to age for domains under one year old and capped at 1.0 from the first
/// anniversary on.
pub fn score_domain_age(facts: Option<&SiteFacts>) -> CheckResult {
    let Some(facts) = facts else {
        return CheckResult::error(vec![
            "Site facts unavailable - WHOIS/DNS lookups did not complete".to_string(),
        ]);
    };
    score_domain_age_as_of(facts.registration_date, Utc::now().date_naive())
}

/// Age scoring against an explicit reference date.
fn score_domain_age_as_of(registration_date: Option<NaiveDate>, today: NaiveDate) -> CheckResult {
    let Some(registered) = registration_date else {
        debug!("No registration date available, abstaining.");
        return CheckResult::no_data(vec![
            "Registration date not available from WHOIS".to_string(),
            "Module excluded from final score calculation".to_string(),
        ]);
    };

    let age_days = (today - registered).num_days();
    let age_years = age_days as f64 / DAYS_PER_YEAR;
    let (score, qualifier) = if age_years >= 1.0 {
        (1.0, "maximum")
    } else {
        (age_years.max(0.0), "proportional")
    };

    debug!(age_days, age_years, score, "Domain age scoring finished.");
    let details = vec![
        format!(
            "Domain age: {age_years:.2} years ({} 1 year)",
            if age_years >= 1.0 { ">=" } else { "<" }
        ),
        format!("Score: {score:.2}/1.0 ({qualifier})"),
        format!("Registered: {}", registered.format("%d-%m-%Y")),
        format!("Age: {age_days} days ({age_years:.2} years)"),
    ];
    CheckResult::scored(score, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CheckStatus;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn mature_domains_score_the_maximum() {
        let result = score_domain_age_as_of(Some(day(2005, 6, 1)), day(2026, 6, 1));
        assert_eq!(result.score, Some(1.0));
        assert!(result.details[1].contains("maximum"));
    }

    #[test]
    fn young_domains_score_proportionally() {
        // Half a year old: roughly 0.5.
        let result = score_domain_age_as_of(Some(day(2026, 1, 1)), day(2026, 7, 2));
        let score = result.score.unwrap();
        assert!((0.45..0.55).contains(&score), "score was {score}");
        assert!(result.details[1].contains("proportional"));
    }

    #[test]
    fn week_old_domains_score_near_zero() {
        let result = score_domain_age_as_of(Some(day(2026, 7, 25)), day(2026, 8, 1));
        assert!(result.score.unwrap() <= 0.1);
    }

    #[test]
    fn future_registration_dates_floor_at_zero() {
        let result = score_domain_age_as_of(Some(day(2027, 1, 1)), day(2026, 8, 1));
        assert_eq!(result.score, Some(0.0));
    }

    #[test]
    fn missing_registration_date_abstains() {
        let result = score_domain_age_as_of(None, day(2026, 8, 1));
        assert_eq!(result.status, CheckStatus::NoData);
        assert_eq!(result.score, None);
    }

    #[test]
    fn missing_site_facts_is_an_error() {
        let result = score_domain_age(None);
        assert_eq!(result.status, CheckStatus::Error);
    }
}
