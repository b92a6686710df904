// src/core/services/whois.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};
use whois_rust::{WhoIs, WhoIsLookupOptions};

// TLD -> WHOIS server map embedded at compile time so lookups work without
// any runtime configuration.
static WHOIS: Lazy<WhoIs> = Lazy::new(|| {
    WhoIs::from_string(include_str!("whois_servers.json"))
        .expect("embedded WHOIS server list is valid JSON")
});

/// Registration and expiration dates extracted from a WHOIS response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhoisDates {
    pub registration_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

/// Looks up the registration and expiration dates of a domain.
///
/// Total: lookup failures come back as empty dates, since a missing WHOIS
/// answer is ordinary (rate limits, privacy proxies, uncooperative
/// registries) and is handled downstream as a no-data condition.
pub async fn lookup_dates(domain: &str) -> WhoisDates {
    // The .vn registry blocks automated queries outright; asking would only
    // burn the timeout budget.
    if domain.rsplit('.').next() == Some("vn") {
        debug!(domain, "Skipping WHOIS for .vn domain (registry blocks automated queries).");
        return WhoisDates::default();
    }

    let domain_owned = domain.to_string();
    let raw = spawn_blocking(move || {
        let options = WhoIsLookupOptions::from_string(&domain_owned)
            .map_err(|e| format!("bad lookup target: {e:?}"))?;
        WHOIS
            .lookup(options)
            .map_err(|e| format!("WHOIS query failed: {e:?}"))
    })
    .await;

    match raw {
        Ok(Ok(response)) => {
            let dates = parse_whois_dates(&response);
            debug!(
                domain,
                registration = ?dates.registration_date,
                expiration = ?dates.expiration_date,
                "WHOIS lookup finished."
            );
            dates
        }
        Ok(Err(e)) => {
            warn!(domain, error = %e, "WHOIS lookup failed.");
            WhoisDates::default()
        }
        Err(e) => {
            warn!(domain, error = %e, "WHOIS lookup task panicked.");
            WhoisDates::default()
        }
    }
}

/// Line-based extraction of the creation/expiry dates from a raw WHOIS
/// response. Registries disagree on field names; the common spellings are
/// all accepted.
fn parse_whois_dates(raw: &str) -> WhoisDates {
    let mut dates = WhoisDates::default();

    for line in raw.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "creation date" | "created" | "registered" | "registered on" | "registration time" => {
                if dates.registration_date.is_none() {
                    dates.registration_date = parse_date(value);
                }
            }
            "registry expiry date" | "expiration date" | "expires" | "expiry date"
            | "expire date" | "paid-till" => {
                if dates.expiration_date.is_none() {
                    dates.expiration_date = parse_date(value);
                }
            }
            _ => {}
        }
    }

    dates
}

/// Parses the date formats registries actually emit: ISO timestamps
/// (`1997-09-15T04:00:00Z`), bare dates, and the older `15-Sep-1997` style.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let head: String = value.chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&head, "%Y.%m.%d"))
        .or_else(|_| NaiveDate::parse_from_str(value, "%d-%b-%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_timestamp_fields() {
        let raw = "\
   Domain Name: EXAMPLE.COM\n\
   Creation Date: 1997-09-15T04:00:00Z\n\
   Registry Expiry Date: 2028-09-14T04:00:00Z\n\
   Registrar: Example Registrar LLC\n";
        let dates = parse_whois_dates(raw);
        assert_eq!(
            dates.registration_date,
            NaiveDate::from_ymd_opt(1997, 9, 15)
        );
        assert_eq!(dates.expiration_date, NaiveDate::from_ymd_opt(2028, 9, 14));
    }

    #[test]
    fn parses_legacy_day_month_year_fields() {
        let raw = "created: 03-Feb-2001\nexpires: 03-Feb-2030\n";
        let dates = parse_whois_dates(raw);
        assert_eq!(dates.registration_date, NaiveDate::from_ymd_opt(2001, 2, 3));
        assert_eq!(dates.expiration_date, NaiveDate::from_ymd_opt(2030, 2, 3));
    }

    #[test]
    fn first_occurrence_wins_when_fields_repeat() {
        let raw = "Creation Date: 2010-01-01\nCreation Date: 2015-06-06\n";
        let dates = parse_whois_dates(raw);
        assert_eq!(dates.registration_date, NaiveDate::from_ymd_opt(2010, 1, 1));
    }

    #[test]
    fn unparseable_responses_yield_empty_dates() {
        let dates = parse_whois_dates("No match for domain \"EXAMPLE.INVALID\".\n");
        assert_eq!(dates, WhoisDates::default());
    }
}
