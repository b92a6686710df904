// src/core/checks/mod.rs

// The nine check modules. Each one is total in spirit (expected faults are
// converted to structured results inside the module) and returns `Err` only
// for genuinely unexpected conditions, which the retry wrapper and the
// orchestrator then contain.

pub mod ai_content;
pub mod certificate;
pub mod domain_age;
pub mod domain_pattern;
pub mod html_heuristic;
pub mod protocol;
pub mod reputation;
pub mod server_reliability;
pub mod user_review;

use crate::core::models::{CheckName, CheckResult, PageContent, Review, SiteFacts};
use color_eyre::eyre::Result;
use std::sync::Arc;
use std::time::Duration;

/// Read-only inputs shared by all concurrently running checks. Cloning is
/// cheap; the heavyweight members sit behind `Arc`s and nothing in here is
/// ever mutated during a scan.
#[derive(Clone)]
pub struct CheckContext {
    /// Full URL being scanned (with scheme).
    pub url: String,
    /// Hostname extracted from the URL.
    pub host: String,
    /// Page HTML and extracted text, fetched once.
    pub page: Arc<PageContent>,
    /// WHOIS/DNS/geo/redirect facts, fetched once. `None` when the facts
    /// fetch itself failed or timed out.
    pub facts: Arc<Option<SiteFacts>>,
    /// Reviews recorded for the parent host.
    pub reviews: Arc<Vec<Review>>,
    /// Budget for a single module attempt.
    pub timeout: Duration,
}

/// Dispatches one named check against the shared context.
pub async fn run_check(name: CheckName, ctx: &CheckContext) -> Result<CheckResult> {
    match name {
        CheckName::Certificate => certificate::run(&ctx.host, ctx.timeout).await,
        CheckName::ProtocolSecurity => protocol::run(&ctx.host, ctx.timeout).await,
        CheckName::DomainPattern => Ok(domain_pattern::analyze_domain_pattern(&ctx.host)),
        CheckName::HtmlHeuristic => {
            // DOM parsing is blocking CPU work on an unbounded input.
            let page = Arc::clone(&ctx.page);
            let url = ctx.url.clone();
            let result =
                tokio::task::spawn_blocking(move || html_heuristic::analyze_html(&page.raw_html, &url))
                    .await?;
            Ok(result)
        }
        CheckName::ReputationDatabase => reputation::run(&ctx.host, &ctx.url, ctx.timeout).await,
        CheckName::ServerReliability => Ok(server_reliability::score_server_reliability(
            (*ctx.facts).as_ref(),
        )),
        CheckName::DomainAge => Ok(domain_age::score_domain_age((*ctx.facts).as_ref())),
        CheckName::AiContentAnalysis => ai_content::run(&ctx.url, &ctx.page, ctx.timeout).await,
        CheckName::UserReview => Ok(user_review::score_reviews(&ctx.reviews)),
    }
}
