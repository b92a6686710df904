// src/core/scan.rs

use crate::core::checks::{run_check, CheckContext};
use crate::core::config::ScanOptions;
use crate::core::connectivity::{check_reachable, PRECHECK_TIMEOUT};
use crate::core::fetchers::site_facts::fetch_site_facts;
use crate::core::fetchers::{fetch_page, host_of, normalize_url, parent_host};
use crate::core::models::{
    CheckName, CheckResult, ModuleOutcome, ScanReport, ScanVerdict, ScreenshotArtifact,
};
use crate::core::retry::with_retry;
use crate::core::services::reviews::ReviewStore;
use crate::core::services::screenshot::ScreenshotCapture;
use crate::core::verdict::aggregate;
use color_eyre::eyre::Result;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Scans a URL end to end: reachability gate, shared fetches, concurrent
/// check fan-out, and verdict aggregation.
///
/// The checks are latency-dominated network calls, so they all run at once
/// and the wall-clock cost of a scan approaches the slowest single module
/// rather than the sum. No module failure (error, panic, or timeout) ever
/// aborts the scan of the other eight.
pub async fn scan_url<R: ReviewStore>(
    url: &str,
    options: &ScanOptions,
    review_store: &R,
    screenshotter: Option<Arc<dyn ScreenshotCapture>>,
) -> ScanVerdict {
    let target = normalize_url(url);
    info!(url = %target, "Starting scan.");

    // Fail fast on dead targets instead of committing nine modules' worth
    // of work.
    let reachability = check_reachable(&target, PRECHECK_TIMEOUT).await;
    if !reachability.reachable {
        warn!(url = %target, reason = %reachability.message, "Target unreachable, aborting scan.");
        return ScanVerdict {
            report: ScanReport::unreachable(reachability.message),
            screenshots: Vec::new(),
        };
    }

    // Best-effort screenshot side channel, started early and joined last.
    let screenshot_task = if options.screenshot_enabled {
        screenshotter.map(|capture| {
            let capture_url = target.clone();
            tokio::task::spawn_blocking(move || capture.capture(&capture_url))
        })
    } else {
        None
    };

    // Shared fetches, all in flight at once. Their outputs are reused by
    // every module that needs them, so no module fetches twice.
    let host = host_of(&target).unwrap_or_else(|| target.clone());
    let review_host = parent_host(&target);
    let (facts, page, reviews) = tokio::join!(
        timeout(options.timeout, fetch_site_facts(&target)),
        fetch_page(&target, options.timeout),
        review_store.reviews_for(&review_host),
    );
    let facts = match facts {
        Ok(facts) => Some(facts),
        Err(_) => {
            warn!(url = %target, "Site facts fetch timed out.");
            None
        }
    };
    let reviews = reviews.unwrap_or_else(|e| {
        warn!(url = %target, error = %e, "Review fetch failed.");
        Vec::new()
    });
    if page.is_empty() {
        warn!(url = %target, "Page fetch produced no content; content modules will abstain.");
    }

    let ctx = Arc::new(CheckContext {
        url: target.clone(),
        host,
        page: Arc::new(page),
        facts: Arc::new(facts),
        reviews: Arc::new(reviews),
        timeout: options.timeout,
    });

    // Fan out all nine checks; collect in completion order.
    let mut set: JoinSet<ModuleOutcome> = JoinSet::new();
    for name in CheckName::iter() {
        let ctx = Arc::clone(&ctx);
        let budget = options.module_budget();
        let retry_count = options.retry_count;
        set.spawn(async move {
            let factory_ctx = Arc::clone(&ctx);
            let result = guarded_check(name, budget, retry_count, move || {
                let ctx = Arc::clone(&factory_ctx);
                async move { run_check(name, &ctx).await }
            })
            .await;
            ModuleOutcome { name, result }
        });
    }

    let mut outcomes: BTreeMap<CheckName, CheckResult> = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => {
                debug!(module = %outcome.name, score = ?outcome.result.score, "Check completed.");
                outcomes.insert(outcome.name, outcome.result);
            }
            // guarded_check contains panics internally; only external
            // cancellation lands here, and the aggregator backfills the
            // missing module as an error.
            Err(e) => error!(error = %e, "A check task was lost."),
        }
    }

    let screenshots = join_screenshots(screenshot_task, options).await;

    info!(url = %target, modules = outcomes.len(), "Scan finished.");
    ScanVerdict {
        report: aggregate(&outcomes),
        screenshots,
    }
}

/// Runs one check inside its own task with retry, a hard timeout, and panic
/// containment, always yielding a result.
pub(crate) async fn guarded_check<F, Fut>(
    name: CheckName,
    budget: Duration,
    retry_count: u32,
    factory: F,
) -> CheckResult
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<CheckResult>> + Send + 'static,
{
    let attempts = retry_count + 1;
    let module = name.to_string();
    let handle = tokio::spawn(async move { with_retry(factory, retry_count, &module).await });
    let abort = handle.abort_handle();

    match timeout(budget, handle).await {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(e))) => {
            CheckResult::error(vec![format!("Analysis failed after {attempts} attempts: {e}")])
        }
        Ok(Err(join_error)) => {
            error!(module = %name, error = %join_error, "Check task panicked.");
            CheckResult::error(vec![format!(
                "Analysis failed after {attempts} attempts: {join_error}"
            )])
        }
        Err(_) => {
            // Out of budget: abandon the task, don't wait on it further.
            abort.abort();
            warn!(module = %name, budget_secs = budget.as_secs(), "Check exceeded its budget.");
            CheckResult::error(vec![format!(
                "Analysis timed out after {} seconds",
                budget.as_secs()
            )])
        }
    }
}

/// Joins the screenshot task with a generous timeout. Failures and timeouts
/// only cost the artifacts, never the score.
async fn join_screenshots(
    task: Option<tokio::task::JoinHandle<Vec<ScreenshotArtifact>>>,
    options: &ScanOptions,
) -> Vec<ScreenshotArtifact> {
    let Some(task) = task else {
        return Vec::new();
    };

    let budget = options.timeout * 3 + Duration::from_secs(10);
    match timeout(budget, task).await {
        Ok(Ok(artifacts)) => {
            let captured = artifacts.iter().filter(|a| a.success).count();
            info!(captured, total = artifacts.len(), "Screenshot capture finished.");
            artifacts
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Screenshot task failed.");
            Vec::new()
        }
        Err(_) => {
            warn!(budget_secs = budget.as_secs(), "Screenshot capture timed out.");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CheckStatus;
    use color_eyre::eyre::eyre;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn successful_checks_pass_through_unchanged() {
        let result = guarded_check(
            CheckName::DomainPattern,
            Duration::from_secs(60),
            3,
            || async { Ok(CheckResult::scored(0.7, vec!["fine".to_string()])) },
        )
        .await;
        assert_eq!(result.score, Some(0.7));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_is_invisible_to_the_caller() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = guarded_check(CheckName::Certificate, Duration::from_secs(120), 3, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(eyre!("flaky upstream"))
                } else {
                    Ok(CheckResult::scored(0.9, vec!["ok".to_string()]))
                }
            }
        })
        .await;
        assert_eq!(result.score, Some(0.9));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_become_a_synthesized_error() {
        let result = guarded_check(
            CheckName::ReputationDatabase,
            Duration::from_secs(600),
            2,
            || async { Err(eyre!("feed is down")) },
        )
        .await;
        assert_eq!(result.status, CheckStatus::Error);
        assert!(result.details[0].contains("failed after 3 attempts"));
        assert!(result.details[0].contains("feed is down"));
    }

    #[tokio::test(start_paused = true)]
    async fn panics_are_contained_as_errors() {
        let result = guarded_check(
            CheckName::HtmlHeuristic,
            Duration::from_secs(60),
            0,
            || async { panic!("parser blew up") },
        )
        .await;
        assert_eq!(result.status, CheckStatus::Error);
        assert!(result.details[0].contains("failed after 1 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn over_budget_checks_are_abandoned() {
        let result = guarded_check(CheckName::AiContentAnalysis, Duration::from_secs(5), 0, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CheckResult::scored(1.0, vec!["too late".to_string()]))
        })
        .await;
        assert_eq!(result.status, CheckStatus::Error);
        assert!(result.details[0].contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn one_panicking_check_never_takes_down_the_others() {
        let mut set: JoinSet<ModuleOutcome> = JoinSet::new();
        for (index, name) in [
            CheckName::Certificate,
            CheckName::DomainPattern,
            CheckName::UserReview,
        ]
        .into_iter()
        .enumerate()
        {
            set.spawn(async move {
                let result = guarded_check(name, Duration::from_secs(60), 0, move || async move {
                    if index == 1 {
                        panic!("simulated module crash");
                    }
                    Ok(CheckResult::scored(0.8, vec!["ok".to_string()]))
                })
                .await;
                ModuleOutcome { name, result }
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            let outcome = joined.expect("guarded tasks never panic outward");
            outcomes.insert(outcome.name, outcome.result);
        }

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[&CheckName::Certificate].status, CheckStatus::Ok);
        assert_eq!(outcomes[&CheckName::UserReview].status, CheckStatus::Ok);
        assert_eq!(outcomes[&CheckName::DomainPattern].status, CheckStatus::Error);
    }
}
