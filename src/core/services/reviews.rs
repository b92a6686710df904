// src/core/services/reviews.rs

use crate::core::models::Review;
use color_eyre::eyre::Result;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Contract of the review-persistence collaborator.
///
/// Reviews are keyed by the parent host of the reviewed URL. The store, not
/// the scoring core, enforces the one-review-per-user-per-host rule.
pub trait ReviewStore: Send + Sync {
    /// All reviews recorded for a host.
    fn reviews_for(&self, host: &str) -> impl Future<Output = Result<Vec<Review>>> + Send;

    /// Records a review. Returns `false` (without storing) when the user has
    /// already reviewed this host.
    fn save_review(&self, host: &str, review: Review) -> impl Future<Output = Result<bool>> + Send;
}

/// Process-local review store. A durable backend is a drop-in replacement
/// behind the same trait.
#[derive(Default)]
pub struct InMemoryReviewStore {
    inner: RwLock<HashMap<String, Vec<Review>>>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReviewStore for InMemoryReviewStore {
    async fn reviews_for(&self, host: &str) -> Result<Vec<Review>> {
        let guard = self.inner.read().await;
        let reviews = guard.get(host).cloned().unwrap_or_default();
        debug!(host, count = reviews.len(), "Fetched reviews.");
        Ok(reviews)
    }

    async fn save_review(&self, host: &str, review: Review) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let entries = guard.entry(host.to_string()).or_default();
        if entries.iter().any(|r| r.user_id == review.user_id) {
            warn!(host, user = %review.user_id, "Duplicate review rejected.");
            return Ok(false);
        }
        entries.push(review);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review(user: &str, score: u8) -> Review {
        Review {
            score,
            comment: "fine".to_string(),
            timestamp: Utc::now(),
            user_id: user.to_string(),
        }
    }

    #[tokio::test]
    async fn stores_and_returns_reviews_per_host() {
        let store = InMemoryReviewStore::new();
        assert!(store.save_review("shop.example", review("alice", 8)).await.unwrap());
        assert!(store.save_review("shop.example", review("bob", 6)).await.unwrap());
        assert!(store.save_review("other.example", review("alice", 2)).await.unwrap());

        let reviews = store.reviews_for("shop.example").await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(store.reviews_for("unknown.example").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_review_per_user_per_host() {
        let store = InMemoryReviewStore::new();
        assert!(store.save_review("shop.example", review("alice", 8)).await.unwrap());
        assert!(!store.save_review("shop.example", review("alice", 1)).await.unwrap());

        let reviews = store.reviews_for("shop.example").await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].score, 8);
    }
}
