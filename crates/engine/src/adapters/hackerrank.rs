//! HackerRank adapter — profile page existence + contest leaderboard scores
//!
//! HackerRank exposes no per-user rating endpoint, so `authenticate` warms
//! a score cache from the configured contest leaderboards (paginated REST),
//! and each profile fetch combines an existence check on the public profile
//! page with the cached contest total for that handle.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{http_client, PlatformAdapter, RatingSnapshot, RawPayload, BROWSER_USER_AGENT};
use crate::config::HackerRankConfig;
use crate::errors::FetchError;
use crate::types::Platform;

const LEADERBOARD_PAGE_SIZE: usize = 100;

/// Markers in the profile HTML that identify a 404 served with status 200.
const NOT_FOUND_MARKERS: [&str; 4] = [
    "class=\"error-title\"",
    "HTTP 404: Page Not Found | HackerRank",
    "class=\"e404-view\"",
    "class=\"page-not-found-container container\"",
];

pub struct HackerRankAdapter {
    client: Client,
    config: HackerRankConfig,
    /// handle (lowercased) -> summed contest score, filled by authenticate.
    contest_scores: RwLock<Option<HashMap<String, f64>>>,
}

impl HackerRankAdapter {
    pub fn new(config: HackerRankConfig, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            config,
            contest_scores: RwLock::new(None),
        }
    }

    async fn fetch_leaderboard(&self, slug: &str, scores: &mut HashMap<String, f64>) -> Result<(), FetchError> {
        let url = format!("{}/contests/{}/leaderboard", self.config.api_url, slug);
        let mut offset = 0usize;

        loop {
            let resp = self
                .client
                .get(&url)
                .query(&[("offset", offset.to_string()), ("limit", LEADERBOARD_PAGE_SIZE.to_string())])
                .header("User-Agent", BROWSER_USER_AGENT)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| FetchError::Auth(format!("leaderboard fetch failed for {slug}: {e}")))?;
            if !resp.status().is_success() {
                return Err(FetchError::Auth(format!(
                    "leaderboard fetch rejected for {slug}: {}",
                    resp.status()
                )));
            }

            let body: Value = resp
                .json()
                .await
                .map_err(|e| FetchError::Auth(format!("invalid leaderboard page for {slug}: {e}")))?;
            let models = match body.get("models").and_then(Value::as_array) {
                Some(models) if !models.is_empty() => models.clone(),
                _ => break,
            };

            for model in &models {
                let hacker = model.get("hacker").and_then(Value::as_str);
                let score = model.get("score").and_then(Value::as_f64);
                if let (Some(hacker), Some(score)) = (hacker, score) {
                    *scores.entry(hacker.to_lowercase()).or_insert(0.0) += score;
                }
            }

            if models.len() < LEADERBOARD_PAGE_SIZE {
                break;
            }
            offset += models.len();
            // small delay between pages to stay polite
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for HackerRankAdapter {
    fn platform(&self) -> Platform {
        Platform::HackerRank
    }

    async fn authenticate(&self) -> Result<(), FetchError> {
        if self.contest_scores.read().await.is_some() {
            return Ok(());
        }

        let mut scores = HashMap::new();
        for slug in &self.config.contest_slugs {
            self.fetch_leaderboard(slug, &mut scores).await?;
        }
        info!(
            contests = self.config.contest_slugs.len(),
            hackers = scores.len(),
            "hackerrank contest score cache warmed"
        );
        *self.contest_scores.write().await = Some(scores);
        Ok(())
    }

    async fn fetch_profile(&self, handle: &str) -> Result<RawPayload, FetchError> {
        let url = format!("{}/profile/{}", self.config.base_url, handle);
        let resp = self
            .client
            .get(&url)
            .header("User-Agent", BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, &body));
        }

        // HackerRank serves its 404 page with status 200.
        let html = resp
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("profile page read failed: {e}")))?;
        if NOT_FOUND_MARKERS.iter().any(|marker| html.contains(marker)) {
            return Err(FetchError::NotFound);
        }

        let contest_score = self
            .contest_scores
            .read()
            .await
            .as_ref()
            .and_then(|scores| scores.get(&handle.to_lowercase()).copied());

        debug!(handle, ?contest_score, "hackerrank profile resolved");
        Ok(json!({
            "handle": handle,
            "profile_found": true,
            "contest_score": contest_score,
        }))
    }

    fn extract_rating(&self, payload: &RawPayload) -> RatingSnapshot {
        RatingSnapshot {
            rating: payload.get("contest_score").and_then(Value::as_f64),
            exists: payload.get("profile_found").and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateBudget;

    fn adapter(slugs: Vec<String>) -> HackerRankAdapter {
        HackerRankAdapter::new(
            HackerRankConfig {
                base_url: "https://www.hackerrank.com".into(),
                api_url: "https://www.hackerrank.com/rest".into(),
                contest_slugs: slugs,
                rate: RateBudget::per_second(1),
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn authenticate_with_no_contests_is_a_noop_warmup() {
        let adapter = adapter(vec![]);
        adapter.authenticate().await.unwrap();
        assert!(adapter.contest_scores.read().await.as_ref().unwrap().is_empty());
        // idempotent
        adapter.authenticate().await.unwrap();
    }

    #[test]
    fn extract_rating_uses_cached_contest_total() {
        let snapshot = adapter(vec![]).extract_rating(&json!({
            "handle": "ada",
            "profile_found": true,
            "contest_score": 312.5,
        }));
        assert_eq!(snapshot.rating, Some(312.5));
        assert!(snapshot.exists);
    }

    #[test]
    fn profile_without_contest_entries_has_no_rating() {
        let snapshot = adapter(vec![]).extract_rating(&json!({
            "handle": "lurker",
            "profile_found": true,
            "contest_score": null,
        }));
        assert_eq!(snapshot.rating, None);
        assert!(snapshot.exists);
    }
}
