//! LeetCode adapter — anonymous GraphQL `userContestRanking` query
//!
//! No authentication; the endpoint only wants browser-like headers. A user
//! who exists but never entered a contest has a null ranking, which is not
//! an error — the account exists with no rating yet.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{http_client, PlatformAdapter, RatingSnapshot, RawPayload, BROWSER_USER_AGENT};
use crate::config::LeetCodeConfig;
use crate::errors::FetchError;
use crate::types::Platform;

pub struct LeetCodeAdapter {
    client: Client,
    config: LeetCodeConfig,
}

impl LeetCodeAdapter {
    pub fn new(config: LeetCodeConfig, timeout: Duration) -> Self {
        Self { client: http_client(timeout), config }
    }
}

/// Compact query, no whitespace, suitable for a GET query parameter.
fn contest_query(handle: &str) -> String {
    format!(
        "query{{userContestRanking(username:\"{handle}\"){{attendedContestsCount,rating,globalRanking,totalParticipants,topPercentage}}}}"
    )
}

#[async_trait]
impl PlatformAdapter for LeetCodeAdapter {
    fn platform(&self) -> Platform {
        Platform::LeetCode
    }

    async fn authenticate(&self) -> Result<(), FetchError> {
        // Anonymous GraphQL endpoint, nothing to establish.
        Ok(())
    }

    async fn fetch_profile(&self, handle: &str) -> Result<RawPayload, FetchError> {
        let resp = self
            .client
            .get(&self.config.graphql_url)
            .query(&[("query", contest_query(handle))])
            .header("User-Agent", BROWSER_USER_AGENT)
            .header("Accept", "application/json")
            .header("Referer", &self.config.referer)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, &body));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("invalid leetcode response: {e}")))?;

        if let Some(message) = body.pointer("/errors/0/message").and_then(Value::as_str) {
            let lower = message.to_lowercase();
            if lower.contains("does not exist") || lower.contains("could not find user") {
                return Err(FetchError::NotFound);
            }
            return Err(FetchError::Transient(format!("leetcode API error: {message}")));
        }

        let ranking = body.pointer("/data/userContestRanking").cloned().unwrap_or(Value::Null);
        debug!(handle, "leetcode contest ranking fetched");
        Ok(json!({ "userContestRanking": ranking }))
    }

    fn extract_rating(&self, payload: &RawPayload) -> RatingSnapshot {
        // Null ranking: the account exists but has no contest history.
        RatingSnapshot {
            rating: payload.pointer("/userContestRanking/rating").and_then(Value::as_f64),
            exists: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateBudget;

    fn adapter() -> LeetCodeAdapter {
        LeetCodeAdapter::new(
            LeetCodeConfig {
                graphql_url: "https://leetcode.com/graphql".into(),
                referer: "https://leetcode.com".into(),
                rate: RateBudget::per_second(1),
            },
            Duration::from_secs(5),
        )
    }

    #[test]
    fn query_embeds_handle_without_whitespace() {
        let q = contest_query("neal_wu");
        assert!(q.contains("username:\"neal_wu\""));
        assert!(!q.contains(' '));
    }

    #[test]
    fn extract_rating_from_contest_ranking() {
        let payload = json!({
            "userContestRanking": {
                "attendedContestsCount": 58,
                "rating": 3686.52,
                "globalRanking": 1
            }
        });
        let snapshot = adapter().extract_rating(&payload);
        assert_eq!(snapshot.rating, Some(3686.52));
        assert!(snapshot.exists);
    }

    #[test]
    fn null_ranking_maps_to_no_rating_not_an_error() {
        let snapshot = adapter().extract_rating(&json!({ "userContestRanking": null }));
        assert_eq!(snapshot.rating, None);
        assert!(snapshot.exists);
    }
}
