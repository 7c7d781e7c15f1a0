//! GeeksforGeeks adapter — practice score + weekly contest leaderboard
//!
//! The rating combines two sub-scores: the practice score from the profile
//! API and the accumulated weekly-contest score. The contest side only
//! exists as a global paginated leaderboard, so `authenticate` scans it
//! once into a handle-keyed cache and each profile fetch merges the cached
//! value into its payload.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{http_client, PlatformAdapter, RatingSnapshot, RawPayload, BROWSER_USER_AGENT};
use crate::config::GeeksForGeeksConfig;
use crate::errors::FetchError;
use crate::types::Platform;

pub struct GeeksForGeeksAdapter {
    client: Client,
    config: GeeksForGeeksConfig,
    /// handle (lowercased) -> summed weekly contest score.
    weekly_scores: RwLock<Option<HashMap<String, f64>>>,
}

impl GeeksForGeeksAdapter {
    pub fn new(config: GeeksForGeeksConfig, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            config,
            weekly_scores: RwLock::new(None),
        }
    }
}

#[async_trait]
impl PlatformAdapter for GeeksForGeeksAdapter {
    fn platform(&self) -> Platform {
        Platform::GeeksforGeeks
    }

    async fn authenticate(&self) -> Result<(), FetchError> {
        if self.weekly_scores.read().await.is_some() {
            return Ok(());
        }

        let mut scores: HashMap<String, f64> = HashMap::new();
        for page in 0..self.config.max_leaderboard_pages {
            let resp = self
                .client
                .get(&self.config.weekly_contest_url)
                .query(&[("leaderboard_type", "0".to_string()), ("page", page.to_string())])
                .header("User-Agent", BROWSER_USER_AGENT)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| FetchError::Auth(format!("weekly leaderboard page {page} failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(FetchError::Auth(format!(
                    "weekly leaderboard page {page} rejected: {}",
                    resp.status()
                )));
            }

            let body: Value = resp
                .json()
                .await
                .map_err(|e| FetchError::Auth(format!("invalid leaderboard page {page}: {e}")))?;
            let results = match body.get("results").and_then(Value::as_array) {
                Some(results) if !results.is_empty() => results.clone(),
                _ => break,
            };

            for entry in &results {
                let handle = entry.get("user_handle").and_then(Value::as_str);
                let score = entry.get("user_score").and_then(Value::as_f64);
                if let (Some(handle), Some(score)) = (handle, score) {
                    *scores.entry(handle.to_lowercase()).or_insert(0.0) += score;
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!(handles = scores.len(), "gfg weekly contest cache warmed");
        *self.weekly_scores.write().await = Some(scores);
        Ok(())
    }

    async fn fetch_profile(&self, handle: &str) -> Result<RawPayload, FetchError> {
        let resp = self
            .client
            .get(&self.config.practice_api_url)
            .query(&[("handle", handle)])
            .header("User-Agent", BROWSER_USER_AGENT)
            .header("Accept", "application/json")
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
            .map_err(|e| FetchError::Transient(format!("invalid gfg response: {e}")))?;
        let practice = match body.get("data") {
            Some(data) if !data.is_null() => data.clone(),
            _ => return Err(FetchError::NotFound),
        };

        let weekly_score = self
            .weekly_scores
            .read()
            .await
            .as_ref()
            .and_then(|scores| scores.get(&handle.to_lowercase()).copied());

        debug!(handle, ?weekly_score, "gfg profile fetched");
        Ok(json!({
            "practice": practice,
            "weekly_score": weekly_score,
        }))
    }

    fn extract_rating(&self, payload: &RawPayload) -> RatingSnapshot {
        let practice = payload.pointer("/practice/score").and_then(Value::as_f64);
        let weekly = payload.get("weekly_score").and_then(Value::as_f64);

        // Weighted combination; a missing sub-score counts as zero, but if
        // neither is present there is nothing to rate yet.
        let rating = if practice.is_none() && weekly.is_none() {
            None
        } else {
            let w = self.config.weekly_weight;
            Some(weekly.unwrap_or(0.0) * w + practice.unwrap_or(0.0) * (1.0 - w))
        };

        RatingSnapshot { rating, exists: true }
    }
}
