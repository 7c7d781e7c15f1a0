//! CodeChef adapter — OAuth2 client-credentials API
//!
//! `authenticate` obtains a bearer token once per run; profile fetches read
//! `/users/{handle}?fields=ratings`. The API hides "no such user" inside a
//! 200 response, so the body message is inspected.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{http_client, PlatformAdapter, RatingSnapshot, RawPayload};
use crate::config::CodeChefConfig;
use crate::errors::FetchError;
use crate::types::Platform;

const NOT_FOUND_MESSAGES: [&str; 2] = ["user does not exists", "no user found for this search"];

pub struct CodeChefAdapter {
    client: Client,
    config: CodeChefConfig,
    access_token: RwLock<Option<String>>,
}

impl CodeChefAdapter {
    pub fn new(config: CodeChefConfig, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            config,
            access_token: RwLock::new(None),
        }
    }
}

#[async_trait]
impl PlatformAdapter for CodeChefAdapter {
    fn platform(&self) -> Platform {
        Platform::CodeChef
    }

    async fn authenticate(&self) -> Result<(), FetchError> {
        if self.access_token.read().await.is_some() {
            return Ok(());
        }
        let (client_id, client_secret) = match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => return Err(FetchError::Auth("codechef client id/secret not configured".into())),
        };

        let url = format!("{}/oauth/token", self.config.api_url);
        let body = json!({
            "grant_type": "client_credentials",
            "scope": "public",
            "client_id": client_id,
            "client_secret": client_secret,
            "redirect_uri": "",
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Auth(format!("token request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(FetchError::Auth(format!("token request rejected: {}", resp.status())));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Auth(format!("invalid token response: {e}")))?;
        let token = body
            .pointer("/result/data/access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Auth("token missing from response".into()))?;

        info!("codechef access token obtained");
        *self.access_token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn fetch_profile(&self, handle: &str) -> Result<RawPayload, FetchError> {
        let token = self
            .access_token
            .read()
            .await
            .clone()
            .ok_or_else(|| FetchError::Auth("codechef adapter not authenticated".into()))?;

        let url = format!("{}/users/{}", self.config.api_url, handle);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", "ratings")])
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
            .map_err(|e| FetchError::Transient(format!("invalid codechef response: {e}")))?;
        let data = body.pointer("/result/data").cloned().unwrap_or(Value::Null);

        if let Some(message) = data.get("message").and_then(Value::as_str) {
            if NOT_FOUND_MESSAGES.contains(&message) {
                return Err(FetchError::NotFound);
            }
        }

        let content = data.get("content").cloned();
        match content {
            Some(content) if !content.is_null() => {
                debug!(handle, "codechef profile fetched");
                Ok(content)
            }
            _ => Err(FetchError::Transient("codechef response missing content".into())),
        }
    }

    fn extract_rating(&self, payload: &RawPayload) -> RatingSnapshot {
        RatingSnapshot {
            rating: payload.pointer("/ratings/allContest").and_then(Value::as_f64),
            exists: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateBudget;

    fn adapter() -> CodeChefAdapter {
        CodeChefAdapter::new(
            CodeChefConfig {
                api_url: "https://api.codechef.com".into(),
                client_id: None,
                client_secret: None,
                rate: RateBudget::per_minute(30),
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn authenticate_fails_without_credentials() {
        assert!(matches!(adapter().authenticate().await, Err(FetchError::Auth(_))));
    }

    #[tokio::test]
    async fn fetch_requires_prior_authentication() {
        let result = adapter().fetch_profile("gennady").await;
        assert!(matches!(result, Err(FetchError::Auth(_))));
    }

    #[test]
    fn extract_rating_from_ratings_block() {
        let payload = json!({
            "username": "gennady",
            "ratings": {"allContest": 2814, "cookOff": 2602}
        });
        let snapshot = adapter().extract_rating(&payload);
        assert_eq!(snapshot.rating, Some(2814.0));
    }

    #[test]
    fn extract_rating_tolerates_missing_block() {
        let snapshot = adapter().extract_rating(&json!({"username": "fresh"}));
        assert_eq!(snapshot.rating, None);
        assert!(snapshot.exists);
    }
}
