//! Codeforces adapter — signed `user.info` API requests
//!
//! Every call carries an `apiSig` query parameter: a random 6-char
//! lowercase-alphanumeric nonce prefixed to the SHA-512 hex digest of
//! `{nonce}/user.info?apiKey={key}&handles={handle}&time={unix}#{secret}`
//! (query parameters in alphabetical order), sent alongside the Unix
//! timestamp used in the hash.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::Value;
use sha2::{Digest, Sha512};
use tracing::debug;

use super::{http_client, PlatformAdapter, RatingSnapshot, RawPayload};
use crate::config::CodeforcesConfig;
use crate::errors::FetchError;
use crate::types::Platform;

pub struct CodeforcesAdapter {
    client: Client,
    config: CodeforcesConfig,
}

impl CodeforcesAdapter {
    pub fn new(config: CodeforcesConfig, timeout: Duration) -> Self {
        Self { client: http_client(timeout), config }
    }

    fn credentials(&self) -> Result<(&str, &str), FetchError> {
        match (&self.config.api_key, &self.config.api_secret) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(FetchError::Auth("codeforces API key/secret not configured".into())),
        }
    }
}

fn random_nonce(len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len).map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char).collect()
}

/// `apiSig` value: nonce + SHA-512 hex digest of the canonical query string
/// with the shared secret appended after `#`.
pub fn sign_request(
    nonce: &str,
    method: &str,
    api_key: &str,
    handle: &str,
    time: i64,
    secret: &str,
) -> String {
    let to_hash = format!("{nonce}/{method}?apiKey={api_key}&handles={handle}&time={time}#{secret}");
    let digest = Sha512::digest(to_hash.as_bytes());
    format!("{nonce}{digest:x}")
}

#[async_trait]
impl PlatformAdapter for CodeforcesAdapter {
    fn platform(&self) -> Platform {
        Platform::Codeforces
    }

    async fn authenticate(&self) -> Result<(), FetchError> {
        self.credentials().map(|_| ())
    }

    async fn fetch_profile(&self, handle: &str) -> Result<RawPayload, FetchError> {
        let (api_key, secret) = self.credentials()?;
        // Handles never contain '@' or whitespace; reject without a request.
        if handle.contains('@') || handle.contains(char::is_whitespace) {
            return Err(FetchError::NotFound);
        }

        let nonce = random_nonce(6);
        let time = chrono::Utc::now().timestamp();
        let api_sig = sign_request(&nonce, "user.info", api_key, handle, time, secret);

        let url = format!("{}/user.info", self.config.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", api_key),
                ("handles", handle),
                ("time", &time.to_string()),
                ("apiSig", &api_sig),
            ])
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("invalid codeforces response: {e}")))?;

        // Codeforces reports errors inside the body, including on 4xx.
        if body.get("status").and_then(Value::as_str) != Some("OK") {
            let comment = body
                .get("comment")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            if comment.to_lowercase().contains("not found") {
                return Err(FetchError::NotFound);
            }
            if !status.is_success() {
                return Err(FetchError::from_status(status, &comment));
            }
            return Err(FetchError::Transient(format!("codeforces API error: {comment}")));
        }

        let user = body
            .get("result")
            .and_then(|r| r.get(0))
            .cloned()
            .ok_or(FetchError::NotFound)?;
        debug!(handle, "codeforces profile fetched");
        Ok(user)
    }

    fn extract_rating(&self, payload: &RawPayload) -> RatingSnapshot {
        // Unrated accounts have no "rating" field at all.
        RatingSnapshot {
            rating: payload.get("rating").and_then(Value::as_f64),
            exists: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateBudget;
    use serde_json::json;

    fn adapter() -> CodeforcesAdapter {
        CodeforcesAdapter::new(
            CodeforcesConfig {
                base_url: "https://codeforces.com/api".into(),
                api_key: Some("key".into()),
                api_secret: Some("secret".into()),
                rate: RateBudget::per_second(1),
            },
            Duration::from_secs(5),
        )
    }

    #[test]
    fn signature_is_nonce_plus_sha512_hex() {
        let sig = sign_request("abc123", "user.info", "key", "tourist", 1700000000, "secret");
        assert!(sig.starts_with("abc123"));
        // SHA-512 hex digest is 128 chars
        assert_eq!(sig.len(), 6 + 128);
        assert!(sig[6..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_is_deterministic_and_secret_sensitive() {
        let a = sign_request("abc123", "user.info", "key", "tourist", 1700000000, "secret");
        let b = sign_request("abc123", "user.info", "key", "tourist", 1700000000, "secret");
        let c = sign_request("abc123", "user.info", "key", "tourist", 1700000000, "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn nonce_shape() {
        let nonce = random_nonce(6);
        assert_eq!(nonce.len(), 6);
        assert!(nonce.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn extract_rating_present() {
        let snapshot = adapter().extract_rating(&json!({"handle": "tourist", "rating": 3822}));
        assert_eq!(snapshot.rating, Some(3822.0));
        assert!(snapshot.exists);
    }

    #[test]
    fn extract_rating_absent_for_unrated_account() {
        let snapshot = adapter().extract_rating(&json!({"handle": "newcomer"}));
        assert_eq!(snapshot.rating, None);
        assert!(snapshot.exists);
    }

    #[tokio::test]
    async fn authenticate_fails_without_credentials() {
        let adapter = CodeforcesAdapter::new(
            CodeforcesConfig {
                base_url: "https://codeforces.com/api".into(),
                api_key: None,
                api_secret: None,
                rate: RateBudget::per_second(1),
            },
            Duration::from_secs(5),
        );
        assert!(matches!(adapter.authenticate().await, Err(FetchError::Auth(_))));
    }

    #[tokio::test]
    async fn structurally_invalid_handle_is_not_found() {
        let result = adapter().fetch_profile("someone@example.com").await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }
}
