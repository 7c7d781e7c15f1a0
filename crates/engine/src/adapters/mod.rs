//! Platform adapters — one implementation per competitive-programming site
//!
//! Every site plugs into the same two-operation contract (authenticate +
//! fetch) plus a pure rating extractor. Adding a platform means writing one
//! module here and registering it in `build_registry`; nothing else in the
//! pipeline changes.

mod codechef;
mod codeforces;
mod geeksforgeeks;
mod hackerrank;
mod leetcode;

pub use codechef::CodeChefAdapter;
pub use codeforces::CodeforcesAdapter;
pub use geeksforgeeks::GeeksForGeeksAdapter;
pub use hackerrank::HackerRankAdapter;
pub use leetcode::LeetCodeAdapter;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::TrackerConfig;
use crate::errors::FetchError;
use crate::types::Platform;

/// Uninterpreted payload returned by a platform fetch. Stored on the
/// participant for audit; only `extract_rating` looks inside.
pub type RawPayload = Value;

/// Rating pulled out of a raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSnapshot {
    /// `None` when the account exists but has no numeric rating yet.
    pub rating: Option<f64>,
    pub exists: bool,
}

/// Shared contract for every platform.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Establish whatever the platform needs before profile fetches (signed
    /// params, OAuth token, leaderboard warm-up, or nothing). Idempotent;
    /// invoked once per batch run and reused across participants. A failure
    /// is fatal for this platform's entire run.
    async fn authenticate(&self) -> Result<(), FetchError>;

    /// Issue the platform-specific request(s) for one handle and return the
    /// uninterpreted payload.
    async fn fetch_profile(&self, handle: &str) -> Result<RawPayload, FetchError>;

    /// Pull a numeric rating out of the payload. Pure — no I/O, and absent
    /// fields map to `rating: None`, never to an error.
    fn extract_rating(&self, payload: &RawPayload) -> RatingSnapshot;
}

/// Build the adapter registry, keyed by platform identifier.
pub fn build_registry(config: &TrackerConfig) -> HashMap<Platform, Arc<dyn PlatformAdapter>> {
    let timeout = config.batch.call_timeout;
    let mut registry: HashMap<Platform, Arc<dyn PlatformAdapter>> = HashMap::new();
    registry.insert(
        Platform::CodeChef,
        Arc::new(CodeChefAdapter::new(config.codechef.clone(), timeout)),
    );
    registry.insert(
        Platform::Codeforces,
        Arc::new(CodeforcesAdapter::new(config.codeforces.clone(), timeout)),
    );
    registry.insert(
        Platform::GeeksforGeeks,
        Arc::new(GeeksForGeeksAdapter::new(config.geeksforgeeks.clone(), timeout)),
    );
    registry.insert(
        Platform::HackerRank,
        Arc::new(HackerRankAdapter::new(config.hackerrank.clone(), timeout)),
    );
    registry.insert(
        Platform::LeetCode,
        Arc::new(LeetCodeAdapter::new(config.leetcode.clone(), timeout)),
    );
    registry
}

/// Browser-like user agent; some sites reject the default reqwest UA.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_platform() {
        let config = TrackerConfig::from_env();
        let registry = build_registry(&config);
        for platform in Platform::ALL {
            let adapter = registry.get(&platform).expect("missing adapter");
            assert_eq!(adapter.platform(), platform);
        }
    }
}
