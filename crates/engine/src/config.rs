//! Runtime configuration, threaded explicitly into the orchestrator and
//! each adapter at construction — no ambient process-wide state.
//!
//! Credentials and base URLs come from the environment (loaded by the
//! binary via dotenvy). Missing credentials are not an error here: a
//! platform with no usable credentials fails with an authentication error
//! at run time, contained to that platform alone.

use std::collections::HashMap;
use std::time::Duration;

use crate::types::Platform;

/// Rate-limit budget for one platform: at most `calls` acquisitions within
/// any sliding window of `period`.
#[derive(Debug, Clone, Copy)]
pub struct RateBudget {
    pub calls: u32,
    pub period: Duration,
}

impl RateBudget {
    pub fn per_second(calls: u32) -> Self {
        Self { calls, period: Duration::from_secs(1) }
    }

    pub fn per_minute(calls: u32) -> Self {
        Self { calls, period: Duration::from_secs(60) }
    }
}

#[derive(Debug, Clone)]
pub struct CodeforcesConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub rate: RateBudget,
}

#[derive(Debug, Clone)]
pub struct CodeChefConfig {
    pub api_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub rate: RateBudget,
}

#[derive(Debug, Clone)]
pub struct LeetCodeConfig {
    pub graphql_url: String,
    pub referer: String,
    pub rate: RateBudget,
}

#[derive(Debug, Clone)]
pub struct HackerRankConfig {
    pub base_url: String,
    pub api_url: String,
    /// Contest slugs whose leaderboards contribute to the rating.
    pub contest_slugs: Vec<String>,
    pub rate: RateBudget,
}

#[derive(Debug, Clone)]
pub struct GeeksForGeeksConfig {
    pub practice_api_url: String,
    pub weekly_contest_url: String,
    /// Weight of the weekly-contest score in the combined rating.
    pub weekly_weight: f64,
    /// Upper bound on leaderboard pages scanned while warming the cache.
    pub max_leaderboard_pages: usize,
    pub rate: RateBudget,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Maximum simultaneously in-flight (participant, platform) units.
    pub max_in_flight: usize,
    pub max_attempts: u32,
    /// Fixed per-call timeout for every outbound request.
    pub call_timeout: Duration,
}

/// Full tracker configuration. Built once and passed by reference.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub codeforces: CodeforcesConfig,
    pub codechef: CodeChefConfig,
    pub leetcode: LeetCodeConfig,
    pub hackerrank: HackerRankConfig,
    pub geeksforgeeks: GeeksForGeeksConfig,
    pub batch: BatchConfig,
    /// Per-platform normalization weights for the composite rating.
    pub weights: HashMap<Platform, f64>,
}

impl TrackerConfig {
    /// Read configuration from the environment, with defaults matching the
    /// public endpoints of each platform.
    pub fn from_env() -> Self {
        let mut weights = HashMap::new();
        for platform in Platform::ALL {
            let var = format!("WEIGHT_{}", platform.as_str().to_ascii_uppercase());
            weights.insert(platform, env_f64(&var, 1.0));
        }

        Self {
            codeforces: CodeforcesConfig {
                base_url: env_or("URL_CODEFORCES_URL", "https://codeforces.com/api"),
                api_key: env_opt("API_CODEFORCES_KEY"),
                api_secret: env_opt("API_CODEFORCES_SECRET"),
                rate: RateBudget::per_second(1),
            },
            codechef: CodeChefConfig {
                api_url: env_or("URL_CODECHEF_API_URL", "https://api.codechef.com"),
                client_id: env_opt("API_CODECHEF_CLIENT_ID"),
                client_secret: env_opt("API_CODECHEF_CLIENT_SECRET"),
                rate: RateBudget::per_minute(30),
            },
            leetcode: LeetCodeConfig {
                graphql_url: env_or("URL_LEETCODE_URL", "https://leetcode.com/graphql"),
                referer: env_or("URL_LEETCODE_REFERER", "https://leetcode.com"),
                rate: RateBudget::per_second(1),
            },
            hackerrank: HackerRankConfig {
                base_url: env_or("URL_HACKERRANK_URL", "https://www.hackerrank.com"),
                api_url: env_or("URL_HACKERRANK_API_URL", "https://www.hackerrank.com/rest"),
                contest_slugs: env_list("HACKERRANK_CONTESTS"),
                rate: RateBudget::per_second(1),
            },
            geeksforgeeks: GeeksForGeeksConfig {
                practice_api_url: env_or(
                    "URL_GFG_API_URL",
                    "https://practiceapi.geeksforgeeks.org/api/v1/user/profile",
                ),
                weekly_contest_url: env_or(
                    "URL_GFG_WEEKLY_CONTEST_URL",
                    "https://practiceapi.geeksforgeeks.org/api/latest/events/recurring/gfg-weekly-coding-contest/leaderboard",
                ),
                weekly_weight: env_f64("GFG_WEEKLY_WEIGHT", 0.75),
                max_leaderboard_pages: env_u64("GFG_MAX_LEADERBOARD_PAGES", 200) as usize,
                rate: RateBudget::per_second(2),
            },
            batch: BatchConfig {
                max_in_flight: env_u64("BATCH_MAX_IN_FLIGHT", 16) as usize,
                max_attempts: env_u64("RETRY_MAX_ATTEMPTS", 3) as u32,
                call_timeout: Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS", 30)),
            },
            weights,
        }
    }

    pub fn rate_budget(&self, platform: Platform) -> RateBudget {
        match platform {
            Platform::CodeChef => self.codechef.rate,
            Platform::Codeforces => self.codeforces.rate,
            Platform::GeeksforGeeks => self.geeksforgeeks.rate,
            Platform::HackerRank => self.hackerrank.rate,
            Platform::LeetCode => self.leetcode.rate,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
