//! Core data model: platforms, participants, poll outcomes, leaderboard rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One external competitive-programming site. Each platform has its own
/// authentication, rate limit, and payload shape behind a shared adapter
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    CodeChef,
    Codeforces,
    GeeksforGeeks,
    HackerRank,
    LeetCode,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::CodeChef,
        Platform::Codeforces,
        Platform::GeeksforGeeks,
        Platform::HackerRank,
        Platform::LeetCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeChef => "CodeChef",
            Self::Codeforces => "Codeforces",
            Self::GeeksforGeeks => "GeeksforGeeks",
            Self::HackerRank => "HackerRank",
            Self::LeetCode => "LeetCode",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "codechef" | "cc" => Ok(Self::CodeChef),
            "codeforces" | "cf" => Ok(Self::Codeforces),
            "geeksforgeeks" | "gfg" => Ok(Self::GeeksforGeeks),
            "hackerrank" | "hr" => Ok(Self::HackerRank),
            "leetcode" | "lc" => Ok(Self::LeetCode),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Per participant-per-platform poll result.
///
/// Invariant: `exists == false` implies `rating == None`, enforced by the
/// constructors. Overwritten on every successful or definitively-failed
/// poll; left untouched when a poll is skipped or fails transiently, so
/// stale data survives a bad run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStatus {
    /// Handle as supplied by the roster; may be malformed.
    pub handle: String,
    /// Absent means "not yet resolved or the platform has no numeric rating".
    pub rating: Option<f64>,
    pub exists: bool,
    pub last_updated: DateTime<Utc>,
    /// Opaque raw payload kept for audit, never interpreted past extraction.
    pub raw_data: Value,
}

impl PlatformStatus {
    pub fn new(handle: impl Into<String>, rating: Option<f64>, exists: bool, raw_data: Value) -> Self {
        Self {
            handle: handle.into(),
            rating: if exists { rating } else { None },
            exists,
            last_updated: Utc::now(),
            raw_data,
        }
    }

    /// Roster skeleton: a handle that has not been polled yet.
    pub fn pending(handle: impl Into<String>) -> Self {
        Self::new(handle, None, false, Value::Null)
    }

    /// The platform definitively reported no such account.
    pub fn missing(handle: impl Into<String>) -> Self {
        Self::new(handle, None, false, Value::Null)
    }
}

/// A tracked individual. Identity fields are immutable after creation; the
/// platform mapping is written by the batch orchestrator and the computed
/// fields by the aggregation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub roster_id: String,
    pub name: String,
    pub college: String,
    pub batch: String,
    pub platforms: HashMap<Platform, PlatformStatus>,
    /// Cache, never source of truth: recomputable from `platforms` alone.
    pub total_rating: f64,
    pub percentile: f64,
}

impl Participant {
    pub fn new(
        roster_id: impl Into<String>,
        name: impl Into<String>,
        college: impl Into<String>,
        batch: impl Into<String>,
    ) -> Self {
        Self {
            roster_id: roster_id.into(),
            name: name.into(),
            college: college.into(),
            batch: batch.into(),
            platforms: HashMap::new(),
            total_rating: 0.0,
            percentile: 0.0,
        }
    }

    /// Record a roster-supplied handle for a platform.
    pub fn set_handle(&mut self, platform: Platform, handle: impl Into<String>) {
        self.platforms.insert(platform, PlatformStatus::pending(handle));
    }

    /// The usable handle for a platform, if one was supplied. Placeholder
    /// values from spreadsheet exports ("#n/a") count as absent.
    pub fn handle_for(&self, platform: Platform) -> Option<&str> {
        let handle = self.platforms.get(&platform)?.handle.trim();
        if handle.is_empty() || handle.eq_ignore_ascii_case("#n/a") {
            None
        } else {
            Some(handle)
        }
    }
}

/// Result of one (participant, platform) attempt. Consumed immediately by
/// the orchestrator; never persisted.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Success(PlatformStatus),
    NotFound,
    RateLimited,
    TransientFailure(String),
    FatalFailure(String),
}

/// Read-only projection of a ranked participant, produced fresh on every
/// aggregation run.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub roster_id: String,
    pub name: String,
    pub college: String,
    pub batch: String,
    pub total_rating: f64,
    pub percentile: f64,
    /// Resolved per-platform ratings, for display and export.
    pub platform_ratings: BTreeMap<Platform, f64>,
}
