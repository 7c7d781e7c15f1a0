//! CP Track Engine — platform polling and rating aggregation
//!
//! Self-contained crate holding the polling pipeline:
//! - Platform adapters for CodeChef, Codeforces, GeeksforGeeks,
//!   HackerRank, and LeetCode behind a shared contract
//! - Sliding-window rate limiter and retrying executor
//! - Batch orchestrator with bounded concurrency and cancellation
//! - Deterministic aggregation into a ranked leaderboard

pub mod adapters;
pub mod aggregate;
pub mod batch;
pub mod cancel;
pub mod config;
pub mod errors;
pub mod limiter;
pub mod retry;
pub mod types;

// Re-exports for convenience
pub use adapters::{build_registry, PlatformAdapter, RatingSnapshot, RawPayload};
pub use aggregate::{aggregate, composite_rating, NormalizationPolicy};
pub use batch::{BatchOptions, BatchReport, BatchRunner, PlatformTally};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use config::{RateBudget, TrackerConfig};
pub use errors::FetchError;
pub use limiter::RateLimiter;
pub use retry::{run_with_retry, RetryOutcome, RetryPolicy};
pub use types::{LeaderboardEntry, Participant, Platform, PlatformStatus, PollOutcome};
