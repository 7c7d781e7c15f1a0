//! Batch orchestrator: fans (participant, platform) units out across
//! adapters under a global concurrency cap and per-platform rate limits.
//!
//! Failure containment is per unit and per platform: one participant's bad
//! handle never affects another, and a failed platform authentication sinks
//! only that platform's units for the run. Participants are only mutated on
//! the collecting side, so stale data survives transient failures.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::seq::index::sample;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::adapters::{build_registry, PlatformAdapter};
use crate::cancel::CancelToken;
use crate::config::TrackerConfig;
use crate::errors::FetchError;
use crate::limiter::RateLimiter;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::types::{Participant, Platform, PlatformStatus, PollOutcome};

/// Per-platform counters for one batch run.
#[derive(Debug, Default, Clone)]
pub struct PlatformTally {
    pub resolved: usize,
    pub not_found: usize,
    pub failed: usize,
    /// (roster_id, reason) for every failed unit.
    pub failures: Vec<(String, String)>,
}

/// Summary returned by [`BatchRunner::run`].
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    /// Units dispatched (participants with a usable handle, per platform).
    pub scheduled: usize,
    pub cancelled: bool,
    pub per_platform: BTreeMap<Platform, PlatformTally>,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_in_flight: usize,
    /// Poll a random subset of this size instead of the whole roster.
    pub sample: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { max_in_flight: 16, sample: None, retry: RetryPolicy::default() }
    }
}

pub struct BatchRunner {
    registry: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    limiters: HashMap<Platform, Arc<RateLimiter>>,
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(
        registry: HashMap<Platform, Arc<dyn PlatformAdapter>>,
        limiters: HashMap<Platform, Arc<RateLimiter>>,
        options: BatchOptions,
    ) -> Self {
        Self { registry, limiters, options }
    }

    /// Standard runner: full adapter registry, per-platform limiters and
    /// retry policy taken from the configuration.
    pub fn from_config(config: &TrackerConfig, options: BatchOptions) -> Self {
        let registry = build_registry(config);
        let limiters = Platform::ALL
            .into_iter()
            .map(|p| (p, Arc::new(RateLimiter::new(config.rate_budget(p)))))
            .collect();
        Self::new(registry, limiters, options)
    }

    /// Poll the requested platforms for every participant (or a random
    /// sample) and write the outcomes back into `participants`.
    pub async fn run(
        &self,
        participants: &mut [Participant],
        platforms: &[Platform],
        cancel: &CancelToken,
    ) -> BatchReport {
        let selected = self.select_indices(participants.len());
        info!(
            participants = selected.len(),
            platforms = platforms.len(),
            max_in_flight = self.options.max_in_flight,
            "batch run starting"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.max_in_flight.max(1)));
        let auth_cells: HashMap<Platform, Arc<OnceCell<Result<(), FetchError>>>> = platforms
            .iter()
            .map(|&p| (p, Arc::new(OnceCell::new())))
            .collect();

        let mut report = BatchReport::default();
        for &platform in platforms {
            report.per_platform.entry(platform).or_default();
        }

        let mut join_set = JoinSet::new();
        for &idx in &selected {
            for &platform in platforms {
                let Some(adapter) = self.registry.get(&platform) else { continue };
                let Some(limiter) = self.limiters.get(&platform) else { continue };
                let Some(handle) = participants[idx].handle_for(platform) else { continue };

                report.scheduled += 1;
                join_set.spawn(poll_unit(
                    idx,
                    platform,
                    handle.to_string(),
                    Arc::clone(adapter),
                    Arc::clone(limiter),
                    Arc::clone(&auth_cells[&platform]),
                    Arc::clone(&semaphore),
                    self.options.retry,
                    cancel.clone(),
                ));
            }
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, platform, outcome)) => {
                    apply_outcome(&mut participants[idx], platform, outcome, &mut report);
                }
                Err(err) => {
                    warn!(error = %err, "polling task aborted");
                }
            }
        }

        report.cancelled = cancel.is_cancelled();
        for (platform, tally) in &report.per_platform {
            info!(
                %platform,
                resolved = tally.resolved,
                not_found = tally.not_found,
                failed = tally.failed,
                "platform tally"
            );
        }
        report
    }

    fn select_indices(&self, total: usize) -> Vec<usize> {
        match self.options.sample {
            Some(k) if k < total => sample(&mut rand::thread_rng(), total, k).into_vec(),
            _ => (0..total).collect(),
        }
    }
}

/// One (participant, platform) unit: wait for a concurrency permit, make
/// sure the platform is authenticated, then fetch under the rate limiter
/// with retries.
#[allow(clippy::too_many_arguments)]
async fn poll_unit(
    idx: usize,
    platform: Platform,
    handle: String,
    adapter: Arc<dyn PlatformAdapter>,
    limiter: Arc<RateLimiter>,
    auth: Arc<OnceCell<Result<(), FetchError>>>,
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
    cancel: CancelToken,
) -> (usize, Platform, PollOutcome) {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return (idx, platform, PollOutcome::TransientFailure("scheduler shut down".into())),
    };
    if cancel.is_cancelled() {
        return (idx, platform, PollOutcome::TransientFailure("batch cancelled".into()));
    }

    // Authenticate once per platform per run; all units of a platform share
    // the outcome, so a failure sinks exactly that platform.
    if let Err(err) = auth.get_or_init(|| adapter.authenticate()).await {
        return (idx, platform, PollOutcome::FatalFailure(format!("authentication failed: {err}")));
    }

    let outcome = run_with_retry(&retry, &cancel, || async {
        limiter.acquire().await;
        adapter.fetch_profile(&handle).await
    })
    .await;

    // Feed remote throttling back into the shared limiter so sibling units
    // slow down too.
    if outcome.rate_limit_hits > 0 {
        limiter.penalize(retry.rate_limit_delay * outcome.rate_limit_hits).await;
    }

    let poll = match outcome.result {
        Ok(payload) => {
            let snapshot = adapter.extract_rating(&payload);
            PollOutcome::Success(PlatformStatus::new(handle, snapshot.rating, snapshot.exists, payload))
        }
        Err(FetchError::NotFound) => PollOutcome::NotFound,
        Err(FetchError::RateLimited) => PollOutcome::RateLimited,
        Err(FetchError::Cancelled) => PollOutcome::TransientFailure("batch cancelled".into()),
        Err(FetchError::Transient(msg)) => PollOutcome::TransientFailure(msg),
        Err(err @ (FetchError::Auth(_) | FetchError::Fatal(_))) => {
            PollOutcome::FatalFailure(err.to_string())
        }
    };
    (idx, platform, poll)
}

/// Write one unit's outcome into the participant and the report. Transient
/// and fatal failures leave the existing status untouched.
fn apply_outcome(
    participant: &mut Participant,
    platform: Platform,
    outcome: PollOutcome,
    report: &mut BatchReport,
) {
    let tally = report.per_platform.entry(platform).or_default();
    match outcome {
        PollOutcome::Success(status) => {
            debug!(roster_id = %participant.roster_id, %platform, rating = ?status.rating, "unit resolved");
            participant.platforms.insert(platform, status);
            tally.resolved += 1;
        }
        PollOutcome::NotFound => {
            let handle = participant
                .platforms
                .get(&platform)
                .map(|s| s.handle.clone())
                .unwrap_or_default();
            participant.platforms.insert(platform, PlatformStatus::missing(handle));
            tally.not_found += 1;
        }
        PollOutcome::RateLimited => {
            tally.failed += 1;
            tally.failures.push((participant.roster_id.clone(), "rate limited".into()));
        }
        PollOutcome::TransientFailure(msg) | PollOutcome::FatalFailure(msg) => {
            warn!(roster_id = %participant.roster_id, %platform, reason = %msg, "unit failed");
            tally.failed += 1;
            tally.failures.push((participant.roster_id.clone(), msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::config::RateBudget;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum StubBehavior {
        Rating(f64),
        AuthFailure,
        NotFound,
        Transient,
    }

    struct StubAdapter {
        platform: Platform,
        behavior: StubBehavior,
        fetches: AtomicUsize,
    }

    impl StubAdapter {
        fn new(platform: Platform, behavior: StubBehavior) -> Arc<Self> {
            Arc::new(Self { platform, behavior, fetches: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl PlatformAdapter for StubAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn authenticate(&self) -> Result<(), FetchError> {
            match self.behavior {
                StubBehavior::AuthFailure => Err(FetchError::Auth("no credentials".into())),
                _ => Ok(()),
            }
        }

        async fn fetch_profile(&self, handle: &str) -> Result<serde_json::Value, FetchError> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            match self.behavior {
                StubBehavior::Rating(r) => Ok(json!({"handle": handle, "rating": r})),
                StubBehavior::NotFound => Err(FetchError::NotFound),
                StubBehavior::Transient => Err(FetchError::Transient("down".into())),
                StubBehavior::AuthFailure => unreachable!("fetch after failed auth"),
            }
        }

        fn extract_rating(&self, payload: &serde_json::Value) -> crate::adapters::RatingSnapshot {
            crate::adapters::RatingSnapshot {
                rating: payload.get("rating").and_then(serde_json::Value::as_f64),
                exists: true,
            }
        }
    }

    fn runner_with(adapters: Vec<Arc<StubAdapter>>, options: BatchOptions) -> BatchRunner {
        let mut registry: HashMap<Platform, Arc<dyn PlatformAdapter>> = HashMap::new();
        let mut limiters = HashMap::new();
        for adapter in adapters {
            let platform = adapter.platform();
            registry.insert(platform, adapter as Arc<dyn PlatformAdapter>);
            limiters.insert(platform, Arc::new(RateLimiter::new(RateBudget::per_second(10_000))));
        }
        BatchRunner::new(registry, limiters, options)
    }

    fn roster(n: usize, platforms: &[Platform]) -> Vec<Participant> {
        (0..n)
            .map(|i| {
                let mut p = Participant::new(format!("R{i:03}"), format!("P{i}"), "CMRIT", "2026");
                for &platform in platforms {
                    p.set_handle(platform, format!("handle{i}"));
                }
                p
            })
            .collect()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
            rate_limit_delay: std::time::Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn success_writes_rating_back() {
        let cf = StubAdapter::new(Platform::Codeforces, StubBehavior::Rating(1500.0));
        let runner = runner_with(vec![cf], BatchOptions::default());
        let mut roster = roster(3, &[Platform::Codeforces]);
        let (_handle, cancel) = cancel_pair();

        let report = runner.run(&mut roster, &[Platform::Codeforces], &cancel).await;

        assert_eq!(report.scheduled, 3);
        assert_eq!(report.per_platform[&Platform::Codeforces].resolved, 3);
        for p in &roster {
            let status = &p.platforms[&Platform::Codeforces];
            assert_eq!(status.rating, Some(1500.0));
            assert!(status.exists);
        }
    }

    #[tokio::test]
    async fn auth_failure_is_contained_to_its_platform() {
        let cf = StubAdapter::new(Platform::Codeforces, StubBehavior::Rating(1500.0));
        let cc = StubAdapter::new(Platform::CodeChef, StubBehavior::AuthFailure);
        let cc_probe = Arc::clone(&cc);
        let runner = runner_with(vec![cf, cc], BatchOptions::default());
        let mut roster = roster(4, &[Platform::Codeforces, Platform::CodeChef]);
        let (_handle, cancel) = cancel_pair();

        let report = runner
            .run(&mut roster, &[Platform::Codeforces, Platform::CodeChef], &cancel)
            .await;

        let cf_tally = &report.per_platform[&Platform::Codeforces];
        let cc_tally = &report.per_platform[&Platform::CodeChef];
        assert_eq!(cf_tally.resolved, 4);
        assert_eq!(cc_tally.resolved, 0);
        assert_eq!(cc_tally.failed, 4);
        // no fetch was ever attempted on the unauthenticated platform
        assert_eq!(cc_probe.fetches.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn not_found_clears_rating_but_keeps_handle() {
        let cf = StubAdapter::new(Platform::Codeforces, StubBehavior::NotFound);
        let runner = runner_with(vec![cf], BatchOptions::default());
        let mut roster = roster(1, &[Platform::Codeforces]);
        let (_handle, cancel) = cancel_pair();

        let report = runner.run(&mut roster, &[Platform::Codeforces], &cancel).await;

        assert_eq!(report.per_platform[&Platform::Codeforces].not_found, 1);
        let status = &roster[0].platforms[&Platform::Codeforces];
        assert_eq!(status.handle, "handle0");
        assert!(!status.exists);
        assert_eq!(status.rating, None);
    }

    #[tokio::test]
    async fn transient_failure_preserves_stale_status() {
        let cf = StubAdapter::new(Platform::Codeforces, StubBehavior::Transient);
        let options = BatchOptions { retry: fast_retry(), ..Default::default() };
        let runner = runner_with(vec![cf], options);

        let mut roster = roster(1, &[Platform::Codeforces]);
        let stale = PlatformStatus::new("handle0", Some(1200.0), true, json!({"cached": true}));
        roster[0].platforms.insert(Platform::Codeforces, stale);
        let (_handle, cancel) = cancel_pair();

        let report = runner.run(&mut roster, &[Platform::Codeforces], &cancel).await;

        assert_eq!(report.per_platform[&Platform::Codeforces].failed, 1);
        let status = &roster[0].platforms[&Platform::Codeforces];
        assert_eq!(status.rating, Some(1200.0));
        assert!(status.exists);
    }

    #[tokio::test]
    async fn sampling_polls_only_the_requested_count() {
        let cf = StubAdapter::new(Platform::Codeforces, StubBehavior::Rating(1000.0));
        let probe = Arc::clone(&cf);
        let options = BatchOptions { sample: Some(2), ..Default::default() };
        let runner = runner_with(vec![cf], options);
        let mut roster = roster(5, &[Platform::Codeforces]);
        let (_handle, cancel) = cancel_pair();

        let report = runner.run(&mut roster, &[Platform::Codeforces], &cancel).await;

        assert_eq!(report.scheduled, 2);
        assert_eq!(probe.fetches.load(Ordering::Relaxed), 2);
        let resolved = roster
            .iter()
            .filter(|p| p.platforms[&Platform::Codeforces].rating.is_some())
            .count();
        assert_eq!(resolved, 2);
    }

    #[tokio::test]
    async fn participants_without_handles_are_skipped() {
        let cf = StubAdapter::new(Platform::Codeforces, StubBehavior::Rating(1000.0));
        let runner = runner_with(vec![cf], BatchOptions::default());
        let mut roster = vec![Participant::new("R000", "NoHandles", "CMRIT", "2026")];
        let (_handle, cancel) = cancel_pair();

        let report = runner.run(&mut roster, &[Platform::Codeforces], &cancel).await;
        assert_eq!(report.scheduled, 0);
    }
}
