//! Aggregation engine: composite ratings, percentiles, and the leaderboard
//!
//! Pure and deterministic: no I/O, no clock, and the same cohort always
//! produces the same leaderboard. Runs over whatever statuses the batch
//! orchestrator left behind, so a participant with nothing resolved still
//! appears with a composite of zero.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::types::{LeaderboardEntry, Participant, Platform};

/// How per-platform ratings are scaled before being summed into the
/// composite. Platforms without an entry contribute at weight 1.0.
#[derive(Debug, Clone)]
pub struct NormalizationPolicy {
    weights: HashMap<Platform, f64>,
}

impl NormalizationPolicy {
    /// Every platform contributes its raw rating unchanged.
    pub fn equal_weight() -> Self {
        Self { weights: HashMap::new() }
    }

    pub fn with_weights(weights: HashMap<Platform, f64>) -> Self {
        Self { weights }
    }

    /// A single platform's contribution to the composite.
    pub fn contribution(&self, platform: Platform, rating: f64) -> f64 {
        rating * self.weights.get(&platform).copied().unwrap_or(1.0)
    }
}

/// Sum of weighted resolved ratings. Unresolved and nonexistent handles
/// contribute nothing.
pub fn composite_rating(participant: &Participant, policy: &NormalizationPolicy) -> f64 {
    participant
        .platforms
        .iter()
        .filter_map(|(&platform, status)| status.rating.map(|r| policy.contribution(platform, r)))
        .sum()
}

/// Recompute composites and percentiles for the whole cohort and produce
/// the ranked leaderboard. Ordering is total rating descending with
/// roster id ascending as the tiebreak, so equal ratings rank stably.
pub fn aggregate(participants: &mut [Participant], policy: &NormalizationPolicy) -> Vec<LeaderboardEntry> {
    let n = participants.len();
    let totals: Vec<f64> = participants.iter().map(|p| composite_rating(p, policy)).collect();

    for (participant, &total) in participants.iter_mut().zip(&totals) {
        participant.total_rating = total;
        // Percentile: share of the cohort strictly below this participant.
        participant.percentile = if n <= 1 {
            0.0
        } else {
            let below = totals.iter().filter(|&&t| t < total).count();
            below as f64 / (n - 1) as f64 * 100.0
        };
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        totals[b]
            .partial_cmp(&totals[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| participants[a].roster_id.cmp(&participants[b].roster_id))
    });

    let entries: Vec<LeaderboardEntry> = order
        .into_iter()
        .enumerate()
        .map(|(rank_idx, i)| {
            let p = &participants[i];
            let platform_ratings: BTreeMap<Platform, f64> = p
                .platforms
                .iter()
                .filter_map(|(&platform, status)| status.rating.map(|r| (platform, r)))
                .collect();
            LeaderboardEntry {
                rank: rank_idx + 1,
                roster_id: p.roster_id.clone(),
                name: p.name.clone(),
                college: p.college.clone(),
                batch: p.batch.clone(),
                total_rating: p.total_rating,
                percentile: p.percentile,
                platform_ratings,
            }
        })
        .collect();

    debug!(cohort = n, entries = entries.len(), "leaderboard aggregated");
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlatformStatus;
    use serde_json::Value;

    fn participant(roster_id: &str, ratings: &[(Platform, f64)]) -> Participant {
        let mut p = Participant::new(roster_id, roster_id, "CMRIT", "2026");
        for &(platform, rating) in ratings {
            p.platforms.insert(
                platform,
                PlatformStatus::new(format!("{roster_id}-h"), Some(rating), true, Value::Null),
            );
        }
        p
    }

    #[test]
    fn percentile_is_share_of_cohort_strictly_below() {
        let mut cohort = vec![
            participant("A", &[(Platform::Codeforces, 1000.0)]),
            participant("B", &[]),
            participant("C", &[(Platform::Codeforces, 2000.0)]),
        ];
        let entries = aggregate(&mut cohort, &NormalizationPolicy::equal_weight());

        assert_eq!(cohort[0].percentile, 50.0);
        assert_eq!(cohort[1].percentile, 0.0);
        assert_eq!(cohort[2].percentile, 100.0);

        let order: Vec<&str> = entries.iter().map(|e| e.roster_id.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[2].rank, 3);
    }

    #[test]
    fn singleton_cohort_gets_zero_percentile() {
        let mut cohort = vec![participant("A", &[(Platform::LeetCode, 1800.0)])];
        aggregate(&mut cohort, &NormalizationPolicy::equal_weight());
        assert_eq!(cohort[0].percentile, 0.0);
        assert_eq!(cohort[0].total_rating, 1800.0);
    }

    #[test]
    fn composite_sums_across_platforms_with_weights() {
        let p = participant(
            "A",
            &[(Platform::Codeforces, 1000.0), (Platform::LeetCode, 2000.0)],
        );
        let mut weights = HashMap::new();
        weights.insert(Platform::LeetCode, 0.5);
        let policy = NormalizationPolicy::with_weights(weights);
        assert_eq!(composite_rating(&p, &policy), 2000.0);
    }

    #[test]
    fn unresolved_participant_is_listed_with_zero_composite() {
        let mut cohort = vec![
            participant("A", &[(Platform::Codeforces, 1500.0)]),
            Participant::new("B", "B", "CMRIT", "2026"),
        ];
        let entries = aggregate(&mut cohort, &NormalizationPolicy::equal_weight());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].roster_id, "B");
        assert_eq!(entries[1].total_rating, 0.0);
        assert!(entries[1].platform_ratings.is_empty());
    }

    #[test]
    fn ties_break_on_roster_id_ascending() {
        let mut cohort = vec![
            participant("Z9", &[(Platform::Codeforces, 1500.0)]),
            participant("A1", &[(Platform::Codeforces, 1500.0)]),
        ];
        let entries = aggregate(&mut cohort, &NormalizationPolicy::equal_weight());
        assert_eq!(entries[0].roster_id, "A1");
        assert_eq!(entries[1].roster_id, "Z9");
    }

    #[test]
    fn aggregation_is_repeatable() {
        let mut cohort = vec![
            participant("A", &[(Platform::Codeforces, 1200.0)]),
            participant("B", &[(Platform::LeetCode, 1900.0)]),
            participant("C", &[]),
        ];
        let policy = NormalizationPolicy::equal_weight();
        let first = aggregate(&mut cohort, &policy);
        let second = aggregate(&mut cohort, &policy);

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.roster_id, b.roster_id);
            assert_eq!(a.rank, b.rank);
            assert_eq!(a.total_rating, b.total_rating);
            assert_eq!(a.percentile, b.percentile);
        }
    }
}
