//! Participant repository — roster rows plus per-platform poll state

use std::collections::HashMap;

use chrono::DateTime;
use engine::types::{Participant, Platform, PlatformStatus};
use sqlx::SqlitePool;
use tracing::warn;

use crate::DbResult;

/// Repository for participants and their platform statuses
pub struct ParticipantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ParticipantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Add roster entries, skipping roster ids that already exist. Handles
    /// are inserted as unpolled statuses. Returns how many participants
    /// were newly added.
    pub async fn insert_participants(&self, participants: &[Participant]) -> DbResult<u64> {
        let mut added = 0u64;
        for p in participants {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO participants (roster_id, name, college, batch, total_rating, percentile)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&p.roster_id)
            .bind(&p.name)
            .bind(&p.college)
            .bind(&p.batch)
            .bind(p.total_rating)
            .bind(p.percentile)
            .execute(self.pool)
            .await?;
            added += result.rows_affected();

            for (platform, status) in &p.platforms {
                sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO platform_statuses
                        (roster_id, platform, handle, rating, handle_exists, last_updated, raw_json)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&p.roster_id)
                .bind(platform.as_str())
                .bind(&status.handle)
                .bind(status.rating)
                .bind(status.exists as i64)
                .bind(status.last_updated.timestamp())
                .bind(raw_json(status))
                .execute(self.pool)
                .await?;
            }
        }
        Ok(added)
    }

    /// Write the current state of every participant back, overwriting
    /// existing rows (upsert on roster_id and on (roster_id, platform)).
    pub async fn save_participants(&self, participants: &[Participant]) -> DbResult<()> {
        for p in participants {
            sqlx::query(
                r#"
                INSERT INTO participants (roster_id, name, college, batch, total_rating, percentile, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, strftime('%s', 'now'))
                ON CONFLICT(roster_id) DO UPDATE SET
                    name = excluded.name,
                    college = excluded.college,
                    batch = excluded.batch,
                    total_rating = excluded.total_rating,
                    percentile = excluded.percentile,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&p.roster_id)
            .bind(&p.name)
            .bind(&p.college)
            .bind(&p.batch)
            .bind(p.total_rating)
            .bind(p.percentile)
            .execute(self.pool)
            .await?;

            for (platform, status) in &p.platforms {
                sqlx::query(
                    r#"
                    INSERT INTO platform_statuses
                        (roster_id, platform, handle, rating, handle_exists, last_updated, raw_json)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(roster_id, platform) DO UPDATE SET
                        handle = excluded.handle,
                        rating = excluded.rating,
                        handle_exists = excluded.handle_exists,
                        last_updated = excluded.last_updated,
                        raw_json = excluded.raw_json
                    "#,
                )
                .bind(&p.roster_id)
                .bind(platform.as_str())
                .bind(&status.handle)
                .bind(status.rating)
                .bind(status.exists as i64)
                .bind(status.last_updated.timestamp())
                .bind(raw_json(status))
                .execute(self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Load one cohort (college + batch) with all platform statuses attached,
    /// ordered by roster id.
    pub async fn load_cohort(&self, college: &str, batch: &str) -> DbResult<Vec<Participant>> {
        let rows: Vec<(String, String, String, String, f64, f64)> = sqlx::query_as(
            r#"
            SELECT roster_id, name, college, batch, total_rating, percentile
            FROM participants
            WHERE college = ? AND batch = ?
            ORDER BY roster_id
            "#,
        )
        .bind(college)
        .bind(batch)
        .fetch_all(self.pool)
        .await?;

        let mut participants = Vec::with_capacity(rows.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        for (roster_id, name, college, batch, total_rating, percentile) in rows {
            let mut p = Participant::new(roster_id.clone(), name, college, batch);
            p.total_rating = total_rating;
            p.percentile = percentile;
            index.insert(roster_id, participants.len());
            participants.push(p);
        }

        let statuses: Vec<(String, String, String, Option<f64>, i64, i64, String)> = sqlx::query_as(
            r#"
            SELECT s.roster_id, s.platform, s.handle, s.rating, s.handle_exists, s.last_updated, s.raw_json
            FROM platform_statuses s
            JOIN participants p ON p.roster_id = s.roster_id
            WHERE p.college = ? AND p.batch = ?
            "#,
        )
        .bind(college)
        .bind(batch)
        .fetch_all(self.pool)
        .await?;

        for (roster_id, platform, handle, rating, handle_exists, last_updated, raw) in statuses {
            let Some(&i) = index.get(&roster_id) else { continue };
            let platform: Platform = match platform.parse() {
                Ok(platform) => platform,
                Err(err) => {
                    warn!(roster_id, error = %err, "skipping status row");
                    continue;
                }
            };
            let raw_data = serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
            let mut status = PlatformStatus::new(handle, rating, handle_exists != 0, raw_data);
            status.last_updated = DateTime::from_timestamp(last_updated, 0).unwrap_or_default();
            participants[i].platforms.insert(platform, status);
        }

        Ok(participants)
    }
}

fn raw_json(status: &PlatformStatus) -> String {
    serde_json::to_string(&status.raw_data).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use serde_json::json;

    fn roster_entry(roster_id: &str, rating: Option<f64>) -> Participant {
        let mut p = Participant::new(roster_id, format!("Name {roster_id}"), "CMRIT", "2026");
        p.platforms.insert(
            Platform::Codeforces,
            PlatformStatus::new(format!("{roster_id}_cf"), rating, rating.is_some(), json!({"x": 1})),
        );
        p
    }

    #[tokio::test]
    async fn roundtrip_preserves_statuses() {
        let db = Database::in_memory().await.unwrap();
        let repo = ParticipantRepository::new(db.pool());

        let mut original = vec![roster_entry("R001", Some(1500.0)), roster_entry("R002", None)];
        original[0].total_rating = 1500.0;
        original[0].percentile = 100.0;

        repo.save_participants(&original).await.unwrap();
        let loaded = repo.load_cohort("CMRIT", "2026").await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].roster_id, "R001");
        assert_eq!(loaded[0].total_rating, 1500.0);
        let status = &loaded[0].platforms[&Platform::Codeforces];
        assert_eq!(status.handle, "R001_cf");
        assert_eq!(status.rating, Some(1500.0));
        assert!(status.exists);
        assert_eq!(status.raw_data, json!({"x": 1}));

        let unresolved = &loaded[1].platforms[&Platform::Codeforces];
        assert_eq!(unresolved.rating, None);
        assert!(!unresolved.exists);
    }

    #[tokio::test]
    async fn insert_ignores_existing_roster_ids() {
        let db = Database::in_memory().await.unwrap();
        let repo = ParticipantRepository::new(db.pool());

        let roster = vec![roster_entry("R001", None)];
        assert_eq!(repo.insert_participants(&roster).await.unwrap(), 1);
        assert_eq!(repo.insert_participants(&roster).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_overwrites_previous_poll_state() {
        let db = Database::in_memory().await.unwrap();
        let repo = ParticipantRepository::new(db.pool());

        let mut roster = vec![roster_entry("R001", None)];
        repo.save_participants(&roster).await.unwrap();

        roster[0].platforms.insert(
            Platform::Codeforces,
            PlatformStatus::new("R001_cf", Some(1900.0), true, json!({"fresh": true})),
        );
        roster[0].total_rating = 1900.0;
        repo.save_participants(&roster).await.unwrap();

        let loaded = repo.load_cohort("CMRIT", "2026").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].platforms[&Platform::Codeforces].rating, Some(1900.0));
        assert_eq!(loaded[0].total_rating, 1900.0);
    }

    #[tokio::test]
    async fn cohorts_are_isolated() {
        let db = Database::in_memory().await.unwrap();
        let repo = ParticipantRepository::new(db.pool());

        let mut other = Participant::new("X001", "Other", "RVCE", "2025");
        other.platforms.insert(
            Platform::LeetCode,
            PlatformStatus::new("x1", None, false, serde_json::Value::Null),
        );
        repo.save_participants(&[roster_entry("R001", None), other]).await.unwrap();

        let cohort = repo.load_cohort("CMRIT", "2026").await.unwrap();
        assert_eq!(cohort.len(), 1);
        assert_eq!(cohort[0].roster_id, "R001");
    }
}
