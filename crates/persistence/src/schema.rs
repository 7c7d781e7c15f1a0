//! Database schema definitions

/// SQL to create all tables
/// NOTE: `exists` is an SQL keyword, so the flag column is `handle_exists`
pub const CREATE_TABLES: &str = r#"
-- Tracked participants, one row per roster entry
CREATE TABLE IF NOT EXISTS participants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    roster_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    college TEXT NOT NULL,
    batch TEXT NOT NULL,
    total_rating REAL NOT NULL DEFAULT 0,
    percentile REAL NOT NULL DEFAULT 0,
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Per (participant, platform) poll state
CREATE TABLE IF NOT EXISTS platform_statuses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    roster_id TEXT NOT NULL,
    platform TEXT NOT NULL,
    handle TEXT NOT NULL,
    rating REAL,
    handle_exists INTEGER NOT NULL DEFAULT 0,
    last_updated INTEGER NOT NULL DEFAULT 0,
    raw_json TEXT NOT NULL DEFAULT 'null',
    UNIQUE(roster_id, platform)
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_participants_cohort ON participants(college, batch);
CREATE INDEX IF NOT EXISTS idx_participants_rating ON participants(total_rating DESC);
CREATE INDEX IF NOT EXISTS idx_statuses_roster ON platform_statuses(roster_id)
"#;
