//! CP Track — roster polling and leaderboard CLI
//!
//! Usage:
//!   cptrack upload --csv roster.csv --college CMRIT --batch 2026
//!   cptrack scrape --college CMRIT --batch 2026 --platforms codeforces,leetcode
//!   cptrack verify --college CMRIT --batch 2026 --sample 25
//!   cptrack evaluate --college CMRIT --batch 2026 --export leaderboard.json

use clap::{Parser, Subcommand};
use engine::{
    aggregate, cancel_pair, BatchOptions, BatchReport, BatchRunner, CancelToken,
    LeaderboardEntry, NormalizationPolicy, Participant, Platform, RetryPolicy, TrackerConfig,
};
use persistence::repository::ParticipantRepository;
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "cptrack")]
#[command(about = "Competitive-programming roster tracker", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a roster CSV into the database
    Upload {
        /// CSV with roster_id, name, and one column per platform handle
        #[arg(long)]
        csv: String,
        #[arg(long)]
        college: String,
        #[arg(long)]
        batch: String,
    },
    /// Poll platforms for the cohort and store the results
    Scrape {
        #[arg(long)]
        college: String,
        #[arg(long)]
        batch: String,
        /// Platforms to poll (comma-separated), or "all"
        #[arg(long, value_delimiter = ',', default_value = "all")]
        platforms: Vec<String>,
        /// Poll a random sample of this many participants
        #[arg(long)]
        sample: Option<usize>,
        /// Override the configured concurrency cap
        #[arg(long)]
        max_in_flight: Option<usize>,
    },
    /// Check which handles exist, without writing anything back
    Verify {
        #[arg(long)]
        college: String,
        #[arg(long)]
        batch: String,
        #[arg(long, value_delimiter = ',', default_value = "all")]
        platforms: Vec<String>,
        #[arg(long)]
        sample: Option<usize>,
    },
    /// Recompute composites and percentiles and print the leaderboard
    Evaluate {
        #[arg(long)]
        college: String,
        #[arg(long)]
        batch: String,
        /// Export path; format chosen by extension (.json or .csv)
        #[arg(long)]
        export: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,cptrack=debug")
    } else {
        EnvFilter::new("info,engine=info,cptrack=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn parse_platforms(raw: &[String]) -> anyhow::Result<Vec<Platform>> {
    if raw.iter().any(|s| s.eq_ignore_ascii_case("all")) {
        return Ok(Platform::ALL.to_vec());
    }
    raw.iter()
        .map(|s| s.parse::<Platform>().map_err(|e| anyhow::anyhow!(e)))
        .collect()
}

/// Ctrl-C flips the shared cancel token; in-flight work drains gracefully.
fn ctrl_c_token() -> CancelToken {
    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, draining in-flight work");
            handle.cancel();
        }
    });
    token
}

async fn open_db() -> anyhow::Result<persistence::Database> {
    let db_path = std::env::var("CPTRACK_DB_PATH").unwrap_or_else(|_| "data/cptrack.db".to_string());
    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    info!("cptrack v{}", APP_VERSION);

    match cli.command {
        Commands::Upload { csv, college, batch } => {
            cmd_upload(&csv, &college, &batch).await?;
        }
        Commands::Scrape { college, batch, platforms, sample, max_in_flight } => {
            let platforms = parse_platforms(&platforms)?;
            cmd_scrape(&college, &batch, &platforms, sample, max_in_flight).await?;
        }
        Commands::Verify { college, batch, platforms, sample } => {
            let platforms = parse_platforms(&platforms)?;
            cmd_verify(&college, &batch, &platforms, sample).await?;
        }
        Commands::Evaluate { college, batch, export } => {
            cmd_evaluate(&college, &batch, export.as_deref()).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Upload command — roster CSV import
// ============================================================================

async fn cmd_upload(path: &str, college: &str, batch: &str) -> anyhow::Result<()> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    // Column -> platform mapping, resolved once from the header row.
    let platform_columns: Vec<(usize, Platform)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| h.trim().parse::<Platform>().ok().map(|p| (i, p)))
        .collect();
    let roster_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("roster_id"))
        .ok_or_else(|| anyhow::anyhow!("CSV is missing a roster_id column"))?;
    let name_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("name"))
        .ok_or_else(|| anyhow::anyhow!("CSV is missing a name column"))?;

    let mut participants = Vec::new();
    for record in reader.records() {
        let record = record?;
        let roster_id = record.get(roster_col).unwrap_or("").trim();
        if roster_id.is_empty() {
            continue;
        }
        let name = record.get(name_col).unwrap_or("").trim();

        let mut p = Participant::new(roster_id, name, college, batch);
        for &(col, platform) in &platform_columns {
            let handle = record.get(col).unwrap_or("").trim();
            if !handle.is_empty() {
                p.set_handle(platform, handle);
            }
        }
        participants.push(p);
    }

    let db = open_db().await?;
    let repo = ParticipantRepository::new(db.pool());
    let added = repo.insert_participants(&participants).await?;

    println!("Imported {added} new participants ({} rows in {path})", participants.len());
    Ok(())
}

// ============================================================================
// Scrape command — poll platforms and store results
// ============================================================================

async fn cmd_scrape(
    college: &str,
    batch: &str,
    platforms: &[Platform],
    sample: Option<usize>,
    max_in_flight: Option<usize>,
) -> anyhow::Result<()> {
    let config = TrackerConfig::from_env();
    let db = open_db().await?;
    let repo = ParticipantRepository::new(db.pool());

    let mut cohort = repo.load_cohort(college, batch).await?;
    if cohort.is_empty() {
        anyhow::bail!("no participants found for {college}/{batch}; run upload first");
    }

    let options = BatchOptions {
        max_in_flight: max_in_flight.unwrap_or(config.batch.max_in_flight),
        sample,
        retry: RetryPolicy { max_attempts: config.batch.max_attempts, ..Default::default() },
    };
    let runner = BatchRunner::from_config(&config, options);
    let cancel = ctrl_c_token();

    let report = runner.run(&mut cohort, platforms, &cancel).await;
    repo.save_participants(&cohort).await?;

    print_report(&report);
    Ok(())
}

// ============================================================================
// Verify command — existence check, read-only
// ============================================================================

async fn cmd_verify(
    college: &str,
    batch: &str,
    platforms: &[Platform],
    sample: Option<usize>,
) -> anyhow::Result<()> {
    let config = TrackerConfig::from_env();
    let db = open_db().await?;
    let repo = ParticipantRepository::new(db.pool());

    let mut cohort = repo.load_cohort(college, batch).await?;
    if cohort.is_empty() {
        anyhow::bail!("no participants found for {college}/{batch}; run upload first");
    }

    let options = BatchOptions {
        max_in_flight: config.batch.max_in_flight,
        sample,
        retry: RetryPolicy { max_attempts: config.batch.max_attempts, ..Default::default() },
    };
    let runner = BatchRunner::from_config(&config, options);
    let cancel = ctrl_c_token();

    // Nothing is saved: the polled copy of the cohort is dropped.
    let report = runner.run(&mut cohort, platforms, &cancel).await;
    print_report(&report);

    println!("\nUnresolved handles:");
    let mut any = false;
    for p in &cohort {
        for &platform in platforms {
            if let Some(status) = p.platforms.get(&platform) {
                if !status.exists && !status.handle.trim().is_empty() {
                    println!("  {:<12} {:<14} {}", p.roster_id, platform.to_string(), status.handle);
                    any = true;
                }
            }
        }
    }
    if !any {
        println!("  (none)");
    }
    Ok(())
}

// ============================================================================
// Evaluate command — aggregation and leaderboard
// ============================================================================

async fn cmd_evaluate(college: &str, batch: &str, export: Option<&str>) -> anyhow::Result<()> {
    let config = TrackerConfig::from_env();
    let db = open_db().await?;
    let repo = ParticipantRepository::new(db.pool());

    let mut cohort = repo.load_cohort(college, batch).await?;
    if cohort.is_empty() {
        anyhow::bail!("no participants found for {college}/{batch}; run upload first");
    }

    let policy = NormalizationPolicy::with_weights(config.weights.clone());
    let entries = aggregate(&mut cohort, &policy);
    repo.save_participants(&cohort).await?;

    print_leaderboard(&entries);

    if let Some(path) = export {
        export_entries(&entries, path)?;
        println!("\nExported {} entries to {path}", entries.len());
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("\n=== Batch report ===");
    println!("Scheduled: {} units{}", report.scheduled, if report.cancelled { " (cancelled)" } else { "" });
    for (platform, tally) in &report.per_platform {
        println!(
            "  {:<14} resolved {:>4}  not found {:>4}  failed {:>4}",
            platform.to_string(),
            tally.resolved,
            tally.not_found,
            tally.failed
        );
        for (roster_id, reason) in &tally.failures {
            println!("      {roster_id}: {reason}");
        }
    }
}

fn print_leaderboard(entries: &[LeaderboardEntry]) {
    println!("\n=== Leaderboard ===");
    println!("{:<6} {:<12} {:<24} {:>10} {:>7}", "Rank", "Roster", "Name", "Rating", "Pctl");
    for entry in entries.iter().take(50) {
        println!(
            "{:<6} {:<12} {:<24} {:>10.1} {:>6.1}%",
            entry.rank, entry.roster_id, entry.name, entry.total_rating, entry.percentile
        );
    }
    if entries.len() > 50 {
        println!("... and {} more", entries.len() - 50);
    }
}

fn export_entries(entries: &[LeaderboardEntry], path: &str) -> anyhow::Result<()> {
    if path.ends_with(".csv") {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec![
            "rank".to_string(),
            "roster_id".to_string(),
            "name".to_string(),
            "college".to_string(),
            "batch".to_string(),
            "total_rating".to_string(),
            "percentile".to_string(),
        ];
        header.extend(Platform::ALL.iter().map(|p| p.to_string().to_lowercase()));
        writer.write_record(&header)?;

        for entry in entries {
            let mut row = vec![
                entry.rank.to_string(),
                entry.roster_id.clone(),
                entry.name.clone(),
                entry.college.clone(),
                entry.batch.clone(),
                format!("{:.2}", entry.total_rating),
                format!("{:.2}", entry.percentile),
            ];
            row.extend(Platform::ALL.iter().map(|p| {
                entry
                    .platform_ratings
                    .get(p)
                    .map(|r| format!("{r:.2}"))
                    .unwrap_or_default()
            }));
            writer.write_record(&row)?;
        }
        writer.flush()?;
    } else {
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(path, json)?;
    }
    Ok(())
}
