use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use spotify_grammy_merge::config::{ConnectionParams, JobOptions, TableNames, DEFAULT_BATCH_SIZE};
use spotify_grammy_merge::job;
use spotify_grammy_merge::progress::{format_duration, Reporter};
use spotify_grammy_merge::schema::{AWARD_TABLE, DEST_TABLE, TRACK_TABLE};

#[derive(Parser)]
#[command(name = "spotify-grammy-merge")]
#[command(about = "Outer-join the Spotify track catalog with Grammy awards and reload the merge table")]
struct Args {
    #[arg(long, env = "MERGE_DB_HOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "MERGE_DB_USER", default_value = "root")]
    user: String,

    #[arg(long, env = "MERGE_DB_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Database file holding the source and destination tables
    #[arg(long, env = "MERGE_DB_NAME", default_value = "spotify_grammy_db")]
    database: String,

    #[arg(long, env = "MERGE_TRACK_TABLE", default_value = TRACK_TABLE)]
    track_table: String,

    #[arg(long, env = "MERGE_AWARD_TABLE", default_value = AWARD_TABLE)]
    award_table: String,

    #[arg(long, env = "MERGE_DEST_TABLE", default_value = DEST_TABLE)]
    dest_table: String,

    /// Rows per committed batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Whole-run retries after a failed attempt
    #[arg(long, env = "MERGE_RETRIES", default_value_t = 1)]
    retries: u32,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: log::LevelFilter,

    /// Hide progress bars and log periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON to this path
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_secs()
        .init();

    let reporter = Reporter::new(args.log_only);
    let params = ConnectionParams {
        host: args.host,
        user: args.user,
        password: args.password,
        database: args.database,
    };
    let options = JobOptions {
        tables: TableNames {
            tracks: args.track_table,
            awards: args.award_table,
            destination: args.dest_table,
        },
        batch_size: args.batch_size,
    };

    let start = Instant::now();

    // A retry re-runs extraction through load from scratch
    let (outcome, attempts) = job::run_with_retries(&params, &options, &reporter, args.retries);
    let stats = outcome
        .with_context(|| format!("Merge job failed after {} attempt(s)", attempts))?;

    println!("\n{:=<60}", "");
    println!("Merge complete!");
    println!("  Tracks: {}", stats.track_rows);
    println!("  Awards: {}", stats.award_rows);
    println!(
        "  Merged rows: {} ({} matched, {} track-only, {} award-only)",
        stats.merged_rows, stats.matched_pairs, stats.unmatched_tracks, stats.unmatched_awards
    );
    println!(
        "  Inserted: {} rows in {} batches",
        stats.rows_inserted,
        stats.batches_committed()
    );
    println!("  Attempts: {}", attempts);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    if let Some(path) = args.stats {
        stats
            .write_to_file(&path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        log::info!("Stats written to {}", path.display());
    }

    Ok(())
}
