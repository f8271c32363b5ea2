//! Check the merge table against its invariants
//!
//! Usage: verify-merge --database <store.sqlite3>
//!
//! Recomputes the outer-join cardinality from the current source tables and
//! checks that no destination cell is NULL and every integer/boolean column
//! holds values of its kind. Exits with status 1 when any check fails.

use anyhow::{Context, Result};
use clap::Parser;

use spotify_grammy_merge::config::{ConnectionParams, TableNames};
use spotify_grammy_merge::db;
use spotify_grammy_merge::progress::Reporter;
use spotify_grammy_merge::schema::{AWARD_TABLE, DEST_TABLE, TRACK_TABLE};
use spotify_grammy_merge::verify::verify_destination;

#[derive(Parser)]
#[command(name = "verify-merge")]
#[command(about = "Verify the Spotify/Grammy merge table against the current sources")]
struct Args {
    #[arg(long, env = "MERGE_DB_HOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "MERGE_DB_NAME", default_value = "spotify_grammy_db")]
    database: String,

    #[arg(long, default_value = TRACK_TABLE)]
    track_table: String,

    #[arg(long, default_value = AWARD_TABLE)]
    award_table: String,

    #[arg(long, default_value = DEST_TABLE)]
    dest_table: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let mut params = ConnectionParams::local(args.database);
    params.host = args.host;
    let tables = TableNames {
        tracks: args.track_table,
        awards: args.award_table,
        destination: args.dest_table,
    };

    let conn = db::connect_read_only(&params).context("Failed to open database")?;
    let report = verify_destination(&conn, &tables, &Reporter::new(true))
        .context("Failed to verify merge table")?;

    println!("\nVerifying {}", tables.destination);
    println!("{:-<60}", "");
    println!(
        "  Rows: {} (expected {} from outer join) {}",
        report.actual_rows,
        report.expected_rows,
        if report.actual_rows == report.expected_rows { "OK" } else { "MISMATCH" }
    );
    for (column, n) in &report.null_cells {
        println!("  NULL cells: {} in {}", n, column);
    }
    for (column, n) in &report.bad_integers {
        println!("  Non-integer values: {} in {}", n, column);
    }
    for (column, n) in &report.bad_booleans {
        println!("  Non-boolean values: {} in {}", n, column);
    }
    println!("{:-<60}", "");

    if report.is_ok() {
        println!("All checks passed.");
        Ok(())
    } else {
        println!("Verification failed.");
        std::process::exit(1);
    }
}
