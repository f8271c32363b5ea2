//! Run lifecycle of the merge job.
//!
//! ```text
//! INIT -> CONNECTED -> EXTRACTED -> TRANSFORMED -> SCHEMA_READY -> LOADING -> DONE
//!             \___________\______________\______________\____________\-> FAILED
//! ```
//!
//! Transitions are strictly sequential. FAILED is only entered once a
//! connection exists; a run that cannot connect stays in INIT and just returns
//! the error. Whatever state a later failure happens in, uncommitted work is
//! rolled back and the connection is released before the error is returned.

use rusqlite::Connection;
use serde::Serialize;
use std::fmt;
use std::time::Instant;

use crate::config::{ConnectionParams, JobOptions};
use crate::db;
use crate::error::MergeError;
use crate::extract::extract_sources;
use crate::join::outer_join;
use crate::load::{load_batches, prepare_destination};
use crate::models::RunStats;
use crate::normalize::normalize_rows;
use crate::progress::{format_duration, Reporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Init,
    Connected,
    Extracted,
    Transformed,
    SchemaReady,
    Loading,
    Done,
    Failed,
}

impl RunState {
    /// The only state reachable on success
    pub fn next(self) -> Option<RunState> {
        match self {
            RunState::Init => Some(RunState::Connected),
            RunState::Connected => Some(RunState::Extracted),
            RunState::Extracted => Some(RunState::Transformed),
            RunState::Transformed => Some(RunState::SchemaReady),
            RunState::SchemaReady => Some(RunState::Loading),
            RunState::Loading => Some(RunState::Done),
            RunState::Done | RunState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "INIT",
            RunState::Connected => "CONNECTED",
            RunState::Extracted => "EXTRACTED",
            RunState::Transformed => "TRANSFORMED",
            RunState::SchemaReady => "SCHEMA_READY",
            RunState::Loading => "LOADING",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Current state of one run plus every state it has been in.
#[derive(Debug)]
pub struct Lifecycle {
    state: RunState,
    history: Vec<RunState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: RunState::Init,
            history: vec![RunState::Init],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Move to `to`, which must be the successor of the current state.
    pub fn advance(&mut self, to: RunState) -> Result<(), MergeError> {
        if self.state.next() != Some(to) {
            return Err(MergeError::Run(anyhow::anyhow!(
                "invalid transition {} -> {}",
                self.state,
                to
            )));
        }
        log::debug!("Run state {} -> {}", self.state, to);
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to FAILED. No-op before CONNECTED and once the run has ended.
    pub fn fail(&mut self) {
        if self.state == RunState::Init || self.state.is_terminal() {
            return;
        }
        log::debug!("Run state {} -> {}", self.state, RunState::Failed);
        self.state = RunState::Failed;
        self.history.push(RunState::Failed);
    }
}

/// CONNECTED through DONE, on an open connection.
fn run_stages(
    conn: &mut Connection,
    options: &JobOptions,
    reporter: &Reporter,
    lifecycle: &mut Lifecycle,
) -> Result<RunStats, MergeError> {
    let mut stats = RunStats::default();

    let (tracks, awards) = extract_sources(conn, &options.tables, reporter)?;
    stats.track_rows = tracks.len();
    stats.award_rows = awards.len();
    lifecycle.advance(RunState::Extracted)?;

    let spinner = reporter.spinner("Merging and normalizing");
    let joined = outer_join(&tracks, &awards)?;
    stats.matched_pairs = joined.matched_pairs;
    stats.unmatched_tracks = joined.unmatched_tracks;
    stats.unmatched_awards = joined.unmatched_awards;
    log::info!(
        "Merge complete - {} rows ({} matched, {} track-only, {} award-only)",
        joined.rows.len(),
        joined.matched_pairs,
        joined.unmatched_tracks,
        joined.unmatched_awards
    );
    drop((tracks, awards));

    let records = normalize_rows(joined.rows)?;
    stats.merged_rows = records.len();
    spinner.finish_with_message(format!("Normalized {} rows", records.len()));
    lifecycle.advance(RunState::Transformed)?;

    prepare_destination(conn, &options.tables.destination)?;
    lifecycle.advance(RunState::SchemaReady)?;

    lifecycle.advance(RunState::Loading)?;
    let report = load_batches(
        conn,
        &options.tables.destination,
        &records,
        options.batch_size,
        reporter,
    )?;
    stats.batch_sizes = report.batch_sizes;
    stats.rows_inserted = report.total;
    lifecycle.advance(RunState::Done)?;

    Ok(stats)
}

/// Run the job once, recording transitions in `lifecycle`.
///
/// Options are validated before connecting. On any failure after connecting
/// the error is logged, open work is rolled back, the connection is closed and
/// the error is returned. Batches committed before a load failure remain.
pub fn run_with_lifecycle(
    params: &ConnectionParams,
    options: &JobOptions,
    reporter: &Reporter,
    lifecycle: &mut Lifecycle,
) -> Result<RunStats, MergeError> {
    let start = Instant::now();
    log::info!("Starting merge into {}", options.tables.destination);

    let mut conn = match options
        .validate()
        .map_err(MergeError::Run)
        .and_then(|()| db::connect(params))
    {
        Ok(conn) => conn,
        Err(err) => {
            log::error!("[{}] {}", err.kind(), err);
            return Err(err);
        }
    };

    let result = lifecycle
        .advance(RunState::Connected)
        .and_then(|()| run_stages(&mut conn, options, reporter, lifecycle));

    let result = match result {
        Ok(mut stats) => {
            stats.elapsed_seconds = start.elapsed().as_secs_f64();
            Ok(stats)
        }
        Err(err) => {
            log::error!("[{}] Error during run in state {}: {}", err.kind(), lifecycle.state(), err);
            db::rollback_pending(&conn);
            lifecycle.fail();
            Err(err)
        }
    };

    db::release(conn);
    log::info!(
        "Run finished in state {} after {}",
        lifecycle.state(),
        format_duration(start.elapsed())
    );
    result
}

/// Run the job once: the single entry point the scheduler triggers.
pub fn run(
    params: &ConnectionParams,
    options: &JobOptions,
    reporter: &Reporter,
) -> Result<RunStats, MergeError> {
    run_with_lifecycle(params, options, reporter, &mut Lifecycle::new())
}

/// Run the job, re-running it from scratch up to `retries` more times after a
/// failure. Returns the last outcome and the number of attempts made.
pub fn run_with_retries(
    params: &ConnectionParams,
    options: &JobOptions,
    reporter: &Reporter,
    retries: u32,
) -> (Result<RunStats, MergeError>, u32) {
    let max_attempts = retries.saturating_add(1);
    let mut attempt = 1;

    loop {
        match run(params, options, reporter) {
            Err(err) if attempt < max_attempts => {
                log::warn!(
                    "Attempt {}/{} failed with {}: {}; retrying whole run",
                    attempt,
                    max_attempts,
                    err.kind(),
                    err
                );
                attempt += 1;
            }
            outcome => return (outcome, attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_transitions() {
        let mut lc = Lifecycle::new();
        let mut state = RunState::Init;
        while let Some(next) = state.next() {
            lc.advance(next).unwrap();
            state = next;
        }
        assert_eq!(lc.state(), RunState::Done);
        assert_eq!(lc.history().len(), 7);
    }

    #[test]
    fn test_skipping_a_state_is_rejected() {
        let mut lc = Lifecycle::new();
        lc.advance(RunState::Connected).unwrap();
        let err = lc.advance(RunState::Transformed).unwrap_err();
        assert_eq!(err.kind(), "RunError");
        assert_eq!(lc.state(), RunState::Connected);
    }

    #[test]
    fn test_fail_from_any_running_state() {
        let mut lc = Lifecycle::new();
        lc.advance(RunState::Connected).unwrap();
        lc.advance(RunState::Extracted).unwrap();
        lc.fail();
        assert_eq!(lc.state(), RunState::Failed);
        assert!(lc.advance(RunState::Transformed).is_err());
    }

    #[test]
    fn test_done_is_final() {
        let mut lc = Lifecycle::new();
        for s in [
            RunState::Connected,
            RunState::Extracted,
            RunState::Transformed,
            RunState::SchemaReady,
            RunState::Loading,
            RunState::Done,
        ] {
            lc.advance(s).unwrap();
        }
        lc.fail();
        assert_eq!(lc.state(), RunState::Done);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(RunState::SchemaReady.to_string(), "SCHEMA_READY");
        assert_eq!(
            serde_json::to_string(&RunState::SchemaReady).unwrap(),
            "\"SCHEMA_READY\""
        );
    }

    #[test]
    fn test_connection_failure_stays_in_init() {
        let params = ConnectionParams::local("/nonexistent/dir/store.sqlite3");
        let mut lc = Lifecycle::new();
        let err = run_with_lifecycle(&params, &JobOptions::default(), &Reporter::new(true), &mut lc)
            .unwrap_err();
        assert_eq!(err.kind(), "ConnectionError");
        assert_eq!(lc.state(), RunState::Init);
        assert_eq!(lc.history(), &[RunState::Init]);
    }

    #[test]
    fn test_fail_before_connect_is_ignored() {
        let mut lc = Lifecycle::new();
        lc.fail();
        assert_eq!(lc.state(), RunState::Init);
        lc.advance(RunState::Connected).unwrap();
        lc.fail();
        assert_eq!(lc.history(), &[RunState::Init, RunState::Connected, RunState::Failed]);
    }

    #[test]
    fn test_invalid_options_stay_in_init() {
        let options = JobOptions {
            batch_size: 0,
            ..JobOptions::default()
        };
        let mut lc = Lifecycle::new();
        let err = run_with_lifecycle(
            &ConnectionParams::local("/nonexistent/dir/store.sqlite3"),
            &options,
            &Reporter::new(true),
            &mut lc,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "RunError");
        assert_eq!(lc.state(), RunState::Init);
    }
}
