//! Core data models for the merge job.
//!
//! Source tables are kept as loosely typed cells exactly as the store returned
//! them; `MergedRecord` is the statically typed row written to the destination.

use chrono::NaiveDateTime;
use rusqlite::types::Value;
use serde::Serialize;

// ============================================================================
// Source Models
// ============================================================================

/// A source table read with `SELECT *`: column names in store order and every
/// row as raw cells.
#[derive(Clone, Debug, Default)]
pub struct SourceTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Index of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Merged row before coercion, one cell per destination column in
/// `schema::COLUMNS` order. `Value::Null` marks an absent value.
pub type WideRow = Vec<Value>;

// ============================================================================
// Output Models
// ============================================================================

/// One row of the destination table.
///
/// Field order follows `schema::COLUMNS`; `normalize::coerce_row` relies on it.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedRecord {
    // Track side
    pub track_id: String,
    pub artists: String,
    pub album_name: String,
    pub track_name: String,
    pub popularity: i64,
    pub duration_ms: i64,
    pub explicit: bool,
    pub danceability: f64,
    pub energy: f64,
    pub key: i64,
    pub loudness: f64,
    pub mode: i64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub time_signature: i64,
    pub track_genre: String,
    pub year: i64,

    // Award side
    pub title: String,
    pub published_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub category: String,
    pub nominee: String,
    pub artist: String,
    pub workers: String,
    pub img: String,
    pub winner: bool,
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters for one run, written as JSON with `--stats`.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    // Extraction
    pub track_rows: usize,
    pub award_rows: usize,

    // Join cardinality
    pub matched_pairs: usize,
    pub unmatched_tracks: usize,
    pub unmatched_awards: usize,
    pub merged_rows: usize,

    // Load
    pub batch_sizes: Vec<usize>,
    pub rows_inserted: usize,

    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Rows the outer join must produce: matched pairs plus unmatched rows of
    /// either side.
    pub fn expected_rows(&self) -> usize {
        self.matched_pairs + self.unmatched_tracks + self.unmatched_awards
    }

    pub fn batches_committed(&self) -> usize {
        self.batch_sizes.len()
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
