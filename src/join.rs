//! Full outer join of tracks and awards on `track_name == title`.
//!
//! Repeated titles are not deduplicated: every matching (track, award) pair
//! becomes one row, like a relational outer join. Unmatched rows of either side
//! are kept with the other side's cells left absent.

use rusqlite::types::Value;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

use crate::error::MergeError;
use crate::models::{SourceTable, WideRow};
use crate::schema::{AWARD_KEY, COLUMNS, TRACK_KEY};

/// Joined rows plus the cardinality split of the join.
#[derive(Debug, Default)]
pub struct JoinOutcome {
    pub rows: Vec<WideRow>,
    pub matched_pairs: usize,
    pub unmatched_tracks: usize,
    pub unmatched_awards: usize,
}

/// Where each destination column comes from in the two source tables.
struct ColumnLayout {
    sources: Vec<(Option<usize>, Option<usize>)>,
}

impl ColumnLayout {
    fn resolve(tracks: &SourceTable, awards: &SourceTable) -> Self {
        let sources = COLUMNS
            .iter()
            .map(|c| (tracks.column_index(c.name), awards.column_index(c.name)))
            .collect();
        Self { sources }
    }

    /// Build a wide row. A column carried by both sides takes the first
    /// non-null of track then award.
    fn merge(&self, track: Option<&[Value]>, award: Option<&[Value]>) -> WideRow {
        self.sources
            .iter()
            .map(|&(ti, ai)| {
                let from_track = track.zip(ti).map(|(row, i)| &row[i]);
                let from_award = award.zip(ai).map(|(row, i)| &row[i]);
                [from_track, from_award]
                    .into_iter()
                    .flatten()
                    .find(|v| !matches!(v, Value::Null))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

/// Text form of a join key. Null never matches.
fn join_key(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Integer(i) => Some(Cow::Owned(i.to_string())),
        Value::Real(f) => Some(Cow::Owned(format!("{:?}", f))),
        Value::Blob(b) => std::str::from_utf8(b).ok().map(Cow::Borrowed),
    }
}

fn require_column(table: &SourceTable, column: &'static str) -> Result<usize, MergeError> {
    table
        .column_index(column)
        .ok_or_else(|| MergeError::MissingJoinColumn {
            table: table.name.clone(),
            column,
        })
}

/// Outer-join tracks and awards.
///
/// Output order: each track row in source order followed by its matches in
/// award order (or alone when unmatched), then the unmatched awards in source
/// order.
pub fn outer_join(tracks: &SourceTable, awards: &SourceTable) -> Result<JoinOutcome, MergeError> {
    let track_key = require_column(tracks, TRACK_KEY)?;
    let award_key = require_column(awards, AWARD_KEY)?;
    let layout = ColumnLayout::resolve(tracks, awards);

    let mut award_index: FxHashMap<Cow<'_, str>, Vec<usize>> = FxHashMap::default();
    for (i, row) in awards.rows.iter().enumerate() {
        if let Some(key) = join_key(&row[award_key]) {
            award_index.entry(key).or_default().push(i);
        }
    }

    let mut outcome = JoinOutcome::default();
    let mut award_matched = vec![false; awards.len()];

    for track in &tracks.rows {
        let matches = join_key(&track[track_key]).and_then(|k| award_index.get(k.as_ref()));
        match matches {
            Some(award_rows) => {
                for &ai in award_rows {
                    award_matched[ai] = true;
                    outcome
                        .rows
                        .push(layout.merge(Some(track.as_slice()), Some(awards.rows[ai].as_slice())));
                    outcome.matched_pairs += 1;
                }
            }
            None => {
                outcome.rows.push(layout.merge(Some(track.as_slice()), None));
                outcome.unmatched_tracks += 1;
            }
        }
    }

    for (award, matched) in awards.rows.iter().zip(award_matched) {
        if !matched {
            outcome.rows.push(layout.merge(None, Some(award.as_slice())));
            outcome.unmatched_awards += 1;
        }
    }

    Ok(outcome)
}
