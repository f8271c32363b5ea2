//! Null-fill and type coercion of joined rows.
//!
//! Two ordered passes, both driven by `schema::COLUMNS`:
//! 1. fill: every absent cell gets its column default;
//! 2. coerce: cells are cast kind by kind in `COERCION_ORDER`.
//!
//! Fill runs first, so defaults must already be castable. Any cell that cannot
//! be cast fails the whole run; rows are never skipped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Value;

use crate::error::MergeError;
use crate::models::{MergedRecord, WideRow};
use crate::schema::{ColumnKind, COERCION_ORDER, COLUMNS};

// ============================================================================
// Fill Pass
// ============================================================================

/// Replace absent cells with their column default. Present cells are left
/// untouched.
pub fn fill_defaults(rows: &mut [WideRow]) {
    for row in rows.iter_mut() {
        for (cell, column) in row.iter_mut().zip(COLUMNS.iter()) {
            if matches!(cell, Value::Null) {
                *cell = column.default.to_value();
            }
        }
    }
}

// ============================================================================
// Coercion Pass
// ============================================================================

/// Cell after coercion to its column kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Typed {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:?}", f),
        Value::Text(s) => format!("'{}'", s),
        Value::Blob(b) => format!("<{} byte blob>", b.len()),
    }
}

fn to_integer(value: &Value) -> Result<i64, String> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Real(f) => {
            let t = f.trunc();
            if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
                Ok(t as i64)
            } else {
                Err("out of integer range".to_string())
            }
        }
        Value::Text(s) => s.trim().parse::<i64>().map_err(|e| e.to_string()),
        Value::Blob(_) => Err("binary data".to_string()),
        Value::Null => Err("absent after fill".to_string()),
    }
}

fn to_float(value: &Value) -> Result<f64, String> {
    let f = match value {
        Value::Integer(i) => *i as f64,
        Value::Real(f) => *f,
        Value::Text(s) => s.trim().parse::<f64>().map_err(|e| e.to_string())?,
        Value::Blob(_) => return Err("binary data".to_string()),
        Value::Null => return Err("absent after fill".to_string()),
    };
    // NaN and infinities would be stored as NULL
    if f.is_finite() {
        Ok(f)
    } else {
        Err("non-finite value".to_string())
    }
}

fn to_boolean(value: &Value) -> Result<bool, String> {
    match value {
        Value::Integer(i) => Ok(*i != 0),
        Value::Real(f) => Ok(*f != 0.0),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Ok(true),
            "false" | "f" | "no" | "0" => Ok(false),
            _ => Err("not a boolean literal".to_string()),
        },
        Value::Blob(_) => Err("binary data".to_string()),
        Value::Null => Err("absent after fill".to_string()),
    }
}

fn to_text(value: &Value) -> Result<String, String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        // keep the trailing ".0" of whole reals
        Value::Real(f) => Ok(format!("{:?}", f)),
        Value::Blob(b) => String::from_utf8(b.clone()).map_err(|e| e.to_string()),
        Value::Null => Err("absent after fill".to_string()),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn to_datetime(value: &Value) -> Result<NaiveDateTime, String> {
    match value {
        Value::Text(s) => parse_datetime(s).ok_or_else(|| "unrecognized timestamp".to_string()),
        Value::Integer(secs) => DateTime::from_timestamp(*secs, 0)
            .map(|d| d.naive_utc())
            .ok_or_else(|| "out of timestamp range".to_string()),
        Value::Real(_) | Value::Blob(_) => Err("not a timestamp".to_string()),
        Value::Null => Err("absent after fill".to_string()),
    }
}

/// Cast one cell to `kind`.
pub fn coerce_cell(value: &Value, kind: ColumnKind) -> Result<Typed, String> {
    match kind {
        ColumnKind::Integer => to_integer(value).map(Typed::Integer),
        ColumnKind::Float => to_float(value).map(Typed::Float),
        ColumnKind::Boolean => to_boolean(value).map(Typed::Boolean),
        ColumnKind::Text => to_text(value).map(Typed::Text),
        ColumnKind::DateTime => to_datetime(value).map(Typed::DateTime),
    }
}

/// Typed cells in `COLUMNS` order, consumed front to back while the record is
/// assembled.
struct Cells(std::vec::IntoIter<Typed>);

impl Cells {
    fn text(&mut self) -> Option<String> {
        match self.0.next()? {
            Typed::Text(s) => Some(s),
            _ => None,
        }
    }

    fn integer(&mut self) -> Option<i64> {
        match self.0.next()? {
            Typed::Integer(i) => Some(i),
            _ => None,
        }
    }

    fn float(&mut self) -> Option<f64> {
        match self.0.next()? {
            Typed::Float(f) => Some(f),
            _ => None,
        }
    }

    fn boolean(&mut self) -> Option<bool> {
        match self.0.next()? {
            Typed::Boolean(b) => Some(b),
            _ => None,
        }
    }

    fn datetime(&mut self) -> Option<NaiveDateTime> {
        match self.0.next()? {
            Typed::DateTime(d) => Some(d),
            _ => None,
        }
    }

    // Struct literal fields are evaluated in the order written, which is
    // `COLUMNS` order.
    fn into_record(mut self) -> Option<MergedRecord> {
        Some(MergedRecord {
            track_id: self.text()?,
            artists: self.text()?,
            album_name: self.text()?,
            track_name: self.text()?,
            popularity: self.integer()?,
            duration_ms: self.integer()?,
            explicit: self.boolean()?,
            danceability: self.float()?,
            energy: self.float()?,
            key: self.integer()?,
            loudness: self.float()?,
            mode: self.integer()?,
            speechiness: self.float()?,
            acousticness: self.float()?,
            instrumentalness: self.float()?,
            liveness: self.float()?,
            valence: self.float()?,
            tempo: self.float()?,
            time_signature: self.integer()?,
            track_genre: self.text()?,
            year: self.integer()?,
            title: self.text()?,
            published_at: self.datetime()?,
            updated_at: self.datetime()?,
            category: self.text()?,
            nominee: self.text()?,
            artist: self.text()?,
            workers: self.text()?,
            img: self.text()?,
            winner: self.boolean()?,
        })
    }
}

/// Coerce one filled row into a `MergedRecord`. `index` is the row's position
/// in the join output, used in error messages.
pub fn coerce_row(index: usize, row: &WideRow) -> Result<MergedRecord, MergeError> {
    let mut typed: Vec<Option<Typed>> = vec![None; COLUMNS.len()];

    for kind in COERCION_ORDER {
        for (i, column) in COLUMNS.iter().enumerate() {
            if column.kind != kind {
                continue;
            }
            let value = &row[i];
            let cell = coerce_cell(value, kind).map_err(|reason| MergeError::Coercion {
                row: index,
                column: column.name,
                value: describe(value),
                expected: kind.label(),
                reason,
            })?;
            typed[i] = Some(cell);
        }
    }

    let cells: Option<Vec<Typed>> = typed.into_iter().collect();
    cells
        .and_then(|cells| Cells(cells.into_iter()).into_record())
        .ok_or_else(|| {
            MergeError::Run(anyhow::anyhow!(
                "row {}: coerced cells do not match the record layout",
                index
            ))
        })
}

/// Fill then coerce every joined row.
pub fn normalize_rows(mut rows: Vec<WideRow>) -> Result<Vec<MergedRecord>, MergeError> {
    fill_defaults(&mut rows);
    rows.iter()
        .enumerate()
        .map(|(i, row)| coerce_row(i, row))
        .collect()
}
