//! Destination table shape.
//!
//! `COLUMNS` is the single table that drives the whole transform: the order of
//! the merged row, the SQL type of each destination column, the kind it is
//! coerced to and the default substituted when the value is absent.
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS Spotify_Grrammy_Merge (
//!     track_id VARCHAR(255), artists TEXT, album_name VARCHAR(255), track_name TEXT,
//!     popularity INT, duration_ms INT, explicit BOOLEAN, danceability FLOAT, ...
//!     published_at DATETIME, updated_at DATETIME, ..., img TEXT, winner BOOLEAN
//! );
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use rusqlite::types::Value;

// ============================================================================
// Table Names
// ============================================================================

pub const TRACK_TABLE: &str = "spotify_dataset";
pub const AWARD_TABLE: &str = "the_grammy_awards";
pub const DEST_TABLE: &str = "Spotify_Grrammy_Merge";

/// Join column on the track side
pub const TRACK_KEY: &str = "track_name";
/// Join column on the award side
pub const AWARD_KEY: &str = "title";

/// Storage format for DATETIME columns
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Placeholder for absent timestamps (2000-01-01 00:00:00)
pub static SENTINEL_DATETIME: Lazy<NaiveDateTime> = Lazy::new(|| {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
});

// ============================================================================
// Column Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
}

impl ColumnKind {
    pub fn label(self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::DateTime => "datetime",
        }
    }
}

/// Order of the coercion passes. Numeric casts run first, in the
/// integer/float/boolean order; text and timestamps follow.
pub const COERCION_ORDER: [ColumnKind; 5] = [
    ColumnKind::Integer,
    ColumnKind::Float,
    ColumnKind::Boolean,
    ColumnKind::Text,
    ColumnKind::DateTime,
];

/// Catalog a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Track,
    Award,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnDefault {
    Text(&'static str),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// `SENTINEL_DATETIME`
    Sentinel,
}

impl ColumnDefault {
    /// Raw cell substituted during the fill pass. Always castable to the
    /// column's own kind.
    pub fn to_value(self) -> Value {
        match self {
            ColumnDefault::Text(s) => Value::Text(s.to_string()),
            ColumnDefault::Integer(i) => Value::Integer(i),
            ColumnDefault::Float(f) => Value::Real(f),
            ColumnDefault::Boolean(b) => Value::Integer(b as i64),
            ColumnDefault::Sentinel => {
                Value::Text(SENTINEL_DATETIME.format(DATETIME_FORMAT).to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub kind: ColumnKind,
    pub side: Side,
    pub default: ColumnDefault,
}

const fn column(
    name: &'static str,
    sql_type: &'static str,
    kind: ColumnKind,
    side: Side,
    default: ColumnDefault,
) -> Column {
    Column {
        name,
        sql_type,
        kind,
        side,
        default,
    }
}

use ColumnDefault as D;
use ColumnKind as K;
use Side::{Award, Track};

/// Destination columns in insert order.
pub const COLUMNS: [Column; 30] = [
    column("track_id", "VARCHAR(255)", K::Text, Track, D::Text("")),
    column("artists", "TEXT", K::Text, Track, D::Text("")),
    column("album_name", "VARCHAR(255)", K::Text, Track, D::Text("")),
    column("track_name", "TEXT", K::Text, Track, D::Text("")),
    column("popularity", "INT", K::Integer, Track, D::Integer(0)),
    column("duration_ms", "INT", K::Integer, Track, D::Integer(0)),
    column("explicit", "BOOLEAN", K::Boolean, Track, D::Boolean(false)),
    column("danceability", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("energy", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("key", "INT", K::Integer, Track, D::Integer(0)),
    column("loudness", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("mode", "INT", K::Integer, Track, D::Integer(0)),
    column("speechiness", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("acousticness", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("instrumentalness", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("liveness", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("valence", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("tempo", "FLOAT", K::Float, Track, D::Float(0.0)),
    column("time_signature", "INT", K::Integer, Track, D::Integer(0)),
    column("track_genre", "VARCHAR(255)", K::Text, Track, D::Text("Unknown")),
    column("year", "INT", K::Integer, Track, D::Integer(0)),
    column("title", "VARCHAR(255)", K::Text, Award, D::Text("")),
    column("published_at", "DATETIME", K::DateTime, Award, D::Sentinel),
    column("updated_at", "DATETIME", K::DateTime, Award, D::Sentinel),
    column("category", "VARCHAR(255)", K::Text, Award, D::Text("")),
    column("nominee", "VARCHAR(255)", K::Text, Award, D::Text("")),
    column("artist", "VARCHAR(255)", K::Text, Award, D::Text("")),
    column("workers", "TEXT", K::Text, Award, D::Text("")),
    column("img", "TEXT", K::Text, Award, D::Text("")),
    column("winner", "BOOLEAN", K::Boolean, Award, D::Boolean(false)),
];

/// Position of a destination column in `COLUMNS`
pub fn column_position(name: &str) -> Option<usize> {
    COLUMNS.iter().position(|c| c.name == name)
}

// ============================================================================
// SQL
// ============================================================================

/// Quote an identifier for SQLite (`key` is a keyword).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` for the destination. Never alters an
/// existing table.
pub fn create_table_sql(table: &str) -> String {
    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|c| format!("    {} {}", quote_ident(c.name), c.sql_type))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        quote_ident(table),
        columns.join(",\n")
    )
}

/// Single-row INSERT with one positional placeholder per column.
pub fn insert_sql(table: &str) -> String {
    let names: Vec<String> = COLUMNS.iter().map(|c| quote_ident(c.name)).collect();
    let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names.join(", "),
        placeholders.join(", ")
    )
}
