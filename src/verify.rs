//! Post-run checks of the destination table.
//!
//! Re-derives the expected join cardinality from the current source tables and
//! checks that every destination cell is non-null and of its declared kind.

use rusqlite::Connection;

use crate::config::TableNames;
use crate::error::MergeError;
use crate::extract::extract_sources;
use crate::join::outer_join;
use crate::progress::Reporter;
use crate::schema::{quote_ident, ColumnKind, COLUMNS};

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub expected_rows: usize,
    pub actual_rows: usize,
    /// (column, offending row count)
    pub null_cells: Vec<(&'static str, usize)>,
    pub bad_integers: Vec<(&'static str, usize)>,
    pub bad_booleans: Vec<(&'static str, usize)>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.expected_rows == self.actual_rows
            && self.null_cells.is_empty()
            && self.bad_integers.is_empty()
            && self.bad_booleans.is_empty()
    }
}

fn count_where(conn: &Connection, table: &str, predicate: &str) -> Result<usize, MergeError> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", quote_ident(table), predicate);
    conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
        .map(|n| n as usize)
        .map_err(|source| MergeError::Extraction {
            table: table.to_string(),
            source,
        })
}

/// Check the destination table against the current sources.
pub fn verify_destination(
    conn: &Connection,
    tables: &TableNames,
    reporter: &Reporter,
) -> Result<VerifyReport, MergeError> {
    let (tracks, awards) = extract_sources(conn, tables, reporter)?;
    let joined = outer_join(&tracks, &awards)?;
    let dest = tables.destination.as_str();

    let mut report = VerifyReport {
        expected_rows: joined.matched_pairs + joined.unmatched_tracks + joined.unmatched_awards,
        actual_rows: count_where(conn, dest, "1")?,
        ..VerifyReport::default()
    };

    for column in COLUMNS.iter() {
        let name = quote_ident(column.name);

        let nulls = count_where(conn, dest, &format!("{} IS NULL", name))?;
        if nulls > 0 {
            report.null_cells.push((column.name, nulls));
        }

        match column.kind {
            ColumnKind::Integer => {
                let predicate = format!("typeof({}) NOT IN ('integer', 'null')", name);
                let bad = count_where(conn, dest, &predicate)?;
                if bad > 0 {
                    report.bad_integers.push((column.name, bad));
                }
            }
            ColumnKind::Boolean => {
                let bad = count_where(conn, dest, &format!("{} NOT IN (0, 1)", name))?;
                if bad > 0 {
                    report.bad_booleans.push((column.name, bad));
                }
            }
            _ => {}
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{load_batches, prepare_destination};
    use crate::normalize::normalize_rows;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE spotify_dataset (track_id TEXT, track_name TEXT, popularity INTEGER);
             INSERT INTO spotify_dataset VALUES ('t1', 'Song A', 50);
             INSERT INTO spotify_dataset VALUES ('t2', 'Song C', 70);
             CREATE TABLE the_grammy_awards (title TEXT, category TEXT, winner INTEGER);
             INSERT INTO the_grammy_awards VALUES ('Song C', 'Record Of The Year', 1);
             INSERT INTO the_grammy_awards VALUES ('Song B', 'Song Of The Year', 1);",
        )
        .unwrap();
        conn
    }

    fn merge(conn: &mut Connection) {
        let reporter = Reporter::new(true);
        let tables = TableNames::default();
        let (tracks, awards) = extract_sources(conn, &tables, &reporter).unwrap();
        let records = normalize_rows(outer_join(&tracks, &awards).unwrap().rows).unwrap();
        prepare_destination(conn, &tables.destination).unwrap();
        load_batches(conn, &tables.destination, &records, 1000, &reporter).unwrap();
    }

    #[test]
    fn test_clean_merge_passes() {
        let mut conn = setup();
        merge(&mut conn);
        let report = verify_destination(&conn, &TableNames::default(), &Reporter::new(true)).unwrap();
        assert_eq!(report.expected_rows, 3);
        assert_eq!(report.actual_rows, 3);
        assert!(report.is_ok(), "{:?}", report);
    }

    #[test]
    fn test_detects_nulls_and_bad_values() {
        let mut conn = setup();
        merge(&mut conn);
        conn.execute_batch(
            "UPDATE Spotify_Grrammy_Merge SET category = NULL WHERE track_name = 'Song A';
             UPDATE Spotify_Grrammy_Merge SET popularity = 1.5, winner = 7 WHERE title = 'Song B';",
        )
        .unwrap();
        let report = verify_destination(&conn, &TableNames::default(), &Reporter::new(true)).unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.null_cells, vec![("category", 1)]);
        assert_eq!(report.bad_integers, vec![("popularity", 1)]);
        assert_eq!(report.bad_booleans, vec![("winner", 1)]);
    }

    #[test]
    fn test_null_integer_counted_once() {
        let mut conn = setup();
        merge(&mut conn);
        conn.execute_batch(
            "UPDATE Spotify_Grrammy_Merge SET popularity = NULL WHERE track_name = 'Song A';",
        )
        .unwrap();
        let report = verify_destination(&conn, &TableNames::default(), &Reporter::new(true)).unwrap();
        assert_eq!(report.null_cells, vec![("popularity", 1)]);
        assert!(report.bad_integers.is_empty());
    }

    #[test]
    fn test_detects_row_count_drift() {
        let mut conn = setup();
        merge(&mut conn);
        conn.execute_batch("INSERT INTO spotify_dataset VALUES ('t3', 'Song D', 10);")
            .unwrap();
        let report = verify_destination(&conn, &TableNames::default(), &Reporter::new(true)).unwrap();
        assert_eq!(report.expected_rows, 4);
        assert_eq!(report.actual_rows, 3);
        assert!(!report.is_ok());
    }
}
