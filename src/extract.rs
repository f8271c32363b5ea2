//! Full-table reads of the two source catalogs.

use rusqlite::types::Value;
use rusqlite::Connection;

use crate::config::TableNames;
use crate::error::MergeError;
use crate::models::SourceTable;
use crate::progress::Reporter;
use crate::schema::quote_ident;

const LOG_INTERVAL: u64 = 50_000;

/// Read every row of `table` (`SELECT *`), keeping the store's column names and
/// row order. Cells keep their storage type.
pub fn read_table(
    conn: &Connection,
    table: &str,
    reporter: &Reporter,
) -> Result<SourceTable, MergeError> {
    let wrap = |source| MergeError::Extraction {
        table: table.to_string(),
        source,
    };

    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )
        .map_err(wrap)?;

    let pb = reporter.progress_bar(count as u64, &format!("Reading {}", table));

    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {}", quote_ident(table)))
        .map_err(wrap)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut result = SourceTable::new(table, columns);
    result.rows.reserve(count as usize);

    let mut rows = stmt.query([]).map_err(wrap)?;
    while let Some(row) = rows.next().map_err(wrap)? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(row.get::<_, Value>(i).map_err(wrap)?);
        }
        result.rows.push(cells);

        let read = result.rows.len() as u64;
        pb.inc(1);
        reporter.log_progress(table, read, count as u64, LOG_INTERVAL);
    }

    pb.finish_with_message(format!("Read {} rows from {}", result.len(), table));
    Ok(result)
}

/// Read the track and award catalogs, in that order.
pub fn extract_sources(
    conn: &Connection,
    tables: &TableNames,
    reporter: &Reporter,
) -> Result<(SourceTable, SourceTable), MergeError> {
    let tracks = read_table(conn, &tables.tracks, reporter)?;
    let awards = read_table(conn, &tables.awards, reporter)?;

    log::info!(
        "Loaded sources - {}: {} rows, {}: {} rows",
        tracks.name,
        tracks.len(),
        awards.name,
        awards.len()
    );
    Ok((tracks, awards))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter() -> Reporter {
        Reporter::new(true)
    }

    #[test]
    fn test_read_table_keeps_columns_and_types() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE the_grammy_awards (year INTEGER, title TEXT, winner INTEGER);
             INSERT INTO the_grammy_awards VALUES (2019, 'Song B', 1);
             INSERT INTO the_grammy_awards VALUES (NULL, 'Song C', 0);",
        )
        .unwrap();

        let table = read_table(&conn, "the_grammy_awards", &reporter()).unwrap();
        assert_eq!(table.columns, vec!["year", "title", "winner"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][0], Value::Integer(2019));
        assert_eq!(table.rows[0][1], Value::Text("Song B".to_string()));
        assert_eq!(table.rows[1][0], Value::Null);
    }

    #[test]
    fn test_missing_table_is_extraction_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = read_table(&conn, "spotify_dataset", &reporter()).unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");
        assert!(err.to_string().contains("spotify_dataset"));
    }

    #[test]
    fn test_empty_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE spotify_dataset (track_name TEXT)")
            .unwrap();
        let table = read_table(&conn, "spotify_dataset", &reporter()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["track_name"]);
    }
}
