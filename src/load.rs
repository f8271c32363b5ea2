//! Destination reset and batched load.
//!
//! Each batch is its own transaction and is committed before the next batch
//! starts. A failing batch is rolled back and the load stops, but batches that
//! were already committed stay in the table until the next run truncates it.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};

use crate::error::{LoadStage, MergeError};
use crate::models::MergedRecord;
use crate::progress::Reporter;
use crate::schema::{create_table_sql, insert_sql, quote_ident, DATETIME_FORMAT};

/// Per-run load summary: size of every committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub batch_sizes: Vec<usize>,
    pub total: usize,
}

fn load_error(table: &str, stage: LoadStage) -> impl Fn(rusqlite::Error) -> MergeError + '_ {
    move |source| MergeError::Load {
        table: table.to_string(),
        stage,
        source,
    }
}

/// Create the destination table if it does not exist.
pub fn ensure_schema(conn: &Connection, table: &str) -> Result<(), MergeError> {
    conn.execute_batch(&create_table_sql(table))
        .map_err(load_error(table, LoadStage::EnsureSchema))?;
    log::info!("Table {} created or already present", table);
    Ok(())
}

/// Remove every row of the destination table. Runs in autocommit mode, so the
/// delete is flushed before any batch begins.
pub fn reset_table(conn: &Connection, table: &str) -> Result<(), MergeError> {
    let removed = conn
        .execute(&format!("DELETE FROM {}", quote_ident(table)), [])
        .map_err(load_error(table, LoadStage::Reset))?;
    log::info!("Table {} cleared ({} previous rows)", table, removed);
    Ok(())
}

/// Ensure the schema, then empty the table.
pub fn prepare_destination(conn: &Connection, table: &str) -> Result<(), MergeError> {
    ensure_schema(conn, table)?;
    reset_table(conn, table)
}

fn float_value(f: f64) -> Value {
    // NaN and infinities cannot be stored; bind them as NULL
    if f.is_finite() {
        Value::Real(f)
    } else {
        Value::Null
    }
}

/// Row tuple for the INSERT, in `COLUMNS` order. This is the last
/// null-normalization step before the store sees the row.
pub fn record_values(r: &MergedRecord) -> [Value; 30] {
    [
        Value::Text(r.track_id.clone()),
        Value::Text(r.artists.clone()),
        Value::Text(r.album_name.clone()),
        Value::Text(r.track_name.clone()),
        Value::Integer(r.popularity),
        Value::Integer(r.duration_ms),
        Value::Integer(r.explicit as i64),
        float_value(r.danceability),
        float_value(r.energy),
        Value::Integer(r.key),
        float_value(r.loudness),
        Value::Integer(r.mode),
        float_value(r.speechiness),
        float_value(r.acousticness),
        float_value(r.instrumentalness),
        float_value(r.liveness),
        float_value(r.valence),
        float_value(r.tempo),
        Value::Integer(r.time_signature),
        Value::Text(r.track_genre.clone()),
        Value::Integer(r.year),
        Value::Text(r.title.clone()),
        Value::Text(r.published_at.format(DATETIME_FORMAT).to_string()),
        Value::Text(r.updated_at.format(DATETIME_FORMAT).to_string()),
        Value::Text(r.category.clone()),
        Value::Text(r.nominee.clone()),
        Value::Text(r.artist.clone()),
        Value::Text(r.workers.clone()),
        Value::Text(r.img.clone()),
        Value::Integer(r.winner as i64),
    ]
}

fn insert_chunk(tx: &Transaction<'_>, sql: &str, chunk: &[MergedRecord]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare_cached(sql)?;
    for record in chunk {
        stmt.execute(params_from_iter(record_values(record)))?;
    }
    Ok(())
}

/// Insert `records` into `table` in batches of `batch_size`, committing each
/// batch before starting the next.
pub fn load_batches(
    conn: &mut Connection,
    table: &str,
    records: &[MergedRecord],
    batch_size: usize,
    reporter: &Reporter,
) -> Result<LoadReport, MergeError> {
    let sql = insert_sql(table);
    let batch_size = batch_size.max(1);
    let mut report = LoadReport::default();
    let pb = reporter.progress_bar(records.len() as u64, &format!("Loading {}", table));

    for (batch, chunk) in records.chunks(batch_size).enumerate() {
        let tx = conn
            .transaction()
            .map_err(load_error(table, LoadStage::Insert { batch }))?;

        if let Err(source) = insert_chunk(&tx, &sql, chunk) {
            log::error!(
                "Batch {} failed, rolling back its {} rows ({} rows already committed stay)",
                batch + 1,
                chunk.len(),
                report.total
            );
            if let Err(e) = tx.rollback() {
                log::warn!("Rollback of batch {} failed: {}", batch + 1, e);
            }
            pb.abandon();
            return Err(load_error(table, LoadStage::Insert { batch })(source));
        }

        tx.commit()
            .map_err(load_error(table, LoadStage::Commit { batch }))?;

        report.batch_sizes.push(chunk.len());
        report.total += chunk.len();
        pb.inc(chunk.len() as u64);
        log::info!("Inserted batch of {} rows", chunk.len());
        reporter.log_progress("LOAD", report.total as u64, records.len() as u64, batch_size as u64);
    }

    pb.finish_with_message(format!("Loaded {} rows into {}", report.total, table));
    log::info!("Total rows inserted into {}: {}", table, report.total);
    Ok(report)
}
