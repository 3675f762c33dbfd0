use anyhow::{Context, Result};
use duckdb::{params, Connection, Transaction};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::ReviewError;
use crate::process::CleanedReview;

pub const REVIEWS_TABLE: &str = "reviews";

const CREATE_REVIEWS_SQL: &str = r#"
    DROP TABLE IF EXISTS reviews;
    CREATE TABLE reviews(
        title TEXT,
        score INTEGER,
        iso TEXT,
        "date" TEXT,
        apps_bought INTEGER,
        money_spent NUMERIC(18, 3),
        apps_bought_bucket TEXT,
        money_spent_bucket TEXT
    );"#;

const INSERT_REVIEW_SQL: &str = "INSERT INTO reviews VALUES (?, ?, ?, ?, ?, ?, ?, ?);";

/// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
pub fn open_disk_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())
        .with_context(|| format!("opening database {:?}", path.as_ref()))?;
    Ok(conn)
}

/// Open a DuckDB in‐memory database
pub fn open_mem_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    Ok(conn)
}

/// Replace the whole `reviews` table with `records`.
///
/// Drop, create and insert all run in one transaction: either the new rows
/// are committed or the previous table is left exactly as it was.
#[tracing::instrument(level = "info", skip_all, fields(rows = records.len()))]
pub fn replace_reviews(conn: &mut Connection, records: &[CleanedReview]) -> Result<usize> {
    let start = Instant::now();
    let tx = conn.transaction().map_err(store_failure)?;

    match write_reviews(&tx, records) {
        Ok(n) => {
            tx.commit().map_err(store_failure)?;
            info!(rows = n, elapsed = ?start.elapsed(), "replaced {}", REVIEWS_TABLE);
            Ok(n)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback() {
                warn!(error = %rb, "rollback failed");
            }
            Err(store_failure(e).into())
        }
    }
}

fn write_reviews(tx: &Transaction<'_>, records: &[CleanedReview]) -> duckdb::Result<usize> {
    tx.execute_batch(CREATE_REVIEWS_SQL)?;

    let mut stmt = tx.prepare(INSERT_REVIEW_SQL)?;
    for r in records {
        let date = r.date_text();
        stmt.execute(params![
            r.title,
            r.score,
            r.iso,
            date,
            r.apps_bought,
            r.money_spent,
            r.apps_bought_bucket,
            r.money_spent_bucket
        ])?;
    }
    Ok(records.len())
}

fn store_failure(e: duckdb::Error) -> ReviewError {
    ReviewError::StoreWriteFailure {
        table: REVIEWS_TABLE.to_string(),
        reason: e.to_string(),
    }
}

pub fn count_reviews(conn: &Connection) -> Result<i64> {
    let n = conn
        .query_row("SELECT COUNT(*) FROM reviews;", [], |r| r.get(0))
        .context("counting reviews")?;
    Ok(n)
}
