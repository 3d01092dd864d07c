//! Overview maintenance
//!
//! An overview row holds `(count, start, end)` for one series. It is refreshed
//! inside the same transaction as the rows it describes.

use super::models::{OverviewRow, SeriesKey, Span};
use crate::error::Result;
use crate::models::WriteMode;
use duckdb::{Connection, ToSql};

/// What to write after a batch lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Final row, no scan needed
    Write(OverviewRow),
    /// Range is known; the count must be read back from the data table
    Recount { start: i64, end: i64 },
}

/// Decide how to refresh the overview of `key` after writing `batch`
pub fn plan(existing: Option<&OverviewRow>, key: &SeriesKey, batch: Span, mode: WriteMode) -> Plan {
    let Some(existing) = existing else {
        return Plan::Write(OverviewRow {
            key: key.clone(),
            count: batch.len,
            start: batch.start,
            end: batch.end,
        });
    };

    match mode {
        WriteMode::Streaming if batch.start > existing.end => Plan::Write(OverviewRow {
            key: key.clone(),
            count: existing.count + batch.len,
            start: existing.start,
            end: batch.end,
        }),
        WriteMode::Streaming => {
            tracing::warn!(
                "Streaming batch for {} starts at {} but stored data ends at {}; recounting",
                key,
                batch.start,
                existing.end
            );
            Plan::Recount {
                start: existing.start.min(batch.start),
                end: existing.end.max(batch.end),
            }
        }
        WriteMode::Full => Plan::Recount {
            start: existing.start.min(batch.start),
            end: existing.end.max(batch.end),
        },
    }
}

/// Refresh the overview of `key` after a batch was written to `data_table`
pub fn refresh(
    conn: &Connection,
    data_table: &str,
    overview_table: &str,
    key: &SeriesKey,
    batch: Span,
    mode: WriteMode,
) -> Result<OverviewRow> {
    let existing = load(conn, overview_table, key)?;

    let row = match plan(existing.as_ref(), key, batch, mode) {
        Plan::Write(row) => row,
        Plan::Recount { start, end } => OverviewRow {
            key: key.clone(),
            count: count_rows(conn, data_table, key)?,
            start,
            end,
        },
    };

    upsert(conn, overview_table, &row)?;
    Ok(row)
}

/// Overview row for `key`, if one exists
pub fn load(
    conn: &Connection,
    overview_table: &str,
    key: &SeriesKey,
) -> Result<Option<OverviewRow>> {
    let sql = format!(
        "SELECT \"count\", \"start\", \"end\" FROM {} WHERE {}",
        overview_table,
        key.predicate()
    );

    let result = conn.query_row(&sql, duckdb::params_from_iter(key.values()), |row| {
        Ok(OverviewRow {
            key: key.clone(),
            count: row.get(0)?,
            start: row.get(1)?,
            end: row.get(2)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(row)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Every overview row in `overview_table`
pub fn list(
    conn: &Connection,
    overview_table: &str,
    with_interval: bool,
) -> Result<Vec<OverviewRow>> {
    let sql = if with_interval {
        format!(
            "SELECT symbol, exchange, \"interval\", \"count\", \"start\", \"end\"
             FROM {overview_table}
             ORDER BY symbol, exchange, \"interval\""
        )
    } else {
        format!(
            "SELECT symbol, exchange, NULL, \"count\", \"start\", \"end\" FROM {overview_table}
             ORDER BY symbol, exchange"
        )
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(OverviewRow {
                key: SeriesKey {
                    symbol: row.get(0)?,
                    exchange: row.get(1)?,
                    interval: row.get(2)?,
                },
                count: row.get(3)?,
                start: row.get(4)?,
                end: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Exact number of stored rows for `key`
pub fn count_rows(conn: &Connection, data_table: &str, key: &SeriesKey) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", data_table, key.predicate());
    let count: i64 =
        conn.query_row(&sql, duckdb::params_from_iter(key.values()), |row| row.get(0))?;
    Ok(count)
}

/// Remove the overview row for `key`
pub fn delete(conn: &Connection, overview_table: &str, key: &SeriesKey) -> Result<usize> {
    let sql = format!("DELETE FROM {} WHERE {}", overview_table, key.predicate());
    let deleted = conn.execute(&sql, duckdb::params_from_iter(key.values()))?;
    Ok(deleted)
}

/// Replace every overview row with one computed from `data_table`
pub fn rebuild(
    conn: &Connection,
    data_table: &str,
    overview_table: &str,
    with_interval: bool,
) -> Result<usize> {
    let group = if with_interval {
        "symbol, exchange, \"interval\""
    } else {
        "symbol, exchange"
    };

    conn.execute(&format!("DELETE FROM {overview_table}"), [])?;
    let inserted = conn.execute(
        &format!(
            "INSERT INTO {overview_table} ({group}, \"count\", \"start\", \"end\")
             SELECT {group}, COUNT(*), MIN(datetime), MAX(datetime)
             FROM {data_table}
             GROUP BY {group}"
        ),
        [],
    )?;

    Ok(inserted)
}

fn upsert(conn: &Connection, overview_table: &str, row: &OverviewRow) -> Result<()> {
    let (columns, conflict) = if row.key.interval.is_some() {
        (
            "symbol, exchange, \"interval\", \"count\", \"start\", \"end\"",
            "symbol, exchange, \"interval\"",
        )
    } else {
        ("symbol, exchange, \"count\", \"start\", \"end\"", "symbol, exchange")
    };

    let values = row.key.values();
    let mut params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
    params.push(&row.count);
    params.push(&row.start);
    params.push(&row.end);

    let placeholders = vec!["?"; params.len()].join(", ");
    let sql = format!(
        "INSERT INTO {overview_table} ({columns}) VALUES ({placeholders})
         ON CONFLICT ({conflict}) DO UPDATE SET
           \"count\" = excluded.\"count\",
           \"start\" = excluded.\"start\",
           \"end\" = excluded.\"end\""
    );

    conn.execute(&sql, params.as_slice())?;
    Ok(())
}
