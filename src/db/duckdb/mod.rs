//! DuckDB market data store (Historify)
//!
//! Reads and schema work go through one session connection. Saves and deletes
//! check out a pooled writer connection and run inside a single transaction,
//! so rows and their overview are committed together.

pub mod marshal;
pub mod models;
pub mod overview;
pub mod pool;
pub mod schema;

use super::MarketDataStore;
use crate::config::DatabaseSettings;
use crate::constant::{Exchange, Interval};
use crate::error::{Result, StoreError};
use crate::models::{BarData, BarOverview, DropReport, TickData, TickOverview, WriteMode};
use chrono::DateTime;
use chrono_tz::Tz;
use duckdb::Connection;
use models::{BarRow, Batch, OverviewRow, SeriesKey, TickRow};
use parking_lot::Mutex;
use pool::WriterPool;
use schema::Namespaces;
use std::sync::Arc;
use tracing::{debug, info, warn};

const BAR_COLUMNS: [&str; 11] = [
    "symbol",
    "exchange",
    "interval",
    "datetime",
    "volume",
    "turnover",
    "open_interest",
    "open_price",
    "high_price",
    "low_price",
    "close_price",
];
const BAR_KEY: [&str; 4] = ["symbol", "exchange", "interval", "datetime"];

const TICK_COLUMNS: [&str; 36] = [
    "symbol",
    "exchange",
    "datetime",
    "name",
    "volume",
    "turnover",
    "open_interest",
    "last_price",
    "last_volume",
    "limit_up",
    "limit_down",
    "open_price",
    "high_price",
    "low_price",
    "pre_close",
    "bid_price_1",
    "bid_price_2",
    "bid_price_3",
    "bid_price_4",
    "bid_price_5",
    "ask_price_1",
    "ask_price_2",
    "ask_price_3",
    "ask_price_4",
    "ask_price_5",
    "bid_volume_1",
    "bid_volume_2",
    "bid_volume_3",
    "bid_volume_4",
    "bid_volume_5",
    "ask_volume_1",
    "ask_volume_2",
    "ask_volume_3",
    "ask_volume_4",
    "ask_volume_5",
    "localtime",
];
const TICK_KEY: [&str; 3] = ["symbol", "exchange", "datetime"];

/// DuckDB-backed [`MarketDataStore`]
pub struct DuckDb {
    session: Arc<Mutex<Connection>>,
    writers: WriterPool,
    namespaces: Namespaces,
    tz: Tz,
}

impl DuckDb {
    /// Open the database and create any missing namespace.
    ///
    /// Fails if the file cannot be opened or the schema cannot be created.
    pub fn new(settings: &DatabaseSettings) -> Result<Self> {
        settings.validate()?;
        let tz = settings.tz()?;

        let conn = if settings.is_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&settings.path)
        }
        .map_err(StoreError::Connection)?;

        let namespaces = Namespaces::new(&settings.database, settings.layout);
        schema::initialize(&conn, &namespaces)?;

        let session = Arc::new(Mutex::new(conn));
        let writers = pool::open_writer_pool(session.clone(), settings.pool_size)?;

        info!(
            "Opened DuckDB store at {} (namespaces: {}, writers: {})",
            settings.path,
            namespaces.all().join(", "),
            settings.pool_size
        );

        Ok(Self {
            session,
            writers,
            namespaces,
            tz,
        })
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Timezone applied to loaded records
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Create any namespace that is missing, e.g. after [`MarketDataStore::drop_all`]
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.session.lock();
        schema::initialize(&conn, &self.namespaces)
    }

    fn write_bar_batch(&self, batch: &Batch<BarRow>, mode: WriteMode) -> Result<OverviewRow> {
        let bar_table = self.namespaces.bar_table();
        let mut conn = self.writers.get()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(&upsert_sql(&bar_table, &BAR_COLUMNS, &BAR_KEY))?;
            for row in &batch.rows {
                stmt.execute(duckdb::params![
                    row.symbol,
                    row.exchange,
                    row.interval,
                    row.datetime,
                    row.volume,
                    row.turnover,
                    row.open_interest,
                    row.open_price,
                    row.high_price,
                    row.low_price,
                    row.close_price,
                ])?;
            }
        }

        let overview = overview::refresh(
            &tx,
            &bar_table,
            &self.namespaces.bar_overview_table(),
            &batch.key,
            batch.span(),
            mode,
        )?;

        tx.commit()?;
        Ok(overview)
    }

    fn write_tick_batch(&self, batch: &Batch<TickRow>, mode: WriteMode) -> Result<OverviewRow> {
        let tick_table = self.namespaces.tick_table();
        let mut conn = self.writers.get()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(&upsert_sql(&tick_table, &TICK_COLUMNS, &TICK_KEY))?;
            for row in &batch.rows {
                let [bp1, bp2, bp3, bp4, bp5] = row.bid_price;
                let [ap1, ap2, ap3, ap4, ap5] = row.ask_price;
                let [bv1, bv2, bv3, bv4, bv5] = row.bid_volume;
                let [av1, av2, av3, av4, av5] = row.ask_volume;

                stmt.execute(duckdb::params![
                    row.symbol,
                    row.exchange,
                    row.datetime,
                    row.name,
                    row.volume,
                    row.turnover,
                    row.open_interest,
                    row.last_price,
                    row.last_volume,
                    row.limit_up,
                    row.limit_down,
                    row.open_price,
                    row.high_price,
                    row.low_price,
                    row.pre_close,
                    bp1,
                    bp2,
                    bp3,
                    bp4,
                    bp5,
                    ap1,
                    ap2,
                    ap3,
                    ap4,
                    ap5,
                    bv1,
                    bv2,
                    bv3,
                    bv4,
                    bv5,
                    av1,
                    av2,
                    av3,
                    av4,
                    av5,
                    row.localtime,
                ])?;
            }
        }

        let overview = overview::refresh(
            &tx,
            &tick_table,
            &self.namespaces.tick_overview_table(),
            &batch.key,
            batch.span(),
            mode,
        )?;

        tx.commit()?;
        Ok(overview)
    }

    /// Count, delete rows, delete overview; one transaction
    fn delete_series(
        &self,
        data_table: &str,
        overview_table: &str,
        key: &SeriesKey,
    ) -> Result<i64> {
        let mut conn = self.writers.get()?;
        let tx = conn.transaction()?;

        let count = overview::count_rows(&tx, data_table, key)?;
        tx.execute(
            &format!("DELETE FROM {} WHERE {}", data_table, key.predicate()),
            duckdb::params_from_iter(key.values()),
        )?;
        overview::delete(&tx, overview_table, key)?;

        tx.commit()?;
        Ok(count)
    }
}

impl MarketDataStore for DuckDb {
    fn save_bars(&self, bars: &[BarData], mode: WriteMode) -> Result<BarOverview> {
        let batch = marshal::bars_to_batch(bars)?;

        let row = self
            .write_bar_batch(&batch, mode)
            .map_err(|e| StoreError::write("bar", e))?;
        debug!(
            "Saved {} bars for {} ({:?}); overview count {}",
            batch.len(),
            batch.key,
            mode,
            row.count
        );

        marshal::bar_overview_from_row(row, self.tz)
    }

    fn save_ticks(&self, ticks: &[TickData], mode: WriteMode) -> Result<TickOverview> {
        let batch = marshal::ticks_to_batch(ticks)?;

        let row = self
            .write_tick_batch(&batch, mode)
            .map_err(|e| StoreError::write("tick", e))?;
        debug!(
            "Saved {} ticks for {} ({:?}); overview count {}",
            batch.len(),
            batch.key,
            mode,
            row.count
        );

        marshal::tick_overview_from_row(row, self.tz)
    }

    fn load_bars(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<BarData>> {
        let start = marshal::to_epoch_ns_clamped(&start);
        let end = marshal::to_epoch_ns_clamped(&end);

        let sql = format!(
            "SELECT {} FROM {}
             WHERE symbol = ? AND exchange = ? AND \"interval\" = ?
               AND datetime >= ? AND datetime <= ?
             ORDER BY datetime ASC",
            column_list(&BAR_COLUMNS),
            self.namespaces.bar_table()
        );

        let rows = {
            let conn = self.session.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    duckdb::params![symbol, exchange.value(), interval.value(), start, end],
                    |row| {
                        Ok(BarRow {
                            symbol: row.get(0)?,
                            exchange: row.get(1)?,
                            interval: row.get(2)?,
                            datetime: row.get(3)?,
                            volume: row.get(4)?,
                            turnover: row.get(5)?,
                            open_interest: row.get(6)?,
                            open_price: row.get(7)?,
                            high_price: row.get(8)?,
                            low_price: row.get(9)?,
                            close_price: row.get(10)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        debug!("Loaded {} bars for {}.{} {}", rows.len(), symbol, exchange, interval);
        marshal::bars_from_rows(rows, self.tz)
    }

    fn load_ticks(
        &self,
        symbol: &str,
        exchange: Exchange,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<TickData>> {
        let start = marshal::to_epoch_ns_clamped(&start);
        let end = marshal::to_epoch_ns_clamped(&end);

        let sql = format!(
            "SELECT {} FROM {}
             WHERE symbol = ? AND exchange = ? AND datetime >= ? AND datetime <= ?
             ORDER BY datetime ASC",
            column_list(&TICK_COLUMNS),
            self.namespaces.tick_table()
        );

        let rows = {
            let conn = self.session.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    duckdb::params![symbol, exchange.value(), start, end],
                    |row| {
                        Ok(TickRow {
                            symbol: row.get("symbol")?,
                            exchange: row.get("exchange")?,
                            datetime: row.get("datetime")?,
                            name: row.get("name")?,
                            volume: row.get("volume")?,
                            turnover: row.get("turnover")?,
                            open_interest: row.get("open_interest")?,
                            last_price: row.get("last_price")?,
                            last_volume: row.get("last_volume")?,
                            limit_up: row.get("limit_up")?,
                            limit_down: row.get("limit_down")?,
                            open_price: row.get("open_price")?,
                            high_price: row.get("high_price")?,
                            low_price: row.get("low_price")?,
                            pre_close: row.get("pre_close")?,
                            bid_price: [
                                row.get("bid_price_1")?,
                                row.get("bid_price_2")?,
                                row.get("bid_price_3")?,
                                row.get("bid_price_4")?,
                                row.get("bid_price_5")?,
                            ],
                            ask_price: [
                                row.get("ask_price_1")?,
                                row.get("ask_price_2")?,
                                row.get("ask_price_3")?,
                                row.get("ask_price_4")?,
                                row.get("ask_price_5")?,
                            ],
                            bid_volume: [
                                row.get("bid_volume_1")?,
                                row.get("bid_volume_2")?,
                                row.get("bid_volume_3")?,
                                row.get("bid_volume_4")?,
                                row.get("bid_volume_5")?,
                            ],
                            ask_volume: [
                                row.get("ask_volume_1")?,
                                row.get("ask_volume_2")?,
                                row.get("ask_volume_3")?,
                                row.get("ask_volume_4")?,
                                row.get("ask_volume_5")?,
                            ],
                            localtime: row.get("localtime")?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        debug!("Loaded {} ticks for {}.{}", rows.len(), symbol, exchange);
        marshal::ticks_from_rows(rows, self.tz)
    }

    fn delete_bars(&self, symbol: &str, exchange: Exchange, interval: Interval) -> Result<i64> {
        let key = SeriesKey {
            symbol: symbol.to_string(),
            exchange: exchange.value().to_string(),
            interval: Some(interval.value().to_string()),
        };

        let count = self
            .delete_series(
                &self.namespaces.bar_table(),
                &self.namespaces.bar_overview_table(),
                &key,
            )
            .map_err(|e| StoreError::write("bar", e))?;

        info!("Deleted {} bars for {}", count, key);
        Ok(count)
    }

    fn delete_ticks(&self, symbol: &str, exchange: Exchange) -> Result<i64> {
        let key = SeriesKey {
            symbol: symbol.to_string(),
            exchange: exchange.value().to_string(),
            interval: None,
        };

        let count = self
            .delete_series(
                &self.namespaces.tick_table(),
                &self.namespaces.tick_overview_table(),
                &key,
            )
            .map_err(|e| StoreError::write("tick", e))?;

        info!("Deleted {} ticks for {}", count, key);
        Ok(count)
    }

    fn list_bar_overviews(&self) -> Result<Vec<BarOverview>> {
        let rows = {
            let conn = self.session.lock();
            overview::list(&conn, &self.namespaces.bar_overview_table(), true)?
        };

        rows.into_iter()
            .map(|row| marshal::bar_overview_from_row(row, self.tz))
            .collect()
    }

    fn list_tick_overviews(&self) -> Result<Vec<TickOverview>> {
        let rows = {
            let conn = self.session.lock();
            overview::list(&conn, &self.namespaces.tick_overview_table(), false)?
        };

        rows.into_iter()
            .map(|row| marshal::tick_overview_from_row(row, self.tz))
            .collect()
    }

    fn rebuild_overviews(&self) -> Result<(usize, usize)> {
        let rebuild = || -> Result<(usize, usize)> {
            let mut conn = self.writers.get()?;
            let tx = conn.transaction()?;

            let bars = overview::rebuild(
                &tx,
                &self.namespaces.bar_table(),
                &self.namespaces.bar_overview_table(),
                true,
            )?;
            let ticks = overview::rebuild(
                &tx,
                &self.namespaces.tick_table(),
                &self.namespaces.tick_overview_table(),
                false,
            )?;

            tx.commit()?;
            Ok((bars, ticks))
        };

        let (bars, ticks) = rebuild().map_err(|e| StoreError::write("overview", e))?;
        info!("Rebuilt overviews: {} bar series, {} tick series", bars, ticks);
        Ok((bars, ticks))
    }

    fn drop_all(&self) -> Result<Vec<DropReport>> {
        let conn = self.session.lock();
        let reports = self
            .namespaces
            .all()
            .into_iter()
            .map(|namespace| drop_namespace(&conn, namespace))
            .collect();
        Ok(reports)
    }
}

/// Drop one namespace, recording any failure in the report
fn drop_namespace(conn: &Connection, namespace: &str) -> DropReport {
    let mut report = DropReport {
        namespace: namespace.to_string(),
        existed: false,
        dropped: false,
        error: None,
    };

    let outcome = (|| -> Result<()> {
        report.existed = schema::namespace_exists(conn, namespace)?;
        conn.execute_batch(&format!("DROP SCHEMA IF EXISTS \"{namespace}\" CASCADE"))?;
        report.dropped = report.existed && !schema::namespace_exists(conn, namespace)?;
        Ok(())
    })();

    match outcome {
        Ok(()) if report.existed => info!("Dropped namespace {}", namespace),
        Ok(()) => info!("Namespace {} did not exist", namespace),
        Err(e) => {
            warn!("Failed to drop namespace {}: {}", namespace, e);
            report.error = Some(e.to_string());
        }
    }

    report
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Insert that replaces every non-key column when the key already exists
fn upsert_sql(table: &str, columns: &[&str], key: &[&str]) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates = columns
        .iter()
        .filter(|c| !key.contains(c))
        .map(|c| format!("\"{c}\" = excluded.\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})
         ON CONFLICT ({}) DO UPDATE SET {updates}",
        column_list(columns),
        column_list(key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaLayout;
    use chrono::{Duration, TimeZone};
    use chrono_tz::America::New_York;
    use chrono_tz::Asia::Shanghai;

    fn open_store() -> DuckDb {
        DuckDb::new(&DatabaseSettings::in_memory()).unwrap()
    }

    fn t0() -> DateTime<Tz> {
        New_York.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap()
    }

    fn minute(n: i64) -> DateTime<Tz> {
        t0() + Duration::minutes(n)
    }

    fn aapl_bar(n: i64, close: f64) -> BarData {
        BarData {
            volume: 100.0 * (n + 1) as f64,
            open_price: close - 0.5,
            high_price: close + 1.0,
            low_price: close - 1.0,
            close_price: close,
            ..BarData::new("AAPL", Exchange::Nasdaq, Interval::Minute, minute(n))
        }
    }

    fn load_aapl(store: &DuckDb, from: i64, to: i64) -> Vec<BarData> {
        store
            .load_bars("AAPL", Exchange::Nasdaq, Interval::Minute, minute(from), minute(to))
            .unwrap()
    }

    fn closes(bars: &[BarData]) -> Vec<f64> {
        bars.iter().map(|b| b.close_price).collect()
    }

    #[test]
    fn test_save_then_load_three_bars() {
        let store = open_store();
        let bars = vec![aapl_bar(0, 10.0), aapl_bar(1, 11.0), aapl_bar(2, 12.0)];

        let overview = store.save_bars(&bars, WriteMode::Full).unwrap();
        assert_eq!(overview.count, 3);

        let loaded = load_aapl(&store, 0, 2);
        assert_eq!(loaded, bars);
        assert_eq!(closes(&loaded), vec![10.0, 11.0, 12.0]);

        let overviews = store.list_bar_overviews().unwrap();
        assert_eq!(overviews.len(), 1);
        let overview = &overviews[0];
        assert_eq!(overview.symbol, "AAPL");
        assert_eq!(overview.exchange, Exchange::Nasdaq);
        assert_eq!(overview.interval, Interval::Minute);
        assert_eq!(overview.count, 3);
        assert_eq!(overview.start, minute(0));
        assert_eq!(overview.end, minute(2));
    }

    #[test]
    fn test_load_is_inclusive_and_ordered() {
        let store = open_store();
        let bars = vec![aapl_bar(3, 13.0), aapl_bar(0, 10.0), aapl_bar(2, 12.0), aapl_bar(1, 11.0)];
        store.save_bars(&bars, WriteMode::Full).unwrap();

        assert_eq!(closes(&load_aapl(&store, 1, 2)), vec![11.0, 12.0]);
        assert_eq!(closes(&load_aapl(&store, 0, 3)), vec![10.0, 11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_loads_without_data_are_empty() {
        let store = open_store();
        store.save_bars(&[aapl_bar(0, 10.0)], WriteMode::Full).unwrap();

        assert!(load_aapl(&store, 10, 20).is_empty());
        assert!(store
            .load_bars("MSFT", Exchange::Nasdaq, Interval::Minute, minute(0), minute(5))
            .unwrap()
            .is_empty());
        assert!(store
            .load_bars("AAPL", Exchange::Nasdaq, Interval::Daily, minute(0), minute(5))
            .unwrap()
            .is_empty());
        assert!(store
            .load_ticks("AAPL", Exchange::Nasdaq, minute(0), minute(5))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_load_range_beyond_storable_years_returns_rows() {
        let store = open_store();
        store
            .save_bars(&[aapl_bar(0, 10.0), aapl_bar(1, 11.0)], WriteMode::Full)
            .unwrap();
        store
            .save_ticks(&[TickData::new("AAPL", Exchange::Nasdaq, minute(0))], WriteMode::Full)
            .unwrap();

        let early = chrono_tz::UTC.with_ymd_and_hms(1600, 1, 1, 0, 0, 0).unwrap();
        let late = chrono_tz::UTC.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap();

        let bars = store
            .load_bars("AAPL", Exchange::Nasdaq, Interval::Minute, early, late)
            .unwrap();
        assert_eq!(closes(&bars), vec![10.0, 11.0]);

        let ticks = store.load_ticks("AAPL", Exchange::Nasdaq, early, late).unwrap();
        assert_eq!(ticks.len(), 1);
    }

    #[test]
    fn test_loaded_records_use_store_timezone() {
        let store = open_store();
        assert_eq!(store.timezone(), Shanghai);
        store.save_bars(&[aapl_bar(0, 10.0)], WriteMode::Full).unwrap();

        let loaded = load_aapl(&store, 0, 0);
        assert_eq!(loaded[0].datetime, minute(0));
        assert_eq!(loaded[0].datetime.timezone(), Shanghai);
        assert_eq!(loaded[0].datetime.format("%m-%d %H:%M").to_string(), "01-02 22:30");
    }

    #[test]
    fn test_full_mode_recounts_overlapping_batches() {
        let store = open_store();
        store
            .save_bars(&[aapl_bar(2, 12.0), aapl_bar(3, 13.0), aapl_bar(4, 14.0)], WriteMode::Full)
            .unwrap();

        // Overlaps 2..=3 and extends backwards to 0
        let overview = store
            .save_bars(
                &[aapl_bar(0, 10.0), aapl_bar(1, 11.0), aapl_bar(2, 22.0), aapl_bar(3, 23.0)],
                WriteMode::Full,
            )
            .unwrap();

        assert_eq!(overview.count, 5);
        assert_eq!(overview.start, minute(0));
        assert_eq!(overview.end, minute(4));

        // Last write wins on duplicate timestamps
        assert_eq!(closes(&load_aapl(&store, 0, 4)), vec![10.0, 11.0, 22.0, 23.0, 14.0]);
    }

    #[test]
    fn test_streaming_mode_extends_overview() {
        let store = open_store();

        let first = store
            .save_bars(
                &[aapl_bar(0, 10.0), aapl_bar(1, 11.0), aapl_bar(2, 12.0)],
                WriteMode::Streaming,
            )
            .unwrap();
        assert_eq!(first.count, 3);
        assert_eq!(first.start, minute(0));
        assert_eq!(first.end, minute(2));

        let second = store
            .save_bars(&[aapl_bar(3, 13.0), aapl_bar(4, 14.0)], WriteMode::Streaming)
            .unwrap();
        assert_eq!(second.count, 5);
        assert_eq!(second.start, minute(0));
        assert_eq!(second.end, minute(4));
    }

    #[test]
    fn test_streaming_out_of_order_batch_stays_exact() {
        let store = open_store();
        store
            .save_bars(
                &[aapl_bar(0, 10.0), aapl_bar(1, 11.0), aapl_bar(2, 12.0)],
                WriteMode::Streaming,
            )
            .unwrap();

        // Rewrites minute 2: a blind `count += len` would report 5
        let overview = store
            .save_bars(&[aapl_bar(2, 20.0), aapl_bar(3, 13.0)], WriteMode::Streaming)
            .unwrap();
        assert_eq!(overview.count, 4);
        assert_eq!(overview.end, minute(3));
    }

    #[test]
    fn test_delete_bars_returns_prior_count() {
        let store = open_store();
        store
            .save_bars(&[aapl_bar(0, 10.0), aapl_bar(1, 11.0), aapl_bar(2, 12.0)], WriteMode::Full)
            .unwrap();
        let mut daily = aapl_bar(0, 50.0);
        daily.interval = Some(Interval::Daily);
        store.save_bars(&[daily], WriteMode::Full).unwrap();

        let deleted = store
            .delete_bars("AAPL", Exchange::Nasdaq, Interval::Minute)
            .unwrap();
        assert_eq!(deleted, 3);
        assert!(load_aapl(&store, 0, 2).is_empty());

        // Only the daily series is left
        let overviews = store.list_bar_overviews().unwrap();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].interval, Interval::Daily);

        assert_eq!(
            store.delete_bars("AAPL", Exchange::Nasdaq, Interval::Minute).unwrap(),
            0
        );
    }

    #[test]
    fn test_invalid_batch_is_rejected_before_writing() {
        let store = open_store();

        let err = store.save_bars(&[], WriteMode::Full).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let mut other = aapl_bar(1, 11.0);
        other.exchange = Exchange::Nyse;
        let err = store
            .save_bars(&[aapl_bar(0, 10.0), other], WriteMode::Full)
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        assert!(load_aapl(&store, 0, 1).is_empty());
        assert!(store.list_bar_overviews().unwrap().is_empty());
    }

    #[test]
    fn test_write_failure_is_reported_as_write_error() {
        let store = open_store();
        store.session.lock().execute_batch("DROP TABLE vnpy.bar").unwrap();

        let err = store.save_bars(&[aapl_bar(0, 10.0)], WriteMode::Full).unwrap_err();
        assert_eq!(err.code(), "WRITE_ERROR");
        assert!(err.to_string().starts_with("Write to bar failed"));
    }

    #[test]
    fn test_ticks_round_trip_and_delete() {
        let store = open_store();
        let ticks: Vec<TickData> = (0..4)
            .map(|n| {
                let mut tick = TickData::new("IF2403", Exchange::Cffex, minute(n));
                tick.name = "CSI 300 Mar".to_string();
                tick.last_price = 3500.0 + n as f64;
                tick.bid_price_1 = 3499.8 + n as f64;
                tick.ask_price_1 = 3500.2 + n as f64;
                tick.bid_volume_1 = 3.0;
                tick.ask_volume_5 = 12.0;
                tick.localtime = Some(minute(n) + Duration::milliseconds(20));
                tick
            })
            .collect();

        let overview = store.save_ticks(&ticks, WriteMode::Full).unwrap();
        assert_eq!(overview.count, 4);
        assert_eq!(overview.start, minute(0));
        assert_eq!(overview.end, minute(3));

        let loaded = store
            .load_ticks("IF2403", Exchange::Cffex, minute(0), minute(3))
            .unwrap();
        assert_eq!(loaded, ticks);

        let overviews = store.list_tick_overviews().unwrap();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].count, 4);

        assert_eq!(store.delete_ticks("IF2403", Exchange::Cffex).unwrap(), 4);
        assert!(store.list_tick_overviews().unwrap().is_empty());
        assert!(store
            .load_ticks("IF2403", Exchange::Cffex, minute(0), minute(3))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_tick_streaming_overview() {
        let store = open_store();
        let tick = |n| TickData::new("rb2405", Exchange::Shfe, minute(n));

        store.save_ticks(&[tick(0), tick(1)], WriteMode::Streaming).unwrap();
        let overview = store.save_ticks(&[tick(2)], WriteMode::Streaming).unwrap();

        assert_eq!(overview.count, 3);
        assert_eq!(overview.start, minute(0));
        assert_eq!(overview.end, minute(2));
    }

    #[test]
    fn test_rebuild_overviews_repairs_drift() {
        let store = open_store();
        store
            .save_bars(&[aapl_bar(0, 10.0), aapl_bar(1, 11.0), aapl_bar(2, 12.0)], WriteMode::Full)
            .unwrap();
        store
            .save_ticks(&[TickData::new("AAPL", Exchange::Nasdaq, minute(0))], WriteMode::Full)
            .unwrap();

        store
            .session
            .lock()
            .execute_batch("UPDATE vnpy.baroverview SET \"count\" = 999")
            .unwrap();

        assert_eq!(store.rebuild_overviews().unwrap(), (1, 1));
        let overviews = store.list_bar_overviews().unwrap();
        assert_eq!(overviews[0].count, 3);
        assert_eq!(overviews[0].start, minute(0));
        assert_eq!(overviews[0].end, minute(2));
    }

    #[test]
    fn test_drop_all_reports_each_namespace() {
        let settings = DatabaseSettings {
            layout: SchemaLayout::Split,
            ..DatabaseSettings::in_memory()
        };
        let store = DuckDb::new(&settings).unwrap();
        store.save_bars(&[aapl_bar(0, 10.0)], WriteMode::Full).unwrap();

        let reports = store.drop_all().unwrap();
        let names: Vec<&str> = reports.iter().map(|r| r.namespace.as_str()).collect();
        assert_eq!(names, vec!["vnpy_bar", "vnpy_tick", "vnpy_overview"]);
        assert!(reports.iter().all(|r| r.existed && r.dropped && r.error.is_none()));

        // Second drop finds nothing
        let reports = store.drop_all().unwrap();
        assert!(reports.iter().all(|r| !r.existed && !r.dropped));

        store.ensure_schema().unwrap();
        assert!(load_aapl(&store, 0, 0).is_empty());
        assert!(store.list_bar_overviews().unwrap().is_empty());
    }

    #[test]
    fn test_drop_all_continues_after_a_failed_namespace() {
        let settings = DatabaseSettings {
            layout: SchemaLayout::Split,
            ..DatabaseSettings::in_memory()
        };
        let mut store = DuckDb::new(&settings).unwrap();
        // Unterminated identifier makes the DROP statement fail to parse
        store.namespaces.tick = "broken\"tick".to_string();

        let reports = store.drop_all().unwrap();
        assert_eq!(reports.len(), 3);

        assert_eq!(reports[0].namespace, "vnpy_bar");
        assert!(reports[0].dropped && reports[0].error.is_none());

        assert!(!reports[1].dropped);
        assert!(reports[1].error.is_some());

        assert_eq!(reports[2].namespace, "vnpy_overview");
        assert!(reports[2].existed && reports[2].dropped && reports[2].error.is_none());
    }

    #[test]
    fn test_concurrent_writers_on_distinct_series() {
        let store = Arc::new(open_store());
        let symbols = ["AAPL", "MSFT", "NVDA", "AMZN"];

        let handles: Vec<_> = symbols
            .iter()
            .map(|symbol| {
                let store = Arc::clone(&store);
                let symbol = symbol.to_string();
                std::thread::spawn(move || {
                    let bars: Vec<BarData> = (0..50)
                        .map(|n| {
                            BarData::new(&symbol, Exchange::Nasdaq, Interval::Minute, minute(n))
                        })
                        .collect();
                    store.save_bars(&bars, WriteMode::Full).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let overviews = store.list_bar_overviews().unwrap();
        assert_eq!(overviews.len(), symbols.len());
        assert!(overviews.iter().all(|o| o.count == 50));
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DatabaseSettings {
            path: dir.path().join("history.duckdb").to_string_lossy().to_string(),
            ..DatabaseSettings::default()
        };

        {
            let store = DuckDb::new(&settings).unwrap();
            store
                .save_bars(&[aapl_bar(0, 10.0), aapl_bar(1, 11.0)], WriteMode::Full)
                .unwrap();
        }

        let store = DuckDb::new(&settings).unwrap();
        assert_eq!(closes(&load_aapl(&store, 0, 1)), vec![10.0, 11.0]);
        assert_eq!(store.list_bar_overviews().unwrap()[0].count, 2);
    }

    #[test]
    fn test_upsert_sql_updates_only_value_columns() {
        let sql = upsert_sql("\"vnpy\".\"bar\"", &BAR_COLUMNS, &BAR_KEY);
        assert!(sql.contains("ON CONFLICT (\"symbol\", \"exchange\", \"interval\", \"datetime\")"));
        assert!(sql.contains("\"close_price\" = excluded.\"close_price\""));
        assert!(!sql.contains("\"symbol\" = excluded"));
        assert_eq!(sql.matches('?').count(), BAR_COLUMNS.len());
    }
}
