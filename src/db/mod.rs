//! Market data storage
//!
//! [`MarketDataStore`] is the contract the host platform programs against.
//! [`DuckDb`] is the DuckDB-backed implementation.

pub mod duckdb;

pub use self::duckdb::DuckDb;

use crate::constant::{Exchange, Interval};
use crate::error::Result;
use crate::models::{BarData, BarOverview, DropReport, TickData, TickOverview, WriteMode};
use chrono::DateTime;
use chrono_tz::Tz;

/// Record-oriented access to stored bars, ticks and their overviews
pub trait MarketDataStore: Send + Sync {
    /// Save bars of one (symbol, exchange, interval) series and return the
    /// refreshed overview of that series.
    fn save_bars(&self, bars: &[BarData], mode: WriteMode) -> Result<BarOverview>;

    /// Save ticks of one (symbol, exchange) series and return the refreshed
    /// overview of that series.
    fn save_ticks(&self, ticks: &[TickData], mode: WriteMode) -> Result<TickOverview>;

    /// Bars with `start <= datetime <= end`, oldest first
    fn load_bars(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<BarData>>;

    /// Ticks with `start <= datetime <= end`, oldest first
    fn load_ticks(
        &self,
        symbol: &str,
        exchange: Exchange,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<TickData>>;

    /// Delete a bar series and its overview; returns the rows removed
    fn delete_bars(&self, symbol: &str, exchange: Exchange, interval: Interval) -> Result<i64>;

    /// Delete a tick series and its overview; returns the rows removed
    fn delete_ticks(&self, symbol: &str, exchange: Exchange) -> Result<i64>;

    fn list_bar_overviews(&self) -> Result<Vec<BarOverview>>;

    fn list_tick_overviews(&self) -> Result<Vec<TickOverview>>;

    /// Recompute every overview from the stored rows.
    /// Returns the number of (bar, tick) series found.
    fn rebuild_overviews(&self) -> Result<(usize, usize)>;

    /// Irreversibly remove every namespace of this store
    fn drop_all(&self) -> Result<Vec<DropReport>>;
}
