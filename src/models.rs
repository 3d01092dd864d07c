//! Market data records exchanged with the host platform

use crate::constant::{Exchange, Interval};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarData {
    pub symbol: String,
    pub exchange: Exchange,
    pub datetime: DateTime<Tz>,
    pub interval: Option<Interval>,
    pub volume: f64,
    pub turnover: f64,
    pub open_interest: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
}

impl BarData {
    /// Create a bar with all numeric fields zeroed
    pub fn new(
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        datetime: DateTime<Tz>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange,
            datetime,
            interval: Some(interval),
            volume: 0.0,
            turnover: 0.0,
            open_interest: 0.0,
            open_price: 0.0,
            high_price: 0.0,
            low_price: 0.0,
            close_price: 0.0,
        }
    }

    pub fn vt_symbol(&self) -> String {
        format!("{}.{}", self.symbol, self.exchange)
    }
}

/// One order-book snapshot with five levels of depth
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickData {
    pub symbol: String,
    pub exchange: Exchange,
    pub datetime: DateTime<Tz>,

    pub name: String,
    pub volume: f64,
    pub turnover: f64,
    pub open_interest: f64,
    pub last_price: f64,
    pub last_volume: f64,
    pub limit_up: f64,
    pub limit_down: f64,

    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub pre_close: f64,

    pub bid_price_1: f64,
    pub bid_price_2: f64,
    pub bid_price_3: f64,
    pub bid_price_4: f64,
    pub bid_price_5: f64,

    pub ask_price_1: f64,
    pub ask_price_2: f64,
    pub ask_price_3: f64,
    pub ask_price_4: f64,
    pub ask_price_5: f64,

    pub bid_volume_1: f64,
    pub bid_volume_2: f64,
    pub bid_volume_3: f64,
    pub bid_volume_4: f64,
    pub bid_volume_5: f64,

    pub ask_volume_1: f64,
    pub ask_volume_2: f64,
    pub ask_volume_3: f64,
    pub ask_volume_4: f64,
    pub ask_volume_5: f64,

    /// When the snapshot was received locally
    pub localtime: Option<DateTime<Tz>>,
}

impl TickData {
    /// Create a tick with empty name and all numeric fields zeroed
    pub fn new(symbol: &str, exchange: Exchange, datetime: DateTime<Tz>) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange,
            datetime,
            name: String::new(),
            volume: 0.0,
            turnover: 0.0,
            open_interest: 0.0,
            last_price: 0.0,
            last_volume: 0.0,
            limit_up: 0.0,
            limit_down: 0.0,
            open_price: 0.0,
            high_price: 0.0,
            low_price: 0.0,
            pre_close: 0.0,
            bid_price_1: 0.0,
            bid_price_2: 0.0,
            bid_price_3: 0.0,
            bid_price_4: 0.0,
            bid_price_5: 0.0,
            ask_price_1: 0.0,
            ask_price_2: 0.0,
            ask_price_3: 0.0,
            ask_price_4: 0.0,
            ask_price_5: 0.0,
            bid_volume_1: 0.0,
            bid_volume_2: 0.0,
            bid_volume_3: 0.0,
            bid_volume_4: 0.0,
            bid_volume_5: 0.0,
            ask_volume_1: 0.0,
            ask_volume_2: 0.0,
            ask_volume_3: 0.0,
            ask_volume_4: 0.0,
            ask_volume_5: 0.0,
            localtime: None,
        }
    }

    pub fn vt_symbol(&self) -> String {
        format!("{}.{}", self.symbol, self.exchange)
    }
}

/// Stored range summary for one bar series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarOverview {
    pub symbol: String,
    pub exchange: Exchange,
    pub interval: Interval,
    pub count: i64,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Stored range summary for one tick series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOverview {
    pub symbol: String,
    pub exchange: Exchange,
    pub count: i64,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// How the overview is refreshed after a save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Recount the series in storage; exact under overlaps and rewrites
    #[default]
    Full,
    /// Append-only fast path: `count += len`, `end` moves forward, no scan.
    /// Only valid when the batch starts after everything already stored.
    Streaming,
}

/// Outcome of dropping one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropReport {
    pub namespace: String,
    pub existed: bool,
    pub dropped: bool,
    pub error: Option<String>,
}
