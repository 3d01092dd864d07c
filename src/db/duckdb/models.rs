//! Flat row types as stored in DuckDB
//!
//! Codes are plain strings and every timestamp is nanoseconds since the Unix
//! epoch. Conversion to and from the typed records lives in `marshal`.

/// Identity of one stored series. `interval` is `None` for ticks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub symbol: String,
    pub exchange: String,
    pub interval: Option<String>,
}

impl SeriesKey {
    /// Values bound to the `WHERE` clause from [`SeriesKey::predicate`]
    pub fn values(&self) -> Vec<&str> {
        let mut values = vec![self.symbol.as_str(), self.exchange.as_str()];
        if let Some(interval) = &self.interval {
            values.push(interval);
        }
        values
    }

    /// Equality predicate matching this series
    pub fn predicate(&self) -> &'static str {
        if self.interval.is_some() {
            "symbol = ? AND exchange = ? AND \"interval\" = ?"
        } else {
            "symbol = ? AND exchange = ?"
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.interval {
            Some(interval) => write!(f, "{}.{}[{}]", self.symbol, self.exchange, interval),
            None => write!(f, "{}.{}", self.symbol, self.exchange),
        }
    }
}

/// Row with a nanosecond timestamp
pub trait Timestamped {
    fn datetime(&self) -> i64;
}

/// Bar table row
#[derive(Debug, Clone, PartialEq)]
pub struct BarRow {
    pub symbol: String,
    pub exchange: String,
    pub interval: String,
    pub datetime: i64,
    pub volume: f64,
    pub turnover: f64,
    pub open_interest: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
}

impl Timestamped for BarRow {
    fn datetime(&self) -> i64 {
        self.datetime
    }
}

/// Tick table row
#[derive(Debug, Clone, PartialEq)]
pub struct TickRow {
    pub symbol: String,
    pub exchange: String,
    pub datetime: i64,
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
    pub bid_price: [f64; 5],
    pub ask_price: [f64; 5],
    pub bid_volume: [f64; 5],
    pub ask_volume: [f64; 5],
    pub localtime: Option<i64>,
}

impl Timestamped for TickRow {
    fn datetime(&self) -> i64 {
        self.datetime
    }
}

/// Overview table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewRow {
    pub key: SeriesKey,
    pub count: i64,
    pub start: i64,
    pub end: i64,
}

/// Rows of a single series, sorted by timestamp with no duplicate timestamps
#[derive(Debug, Clone)]
pub struct Batch<R> {
    pub key: SeriesKey,
    pub rows: Vec<R>,
}

impl<R: Timestamped> Batch<R> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Earliest timestamp; batches are never empty once built
    pub fn start(&self) -> i64 {
        self.rows.first().map(Timestamped::datetime).unwrap_or_default()
    }

    /// Latest timestamp
    pub fn end(&self) -> i64 {
        self.rows.last().map(Timestamped::datetime).unwrap_or_default()
    }

    pub fn span(&self) -> Span {
        Span {
            start: self.start(),
            end: self.end(),
            len: self.rows.len() as i64,
        }
    }
}

/// Time range and distinct row count of one written batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: i64,
    pub end: i64,
    pub len: i64,
}
