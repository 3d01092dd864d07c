//! Historify - bar and tick history storage
//!
//! Persists OHLCV bars and order-book ticks in an embedded DuckDB database
//! and keeps a per-series overview (row count and time range) up to date.

pub mod config;
pub mod constant;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;

pub use config::{DatabaseSettings, SchemaLayout};
pub use constant::{Exchange, Interval};
pub use db::{DuckDb, MarketDataStore};
pub use error::{ErrorResponse, Result, StoreError};
pub use models::{BarData, BarOverview, DropReport, TickData, TickOverview, WriteMode};
