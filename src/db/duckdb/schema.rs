//! Namespace layout and schema creation

use crate::config::SchemaLayout;
use crate::error::{Result, StoreError};
use duckdb::Connection;

/// Resolved namespace (DuckDB schema) for every table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    pub bar: String,
    pub tick: String,
    pub overview: String,
}

impl Namespaces {
    pub fn new(database: &str, layout: SchemaLayout) -> Self {
        match layout {
            SchemaLayout::Unified => Self {
                bar: database.to_string(),
                tick: database.to_string(),
                overview: database.to_string(),
            },
            SchemaLayout::Split => Self {
                bar: format!("{database}_bar"),
                tick: format!("{database}_tick"),
                overview: format!("{database}_overview"),
            },
        }
    }

    /// Distinct namespaces in creation order
    pub fn all(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(3);
        for name in [&self.bar, &self.tick, &self.overview] {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    pub fn bar_table(&self) -> String {
        qualified(&self.bar, "bar")
    }

    pub fn tick_table(&self) -> String {
        qualified(&self.tick, "tick")
    }

    pub fn bar_overview_table(&self) -> String {
        qualified(&self.overview, "baroverview")
    }

    pub fn tick_overview_table(&self) -> String {
        qualified(&self.overview, "tickoverview")
    }

    fn tables_in(&self, namespace: &str) -> Vec<&'static str> {
        let mut ddl = Vec::new();
        if self.bar == namespace {
            ddl.push(CREATE_BAR_TABLE);
        }
        if self.tick == namespace {
            ddl.push(CREATE_TICK_TABLE);
        }
        if self.overview == namespace {
            ddl.push(CREATE_BAROVERVIEW_TABLE);
            ddl.push(CREATE_TICKOVERVIEW_TABLE);
        }
        ddl
    }
}

fn qualified(namespace: &str, table: &str) -> String {
    format!("\"{namespace}\".\"{table}\"")
}

/// Whether `namespace` exists in the attached database
pub fn namespace_exists(conn: &Connection, namespace: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM information_schema.schemata
         WHERE catalog_name = current_database() AND schema_name = ?",
        [namespace],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Create every missing namespace together with its tables.
///
/// Existing namespaces are left untouched. Any DDL failure is returned as
/// [`StoreError::Schema`]; the store cannot run without its tables.
pub fn initialize(conn: &Connection, namespaces: &Namespaces) -> Result<()> {
    for namespace in namespaces.all() {
        if namespace_exists(conn, namespace)? {
            tracing::debug!("DuckDB namespace already present: {}", namespace);
            continue;
        }

        tracing::info!("Creating DuckDB namespace: {}", namespace);
        let mut script = format!("CREATE SCHEMA IF NOT EXISTS \"{namespace}\";\n");
        for ddl in namespaces.tables_in(namespace) {
            script.push_str(&ddl.replace("{schema}", namespace));
        }

        conn.execute_batch(&script)
            .map_err(|source| StoreError::Schema {
                namespace: namespace.to_string(),
                source,
            })?;
    }

    Ok(())
}

const CREATE_BAR_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS "{schema}"."bar" (
    symbol VARCHAR NOT NULL,
    exchange VARCHAR NOT NULL,
    "interval" VARCHAR NOT NULL,
    datetime BIGINT NOT NULL,
    volume DOUBLE NOT NULL,
    turnover DOUBLE NOT NULL,
    open_interest DOUBLE NOT NULL,
    open_price DOUBLE NOT NULL,
    high_price DOUBLE NOT NULL,
    low_price DOUBLE NOT NULL,
    close_price DOUBLE NOT NULL,
    PRIMARY KEY (symbol, exchange, "interval", datetime)
);
"#;

const CREATE_TICK_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS "{schema}"."tick" (
    symbol VARCHAR NOT NULL,
    exchange VARCHAR NOT NULL,
    datetime BIGINT NOT NULL,
    name VARCHAR NOT NULL,
    volume DOUBLE NOT NULL,
    turnover DOUBLE NOT NULL,
    open_interest DOUBLE NOT NULL,
    last_price DOUBLE NOT NULL,
    last_volume DOUBLE NOT NULL,
    limit_up DOUBLE NOT NULL,
    limit_down DOUBLE NOT NULL,
    open_price DOUBLE NOT NULL,
    high_price DOUBLE NOT NULL,
    low_price DOUBLE NOT NULL,
    pre_close DOUBLE NOT NULL,
    bid_price_1 DOUBLE NOT NULL,
    bid_price_2 DOUBLE NOT NULL,
    bid_price_3 DOUBLE NOT NULL,
    bid_price_4 DOUBLE NOT NULL,
    bid_price_5 DOUBLE NOT NULL,
    ask_price_1 DOUBLE NOT NULL,
    ask_price_2 DOUBLE NOT NULL,
    ask_price_3 DOUBLE NOT NULL,
    ask_price_4 DOUBLE NOT NULL,
    ask_price_5 DOUBLE NOT NULL,
    bid_volume_1 DOUBLE NOT NULL,
    bid_volume_2 DOUBLE NOT NULL,
    bid_volume_3 DOUBLE NOT NULL,
    bid_volume_4 DOUBLE NOT NULL,
    bid_volume_5 DOUBLE NOT NULL,
    ask_volume_1 DOUBLE NOT NULL,
    ask_volume_2 DOUBLE NOT NULL,
    ask_volume_3 DOUBLE NOT NULL,
    ask_volume_4 DOUBLE NOT NULL,
    ask_volume_5 DOUBLE NOT NULL,
    localtime BIGINT,
    PRIMARY KEY (symbol, exchange, datetime)
);
"#;

const CREATE_BAROVERVIEW_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS "{schema}"."baroverview" (
    symbol VARCHAR NOT NULL,
    exchange VARCHAR NOT NULL,
    "interval" VARCHAR NOT NULL,
    "count" BIGINT NOT NULL,
    "start" BIGINT NOT NULL,
    "end" BIGINT NOT NULL,
    PRIMARY KEY (symbol, exchange, "interval")
);
"#;

const CREATE_TICKOVERVIEW_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS "{schema}"."tickoverview" (
    symbol VARCHAR NOT NULL,
    exchange VARCHAR NOT NULL,
    "count" BIGINT NOT NULL,
    "start" BIGINT NOT NULL,
    "end" BIGINT NOT NULL,
    PRIMARY KEY (symbol, exchange)
);
"#;
