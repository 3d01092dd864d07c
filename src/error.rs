//! Store error types

use serde::Serialize;
use thiserror::Error;

/// Store-wide error type
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Connection error: {0}")]
    Connection(#[source] duckdb::Error),

    #[error("Schema error in {namespace}: {source}")]
    Schema {
        namespace: String,
        #[source]
        source: duckdb::Error,
    },

    #[error("Write to {table} failed: {source}")]
    Write {
        table: &'static str,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Wrap a failure that happened while writing to `table`
    pub(crate) fn write(table: &'static str, source: impl Into<StoreError>) -> Self {
        StoreError::Write {
            table,
            source: Box::new(source.into()),
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuckDb(_) => "DUCKDB_ERROR",
            StoreError::Pool(_) => "POOL_ERROR",
            StoreError::Connection(_) => "CONNECTION_ERROR",
            StoreError::Schema { .. } => "SCHEMA_ERROR",
            StoreError::Write { .. } => "WRITE_ERROR",
            StoreError::Serialization(_) => "SERIALIZATION_ERROR",
            StoreError::Validation(_) => "VALIDATION_ERROR",
            StoreError::Decode(_) => "DECODE_ERROR",
            StoreError::Config(_) => "CONFIG_ERROR",
            StoreError::Io(_) => "IO_ERROR",
        }
    }
}

/// Serializable error response for CLI output
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&StoreError> for ErrorResponse {
    fn from(err: &StoreError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
