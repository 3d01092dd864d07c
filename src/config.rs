//! Database settings
//!
//! Keys follow the host platform's flat `database.*` naming, so an existing
//! settings file can be handed over unchanged; unrelated keys are ignored.

use crate::error::{Result, StoreError};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Path value that selects a private in-memory database
pub const MEMORY_PATH: &str = ":memory:";

/// How namespaces are laid out in the database file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaLayout {
    /// One namespace holding every table
    #[default]
    Unified,
    /// Separate `<name>_bar`, `<name>_tick` and `<name>_overview` namespaces
    Split,
}

impl std::str::FromStr for SchemaLayout {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "unified" => Ok(SchemaLayout::Unified),
            "split" => Ok(SchemaLayout::Split),
            other => Err(StoreError::Config(format!("unknown schema layout: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    #[serde(rename = "database.path")]
    pub path: String,
    #[serde(rename = "database.database")]
    pub database: String,
    #[serde(rename = "database.timezone")]
    pub timezone: String,
    #[serde(rename = "database.pool_size")]
    pub pool_size: u32,
    #[serde(rename = "database.layout")]
    pub layout: SchemaLayout,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "historify.duckdb".to_string(),
            database: "vnpy".to_string(),
            timezone: "Asia/Shanghai".to_string(),
            pool_size: 4,
            layout: SchemaLayout::Unified,
        }
    }
}

impl DatabaseSettings {
    /// Settings for a throwaway in-memory database
    pub fn in_memory() -> Self {
        Self {
            path: MEMORY_PATH.to_string(),
            ..Self::default()
        }
    }

    /// Load settings from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: DatabaseSettings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `HISTORIFY_DB_*` environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let layout = match env_str("HISTORIFY_DB_LAYOUT") {
            Some(s) => s.parse()?,
            None => defaults.layout,
        };
        let pool_size = match env_str("HISTORIFY_DB_POOL_SIZE") {
            Some(s) => s
                .parse()
                .map_err(|_| StoreError::Config(format!("invalid HISTORIFY_DB_POOL_SIZE: {s}")))?,
            None => defaults.pool_size,
        };

        let settings = Self {
            path: env_str("HISTORIFY_DB_PATH").unwrap_or(defaults.path),
            database: env_str("HISTORIFY_DB_DATABASE").unwrap_or(defaults.database),
            timezone: env_str("HISTORIFY_DB_TIMEZONE").unwrap_or(defaults.timezone),
            pool_size,
            layout,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Parsed database timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| StoreError::Config(format!("invalid timezone {:?}: {}", self.timezone, e)))
    }

    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Check settings before any connection is opened
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(StoreError::Config("database.path must not be empty".to_string()));
        }
        validate_namespace(&self.database)?;
        self.tz()?;
        if self.pool_size == 0 {
            return Err(StoreError::Config("database.pool_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Namespace names are spliced into DDL, so only plain identifiers pass.
fn validate_namespace(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        return Err(StoreError::Config(format!(
            "database.database must be a plain identifier, got {name:?}"
        )));
    }

    let lower = name.to_lowercase();
    if matches!(lower.as_str(), "main" | "temp" | "information_schema" | "pg_catalog") {
        return Err(StoreError::Config(format!(
            "database.database cannot use reserved namespace {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let settings = DatabaseSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.tz().unwrap(), chrono_tz::Asia::Shanghai);
        assert!(!settings.is_memory());
        assert!(DatabaseSettings::in_memory().is_memory());
    }

    #[test]
    fn test_from_json_file_ignores_unrelated_keys() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "font.family": "Arial",
                "database.path": ":memory:",
                "database.database": "history",
                "database.timezone": "America/New_York",
                "database.layout": "split"
            }}"#
        )
        .unwrap();

        let settings = DatabaseSettings::from_json_file(file.path()).unwrap();
        assert_eq!(settings.database, "history");
        assert_eq!(settings.layout, SchemaLayout::Split);
        assert_eq!(settings.tz().unwrap(), chrono_tz::America::New_York);
        // Missing keys fall back to defaults
        assert_eq!(settings.pool_size, 4);
    }

    #[test]
    fn test_rejects_bad_namespace() {
        for name in ["", "1abc", "vn-py", "main", "a b", "x;DROP"] {
            let settings = DatabaseSettings {
                database: name.to_string(),
                ..DatabaseSettings::in_memory()
            };
            let err = settings.validate().unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR", "namespace {name:?}");
        }
    }

    #[test]
    fn test_rejects_bad_timezone_and_pool() {
        let settings = DatabaseSettings {
            timezone: "Mars/Olympus".to_string(),
            ..DatabaseSettings::in_memory()
        };
        assert!(settings.validate().is_err());

        let settings = DatabaseSettings {
            pool_size: 0,
            ..DatabaseSettings::in_memory()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("Split".parse::<SchemaLayout>().unwrap(), SchemaLayout::Split);
        assert!("sharded".parse::<SchemaLayout>().is_err());
    }
}
